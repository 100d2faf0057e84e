use std::sync::mpsc;
use std::sync::Arc;

use rand::prelude::*;
use serde_json::Value;

use super::hub::Hub;
use super::session::Outbound;
use super::ServerContext;
use crate::config::card_cost;
use crate::control::{spawn_desk, Desk, DeskHandle, DeskMessage};
use crate::error::{ErrorCode, GameResult};
use crate::listener::{EventPrinter, Listener};
use crate::model::*;
use crate::storage::{DeskRecord, User};
use crate::util::log::is_verbose;
use crate::util::misc::unixtime_now;
use crate::{error, info, warn};

// 1接続分のリクエストの振り分け
// 卓に関するリクエストは卓のスレッドへ転送し, レスポンスは卓から返る
pub struct Router {
    ctx: Arc<ServerContext>,
    sid: u64,
    tx: mpsc::Sender<Outbound>,
    uid: Option<Uid>,
}

impl Router {
    pub fn new(ctx: Arc<ServerContext>, tx: mpsc::Sender<Outbound>) -> Self {
        let sid = ctx.sessions.new_sid();
        Self {
            ctx,
            sid,
            tx,
            uid: None,
        }
    }

    pub fn uid(&self) -> Option<Uid> {
        self.uid
    }

    // その場で返すべきレスポンスがあれば返す
    pub fn handle(&mut self, frame: ClientFrame) -> Option<ServerFrame> {
        let ClientFrame { route, id, data } = frame;
        if route == route::LOGIN {
            let res = self.login(data).map(|r| to_json(&r));
            return Some(ServerFrame::result(&route, id, res));
        }

        let uid = match self.uid {
            Some(u) => u,
            None => return Some(ServerFrame::err(&route, id, ErrorCode::AuthFailed)),
        };
        let res = match route.as_str() {
            route::CREATE => self.create(uid, id, data),
            route::JOIN => self.join(uid, id, data),
            route::REJOIN | route::REENTER => self.rejoin(uid, &route, id, data),
            r if r.starts_with("Desk.") => self.forward(uid, &route, id, data),
            _ => Err(ErrorCode::BadRoute),
        };
        match res {
            Ok(()) => None,
            Err(e) => {
                warn!("{}: {} failed: {}", uid, route, e);
                Some(ServerFrame::err(&route, id, e))
            }
        }
    }

    // 接続が切れた
    pub fn close(&mut self) {
        if let Some(uid) = self.uid.take() {
            if !self.ctx.sessions.unbind(uid, self.sid) {
                return;
            }
            if let Some(h) = self.seated_desk(uid) {
                h.send(DeskMessage::Online {
                    uid,
                    is_online: false,
                })
                .ok();
            }
        }
    }

    fn seated_desk(&self, uid: Uid) -> Option<DeskHandle> {
        let no = self.ctx.desks.desk_of(uid)?;
        self.ctx.desks.get(&no).ok()
    }

    // [Login]
    fn login(&mut self, data: Value) -> GameResult<UserResponse> {
        let req: LoginRequest = parse_data(data)?;
        let st = self.ctx.storage.clone();

        let mut user = match st.query_user(req.uid) {
            Ok(u) if req.uid != 0 => u,
            Ok(_) | Err(ErrorCode::UserNotFound) => self.new_guest(req.uid, &req.name)?,
            Err(e) => return Err(e),
        };

        if let Some(old) = self.uid {
            if old != user.uid {
                self.close();
            }
        }
        self.ctx.sessions.bind(user.uid, self.sid, self.tx.clone());
        self.uid = Some(user.uid);

        // 着席中の卓へ再接続を通知
        if let Some(h) = self.seated_desk(user.uid) {
            h.send(DeskMessage::Online {
                uid: user.uid,
                is_online: true,
            })
            .ok();
        }

        user.last_login = unixtime_now();
        let u = user.clone();
        self.ctx
            .jobs
            .push("update_user", move || Ok(st.update_user(&u)?));

        info!("{} logged in (session {})", user.uid, self.sid);
        Ok(UserResponse {
            uid: user.uid,
            name: user.name,
            coin: user.coin,
            desk_no: self.ctx.desks.desk_of(user.uid),
        })
    }

    // uidが0なら未使用の番号を採番
    fn new_guest(&self, uid: Uid, name: &str) -> GameResult<User> {
        let st = &self.ctx.storage;
        let uid = if uid != 0 {
            uid
        } else {
            let mut rng = thread_rng();
            loop {
                let u: Uid = rng.gen_range(100_000..1_000_000);
                match st.query_user(u) {
                    Err(ErrorCode::UserNotFound) => break u,
                    Err(e) => return Err(e),
                    Ok(_) => {}
                }
            }
        };
        let name = if name.is_empty() {
            format!("guest{}", uid)
        } else {
            name.to_string()
        };
        let user = User {
            uid,
            name,
            coin: self.ctx.init_coin,
            last_login: 0,
        };
        st.insert_user(&user)?;
        info!("{}: guest provisioned", uid);
        Ok(user)
    }

    // [Desk manager]
    fn create(&mut self, uid: Uid, id: Option<u64>, data: Value) -> GameResult {
        let req: CreateDeskRequest = parse_data(data)?;
        req.opts.validate()?;
        if self.ctx.desks.desk_of(uid).is_some() {
            return Err(ErrorCode::IllegalDeskStatus);
        }

        let st = self.ctx.storage.clone();
        if req.club_id != 0 {
            if !st.is_club_member(req.club_id, uid)? {
                return Err(ErrorCode::PermissionDenied);
            }
            if !st.is_balance_enough(req.club_id)? {
                return Err(ErrorCode::CoinNotEnough);
            }
        }

        // 房卡は作成時に先払い. 卓の起動に失敗したら返却
        let user = st.query_user(uid)?;
        let cost = card_cost(req.opts.max_round);
        let coin = if cost > 0 {
            st.user_lose_coin(uid, cost)?
        } else {
            user.coin
        };
        let handle = match self.spawn(uid, &req, cost) {
            Ok(h) => h,
            Err(e) => {
                if cost > 0 {
                    if let Err(e) = st.user_add_coin(uid, cost) {
                        error!("{}: refund failed: {}", uid, e);
                    }
                }
                return Err(e);
            }
        };

        if cost > 0 {
            let frame = ServerFrame::push(push::COIN_CHANGE, &CoinChangePush { uid, coin });
            self.ctx.sessions.send(uid, &frame);
        }
        handle.send(DeskMessage::Join {
            uid,
            name: user.name,
            route: route::CREATE.to_string(),
            id,
        })
    }

    fn spawn(&self, uid: Uid, req: &CreateDeskRequest, cost: i64) -> GameResult<DeskHandle> {
        let ctx = &self.ctx;
        ctx.desks.create(uid, |desk_no| {
            let rec = DeskRecord {
                id: 0,
                desk_no: desk_no.to_string(),
                creator: uid,
                club_id: req.club_id,
                opts: req.opts.clone(),
                round: 0,
                scores: vec![],
                status: DeskStatus::Create,
                created_at: unixtime_now(),
            };
            let desk_id = ctx.storage.insert_desk(&rec)?;

            let mut listeners: Vec<Box<dyn Listener>> =
                vec![Box::new(Hub::new(ctx.sessions.clone(), ctx.desks.clone()))];
            if is_verbose() {
                listeners.push(Box::new(EventPrinter::new(desk_no)));
            }
            let desk = Desk::new(
                desk_no,
                desk_id,
                uid,
                req.club_id,
                req.opts.clone(),
                cost,
                ctx.desk_cfg.clone(),
                thread_rng().gen(),
                ctx.storage.clone(),
                ctx.jobs.clone(),
                listeners,
            );
            info!("desk {} created by {} ({:?})", desk_no, uid, req.opts);
            Ok(spawn_desk(desk))
        })
    }

    fn join(&mut self, uid: Uid, id: Option<u64>, data: Value) -> GameResult {
        let req: DeskIdRequest = parse_data(data)?;
        let handle = self.ctx.desks.get(&req.desk_id)?;
        if let Some(no) = self.ctx.desks.desk_of(uid) {
            if no != req.desk_id {
                return Err(ErrorCode::IllegalDeskStatus);
            }
        }
        let user = self.ctx.storage.query_user(uid)?;
        handle.send(DeskMessage::Join {
            uid,
            name: user.name,
            route: route::JOIN.to_string(),
            id,
        })
    }

    fn rejoin(&mut self, uid: Uid, route: &str, id: Option<u64>, data: Value) -> GameResult {
        let req: DeskIdRequest = parse_data(data)?;
        let handle = self.ctx.desks.get(&req.desk_id)?;
        handle.send(DeskMessage::Request {
            uid,
            route: route.to_string(),
            id,
            data: Value::Null,
        })
    }

    // [Desk]
    fn forward(&mut self, uid: Uid, route: &str, id: Option<u64>, data: Value) -> GameResult {
        let no = self.ctx.desks.desk_of(uid).ok_or(ErrorCode::DeskNotFound)?;
        let handle = self.ctx.desks.get(&no)?;
        handle.send(DeskMessage::Request {
            uid,
            route: route.to_string(),
            id,
            data,
        })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::control::{DeskConfig, DeskRegistry};
    use crate::server::session::SessionRegistry;
    use crate::storage::{Club, MemoryStorage, Storage};
    use crate::util::jobs::Jobs;

    fn test_ctx() -> (Arc<ServerContext>, Arc<MemoryStorage>) {
        let st = Arc::new(MemoryStorage::new());
        let ctx = ServerContext {
            sessions: Arc::new(SessionRegistry::new()),
            desks: Arc::new(DeskRegistry::new()),
            storage: st.clone(),
            jobs: Jobs::inline(),
            desk_cfg: DeskConfig::default(),
            init_coin: 10,
        };
        (Arc::new(ctx), st)
    }

    struct Client {
        router: Router,
        rx: mpsc::Receiver<Outbound>,
    }

    impl Client {
        fn new(ctx: &Arc<ServerContext>) -> Self {
            let (tx, rx) = mpsc::channel();
            Self {
                router: Router::new(ctx.clone(), tx),
                rx,
            }
        }

        fn call(&mut self, route: &str, data: Value) -> Option<ServerFrame> {
            self.router.handle(ClientFrame {
                route: route.to_string(),
                id: Some(1),
                data,
            })
        }

        fn login(&mut self, uid: Uid) -> UserResponse {
            let res = self.call(route::LOGIN, json!({ "uid": uid })).unwrap();
            assert_eq!(res.code(), 0);
            serde_json::from_value(res.data().clone()).unwrap()
        }

        // 指定のrouteのフレームが届くまで待つ
        fn wait_for(&self, route: &str) -> ServerFrame {
            loop {
                match self.rx.recv_timeout(Duration::from_secs(2)) {
                    Ok(Outbound::Frame(f)) if f.route() == route => return f,
                    Ok(_) => {}
                    Err(e) => panic!("{} not received: {:?}", route, e),
                }
            }
        }
    }

    #[test]
    fn test_login() {
        let (ctx, st) = test_ctx();
        let mut c = Client::new(&ctx);

        let res = c.call(route::READY, Value::Null).unwrap();
        assert_eq!(res.code(), ErrorCode::AuthFailed.code());

        let u = c.login(0);
        assert!(u.uid >= 100_000);
        assert_eq!(u.name, format!("guest{}", u.uid));
        assert_eq!(u.coin, 10);
        assert_eq!(u.desk_no, None);
        assert!(ctx.sessions.is_online(u.uid));
        assert!(st.query_user(u.uid).unwrap().last_login > 0);

        let res = c.call("Club.List", Value::Null).unwrap();
        assert_eq!(res.code(), ErrorCode::BadRoute.code());
        let res = c.call(route::LOGIN, json!({ "uid": "x" })).unwrap();
        assert_eq!(res.code(), ErrorCode::WrongType.code());

        // 同じuidで別の接続からログイン
        let mut c2 = Client::new(&ctx);
        assert_eq!(c2.login(u.uid).uid, u.uid);
        assert!(matches!(c.rx.try_recv(), Ok(Outbound::Kick(_))));
        c.router.close();
        assert!(ctx.sessions.is_online(u.uid));
        c2.router.close();
        assert!(!ctx.sessions.is_online(u.uid));
    }

    #[test]
    fn test_create_and_join() {
        let (ctx, st) = test_ctx();
        let mut a = Client::new(&ctx);
        let mut b = Client::new(&ctx);
        a.login(1);
        b.login(2);

        let res = a.call(route::SELECT_QUE, json!({ "que": 1 })).unwrap();
        assert_eq!(res.code(), ErrorCode::DeskNotFound.code());
        let res = a.call(route::CREATE, json!({ "opts": { "mode": 5 } })).unwrap();
        assert_eq!(res.code(), ErrorCode::InvalidParameter.code());

        // 4局は房卡2枚
        assert!(a.call(route::CREATE, json!({ "opts": { "mode": 3 } })).is_none());
        let coin = a.wait_for(push::COIN_CHANGE);
        assert_eq!(coin.data()["coin"], json!(8));
        let created = a.wait_for(route::CREATE);
        assert_eq!(created.code(), 0);
        let desk_no = created.data()["tableInfo"]["deskNo"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(ctx.desks.desk_of(1), Some(desk_no.clone()));
        assert_eq!(st.query_user(1).unwrap().coin, 8);

        // 着席中は別の卓を作れない
        let res = a.call(route::CREATE, Value::Null).unwrap();
        assert_eq!(res.code(), ErrorCode::IllegalDeskStatus.code());

        let res = b.call(route::JOIN, json!({ "deskId": "x" })).unwrap();
        assert_eq!(res.code(), ErrorCode::DeskNotFound.code());
        assert!(b.call(route::JOIN, json!({ "deskId": desk_no })).is_none());
        let joined = b.wait_for(route::JOIN);
        assert_eq!(joined.code(), 0);
        let pj = a.wait_for(push::PLAYER_JOIN);
        assert_eq!(pj.data()["uid"], json!(2));

        // 卓へのリクエストは転送される
        assert!(b.call(route::READY, Value::Null).is_none());
        assert_eq!(b.wait_for(route::READY).code(), 0);

        // 切断は卓に通知される
        b.router.close();
        let off = a.wait_for(push::OFFLINE_STATUS);
        assert_eq!(off.data()["isOnline"], json!(false));

        // 再ログインで卓に復帰
        let mut b2 = Client::new(&ctx);
        assert_eq!(b2.login(2).desk_no, Some(desk_no.clone()));
        let on = a.wait_for(push::OFFLINE_STATUS);
        assert_eq!(on.data()["uid"], json!(2));
        assert_eq!(on.data()["isOnline"], json!(true));

        // 作成者による解散で返金
        assert!(a.call(route::EXIT, json!({ "isDestroy": true })).is_none());
        let end = a.wait_for(push::GAME_END);
        assert_eq!(end.data()["isNormalFinished"], json!(false));
        let refund = a.wait_for(push::COIN_CHANGE);
        assert_eq!(refund.data()["coin"], json!(10));
        assert_eq!(st.query_user(1).unwrap().coin, 10);
    }

    #[test]
    fn test_create_twice() {
        let (ctx, st) = test_ctx();
        let mut a = Client::new(&ctx);
        a.login(1);

        // 卓のスレッドが着席を処理する前の2回目の作成
        assert!(a.call(route::CREATE, Value::Null).is_none());
        let res = a.call(route::CREATE, Value::Null).unwrap();
        assert_eq!(res.code(), ErrorCode::IllegalDeskStatus.code());
        assert_eq!(ctx.desks.len(), 1);
        assert_eq!(st.query_user(1).unwrap().coin, 8);
        assert_eq!(a.wait_for(route::CREATE).code(), 0);
    }

    #[test]
    fn test_create_checks() {
        let (ctx, st) = test_ctx();
        let mut a = Client::new(&ctx);
        a.login(1);

        st.insert_club(Club {
            id: 5,
            name: "club".to_string(),
            owner: 9,
            balance: 0,
        });
        let res = a.call(route::CREATE, json!({ "clubId": 5 })).unwrap();
        assert_eq!(res.code(), ErrorCode::PermissionDenied.code());
        st.apply_club(1, 5).unwrap();
        let res = a.call(route::CREATE, json!({ "clubId": 5 })).unwrap();
        assert_eq!(res.code(), ErrorCode::CoinNotEnough.code());

        // 16局は房卡4枚
        st.user_lose_coin(1, 7).unwrap();
        let res = a
            .call(route::CREATE, json!({ "opts": { "maxRound": 16 } }))
            .unwrap();
        assert_eq!(res.code(), ErrorCode::CoinNotEnough.code());
        assert_eq!(st.query_user(1).unwrap().coin, 3);
        assert!(ctx.desks.is_empty());

        // ストレージ障害
        st.set_fail(true);
        let res = a.call(route::CREATE, json!({ "opts": { "maxRound": 1 } })).unwrap();
        assert_eq!(res.code(), ErrorCode::DBOperation.code());
        st.set_fail(false);
        assert_eq!(st.query_user(1).unwrap().coin, 3);
    }
}
