use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::prelude::*;
use serde_json::Value;

use super::dissolve::DissolveContext;
use super::player::DeskPlayer;
use crate::error::{ErrorCode, GameResult};
use crate::listener::Listener;
use crate::model::*;
use crate::storage::{DeskRecord, Storage};
use crate::util::jobs::Jobs;
use crate::util::misc::unixtime_now;
use crate::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub deck: usize,                      // 72 | 108
    pub dissolve_timeout: Duration,       // 解散投票の期限
    pub offline_grace: Duration,          // 応答待ち中に切断した場合の猶予
    pub action_timeout: Option<Duration>, // 接続中のプレイヤーの応答期限 (Noneは無期限)
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            deck: DECK_72,
            dissolve_timeout: Duration::from_secs(60),
            offline_grace: Duration::from_secs(15),
            action_timeout: None,
        }
    }
}

// 卓のスレッドへ送るメッセージ
#[derive(Debug, Clone)]
pub enum DeskMessage {
    Join {
        uid: Uid,
        name: String,
        route: String, // レスポンスを返すroute (Create | Join)
        id: Option<u64>,
    },
    Request {
        uid: Uid,
        route: String,
        id: Option<u64>,
        data: Value,
    },
    Online {
        uid: Uid,
        is_online: bool,
    },
    Die,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    Discard { after_gang: bool },
    RobGang,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub seat: Seat,
    pub hint: Hint,
    pub answer: Option<OpType>,
}

// 打牌(巴杠)に対する鳴き,ロンの受付
#[derive(Debug, Clone)]
pub struct ClaimWindow {
    pub from: Seat,
    pub tile: Tile,
    pub kind: ClaimKind,
    pub candidates: Vec<Candidate>, // 放銃者の次の席から順に
}

// 卓が待っている応答
#[derive(Debug, Clone)]
pub enum Wait {
    None,
    Turn { seat: Seat, hint: Hint },
    Claim(ClaimWindow),
}

pub struct Desk {
    pub(super) desk_no: DeskNo,
    pub(super) desk_id: i64,
    pub(super) creator: Uid,
    pub(super) club_id: i64,
    pub(super) opts: DeskOptions,
    pub(super) cfg: DeskConfig,
    pub(super) card_cost: i64,
    pub(super) created_at: i64,
    // 進行
    pub(super) status: DeskStatus,
    pub(super) players: Vec<DeskPlayer>,
    pub(super) round: usize,
    pub(super) dealer: Seat,
    pub(super) turn: Seat,
    pub(super) dice: [usize; 2],
    pub(super) wall: Vec<Tile>,
    pub(super) n_deal: usize, // 牌山からツモった枚数
    pub(super) next_wall: Option<Vec<Tile>>,
    pub(super) rng: rand::rngs::StdRng,
    pub(super) last_discard: Option<(Seat, Tile)>,
    pub(super) wait: Wait,
    pub(super) last_hint_uid: Option<Uid>,
    pub(super) snapshot: SnapShot,
    pub(super) round_begin: i64,
    pub(super) dissolve: Option<DissolveContext>,
    // 外部
    listeners: Vec<Box<dyn Listener>>,
    pub(super) storage: Arc<dyn Storage>,
    pub(super) jobs: Jobs,
}

impl Desk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        desk_no: &str,
        desk_id: i64,
        creator: Uid,
        club_id: i64,
        opts: DeskOptions,
        card_cost: i64,
        cfg: DeskConfig,
        seed: u64,
        storage: Arc<dyn Storage>,
        jobs: Jobs,
        listeners: Vec<Box<dyn Listener>>,
    ) -> Self {
        Self {
            desk_no: desk_no.to_string(),
            desk_id,
            creator,
            club_id,
            opts,
            cfg,
            card_cost,
            created_at: unixtime_now(),
            status: DeskStatus::Create,
            players: vec![],
            round: 0,
            dealer: 0,
            turn: 0,
            dice: [0, 0],
            wall: vec![],
            n_deal: 0,
            next_wall: None,
            rng: rand::SeedableRng::seed_from_u64(seed),
            last_discard: None,
            wait: Wait::None,
            last_hint_uid: None,
            snapshot: SnapShot::default(),
            round_begin: 0,
            dissolve: None,
            listeners,
            storage,
            jobs,
        }
    }

    // [Accessor]
    pub fn desk_no(&self) -> &str {
        &self.desk_no
    }

    pub fn status(&self) -> DeskStatus {
        self.status
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn dealer(&self) -> Seat {
        self.dealer
    }

    pub fn turn(&self) -> Seat {
        self.turn
    }

    pub fn players(&self) -> &[DeskPlayer] {
        &self.players
    }

    pub fn wait(&self) -> &Wait {
        &self.wait
    }

    pub fn snapshot(&self) -> &SnapShot {
        &self.snapshot
    }

    pub fn wall_count(&self) -> usize {
        self.wall.len() - self.n_deal
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, DeskStatus::Destroy | DeskStatus::Cleaned)
    }

    pub fn seat_of(&self, uid: Uid) -> Option<Seat> {
        self.players.iter().position(|p| p.uid == uid)
    }

    // 次の局の牌山を指定する (検証用)
    pub fn set_next_wall(&mut self, wall: Vec<Tile>) {
        self.next_wall = Some(wall);
    }

    pub(super) fn n_seat(&self) -> usize {
        self.players.len()
    }

    pub(super) fn n_suit(&self) -> usize {
        self.cfg.deck / (RANK * TILE)
    }

    pub(super) fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    pub(super) fn roll_dice(&mut self) -> [usize; 2] {
        [self.rng.gen_range(1..=6), self.rng.gen_range(1..=6)]
    }

    pub fn table_info(&self) -> TableInfo {
        TableInfo {
            desk_no: self.desk_no.clone(),
            creator: self.creator,
            opts: self.opts.clone(),
            status: self.status,
            round: self.round,
            dealer: self.dealer,
            players: self.players.iter().map(|p| p.info()).collect(),
        }
    }

    pub(super) fn record(&self) -> DeskRecord {
        DeskRecord {
            id: self.desk_id,
            desk_no: self.desk_no.clone(),
            creator: self.creator,
            club_id: self.club_id,
            opts: self.opts.clone(),
            round: self.round,
            scores: self.players.iter().map(|p| (p.uid, p.score)).collect(),
            status: self.status,
            created_at: self.created_at,
        }
    }

    // [Output]
    pub(super) fn notify(&mut self, uid: Uid, frame: &ServerFrame) {
        for l in &mut self.listeners {
            l.notify(uid, frame);
        }
    }

    pub(super) fn push_to<T: serde::Serialize>(&mut self, uid: Uid, route: &str, data: &T) {
        let frame = ServerFrame::push(route, data);
        self.notify(uid, &frame);
    }

    pub(super) fn broadcast<T: serde::Serialize>(&mut self, route: &str, data: &T) {
        let frame = ServerFrame::push(route, data);
        let uids: Vec<Uid> = self.players.iter().map(|p| p.uid).collect();
        for uid in uids {
            self.notify(uid, &frame);
        }
    }

    fn respond(&mut self, uid: Uid, route: &str, id: Option<u64>, res: GameResult<Value>) {
        if let Err(e) = &res {
            debug!("[{}] {} {} failed: {}", self.desk_no, uid, route, e);
        }
        let frame = ServerFrame::result(route, id, res);
        self.notify(uid, &frame);
    }

    pub(super) fn seat_changed(&mut self, uid: Uid, seated: bool) {
        let desk_no = self.desk_no.clone();
        for l in &mut self.listeners {
            l.seat_changed(uid, if seated { Some(&desk_no) } else { None });
        }
    }

    pub(super) fn closed(&mut self) {
        let desk_no = self.desk_no.clone();
        for l in &mut self.listeners {
            l.desk_closed(&desk_no);
        }
    }

    pub(super) fn update_desk_job(&self) {
        let st = self.storage.clone();
        let rec = self.record();
        self.jobs
            .push("update_desk", move || Ok(st.update_desk(&rec)?));
    }

    // [Message]
    pub fn handle(&mut self, msg: DeskMessage, now: Instant) {
        if self.is_closed() {
            if let DeskMessage::Request { uid, route, id, .. }
            | DeskMessage::Join { uid, route, id, .. } = msg
            {
                self.respond(uid, &route, id, Err(ErrorCode::DeskNotFound));
            }
            return;
        }

        match msg {
            DeskMessage::Join {
                uid,
                name,
                route,
                id,
            } => {
                let res = self.join(uid, &name, now).map(|r| to_json(&r));
                self.respond(uid, &route, id, res);
            }
            DeskMessage::Request {
                uid,
                route,
                id,
                data,
            } => {
                self.handle_request(uid, &route, id, data, now);
            }
            DeskMessage::Online { uid, is_online } => {
                if let Some(seat) = self.seat_of(uid) {
                    self.set_online(seat, is_online, now);
                }
            }
            DeskMessage::Die => {
                self.destroy("server shutdown");
            }
        }
        self.tick(now);
    }

    pub(super) fn handle_request(
        &mut self,
        uid: Uid,
        route: &str,
        id: Option<u64>,
        data: Value,
        now: Instant,
    ) {
        let seat = match self.seat_of(uid) {
            Some(s) => s,
            None => {
                self.respond(uid, route, id, Err(ErrorCode::PlayerNotFound));
                return;
            }
        };

        // 解散投票中は対局の操作を保留
        if let Some(d) = &mut self.dissolve {
            if route == route::OP_CHOOSE || route == route::SELECT_QUE {
                d.queue(uid, route, id, data);
                return;
            }
        }

        let res = self.dispatch(seat, route, data, now);
        self.respond(uid, route, id, res);
    }

    fn dispatch(&mut self, seat: Seat, route: &str, data: Value, now: Instant) -> GameResult<Value> {
        match route {
            route::READY => {
                self.ready(seat, now)?;
                Ok(Value::Null)
            }
            route::CLIENT_INIT => {
                let req: ClientInitRequest = parse_data(data)?;
                self.client_init(seat, req.is_reenter, now)?;
                Ok(Value::Null)
            }
            route::SELECT_QUE => {
                let req: SelectQueRequest = parse_data(data)?;
                self.select_que(seat, req.que, now)?;
                Ok(Value::Null)
            }
            route::OP_CHOOSE => {
                let act: Action = parse_data(data)?;
                self.op_choose(seat, act, now)?;
                Ok(Value::Null)
            }
            route::DISSOLVE => {
                self.propose_dissolve(seat, now)?;
                Ok(Value::Null)
            }
            route::DISSOLVE_STATUS => {
                let req: DissolveStatusRequest = parse_data(data)?;
                self.vote_dissolve(seat, req.result, now)?;
                Ok(Value::Null)
            }
            route::EXIT => {
                let req: ExitRequest = parse_data(data)?;
                self.exit(seat, req.is_destroy, now)?;
                Ok(Value::Null)
            }
            route::REJOIN | route::REENTER => {
                self.set_online(seat, true, now);
                Ok(to_json(&TableResponse {
                    table_info: self.table_info(),
                }))
            }
            _ => Err(ErrorCode::BadRoute),
        }
    }

    // [Operation]
    pub fn join(&mut self, uid: Uid, name: &str, now: Instant) -> GameResult<TableResponse> {
        if let Some(seat) = self.seat_of(uid) {
            // 同じ卓への再入室
            self.set_online(seat, true, now);
        } else {
            // 解散投票中は席順を変えない
            if self.status != DeskStatus::Create || self.dissolve.is_some() {
                return Err(ErrorCode::IllegalDeskStatus);
            }
            if self.players.len() >= self.opts.mode {
                return Err(ErrorCode::DeskFull);
            }

            let seat = self.players.len();
            self.players.push(DeskPlayer::new(uid, name, seat));
            self.seat_changed(uid, true);
            info!("[{}] {} joined at seat {}", self.desk_no, uid, seat);

            let pi = self.players[seat].info();
            let others: Vec<Uid> = self
                .players
                .iter()
                .filter(|p| p.uid != uid)
                .map(|p| p.uid)
                .collect();
            let frame = ServerFrame::push(push::PLAYER_JOIN, &pi);
            for u in others {
                self.notify(u, &frame);
            }
        }

        Ok(TableResponse {
            table_info: self.table_info(),
        })
    }

    pub fn ready(&mut self, seat: Seat, now: Instant) -> GameResult {
        match self.status {
            DeskStatus::Create | DeskStatus::RoundOver => {}
            _ => return Err(ErrorCode::IllegalDeskStatus),
        }
        self.players[seat].is_ready = true;
        let pi = self.players[seat].info();
        self.broadcast(push::PLAYER_READY, &pi);
        self.try_start(now);
        Ok(())
    }

    pub fn client_init(&mut self, seat: Seat, is_reenter: bool, now: Instant) -> GameResult {
        self.players[seat].is_inited = true;
        if is_reenter {
            self.set_online(seat, true, now);
            let sync = self.sync_desk(seat);
            let uid = self.players[seat].uid;
            self.push_to(uid, push::SYNC_DESK, &sync);
        } else {
            self.try_start(now);
        }
        Ok(())
    }

    pub fn op_choose(&mut self, seat: Seat, act: Action, now: Instant) -> GameResult {
        if self.status != DeskStatus::Playing {
            return Err(ErrorCode::IllegalDeskStatus);
        }
        if act.tile_id != NO_ID && (act.tile_id < 0 || act.tile_id as usize >= self.cfg.deck) {
            return Err(ErrorCode::InvalidParameter);
        }
        match &self.wait {
            Wait::Turn { .. } => self.on_turn_action(seat, act, now),
            Wait::Claim(_) => self.on_claim_action(seat, act, now),
            Wait::None => Err(ErrorCode::IllegalDeskStatus),
        }
    }

    pub fn exit(&mut self, seat: Seat, is_destroy: bool, now: Instant) -> GameResult {
        let uid = self.players[seat].uid;
        if self.status != DeskStatus::Create {
            // 対局中の退出は切断として扱う
            self.set_online(seat, false, now);
            return Ok(());
        }

        if self.dissolve.is_some() {
            return Err(ErrorCode::IllegalDeskStatus);
        }
        let is_destroy = is_destroy && uid == self.creator;
        self.broadcast(push::PLAYER_EXIT, &PlayerExitPush { uid, is_destroy });
        if is_destroy {
            self.game_end(false, "destroyed by creator");
            return Ok(());
        }

        self.players.remove(seat);
        for (s, p) in self.players.iter_mut().enumerate() {
            p.seat = s;
        }
        self.seat_changed(uid, false);
        info!("[{}] {} left", self.desk_no, uid);

        if self.players.is_empty() {
            self.game_end(false, "all players left");
        }
        Ok(())
    }

    pub fn destroy(&mut self, reason: &str) {
        if !self.is_closed() {
            self.status = DeskStatus::Interruption;
            self.game_end(false, reason);
        }
    }

    // [Online]
    // 応答が必要な状態か
    pub(super) fn is_waiting_for(&self, seat: Seat) -> bool {
        if self.status == DeskStatus::QiPai {
            return self.players[seat].que == QUE_NONE;
        }
        match &self.wait {
            Wait::Turn { seat: s, .. } => *s == seat,
            Wait::Claim(w) => w
                .candidates
                .iter()
                .any(|c| c.seat == seat && c.answer.is_none()),
            Wait::None => false,
        }
    }

    // 応答期限の設定. 不在の場合は即時
    pub(super) fn set_deadline(&mut self, seat: Seat, now: Instant) {
        let deadline = if self.players[seat].is_online {
            self.cfg.action_timeout.map(|d| now + d)
        } else {
            Some(now)
        };
        self.players[seat].ctx.deadline = deadline;
    }

    pub(super) fn clear_deadlines(&mut self) {
        for p in &mut self.players {
            p.ctx.deadline = None;
        }
    }

    pub fn set_online(&mut self, seat: Seat, is_online: bool, now: Instant) {
        if self.players[seat].is_online == is_online {
            return;
        }
        let uid = self.players[seat].uid;
        self.players[seat].is_online = is_online;
        info!(
            "[{}] {} {}",
            self.desk_no,
            uid,
            if is_online { "online" } else { "offline" }
        );
        self.broadcast(push::OFFLINE_STATUS, &OfflineStatusPush { uid, is_online });

        if self.is_waiting_for(seat) {
            if is_online {
                self.players[seat].ctx.deadline = self.cfg.action_timeout.map(|d| now + d);
            } else {
                let grace = now + self.cfg.offline_grace;
                let d = &mut self.players[seat].ctx.deadline;
                *d = Some(d.map_or(grace, |d| d.min(grace)));
            }
        }
        if !is_online {
            self.try_start(now);
        }
    }

    // [Timer]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_closed() {
            return None;
        }
        if let Some(d) = &self.dissolve {
            return Some(d.deadline);
        }
        self.players.iter().filter_map(|p| p.ctx.deadline).min()
    }

    // 期限切れの応答を既定の操作で処理する
    pub fn tick(&mut self, now: Instant) {
        if self.is_closed() {
            return;
        }
        if let Some(d) = &self.dissolve {
            if d.deadline <= now {
                self.accept_dissolve();
            }
            // 投票中は対局の期限を止める
            return;
        }

        while !self.is_closed() && self.dissolve.is_none() {
            let due = self
                .players
                .iter()
                .find(|p| p.ctx.deadline.map_or(false, |d| d <= now))
                .map(|p| p.seat);
            match due {
                Some(seat) => {
                    self.players[seat].ctx.deadline = None;
                    self.auto_play(seat, now);
                }
                None => break,
            }
        }
    }

    fn auto_play(&mut self, seat: Seat, now: Instant) {
        let uid = self.players[seat].uid;
        if self.status == DeskStatus::QiPai {
            if self.players[seat].que == QUE_NONE {
                let que = self.players[seat].auto_que(self.n_suit());
                debug!("[{}] auto que {} for {}", self.desk_no, que, uid);
                if let Err(e) = self.select_que(seat, que, now) {
                    warn!("[{}] auto que failed: {}", self.desk_no, e);
                }
            }
            return;
        }

        let act = match &self.wait {
            Wait::Turn { seat: s, .. } if *s == seat => match self.players[seat].auto_discard() {
                Some(id) => Action::discard(id),
                None => return,
            },
            Wait::Claim(_) => Action::pass(),
            _ => return,
        };
        debug!("[{}] auto {} for {}", self.desk_no, act, uid);
        if let Err(e) = self.op_choose(seat, act, now) {
            warn!("[{}] auto play failed: {}", self.desk_no, e);
        }
    }

    // [Sync]
    pub fn sync_desk(&self, seat: Seat) -> SyncDesk {
        let uid = self.players[seat].uid;
        let seats = self
            .players
            .iter()
            .map(|p| SyncSeat {
                uid: p.uid,
                seat: p.seat,
                on_hand: if p.seat == seat { p.hand.clone() } else { vec![] },
                hand_count: p.hand.len(),
                pong_kong: p.melds.clone(),
                discards: p.discards.clone(),
                que: if p.seat == seat || self.status != DeskStatus::QiPai {
                    p.que
                } else {
                    QUE_NONE
                },
                is_online: p.is_online,
                score: p.score,
            })
            .collect();

        let hint = match &self.wait {
            Wait::Turn { hint, .. } if self.last_hint_uid == Some(uid) => Some(hint.clone()),
            Wait::Claim(w) => w
                .candidates
                .iter()
                .find(|c| c.seat == seat && c.answer.is_none())
                .map(|c| c.hint.clone()),
            _ => None,
        };

        SyncDesk {
            table_info: self.table_info(),
            dice: self.dice,
            turn: self.players.get(self.turn).map_or(0, |p| p.uid),
            last_discard: self.last_discard.map(|(s, t)| LastDiscard {
                uid: self.players[s].uid,
                tile_id: t.id,
            }),
            wall_count: self.wall_count(),
            seats,
            hint,
            dissolve: self.dissolve.as_ref().map(|d| d.status_push(self)),
        }
    }
}
