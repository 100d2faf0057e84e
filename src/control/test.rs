use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::*;
use crate::error::ErrorCode;
use crate::hand::{hu_point, multiple};
use crate::listener::{EventRecorder, Listener, Recorded};
use crate::model::*;
use crate::storage::{MemoryStorage, Storage, User};
use crate::util::jobs::Jobs;

const CREATOR: Uid = 100;
const CARD_COST: i64 = 4;

struct Bench {
    desk: Desk,
    rec: EventRecorder,
    st: Arc<MemoryStorage>,
    now: Instant,
}

impl Bench {
    fn new(opts: DeskOptions, cfg: DeskConfig) -> Self {
        let st = Arc::new(MemoryStorage::new());
        st.insert_user(&User {
            uid: CREATOR,
            name: "creator".to_string(),
            coin: 10,
            last_login: 0,
        })
        .unwrap();
        let rec = EventRecorder::new();
        let desk = Desk::new(
            "123456",
            1,
            CREATOR,
            0,
            opts,
            CARD_COST,
            cfg,
            7,
            st.clone(),
            Jobs::inline(),
            vec![Box::new(rec.clone()) as Box<dyn Listener>],
        );
        st.insert_desk(&desk.record()).unwrap();
        Self {
            desk,
            rec,
            st,
            now: Instant::now(),
        }
    }

    fn uid(&self, seat: Seat) -> Uid {
        self.desk.players()[seat].uid
    }

    // uid宛ての最後のレスポンスのコード
    fn request(&mut self, uid: Uid, route: &str, data: Value) -> i32 {
        let n = self.rec.all().len();
        self.desk.handle(
            DeskMessage::Request {
                uid,
                route: route.to_string(),
                id: Some(1),
                data,
            },
            self.now,
        );
        self.rec.all()[n..]
            .iter()
            .rev()
            .find_map(|r| match r {
                Recorded::Frame(u, f @ ServerFrame::Response { .. }) if *u == uid => {
                    Some(f.code())
                }
                _ => None,
            })
            .unwrap_or(-1)
    }

    fn join(&mut self, uid: Uid) -> i32 {
        let n = self.rec.all().len();
        self.desk.handle(
            DeskMessage::Join {
                uid,
                name: format!("p{}", uid),
                route: route::JOIN.to_string(),
                id: Some(1),
            },
            self.now,
        );
        self.rec.all()[n..]
            .iter()
            .find_map(|r| match r {
                Recorded::Frame(u, f @ ServerFrame::Response { .. }) if *u == uid => {
                    Some(f.code())
                }
                _ => None,
            })
            .unwrap_or(-1)
    }

    fn online(&mut self, seat: Seat, is_online: bool) {
        let uid = self.uid(seat);
        self.desk
            .handle(DeskMessage::Online { uid, is_online }, self.now);
    }

    // 着席から配牌まで
    fn start(&mut self, hands: &[Vec<Index>], deal: &[Index]) {
        let n = self.desk.opts.mode;
        if !hands.is_empty() {
            let deck = self.desk.cfg.deck;
            self.desk
                .set_next_wall(create_wall_debug(1, deck, hands, deal));
        }
        for k in 0..n {
            assert_eq!(self.join(CREATOR + k as Uid), 0);
        }
        for s in 0..n {
            let uid = self.uid(s);
            assert_eq!(self.request(uid, route::READY, Value::Null), 0);
        }
        for s in 0..n {
            let uid = self.uid(s);
            let code = self.request(uid, route::CLIENT_INIT, json!({"isReenter": false}));
            assert_eq!(code, 0);
        }
    }

    fn select_que(&mut self, ques: &[usize]) {
        for (s, &que) in ques.iter().enumerate() {
            let uid = self.uid(s);
            assert_eq!(self.request(uid, route::SELECT_QUE, json!({ "que": que })), 0);
        }
    }

    fn op(&mut self, seat: Seat, op: OpType, tile_id: TileId) -> i32 {
        let uid = self.uid(seat);
        let data = serde_json::to_value(Action::new(op, tile_id)).unwrap();
        self.request(uid, route::OP_CHOOSE, data)
    }

    fn tile_id(&self, seat: Seat, index: Index) -> TileId {
        self.desk.players()[seat]
            .hand
            .iter()
            .find(|t| t.index == index)
            .map(|t| t.id)
            .unwrap()
    }

    fn discard(&mut self, seat: Seat, index: Index) {
        let id = self.tile_id(seat, index);
        assert_eq!(self.op(seat, OpType::Discard, id), 0);
    }

    fn turn_hint(&self) -> Hint {
        match self.desk.wait() {
            Wait::Turn { hint, .. } => hint.clone(),
            w => panic!("not waiting for turn: {:?}", w),
        }
    }

    fn claim_hint(&self, seat: Seat) -> Option<Hint> {
        match self.desk.wait() {
            Wait::Claim(w) => w
                .candidates
                .iter()
                .find(|c| c.seat == seat)
                .map(|c| c.hint.clone()),
            _ => None,
        }
    }

    // 受付中の鳴き,ロンを(exceptを除いて)全て見送る
    fn pass_claims(&mut self, except: &[Seat]) {
        let seats: Vec<Seat> = match self.desk.wait() {
            Wait::Claim(w) => w
                .candidates
                .iter()
                .filter(|c| c.answer.is_none() && !except.contains(&c.seat))
                .map(|c| c.seat)
                .collect(),
            _ => return,
        };
        for s in seats {
            assert_eq!(self.op(s, OpType::Pass, NO_ID), 0);
        }
    }

    fn pushes(&self, seat: Seat, name: &str) -> Vec<ServerFrame> {
        self.rec.pushes_to(self.uid(seat), name)
    }

    fn round_over(&self) -> RoundOverStats {
        let f = self.pushes(0, push::ROUND_OVER).pop().unwrap();
        serde_json::from_value(f.data().clone()).unwrap()
    }

    // 記録から再生した手牌,副露,得点が卓の状態と一致すること
    fn assert_replay(&self) {
        let seats = self.desk.snapshot().replay().unwrap();
        for (r, p) in seats.iter().zip(self.desk.players()) {
            assert_eq!(r.uid, p.uid);
            let mut on_hand = p.hand.clone();
            on_hand.sort();
            let ids: Vec<TileId> = on_hand.iter().map(|t| t.id).collect();
            assert_eq!(r.on_hand, ids, "hand of {}", p.uid);
            let melds: Vec<Vec<TileId>> = p
                .melds
                .iter()
                .map(|m| m.tiles.iter().map(|t| t.id).collect())
                .collect();
            assert_eq!(r.pong_kong, melds, "melds of {}", p.uid);
            let discards: Vec<TileId> = p.discards.iter().map(|t| t.id).collect();
            assert_eq!(r.discards, discards, "discards of {}", p.uid);
            assert_eq!(r.score, p.ctx.round_score, "score of {}", p.uid);
        }
    }
}

fn opts(mode: usize, max_round: usize) -> DeskOptions {
    DeskOptions {
        mode,
        max_round,
        ..Default::default()
    }
}

// 親: 条子のみ (8,9待ち), 14枚目は筒子(欠門)
fn dealer_hand() -> Vec<Index> {
    vec![1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 8, 9, 9]
}

// 11を2枚持ち碰のみ可能
fn pong_hand() -> Vec<Index> {
    vec![11, 11, 13, 13, 13, 14, 14, 14, 16, 16, 18, 19, 19]
}

// 11で和了 (清一色)
fn ron_hand() -> Vec<Index> {
    vec![12, 13, 14, 15, 16, 17, 17, 17, 18, 18, 18, 19, 19]
}

fn tiao_hand() -> Vec<Index> {
    vec![2, 2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6]
}

#[test]
fn test_join_and_exit() {
    let mut b = Bench::new(opts(3, 4), DeskConfig::default());
    for k in 0..3 {
        assert_eq!(b.join(CREATOR + k), 0);
    }
    assert_eq!(b.join(CREATOR + 9), ErrorCode::DeskFull.code());
    // 同じプレイヤーの再入室は成功
    assert_eq!(b.join(CREATOR + 1), 0);
    assert_eq!(b.desk.players().len(), 3);

    // 開始前の退出は席を詰める
    let code = b.request(CREATOR + 1, route::EXIT, json!({"isDestroy": false}));
    assert_eq!(code, 0);
    assert_eq!(b.desk.players().len(), 2);
    assert_eq!(b.desk.players()[1].uid, CREATOR + 2);
    assert_eq!(b.desk.players()[1].seat, 1);
    assert!(b.rec.all().contains(&Recorded::Seat(CREATOR + 1, None)));

    // 着席していないプレイヤー
    let code = b.request(CREATOR + 1, route::READY, Value::Null);
    assert_eq!(code, ErrorCode::PlayerNotFound.code());
    let code = b.request(CREATOR, "Desk.Unknown", Value::Null);
    assert_eq!(code, ErrorCode::BadRoute.code());
}

#[test]
fn test_creator_destroy_refund() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.join(CREATOR);
    b.join(CREATOR + 1);
    let code = b.request(CREATOR, route::EXIT, json!({"isDestroy": true}));
    assert_eq!(code, 0);

    assert_eq!(b.desk.status(), DeskStatus::Cleaned);
    assert!(b.rec.all().contains(&Recorded::Closed("123456".to_string())));
    let end = b.pushes(1, push::GAME_END);
    assert_eq!(end.len(), 1);
    assert_eq!(end[0].data()["isNormalFinished"], json!(false));

    // 1局も終わっていないので房卡を返却
    assert_eq!(b.st.query_user(CREATOR).unwrap().coin, 10 + CARD_COST);
    let coin = b.pushes(0, push::COIN_CHANGE);
    assert_eq!(coin[0].data()["coin"], json!(10 + CARD_COST));
    assert!(b.st.consumes().is_empty());

    // 終了後の要求
    let code = b.request(CREATOR + 1, route::READY, Value::Null);
    assert_eq!(code, ErrorCode::DeskNotFound.code());
}

#[test]
fn test_deal_and_que() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[], &[]);
    assert_eq!(b.desk.status(), DeskStatus::QiPai);
    for s in 0..4 {
        let n = if s == 0 { HAND + 1 } else { HAND };
        assert_eq!(b.desk.players()[s].hand.len(), n);
        // 配牌は本人にのみ通知
        let dp = b.pushes(s, push::DUAN_PAI);
        assert_eq!(dp.len(), 1);
        assert_eq!(dp[0].data()["tiles"].as_array().unwrap().len(), n);
    }
    assert_eq!(b.desk.wall_count(), DECK_72 - 4 * HAND - 1);

    let uid = b.uid(1);
    assert_eq!(
        b.request(uid, route::SELECT_QUE, json!({"que": 4})),
        ErrorCode::InvalidParameter.code()
    );
    assert_eq!(b.request(uid, route::SELECT_QUE, json!({"que": 1})), 0);
    assert_eq!(
        b.request(uid, route::SELECT_QUE, json!({"que": 2})),
        ErrorCode::IllegalDeskStatus.code()
    );
    assert_eq!(
        b.op(0, OpType::Discard, 0),
        ErrorCode::IllegalDeskStatus.code()
    );

    for s in [0, 2, 3] {
        let uid = b.uid(s);
        assert_eq!(b.request(uid, route::SELECT_QUE, json!({"que": 2})), 0);
    }
    assert_eq!(b.desk.status(), DeskStatus::Playing);
    assert_eq!(b.desk.turn(), 0);
    // 親は14枚持っているのでツモなしで打牌
    assert!(b.pushes(0, push::MO_PAI).is_empty());
    assert_eq!(b.pushes(0, push::OP_TYPE_HINT).len(), 1);
    assert!(b.turn_hint().allows(OpType::Discard));
}

// 碰とロンが競合した場合はロンが優先. 応答順には依存しない
#[test]
fn test_claim_priority_ron_over_peng() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);

    // 欠門の牌から打牌
    let hint = b.turn_hint();
    assert_eq!(hint.discards, vec![b.tile_id(0, 11)]);
    let id = b.tile_id(0, 1);
    assert_eq!(b.op(0, OpType::Discard, id), ErrorCode::InvalidParameter.code());
    b.discard(0, 11);

    let h1 = b.claim_hint(1).unwrap();
    assert_eq!(h1.ops, vec![OpType::Peng, OpType::Pass]);
    let h2 = b.claim_hint(2).unwrap();
    assert_eq!(h2.ops, vec![OpType::Hu, OpType::Pass]);
    assert!(b.claim_hint(3).is_none());

    assert_eq!(b.op(1, OpType::Hu, NO_ID), ErrorCode::IllegalOrderType.code());
    assert_eq!(b.op(1, OpType::Peng, NO_ID), 0);
    assert_eq!(b.desk.status(), DeskStatus::Playing);
    assert_eq!(b.op(2, OpType::Hu, NO_ID), 0);

    assert_eq!(b.desk.status(), DeskStatus::RoundOver);
    let stats = b.round_over();
    assert_eq!(stats.winners, vec![b.uid(2)]);
    assert!(!stats.is_draw);
    let winner = &stats.players[2];
    assert!(winner.is_win && !winner.is_zimo);
    assert!(winner.desc.iter().any(|d| d.starts_with("清一色")));

    let pt = hu_point(winner.fan, false, &b.desk.opts);
    assert_eq!(b.desk.players()[2].score, pt);
    assert_eq!(b.desk.players()[0].score, -pt);
    assert_eq!(b.desk.players()[1].score, 0);
    // 碰は成立していない
    assert!(b.desk.players()[1].melds.is_empty());

    // 和了者が次の親
    assert_eq!(b.desk.round(), 1);
    assert_eq!(b.desk.dealer(), 2);
    assert_eq!(b.st.histories().len(), 1);
    b.assert_replay();
}

#[test]
fn test_multiple_ron() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    let hand1 = vec![11, 11, 13, 13, 13, 14, 14, 15, 15, 16, 16, 19, 19];
    b.start(&[dealer_hand(), hand1, ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);
    b.discard(0, 11);

    assert!(b.claim_hint(1).unwrap().allows(OpType::Hu));
    assert_eq!(b.op(2, OpType::Hu, NO_ID), 0);
    assert_eq!(b.op(1, OpType::Hu, NO_ID), 0);

    let stats = b.round_over();
    assert_eq!(stats.winners, vec![b.uid(1), b.uid(2)]);
    let total: Score = b.desk.players().iter().map(|p| p.score).sum();
    assert_eq!(total, 0);
    let lost = (1..=2)
        .map(|s| hu_point(stats.players[s].fan, false, &b.desk.opts))
        .sum::<Score>();
    assert_eq!(b.desk.players()[0].score, -lost);
    // 複数和了は親を維持
    assert_eq!(b.desk.dealer(), 0);
    b.assert_replay();
}

// 暗槓 -> 嶺上牌で自摸 (杠上花)
#[test]
fn test_an_gang_then_zimo() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[1, 9]);
    b.select_que(&[2, 1, 1, 2]);

    let hint = b.turn_hint();
    assert!(hint.allows(OpType::Gang));
    assert!(!hint.allows(OpType::Hu));
    assert_eq!(hint.gangs.len(), 1);
    assert_eq!(hint.gangs[0].gang_type, GangType::An);
    assert_eq!(b.op(0, OpType::Gang, NO_ID), 0);

    // 暗槓は他家全員が2点ずつ支払う
    assert_eq!(b.desk.players()[0].score, 6);
    for s in 1..4 {
        assert_eq!(b.desk.players()[s].score, -2);
    }
    assert_eq!(b.pushes(3, push::GANG_SCORE_CHANGE).len(), 1);
    assert_eq!(b.desk.players()[0].melds.len(), 1);

    let hint = b.turn_hint();
    assert!(hint.allows(OpType::Hu));
    assert_eq!(b.op(0, OpType::Hu, NO_ID), 0);

    let stats = b.round_over();
    let w = &stats.players[0];
    assert!(w.is_zimo);
    assert!(w.desc.iter().any(|d| d.starts_with("杠上花")));
    let pt = hu_point(w.fan, true, &b.desk.opts);
    assert_eq!(b.desk.players()[0].score, 6 + 3 * pt);
    for s in 1..4 {
        assert_eq!(b.desk.players()[s].score, -2 - pt);
    }
    assert_eq!(b.desk.dealer(), 0);
    b.assert_replay();
}

// 碰 -> 巴槓 -> 搶槓
#[test]
fn test_rob_ba_gang() {
    let mut b = Bench::new(opts(3, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand()], &[11, 6, 6, 11]);
    b.select_que(&[2, 1, 1]);

    b.discard(0, 11);
    assert_eq!(b.op(2, OpType::Pass, NO_ID), 0);
    assert_eq!(b.op(1, OpType::Peng, NO_ID), 0);
    assert_eq!(b.desk.players()[1].melds[0].meld_type, MeldType::Peng);
    // 碰の後は打牌のみ
    let hint = b.turn_hint();
    assert_eq!(hint.ops, vec![OpType::Discard]);
    assert_eq!(b.desk.turn(), 1);

    b.discard(1, 18);
    b.pass_claims(&[]);
    assert_eq!(b.desk.turn(), 2);
    b.discard(2, 6);
    b.pass_claims(&[]);
    assert_eq!(b.desk.turn(), 0);
    b.discard(0, 6);
    b.pass_claims(&[]);

    assert_eq!(b.desk.turn(), 1);
    let hint = b.turn_hint();
    let ba = hint
        .gangs
        .iter()
        .find(|g| g.gang_type == GangType::Ba)
        .unwrap()
        .clone();
    assert_eq!(b.op(1, OpType::Gang, ba.tile_id), 0);

    // 搶槓はロンのみ受付
    let h2 = b.claim_hint(2).unwrap();
    assert_eq!(h2.ops, vec![OpType::Hu, OpType::Pass]);
    assert_eq!(b.op(2, OpType::Hu, NO_ID), 0);

    let stats = b.round_over();
    assert_eq!(stats.winners, vec![b.uid(2)]);
    assert!(stats.players[2]
        .desc
        .iter()
        .any(|d| d.starts_with("抢杠胡")));
    // 巴槓は成立せず得点も移動しない
    assert!(b.desk.snapshot().gang_score_changes.is_empty());
    assert_eq!(b.desk.players()[1].melds[0].meld_type, MeldType::Peng);
    let pt = hu_point(stats.players[2].fan, false, &b.desk.opts);
    assert_eq!(b.desk.players()[1].score, -pt);
    b.assert_replay();
}

// 11を3枚持ち明槓が可能
fn gang_hand() -> Vec<Index> {
    vec![11, 11, 11, 13, 13, 13, 14, 14, 14, 16, 16, 18, 19]
}

// 18,19待ち (清一色,碰碰胡)
fn peng_peng_hand() -> Vec<Index> {
    vec![12, 12, 12, 15, 15, 15, 17, 17, 17, 18, 18, 19, 19]
}

// 打牌への明槓 -> 放銃者のみ支払い -> 嶺上牌をツモ
#[test]
fn test_ming_gang_from_discard() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(
        &[dealer_hand(), gang_hand(), tiao_hand(), peng_peng_hand()],
        &[11, 16],
    );
    b.select_que(&[2, 1, 2, 1]);

    b.discard(0, 11);
    let h1 = b.claim_hint(1).unwrap();
    assert_eq!(h1.ops, vec![OpType::Gang, OpType::Peng, OpType::Pass]);
    assert!(b.claim_hint(2).is_none());
    assert!(b.claim_hint(3).is_none());
    assert_eq!(b.op(1, OpType::Gang, NO_ID), 0);

    let p = b.desk.players();
    assert_eq!(p[1].melds[0].meld_type, MeldType::Gang(GangType::Ming));
    assert_eq!(p[1].melds[0].from, b.uid(0));
    assert!(p[0].discards.is_empty());
    assert_eq!(p[1].score, 2);
    assert_eq!(p[0].score, -2);
    assert_eq!(p[2].score, 0);
    assert_eq!(p[3].score, 0);
    assert_eq!(b.pushes(3, push::GANG_SCORE_CHANGE).len(), 1);

    // 槓の後は嶺上牌をツモって手番
    assert_eq!(b.desk.turn(), 1);
    assert_eq!(b.pushes(1, push::MO_PAI).len(), 1);
    let p = &b.desk.players()[1];
    assert_eq!(p.hand.len(), 11);
    assert_eq!(p.ctx.drawn.map(|t| t.index), Some(16));
    assert!(p.ctx.is_gang_shang_hua);
    assert!(b.turn_hint().allows(OpType::Discard));
    b.assert_replay();
}

// 槓の後の打牌で放銃すると杠上炮 +1番
#[test]
fn test_gang_shang_pao() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(
        &[dealer_hand(), gang_hand(), tiao_hand(), peng_peng_hand()],
        &[11, 16],
    );
    b.select_que(&[2, 1, 2, 1]);
    b.discard(0, 11);
    assert_eq!(b.op(1, OpType::Gang, NO_ID), 0);

    b.discard(1, 18);
    assert!(b.claim_hint(3).unwrap().allows(OpType::Hu));
    assert_eq!(b.op(3, OpType::Hu, NO_ID), 0);

    let stats = b.round_over();
    assert_eq!(stats.winners, vec![b.uid(3)]);
    let w = &stats.players[3];
    assert!(!w.is_zimo);
    assert!(w.desc.iter().any(|d| d.starts_with("杠上炮")));

    let mut hand = peng_peng_hand();
    hand.push(18);
    let mut ctx = WinContext::new(18, false);
    let base = multiple(&Indexes::new(&hand), &[], &mut ctx, &b.desk.opts).unwrap();
    assert_eq!(w.fan, base + 1);

    let pt = hu_point(w.fan, false, &b.desk.opts);
    assert_eq!(b.desk.players()[3].score, pt);
    assert_eq!(b.desk.players()[1].score, 2 - pt);
    assert_eq!(b.desk.players()[0].score, -2);
    b.assert_replay();
}

// 搶槓がなければ巴槓が成立し他家全員が1点ずつ支払う
#[test]
fn test_ba_gang_unrobbed() {
    let mut b = Bench::new(opts(3, 4), DeskConfig::default());
    let hand2 = vec![12, 12, 12, 15, 15, 15, 16, 16, 17, 17, 17, 19, 19];
    b.start(&[dealer_hand(), pong_hand(), hand2], &[11, 6, 6, 11, 18]);
    b.select_que(&[2, 1, 1]);

    b.discard(0, 11);
    assert!(b.claim_hint(2).is_none());
    assert_eq!(b.op(1, OpType::Peng, NO_ID), 0);
    b.discard(1, 18);
    b.pass_claims(&[]);
    b.discard(2, 6);
    b.pass_claims(&[]);
    b.discard(0, 6);
    b.pass_claims(&[]);

    assert_eq!(b.desk.turn(), 1);
    let ba = b
        .turn_hint()
        .gangs
        .iter()
        .find(|g| g.gang_type == GangType::Ba)
        .unwrap()
        .clone();
    assert_eq!(b.op(1, OpType::Gang, ba.tile_id), 0);

    // 誰も和了できないので受付なしで成立
    assert!(b.claim_hint(0).is_none());
    assert!(b.claim_hint(2).is_none());
    let p = b.desk.players();
    assert_eq!(p[1].melds[0].meld_type, MeldType::Gang(GangType::Ba));
    assert_eq!(p[1].melds[0].tiles.len(), 4);
    assert_eq!(p[1].score, 2);
    assert_eq!(p[0].score, -1);
    assert_eq!(p[2].score, -1);
    assert_eq!(b.desk.snapshot().gang_score_changes.len(), 1);

    assert_eq!(b.desk.turn(), 1);
    assert_eq!(b.desk.players()[1].ctx.drawn.map(|t| t.index), Some(18));
    assert!(b.turn_hint().allows(OpType::Discard));
    b.assert_replay();
}

// 全員が応答期限切れで自動打牌 -> 流局 -> 最終局なので終了
#[test]
fn test_exhaustive_draw_and_game_end() {
    let cfg = DeskConfig {
        action_timeout: Some(Duration::ZERO),
        ..Default::default()
    };
    let mut b = Bench::new(opts(4, 1), cfg);
    b.start(&[], &[]);

    assert_eq!(b.desk.status(), DeskStatus::Cleaned);
    let stats = b.round_over();
    assert!(stats.is_draw);
    assert!(stats.winners.is_empty());
    assert_eq!(b.desk.wall_count(), 0);
    for p in b.desk.players() {
        assert_eq!(p.score, 0);
        assert_ne!(p.que, QUE_NONE);
    }
    b.assert_replay();

    let end = b.pushes(2, push::GAME_END);
    assert_eq!(end.len(), 1);
    assert_eq!(end[0].data()["isNormalFinished"], json!(true));
    assert_eq!(b.st.histories().len(), 1);
    assert_eq!(b.st.consumes().len(), 1);
    assert_eq!(b.st.consumes()[0].cards, CARD_COST);
    assert_eq!(b.st.desks().last().unwrap().status, DeskStatus::Destroy);
    for s in 0..4 {
        let uid = b.uid(s);
        assert!(b.rec.all().contains(&Recorded::Seat(uid, None)));
    }
}

// 切断中のプレイヤーは即座に自動で見送り,打牌する
#[test]
fn test_offline_auto_play() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11, 15]);
    b.select_que(&[2, 1, 1, 2]);
    b.online(1, false);
    assert_eq!(b.pushes(0, push::OFFLINE_STATUS).len(), 1);

    b.discard(0, 11);
    // seat1は自動で見送り済み
    assert_eq!(b.op(1, OpType::Peng, NO_ID), ErrorCode::IllegalDeskStatus.code());
    assert_eq!(b.op(2, OpType::Pass, NO_ID), 0);

    // seat1のツモ番も自動で打牌
    let p1 = &b.desk.players()[1];
    assert_eq!(p1.discards.len(), 1);
    assert_eq!(p1.discards[0].index, 15);
    assert!(b
        .desk
        .snapshot()
        .do_
        .iter()
        .any(|d| d.op_type == OpType::Pass && d.uids == vec![b.uid(1)]));

    b.online(1, true);
    assert!(b.desk.players()[1].is_online);
}

// 手番中に切断,再接続したプレイヤーに同じヒントを再送する
#[test]
fn test_reconnect_sync() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);
    let hint = b.pushes(0, push::OP_TYPE_HINT).pop().unwrap();

    b.online(0, false);
    // 猶予期間中は自動打牌しない
    assert!(b.desk.players()[0].discards.is_empty());
    let deadline = b.desk.next_deadline().unwrap();
    assert!(deadline > b.now);

    b.online(0, true);
    let code = b.request(CREATOR, route::CLIENT_INIT, json!({"isReenter": true}));
    assert_eq!(code, 0);
    let sync = b.pushes(0, push::SYNC_DESK).pop().unwrap();
    assert_eq!(sync.data()["hint"], *hint.data());
    assert_eq!(sync.data()["seats"][0]["onHand"].as_array().unwrap().len(), 14);
    assert!(sync.data()["seats"][1]["onHand"].as_array().unwrap().is_empty());

    // 他家には手番のヒントを含めない
    let code = b.request(b.uid(1), route::CLIENT_INIT, json!({"isReenter": true}));
    assert_eq!(code, 0);
    let sync = b.pushes(1, push::SYNC_DESK).pop().unwrap();
    assert!(sync.data()["hint"].is_null());
    assert!(b.desk.players()[0].discards.is_empty());
}

// 切断中のプレイヤーは投票権なし. 残りの全員が賛成で解散
#[test]
fn test_dissolve_accepted() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);
    b.online(3, false);

    assert_eq!(b.request(CREATOR, route::DISSOLVE, Value::Null), 0);
    assert_eq!(
        b.request(CREATOR, route::DISSOLVE, Value::Null),
        ErrorCode::IllegalDeskStatus.code()
    );
    let d = b.pushes(1, push::DISSOLVE).pop().unwrap();
    assert_eq!(d.data()["voters"], json!([b.uid(1), b.uid(2)]));

    let vote = json!({"result": true});
    assert_eq!(
        b.request(b.uid(3), route::DISSOLVE_STATUS, vote.clone()),
        ErrorCode::IllegalDeskStatus.code()
    );
    assert_eq!(b.request(b.uid(1), route::DISSOLVE_STATUS, vote.clone()), 0);
    assert_eq!(b.desk.status(), DeskStatus::Playing);
    assert_eq!(b.request(b.uid(2), route::DISSOLVE_STATUS, vote), 0);

    assert_eq!(b.desk.status(), DeskStatus::Cleaned);
    let res = b.pushes(0, push::DISSOLVE_RESULT).pop().unwrap();
    assert_eq!(res.data()["ok"], json!(true));
    let end = b.pushes(3, push::GAME_END).pop().unwrap();
    assert_eq!(end.data()["isNormalFinished"], json!(false));
    assert_eq!(b.st.query_user(CREATOR).unwrap().coin, 10 + CARD_COST);
}

// 反対票で再開. 投票中の操作は保留されて再開時に処理される
#[test]
fn test_dissolve_rejected() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);

    assert_eq!(b.request(b.uid(1), route::DISSOLVE, Value::Null), 0);
    let id = b.tile_id(0, 11);
    // 保留中はレスポンスなし
    assert_eq!(b.op(0, OpType::Discard, id), -1);
    assert!(b.desk.players()[0].discards.is_empty());

    let n = b.rec.all().len();
    let code = b.request(b.uid(2), route::DISSOLVE_STATUS, json!({"result": false}));
    assert_eq!(code, 0);
    let res = b.pushes(3, push::DISSOLVE_RESULT).pop().unwrap();
    assert_eq!(res.data()["ok"], json!(false));
    assert!(b.rec.all()[n..].iter().any(|r| matches!(
        r,
        Recorded::Frame(u, f @ ServerFrame::Response { .. })
            if *u == CREATOR && f.route() == route::OP_CHOOSE && f.code() == 0
    )));
    assert_eq!(b.desk.players()[0].discards.len(), 1);
    assert!(matches!(b.desk.wait(), Wait::Claim(_)));
}

// 投票中は着席,退出を受け付けない
#[test]
fn test_dissolve_freezes_seats() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    assert_eq!(b.join(CREATOR), 0);
    assert_eq!(b.join(CREATOR + 1), 0);
    assert_eq!(b.request(CREATOR, route::DISSOLVE, Value::Null), 0);

    assert_eq!(b.join(CREATOR + 2), ErrorCode::IllegalDeskStatus.code());
    let code = b.request(CREATOR + 1, route::EXIT, json!({"isDestroy": false}));
    assert_eq!(code, ErrorCode::IllegalDeskStatus.code());
    assert_eq!(b.desk.players().len(), 2);

    let code = b.request(CREATOR + 1, route::DISSOLVE_STATUS, json!({"result": false}));
    assert_eq!(code, 0);
    assert!(!b.desk.is_closed());
    assert_eq!(b.join(CREATOR + 2), 0);
    assert_eq!(b.desk.players().len(), 3);
}

// 投票期限切れは賛成とみなす. 2局目以降は返却なし
#[test]
fn test_dissolve_timeout() {
    let cfg = DeskConfig {
        dissolve_timeout: Duration::from_secs(60),
        ..Default::default()
    };
    let mut b = Bench::new(opts(4, 4), cfg);
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);
    b.discard(0, 11);
    b.pass_claims(&[2]);
    assert_eq!(b.op(2, OpType::Hu, NO_ID), 0);
    assert_eq!(b.desk.round(), 1);

    assert_eq!(b.request(b.uid(2), route::DISSOLVE, Value::Null), 0);
    let deadline = b.desk.next_deadline().unwrap();
    b.desk.tick(deadline - Duration::from_secs(1));
    assert!(!b.desk.is_closed());
    b.desk.tick(deadline);
    assert!(b.desk.is_closed());

    assert_eq!(b.st.query_user(CREATOR).unwrap().coin, 10);
    let rec = b.st.desks().pop().unwrap();
    assert_eq!(rec.round, 1);
    assert!(rec.scores.iter().any(|&(_, s)| s > 0));
}

// 2局目以降は切断中のプレイヤーを準備完了とみなす
#[test]
fn test_next_round_with_offline_player() {
    let mut b = Bench::new(opts(4, 4), DeskConfig::default());
    b.start(&[dealer_hand(), pong_hand(), ron_hand(), tiao_hand()], &[11]);
    b.select_que(&[2, 1, 1, 2]);
    b.discard(0, 11);
    b.pass_claims(&[2]);
    assert_eq!(b.op(2, OpType::Hu, NO_ID), 0);
    assert_eq!(b.desk.status(), DeskStatus::RoundOver);

    b.online(3, false);
    for s in 0..3 {
        let uid = b.uid(s);
        assert_eq!(b.request(uid, route::READY, Value::Null), 0);
    }
    assert_eq!(b.desk.status(), DeskStatus::QiPai);
    assert_eq!(b.desk.dealer(), 2);
    assert_eq!(b.desk.players()[2].hand.len(), HAND + 1);
    // 切断中のプレイヤーの欠門は自動で選択
    assert_ne!(b.desk.players()[3].que, QUE_NONE);
}
