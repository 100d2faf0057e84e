use std::time::Instant;

use super::desk::*;
use super::player::WinRecord;
use super::possible_actions::*;
use super::wall::create_wall;
use crate::error::{ErrorCode, GameResult};
use crate::hand::{gang_point, hu_point};
use crate::model::*;
use crate::storage::{CardConsume, History};
use crate::util::misc::unixtime_now;
use crate::{error, info};

use OpType::*;

// [Round]
// 配牌 -> 欠門選択 -> (ツモ -> 打牌 -> 鳴き/ロン受付)* -> 和了/流局
impl Desk {
    // 全員が揃って準備完了なら局を開始
    // 2局目以降は切断中のプレイヤーを準備完了とみなす
    pub(super) fn try_start(&mut self, now: Instant) {
        let after_round = match self.status {
            DeskStatus::Create => false,
            DeskStatus::RoundOver => true,
            _ => return,
        };
        if self.dissolve.is_some() || self.players.len() != self.opts.mode {
            return;
        }
        let ok = self
            .players
            .iter()
            .all(|p| p.is_inited && (p.is_ready || (after_round && !p.is_online)));
        if ok {
            self.start_round(now);
        }
    }

    fn draw_tiles(&mut self, n: usize) -> Vec<Tile> {
        let end = (self.n_deal + n).min(self.wall.len());
        let tiles = self.wall[self.n_deal..end].to_vec();
        self.n_deal = end;
        tiles
    }

    fn start_round(&mut self, now: Instant) {
        self.status = DeskStatus::DuanPai;
        for p in &mut self.players {
            p.reset_round();
            p.is_ready = false;
        }

        let seed = self.next_seed();
        self.wall = match self.next_wall.take() {
            Some(w) => w,
            None => create_wall(seed, self.cfg.deck),
        };
        self.n_deal = 0;
        self.dice = self.roll_dice();
        self.turn = self.dealer;
        self.wait = Wait::None;
        self.last_discard = None;
        self.last_hint_uid = None;
        self.round_begin = unixtime_now();

        // 親から順に13枚ずつ, 最後に親の14枚目 (親の最初のツモとして扱う)
        let n = self.n_seat();
        for k in 0..n {
            let s = (self.dealer + k) % n;
            let tiles = self.draw_tiles(HAND);
            self.players[s].hand = tiles;
            self.players[s].sort_hand();
        }
        if let Some(t) = self.draw_tiles(1).pop() {
            let dealer = &mut self.players[self.dealer];
            dealer.hand.push(t);
            dealer.ctx.drawn = Some(t);
        }

        let dealer_uid = self.players[self.dealer].uid;
        self.snapshot = SnapShot {
            enter: self
                .players
                .iter()
                .map(|p| PlayerEnter {
                    uid: p.uid,
                    name: p.name.clone(),
                    seat: p.seat,
                    score: p.score,
                })
                .collect(),
            basic_info: BasicInfo {
                desk_no: self.desk_no.clone(),
                mode: self.opts.mode,
                round: self.round,
                max_round: self.opts.max_round,
                opts: self.opts.clone(),
                begin: self.round_begin,
            },
            duan_pai: DuanPaiRecord {
                dice: self.dice,
                dealer: dealer_uid,
                hands: self
                    .players
                    .iter()
                    .map(|p| SeatTiles {
                        uid: p.uid,
                        tile_ids: p.hand.iter().map(|t| t.id).collect(),
                    })
                    .collect(),
            },
            ..Default::default()
        };

        // 配牌は本人の分のみ通知
        let counts: Vec<HandCount> = self
            .players
            .iter()
            .map(|p| HandCount {
                uid: p.uid,
                count: p.hand.len(),
            })
            .collect();
        let pushes: Vec<(Uid, DuanPaiPush)> = self
            .players
            .iter()
            .map(|p| {
                let push = DuanPaiPush {
                    round: self.round,
                    dice: self.dice,
                    dealer: dealer_uid,
                    tiles: p.hand.clone(),
                    counts: counts.clone(),
                    wall_count: self.wall_count(),
                };
                (p.uid, push)
            })
            .collect();
        for (uid, push) in pushes {
            self.push_to(uid, push::DUAN_PAI, &push);
        }

        info!(
            "[{}] round {} start: dealer {} dice {:?}",
            self.desk_no, self.round, dealer_uid, self.dice
        );
        self.status = DeskStatus::QiPai;
        for s in 0..n {
            self.set_deadline(s, now);
        }
    }

    pub(super) fn select_que(&mut self, seat: Seat, que: usize, now: Instant) -> GameResult {
        if self.status != DeskStatus::QiPai {
            return Err(ErrorCode::IllegalDeskStatus);
        }
        if que == QUE_NONE || que > SUIT {
            return Err(ErrorCode::InvalidParameter);
        }
        if self.players[seat].que != QUE_NONE {
            return Err(ErrorCode::IllegalDeskStatus);
        }

        let pl = &mut self.players[seat];
        pl.que = que;
        pl.ctx.deadline = None;
        let uid = pl.uid;
        self.broadcast(push::SELECT_QUE, &SelectQuePush { uid, que });

        if self.players.iter().all(|p| p.que != QUE_NONE) {
            self.status = DeskStatus::Playing;
            self.turn = self.dealer;
            self.prompt_turn(now, false);
        }
        Ok(())
    }

    // [Turn]
    fn prompt_turn(&mut self, now: Instant, discard_only: bool) {
        let seat = self.turn;
        let hint = calc_turn_hint(&self.players[seat], self.wall_count(), discard_only);
        let uid = hint.uid;
        self.last_hint_uid = Some(uid);
        self.wait = Wait::Turn {
            seat,
            hint: hint.clone(),
        };
        self.push_to(uid, push::OP_TYPE_HINT, &hint);
        self.set_deadline(seat, now);
    }

    fn draw(&mut self, now: Instant, after_gang: bool) {
        if self.wall_count() == 0 {
            self.round_over(now, vec![]);
            return;
        }

        let t = self.wall[self.n_deal];
        self.n_deal += 1;
        let wall_count = self.wall_count();
        let pl = &mut self.players[self.turn];
        pl.hand.push(t);
        pl.ctx.drawn = Some(t);
        pl.ctx.is_last_tile = wall_count == 0;
        pl.ctx.is_gang_shang_hua = after_gang;
        pl.ctx.is_after_gang = after_gang;
        let uid = pl.uid;

        self.snapshot.push_do(Draw, vec![uid], vec![t.id]);
        self.broadcast(
            push::MO_PAI,
            &MoPaiPush {
                uid,
                tile_id: t.id,
                wall_count,
            },
        );
        self.prompt_turn(now, false);
    }

    fn next_turn(&mut self, from: Seat, now: Instant) {
        if self.wall_count() == 0 {
            self.round_over(now, vec![]);
            return;
        }
        self.turn = (from + 1) % self.n_seat();
        self.draw(now, false);
    }

    pub(super) fn on_turn_action(&mut self, seat: Seat, act: Action, now: Instant) -> GameResult {
        let hint = match &self.wait {
            Wait::Turn { seat: s, hint } if *s == seat => hint.clone(),
            _ => return Err(ErrorCode::IllegalDeskStatus),
        };
        if !hint.allows(act.op) {
            return Err(ErrorCode::IllegalOrderType);
        }

        match act.op {
            Discard => {
                if !hint.discards.contains(&act.tile_id) {
                    return Err(ErrorCode::InvalidParameter);
                }
                self.discard(seat, act.tile_id, now)
            }
            Gang => {
                // 牌の指定がない場合は最初の候補
                let choice = hint
                    .gangs
                    .iter()
                    .find(|g| {
                        act.tile_id == NO_ID
                            || index_from_id(g.tile_id) == index_from_id(act.tile_id)
                    })
                    .cloned()
                    .ok_or(ErrorCode::InvalidParameter)?;
                self.self_gang(seat, choice, now)
            }
            Hu => self.zimo(seat, now),
            _ => Err(ErrorCode::IllegalOrderType),
        }
    }

    fn discard(&mut self, seat: Seat, id: TileId, now: Instant) -> GameResult {
        let pl = &mut self.players[seat];
        let t = pl.remove_tile(id).ok_or(ErrorCode::InvalidParameter)?;
        let after_gang = pl.ctx.is_after_gang;
        pl.discards.push(t);
        pl.sort_hand();
        pl.ctx.drawn = None;
        pl.ctx.is_gang_shang_hua = false;
        pl.ctx.is_after_gang = false;
        pl.ctx.deadline = None;
        let uid = pl.uid;

        self.wait = Wait::None;
        self.last_discard = Some((seat, t));
        self.snapshot.push_do(Discard, vec![uid], vec![id]);
        self.broadcast(
            push::TYPE_DO,
            &TypeDoPush {
                op_type: Discard,
                uid,
                from: None,
                tile_ids: vec![id],
                gang_type: None,
            },
        );
        self.open_claim(now, seat, t, ClaimKind::Discard { after_gang });
        Ok(())
    }

    fn self_gang(&mut self, seat: Seat, choice: GangChoice, now: Instant) -> GameResult {
        let index = index_from_id(choice.tile_id);
        match choice.gang_type {
            GangType::An => {
                let tiles = self.players[seat]
                    .take_index(index, TILE)
                    .ok_or(ErrorCode::InvalidParameter)?;
                let ids: Vec<TileId> = tiles.iter().map(|t| t.id).collect();
                let pl = &mut self.players[seat];
                let uid = pl.uid;
                pl.melds.push(PongKong {
                    meld_type: MeldType::Gang(GangType::An),
                    index,
                    tiles,
                    from: uid,
                });
                pl.ctx.drawn = None;
                pl.ctx.deadline = None;
                self.wait = Wait::None;

                self.snapshot.push_do(Gang, vec![uid], ids.clone());
                self.broadcast(
                    push::TYPE_DO,
                    &TypeDoPush {
                        op_type: Gang,
                        uid,
                        from: None,
                        tile_ids: ids,
                        gang_type: Some(GangType::An),
                    },
                );
                self.pay_gang(seat, GangType::An, None);
                self.draw(now, true);
            }
            GangType::Ba => {
                let pl = &mut self.players[seat];
                let t = *pl
                    .hand
                    .iter()
                    .find(|t| t.id == choice.tile_id)
                    .ok_or(ErrorCode::InvalidParameter)?;
                pl.ctx.deadline = None;
                let uid = pl.uid;
                self.wait = Wait::None;

                self.broadcast(
                    push::TYPE_DO,
                    &TypeDoPush {
                        op_type: Gang,
                        uid,
                        from: None,
                        tile_ids: vec![t.id],
                        gang_type: Some(GangType::Ba),
                    },
                );
                // 搶槓の受付後に成立
                self.open_claim(now, seat, t, ClaimKind::RobGang);
            }
            GangType::Ming => return Err(ErrorCode::IllegalOrderType),
        }
        Ok(())
    }

    fn finish_ba_gang(&mut self, seat: Seat, tile: Tile, now: Instant) {
        let pl = &mut self.players[seat];
        if pl.remove_tile(tile.id).is_none() {
            error!("[{}] bagang tile {} not in hand", self.desk_no, tile);
            return;
        }
        match pl
            .melds
            .iter_mut()
            .find(|m| m.meld_type == MeldType::Peng && m.index == tile.index)
        {
            Some(m) => {
                m.tiles.push(tile);
                m.meld_type = MeldType::Gang(GangType::Ba);
            }
            None => error!("[{}] bagang without peng: {}", self.desk_no, tile),
        }
        pl.ctx.drawn = None;
        let uid = pl.uid;

        self.snapshot.push_do(Gang, vec![uid], vec![tile.id]);
        self.pay_gang(seat, GangType::Ba, None);
        self.turn = seat;
        self.draw(now, true);
    }

    fn zimo(&mut self, seat: Seat, now: Instant) -> GameResult {
        let pl = &self.players[seat];
        let tile = pl.ctx.drawn.ok_or(ErrorCode::NotWon)?;
        let mut ctx = WinContext::new(tile.index, true);
        ctx.is_last_tile = pl.ctx.is_last_tile;
        ctx.is_gang_shang_hua = pl.ctx.is_gang_shang_hua;
        let fan = calc_zimo_fan(pl, &mut ctx, &self.opts).ok_or(ErrorCode::NotWon)?;
        let uid = pl.uid;

        self.wait = Wait::None;
        self.clear_deadlines();
        self.players[seat].ctx.win = Some(WinRecord {
            tile,
            fan,
            desc: ctx.desc,
            is_zimo: true,
        });
        self.snapshot.push_do(Hu, vec![uid], vec![tile.id]);
        self.broadcast(
            push::TYPE_DO,
            &TypeDoPush {
                op_type: Hu,
                uid,
                from: None,
                tile_ids: vec![tile.id],
                gang_type: None,
            },
        );

        let payers: Vec<Seat> = (0..self.n_seat()).filter(|&s| s != seat).collect();
        let changes = self.transfer(seat, &payers, hu_point(fan, true, &self.opts));
        self.record_hu(uid, fan, changes);
        info!("[{}] {} zimo {} fan:{}", self.desk_no, uid, tile, fan);

        self.round_over(now, vec![seat]);
        Ok(())
    }

    // [Claim]
    fn claim_context(&self, tile: Tile, kind: ClaimKind) -> WinContext {
        let mut ctx = WinContext::new(tile.index, false);
        match kind {
            ClaimKind::Discard { after_gang } => {
                ctx.is_gang_shang_pao = after_gang;
                ctx.is_last_tile = self.wall_count() == 0;
            }
            ClaimKind::RobGang => ctx.is_qiang_gang_hu = true,
        }
        ctx
    }

    fn open_claim(&mut self, now: Instant, from: Seat, tile: Tile, kind: ClaimKind) {
        let n = self.n_seat();
        let wall_count = self.wall_count();
        let ctx = self.claim_context(tile, kind);
        let hu_only = kind == ClaimKind::RobGang;

        let mut candidates = vec![];
        for k in 1..n {
            let s = (from + k) % n;
            let pl = &self.players[s];
            if let Some(hint) = calc_claim_hint(pl, tile, wall_count, hu_only, &ctx, &self.opts) {
                candidates.push(Candidate {
                    seat: s,
                    hint,
                    answer: None,
                });
            }
        }

        if candidates.is_empty() {
            self.close_claim(now, from, tile, kind, None);
            return;
        }

        let hints: Vec<(Seat, Hint)> = candidates
            .iter()
            .map(|c| (c.seat, c.hint.clone()))
            .collect();
        self.wait = Wait::Claim(ClaimWindow {
            from,
            tile,
            kind,
            candidates,
        });
        for (s, hint) in hints {
            self.push_to(hint.uid, push::OP_TYPE_HINT, &hint);
            self.set_deadline(s, now);
        }
    }

    pub(super) fn on_claim_action(&mut self, seat: Seat, act: Action, now: Instant) -> GameResult {
        let w = match &mut self.wait {
            Wait::Claim(w) => w,
            _ => return Err(ErrorCode::IllegalDeskStatus),
        };
        let tile = w.tile;
        let c = w
            .candidates
            .iter_mut()
            .find(|c| c.seat == seat && c.answer.is_none())
            .ok_or(ErrorCode::IllegalDeskStatus)?;
        if !c.hint.allows(act.op) {
            return Err(ErrorCode::IllegalOrderType);
        }
        c.answer = Some(act.op);
        let all_answered = w.candidates.iter().all(|c| c.answer.is_some());

        let pl = &mut self.players[seat];
        pl.ctx.deadline = None;
        if act.op == Pass {
            let uid = pl.uid;
            self.snapshot.push_do(Pass, vec![uid], vec![tile.id]);
        }

        // 全員の応答が揃ってから優先順位を判定
        if all_answered {
            self.resolve_claim(now);
        }
        Ok(())
    }

    // 和了 > 杠 > 碰, 同じ操作は放銃者の次の席から近い順
    fn resolve_claim(&mut self, now: Instant) {
        let w = match std::mem::replace(&mut self.wait, Wait::None) {
            Wait::Claim(w) => w,
            other => {
                self.wait = other;
                return;
            }
        };

        let winners: Vec<Seat> = w
            .candidates
            .iter()
            .filter(|c| c.answer == Some(Hu))
            .map(|c| c.seat)
            .collect();
        if !winners.is_empty() {
            self.ron(now, &w, &winners);
            return;
        }

        let mut best: Option<(Seat, OpType)> = None;
        for c in &w.candidates {
            if let Some(op @ (Peng | Gang)) = c.answer {
                if best.map_or(true, |(_, b)| op.priority() > b.priority()) {
                    best = Some((c.seat, op));
                }
            }
        }
        self.close_claim(now, w.from, w.tile, w.kind, best);
    }

    fn close_claim(
        &mut self,
        now: Instant,
        from: Seat,
        tile: Tile,
        kind: ClaimKind,
        best: Option<(Seat, OpType)>,
    ) {
        match (kind, best) {
            (ClaimKind::RobGang, _) => self.finish_ba_gang(from, tile, now),
            (_, Some((s, Peng))) => self.peng(s, from, tile, now),
            (_, Some((s, Gang))) => self.ming_gang(s, from, tile, now),
            _ => self.next_turn(from, now),
        }
    }

    // 放銃者の捨て牌と手牌n枚で公開面子を作る
    fn claim_meld(&mut self, seat: Seat, from: Seat, tile: Tile, n: usize) -> Option<Vec<TileId>> {
        let taken = self.players[seat].take_index(tile.index, n)?;
        self.players[from].discards.pop();
        self.last_discard = None;

        let from_uid = self.players[from].uid;
        let mut tiles = vec![tile];
        tiles.extend(taken);
        let ids = tiles.iter().map(|t| t.id).collect();
        let meld_type = if n == 2 {
            MeldType::Peng
        } else {
            MeldType::Gang(GangType::Ming)
        };
        let pl = &mut self.players[seat];
        pl.melds.push(PongKong {
            meld_type,
            index: tile.index,
            tiles,
            from: from_uid,
        });
        pl.ctx.drawn = None;
        Some(ids)
    }

    fn peng(&mut self, seat: Seat, from: Seat, tile: Tile, now: Instant) {
        let ids = match self.claim_meld(seat, from, tile, 2) {
            Some(ids) => ids,
            None => {
                error!("[{}] peng failed: {}", self.desk_no, tile);
                self.next_turn(from, now);
                return;
            }
        };
        let uid = self.players[seat].uid;
        let from_uid = self.players[from].uid;
        self.snapshot
            .push_do(Peng, vec![uid, from_uid], ids.clone());
        self.broadcast(
            push::TYPE_DO,
            &TypeDoPush {
                op_type: Peng,
                uid,
                from: Some(from_uid),
                tile_ids: ids,
                gang_type: None,
            },
        );
        self.turn = seat;
        self.prompt_turn(now, true);
    }

    fn ming_gang(&mut self, seat: Seat, from: Seat, tile: Tile, now: Instant) {
        let ids = match self.claim_meld(seat, from, tile, 3) {
            Some(ids) => ids,
            None => {
                error!("[{}] gang failed: {}", self.desk_no, tile);
                self.next_turn(from, now);
                return;
            }
        };
        let uid = self.players[seat].uid;
        let from_uid = self.players[from].uid;
        self.snapshot
            .push_do(Gang, vec![uid, from_uid], ids.clone());
        self.broadcast(
            push::TYPE_DO,
            &TypeDoPush {
                op_type: Gang,
                uid,
                from: Some(from_uid),
                tile_ids: ids,
                gang_type: Some(GangType::Ming),
            },
        );
        self.pay_gang(seat, GangType::Ming, Some(from));
        self.turn = seat;
        self.draw(now, true);
    }

    fn ron(&mut self, now: Instant, w: &ClaimWindow, winners: &[Seat]) {
        self.clear_deadlines();
        let from_uid = self.players[w.from].uid;

        let mut won = vec![];
        for &s in winners {
            let mut ctx = self.claim_context(w.tile, w.kind);
            let fan = match calc_ron_fan(&self.players[s], w.tile, &mut ctx, &self.opts) {
                Some(fan) => fan,
                None => {
                    error!("[{}] ron rejected at settlement: seat {}", self.desk_no, s);
                    continue;
                }
            };
            let uid = self.players[s].uid;
            self.players[s].ctx.win = Some(WinRecord {
                tile: w.tile,
                fan,
                desc: ctx.desc,
                is_zimo: false,
            });
            self.snapshot
                .push_do(Hu, vec![uid, from_uid], vec![w.tile.id]);
            self.broadcast(
                push::TYPE_DO,
                &TypeDoPush {
                    op_type: Hu,
                    uid,
                    from: Some(from_uid),
                    tile_ids: vec![w.tile.id],
                    gang_type: None,
                },
            );
            let changes = self.transfer(s, &[w.from], hu_point(fan, false, &self.opts));
            self.record_hu(uid, fan, changes);
            info!("[{}] {} ron {} from {} fan:{}", self.desk_no, uid, w.tile, from_uid, fan);
            won.push(s);
        }

        self.round_over(now, won);
    }

    // [Score]
    // payersがそれぞれpointをwinnerに支払う
    fn transfer(&mut self, winner: Seat, payers: &[Seat], point: Score) -> Vec<ScoreDelta> {
        let mut changes = vec![];
        let gain = point * payers.len() as Score;
        let w = &mut self.players[winner];
        w.score += gain;
        w.ctx.round_score += gain;
        changes.push(ScoreDelta {
            uid: w.uid,
            delta: gain,
            total: w.score,
        });
        for &s in payers {
            let p = &mut self.players[s];
            p.score -= point;
            p.ctx.round_score -= point;
            changes.push(ScoreDelta {
                uid: p.uid,
                delta: -point,
                total: p.score,
            });
        }
        changes
    }

    fn pay_gang(&mut self, seat: Seat, gang_type: GangType, from: Option<Seat>) {
        let payers: Vec<Seat> = match from {
            Some(f) => vec![f],
            None => (0..self.n_seat()).filter(|&s| s != seat).collect(),
        };
        let changes = self.transfer(seat, &payers, gang_point(gang_type));
        let uid = self.players[seat].uid;
        self.snapshot.gang_score_changes.push(ScoreChange {
            uid,
            fan: 0,
            deltas: changes.clone(),
        });
        self.broadcast(
            push::GANG_SCORE_CHANGE,
            &GangScoreChangePush {
                uid,
                gang_type,
                changes,
            },
        );
    }

    fn record_hu(&mut self, uid: Uid, fan: usize, changes: Vec<ScoreDelta>) {
        self.snapshot.hu_score_changes.push(ScoreChange {
            uid,
            fan,
            deltas: changes.clone(),
        });
        self.broadcast(push::SCORE_CHANGE, &ScoreChangePush { uid, fan, changes });
    }

    // [Round end]
    fn round_over(&mut self, now: Instant, winners: Vec<Seat>) {
        self.status = DeskStatus::RoundOver;
        self.wait = Wait::None;
        self.last_hint_uid = None;
        self.clear_deadlines();

        let stats = RoundOverStats {
            round: self.round,
            dealer: self.players[self.dealer].uid,
            is_draw: winners.is_empty(),
            winners: winners.iter().map(|&s| self.players[s].uid).collect(),
            players: self
                .players
                .iter()
                .map(|p| {
                    let mut on_hand = p.hand.clone();
                    on_hand.sort();
                    RoundOverPlayer {
                        uid: p.uid,
                        seat: p.seat,
                        on_hand,
                        pong_kong: p.melds.clone(),
                        win_tile: p.ctx.win.as_ref().map_or(NO_ID, |w| w.tile.id),
                        fan: p.ctx.win.as_ref().map_or(0, |w| w.fan),
                        desc: p.ctx.win.as_ref().map_or(vec![], |w| w.desc.clone()),
                        round_score: p.ctx.round_score,
                        total_score: p.score,
                        is_win: p.ctx.win.is_some(),
                        is_zimo: p.ctx.win.as_ref().map_or(false, |w| w.is_zimo),
                        que: p.que,
                    }
                })
                .collect(),
        };
        self.snapshot.end = Some(stats.clone());
        self.broadcast(push::ROUND_OVER, &stats);
        self.insert_history_job();
        info!(
            "[{}] round {} over: {}",
            self.desk_no,
            self.round,
            if stats.is_draw {
                "draw".to_string()
            } else {
                format!("winners {:?}", stats.winners)
            }
        );

        // 単独の和了者が次の親. 複数和了,流局は親を維持
        self.round += 1;
        if winners.len() == 1 {
            self.dealer = winners[0];
        }
        self.turn = self.dealer;
        for p in &mut self.players {
            p.is_ready = false;
        }

        if self.round >= self.opts.max_round {
            self.game_end(true, "finished");
        } else {
            self.update_desk_job();
            self.try_start(now);
        }
    }

    fn insert_history_job(&self) {
        let history = History {
            desk_id: self.desk_id,
            desk_no: self.desk_no.clone(),
            mode: self.opts.mode,
            round: self.round,
            begin: self.round_begin,
            end: unixtime_now(),
            player_names: self.players.iter().map(|p| p.name.clone()).collect(),
            score_changes: self.players.iter().map(|p| p.ctx.round_score).collect(),
            snapshot: serde_json::to_string(&self.snapshot).unwrap_or_default(),
        };
        let st = self.storage.clone();
        self.jobs
            .push("insert_history", move || Ok(st.insert_history(&history)?));
    }

    // 卓の終了. 正常終了以外で1局も終わっていなければ房卡を返却
    pub(super) fn game_end(&mut self, normal: bool, reason: &str) {
        if self.is_closed() {
            return;
        }
        self.wait = Wait::None;
        self.dissolve = None;
        self.clear_deadlines();

        let push = GameEndPush {
            desk_no: self.desk_no.clone(),
            is_normal_finished: normal,
            reason: reason.to_string(),
            rounds: self.round,
            players: self
                .players
                .iter()
                .map(|p| GameEndPlayer {
                    uid: p.uid,
                    name: p.name.clone(),
                    score: p.score,
                })
                .collect(),
        };
        self.status = DeskStatus::Destroy;
        self.broadcast(push::GAME_END, &push);

        if normal {
            let consume = CardConsume {
                uid: self.creator,
                cards: self.card_cost,
                desk_id: self.desk_id,
                desk_no: self.desk_no.clone(),
                timestamp: unixtime_now(),
            };
            let st = self.storage.clone();
            self.jobs
                .push("insert_consume", move || Ok(st.insert_consume(&consume)?));
        } else if self.round == 0 {
            self.refund();
        }
        self.update_desk_job();

        let uids: Vec<Uid> = self.players.iter().map(|p| p.uid).collect();
        for uid in uids {
            self.seat_changed(uid, false);
        }
        self.closed();
        self.status = DeskStatus::Cleaned;
        info!(
            "[{}] game end ({}): {}",
            self.desk_no,
            if normal { "normal" } else { "interrupted" },
            reason
        );
    }

    fn refund(&mut self) {
        if self.card_cost <= 0 {
            return;
        }
        match self.storage.user_add_coin(self.creator, self.card_cost) {
            Ok(coin) => {
                let uid = self.creator;
                self.push_to(uid, push::COIN_CHANGE, &CoinChangePush { uid, coin });
            }
            Err(e) => error!("[{}] refund to {} failed: {}", self.desk_no, self.creator, e),
        }
    }
}
