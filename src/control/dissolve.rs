use std::time::Instant;

use serde_json::Value;

use super::desk::Desk;
use crate::error::{ErrorCode, GameResult};
use crate::model::*;
use crate::{debug, info};

// 解散投票の状態
#[derive(Debug, Clone)]
pub struct DissolveContext {
    pub proposer: Seat,
    pub votes: Vec<Option<bool>>, // 席順. 投票権のない席(提案者,提案時の切断者)は常にNone
    pub voters: Vec<Seat>,
    pub started: Instant,
    pub deadline: Instant,
    queued: Vec<(Uid, String, Option<u64>, Value)>, // 投票中に届いた対局操作
}

impl DissolveContext {
    pub fn queue(&mut self, uid: Uid, route: &str, id: Option<u64>, data: Value) {
        self.queued.push((uid, route.to_string(), id, data));
    }

    pub fn is_unanimous(&self) -> bool {
        self.voters.iter().all(|&s| self.votes[s] == Some(true))
    }

    pub fn status_push(&self, desk: &Desk) -> DissolveStatusPush {
        let players = desk.players();
        DissolveStatusPush {
            proposer: players[self.proposer].uid,
            remaining: self
                .deadline
                .saturating_duration_since(Instant::now())
                .as_secs(),
            votes: players
                .iter()
                .map(|p| DissolveVote {
                    uid: p.uid,
                    agree: self.votes.get(p.seat).copied().flatten(),
                })
                .collect(),
        }
    }
}

impl Desk {
    pub fn propose_dissolve(&mut self, seat: Seat, now: Instant) -> GameResult {
        if self.dissolve.is_some() {
            return Err(ErrorCode::IllegalDeskStatus);
        }

        let voters: Vec<Seat> = self
            .players
            .iter()
            .filter(|p| p.seat != seat && p.is_online)
            .map(|p| p.seat)
            .collect();
        let d = DissolveContext {
            proposer: seat,
            votes: vec![None; self.n_seat()],
            voters,
            started: now,
            deadline: now + self.cfg.dissolve_timeout,
            queued: vec![],
        };
        let push = DissolvePush {
            proposer: self.players[seat].uid,
            remaining: self.cfg.dissolve_timeout.as_secs(),
            voters: d.voters.iter().map(|&s| self.players[s].uid).collect(),
        };
        let unanimous = d.is_unanimous();
        self.dissolve = Some(d);
        info!("[{}] dissolve proposed by {}", self.desk_no, push.proposer);
        self.broadcast(push::DISSOLVE, &push);

        // 投票できるプレイヤーがいない
        if unanimous {
            self.accept_dissolve();
        }
        Ok(())
    }

    pub fn vote_dissolve(&mut self, seat: Seat, agree: bool, now: Instant) -> GameResult {
        let d = self.dissolve.as_mut().ok_or(ErrorCode::IllegalDeskStatus)?;
        if !d.voters.contains(&seat) || d.votes[seat].is_some() {
            return Err(ErrorCode::IllegalDeskStatus);
        }
        d.votes[seat] = Some(agree);
        let unanimous = d.is_unanimous();

        let push = match &self.dissolve {
            Some(d) => d.status_push(self),
            None => return Ok(()),
        };
        self.broadcast(push::DISSOLVE_STATUS, &push);

        if !agree {
            self.cancel_dissolve(now);
        } else if unanimous {
            self.accept_dissolve();
        }
        Ok(())
    }

    // 反対票. 保留していた操作を順に処理して対局を再開
    fn cancel_dissolve(&mut self, now: Instant) {
        let d = match self.dissolve.take() {
            Some(d) => d,
            None => return,
        };
        info!("[{}] dissolve rejected", self.desk_no);
        self.broadcast(push::DISSOLVE_RESULT, &DissolveResultPush { ok: false });

        // 投票中に経過した時間は期限に含めない
        let paused = now.saturating_duration_since(d.started);
        for p in &mut self.players {
            if let Some(dl) = &mut p.ctx.deadline {
                *dl += paused;
            }
        }

        for (uid, route, id, data) in d.queued {
            debug!("[{}] replay queued {} from {}", self.desk_no, route, uid);
            self.handle_request(uid, &route, id, data, now);
        }
        self.try_start(now);
    }

    // 全員の賛成または期限切れ
    pub fn accept_dissolve(&mut self) {
        if self.dissolve.is_none() {
            return;
        }
        info!("[{}] dissolve accepted", self.desk_no);
        self.broadcast(push::DISSOLVE_RESULT, &DissolveResultPush { ok: true });
        self.status = DeskStatus::Interruption;
        self.game_end(false, "dissolved");
    }
}
