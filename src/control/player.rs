use std::fmt;
use std::time::Instant;

use crate::model::*;

// 和了の記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinRecord {
    pub tile: Tile,
    pub fan: usize,
    pub desc: Vec<String>,
    pub is_zimo: bool,
}

// 局ごとにリセットされる作業領域
#[derive(Debug, Clone, Default)]
pub struct PlayerContext {
    pub drawn: Option<Tile>,          // 直前のツモ牌 (打牌または鳴きでクリア)
    pub is_last_tile: bool,           // 海底牌をツモった
    pub is_gang_shang_hua: bool,      // 嶺上牌をツモった
    pub is_after_gang: bool,          // 槓の後の打牌 (放銃すると杠上炮)
    pub deadline: Option<Instant>,    // 応答期限 (欠門選択, 打牌, 鳴き)
    pub round_score: Score,           // この局の得点変動
    pub win: Option<WinRecord>,
}

#[derive(Debug, Clone)]
pub struct DeskPlayer {
    pub uid: Uid,
    pub name: String,
    pub seat: Seat,
    pub score: Score, // 累計
    pub is_ready: bool,
    pub is_inited: bool, // Desk.ClientInitCompleted受信済み
    pub is_online: bool,
    // 局
    pub hand: Vec<Tile>,
    pub melds: Vec<PongKong>,
    pub discards: Vec<Tile>,
    pub que: usize,
    pub ctx: PlayerContext,
}

impl DeskPlayer {
    pub fn new(uid: Uid, name: &str, seat: Seat) -> Self {
        Self {
            uid,
            name: name.to_string(),
            seat,
            score: 0,
            is_ready: false,
            is_inited: false,
            is_online: true,
            hand: vec![],
            melds: vec![],
            discards: vec![],
            que: QUE_NONE,
            ctx: PlayerContext::default(),
        }
    }

    pub fn reset_round(&mut self) {
        self.hand.clear();
        self.melds.clear();
        self.discards.clear();
        self.que = QUE_NONE;
        self.ctx = PlayerContext::default();
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            uid: self.uid,
            name: self.name.clone(),
            seat: self.seat,
            is_ready: self.is_ready,
            is_online: self.is_online,
            score: self.score,
        }
    }

    pub fn indexes(&self) -> Indexes {
        Indexes::from_tiles(&self.hand)
    }

    pub fn count_index(&self, index: Index) -> usize {
        self.hand.iter().filter(|t| t.index == index).count()
    }

    pub fn has_tile(&self, id: TileId) -> bool {
        self.hand.iter().any(|t| t.id == id)
    }

    // 欠門の牌がまだ手牌に残っているか
    pub fn has_que_tiles(&self) -> bool {
        self.que != QUE_NONE && self.hand.iter().any(|t| t.que() == self.que)
    }

    pub fn remove_tile(&mut self, id: TileId) -> Option<Tile> {
        let p = self.hand.iter().position(|t| t.id == id)?;
        Some(self.hand.remove(p))
    }

    // indexが一致する牌をn枚取り出す (足りなければ手牌は変更しない)
    pub fn take_index(&mut self, index: Index, n: usize) -> Option<Vec<Tile>> {
        if self.count_index(index) < n {
            return None;
        }
        let mut res = vec![];
        for _ in 0..n {
            let p = self.hand.iter().position(|t| t.index == index)?;
            res.push(self.hand.remove(p));
        }
        Some(res)
    }

    // 打牌可能な牌 (欠門の牌が残っている間はそれのみ)
    pub fn legal_discards(&self) -> Vec<TileId> {
        let que_only = self.has_que_tiles();
        self.hand
            .iter()
            .filter(|t| !que_only || t.que() == self.que)
            .map(|t| t.id)
            .collect()
    }

    // 不在時の自動打牌: ツモ牌が打牌可能ならツモ切り, それ以外は打牌可能な最後の牌
    pub fn auto_discard(&self) -> Option<TileId> {
        let legal = self.legal_discards();
        if let Some(t) = self.ctx.drawn {
            if legal.contains(&t.id) {
                return Some(t.id);
            }
        }
        legal.last().copied()
    }

    // 不在時の自動欠門選択: 枚数が最も少ない牌種
    pub fn auto_que(&self, n_suit: usize) -> usize {
        let mut counts = vec![0; n_suit];
        for t in &self.hand {
            if t.suit < n_suit {
                counts[t.suit] += 1;
            }
        }
        let mut best = 0;
        for s in 1..n_suit {
            if counts[s] < counts[best] {
                best = s;
            }
        }
        best + 1
    }

    pub fn sort_hand(&mut self) {
        self.hand.sort();
    }
}

impl fmt::Display for DeskPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seat{} uid:{} score:{} que:{} hand:{} melds:{} discards:{}",
            self.seat,
            self.uid,
            self.score,
            self.que,
            crate::util::misc::vec_to_string(&self.hand),
            crate::util::misc::vec_to_string(&self.melds),
            crate::util::misc::vec_to_string(&self.discards),
        )
    }
}

#[cfg(test)]
fn player_with(indexes: &[Index]) -> DeskPlayer {
    let mut pl = DeskPlayer::new(1, "p", 0);
    let mut used = vec![];
    for &i in indexes {
        let base = ((i / 10) * RANK + i % 10 - 1) * TILE;
        let id = (base..base + TILE)
            .map(|id| id as TileId)
            .find(|id| !used.contains(id))
            .unwrap();
        used.push(id);
        pl.hand.push(Tile::from_id(id));
    }
    pl
}

#[test]
fn test_que_discipline() {
    let mut pl = player_with(&[1, 2, 12, 13, 14]);
    assert_eq!(pl.legal_discards().len(), 5);

    pl.que = TIAO + 1;
    assert!(pl.has_que_tiles());
    let legal = pl.legal_discards();
    assert_eq!(legal.len(), 2);
    assert!(legal.iter().all(|&id| tile_from_id(id).suit == TIAO));

    pl.ctx.drawn = Some(pl.hand[3]);
    assert_eq!(pl.auto_discard(), Some(pl.hand[1].id));
    pl.ctx.drawn = Some(pl.hand[0]);
    assert_eq!(pl.auto_discard(), Some(pl.hand[0].id));

    assert_eq!(pl.auto_que(2), 1);
    assert_eq!(pl.take_index(12, 2), None);
    assert_eq!(pl.take_index(12, 1).map(|v| v.len()), Some(1));
}
