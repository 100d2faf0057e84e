use super::*;

// 1局分の牌譜. 局終了時にJSONとして保存する
// gang_score_changes, hu_score_changesはdo配列の中の同じ種類の操作の出現順に対応する
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapShot {
    pub enter: Vec<PlayerEnter>,
    pub basic_info: BasicInfo,
    pub duan_pai: DuanPaiRecord,
    #[serde(rename = "do")]
    pub do_: Vec<OpTypeDo>,
    pub gang_score_changes: Vec<ScoreChange>,
    pub hu_score_changes: Vec<ScoreChange>,
    pub end: Option<RoundOverStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEnter {
    pub uid: Uid,
    pub name: String,
    pub seat: Seat,
    pub score: Score, // 局開始時の累計
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    pub desk_no: DeskNo,
    pub mode: usize,
    pub round: usize,
    pub max_round: usize,
    pub opts: DeskOptions,
    pub begin: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatTiles {
    pub uid: Uid,
    pub tile_ids: Vec<TileId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuanPaiRecord {
    pub dice: [usize; 2],
    pub dealer: Uid,
    pub hands: Vec<SeatTiles>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpTypeDo {
    pub op_type: OpType,
    pub uids: Vec<Uid>,        // [操作者, (鳴かれた/放銃したプレイヤー)]
    pub tile_ids: Vec<TileId>, // 鳴きの場合は先頭が対象の牌
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreChange {
    pub uid: Uid,
    pub fan: usize,
    pub deltas: Vec<ScoreDelta>,
}

impl SnapShot {
    pub fn push_do(&mut self, op_type: OpType, uids: Vec<Uid>, tile_ids: Vec<TileId>) {
        self.do_.push(OpTypeDo {
            op_type,
            uids,
            tile_ids,
        });
    }

    // do配列を配牌から再生して最終的な手牌と得点を復元
    pub fn replay(&self) -> Result<Vec<ReplaySeat>, String> {
        let mut seats: Vec<ReplaySeat> = self
            .duan_pai
            .hands
            .iter()
            .map(|h| ReplaySeat {
                uid: h.uid,
                on_hand: h.tile_ids.clone(),
                pong_kong: vec![],
                discards: vec![],
                score: 0,
            })
            .collect();
        let pos = |seats: &Vec<ReplaySeat>, uid: Uid| {
            seats
                .iter()
                .position(|s| s.uid == uid)
                .ok_or(format!("unknown uid: {}", uid))
        };

        let mut n_gang = 0;
        let mut n_hu = 0;
        for (step, d) in self.do_.iter().enumerate() {
            let err = |msg: &str| format!("step {}: {:?} {}", step, d.op_type, msg);
            let actor = pos(&seats, *d.uids.first().ok_or_else(|| err("no uid"))?)?;
            match d.op_type {
                OpType::Draw => {
                    let &t = d.tile_ids.first().ok_or_else(|| err("no tile"))?;
                    seats[actor].on_hand.push(t);
                }
                OpType::Discard => {
                    let &t = d.tile_ids.first().ok_or_else(|| err("no tile"))?;
                    seats[actor].take(t).map_err(|e| err(&e))?;
                    seats[actor].discards.push(t);
                }
                OpType::Peng => {
                    let from = pos(&seats, *d.uids.get(1).ok_or_else(|| err("no target"))?)?;
                    let &t0 = d.tile_ids.first().ok_or_else(|| err("no tile"))?;
                    let rest = d.tile_ids.get(1..).unwrap_or_default();
                    if rest.len() != 2 {
                        return Err(err("peng needs 2 tiles from hand"));
                    }
                    seats[from].take_discard(t0).map_err(|e| err(&e))?;
                    for &t in rest {
                        seats[actor].take(t).map_err(|e| err(&e))?;
                    }
                    seats[actor].pong_kong.push(d.tile_ids.clone());
                }
                OpType::Gang => {
                    let change = self
                        .gang_score_changes
                        .get(n_gang)
                        .ok_or_else(|| err("gang score change missing"))?;
                    n_gang += 1;

                    let &t0 = d.tile_ids.first().ok_or_else(|| err("no tile"))?;
                    let idx = index_from_id(t0);
                    if let Some(&from_uid) = d.uids.get(1) {
                        // 明槓
                        let from = pos(&seats, from_uid)?;
                        seats[from].take_discard(t0).map_err(|e| err(&e))?;
                        for &t in &d.tile_ids[1..] {
                            seats[actor].take(t).map_err(|e| err(&e))?;
                        }
                        seats[actor].pong_kong.push(d.tile_ids.clone());
                    } else if let Some(m) = seats[actor]
                        .pong_kong
                        .iter()
                        .position(|m| m.len() == 3 && index_from_id(m[0]) == idx)
                    {
                        // 巴槓
                        seats[actor].take(t0).map_err(|e| err(&e))?;
                        seats[actor].pong_kong[m].push(t0);
                    } else {
                        // 暗槓
                        for &t in &d.tile_ids {
                            seats[actor].take(t).map_err(|e| err(&e))?;
                        }
                        seats[actor].pong_kong.push(d.tile_ids.clone());
                    }
                    apply_deltas(&mut seats, change)?;
                }
                OpType::Hu => {
                    let change = self
                        .hu_score_changes
                        .get(n_hu)
                        .ok_or_else(|| err("hu score change missing"))?;
                    n_hu += 1;
                    apply_deltas(&mut seats, change)?;
                }
                OpType::Pass => {}
            }
        }

        if n_gang != self.gang_score_changes.len() {
            return Err(format!(
                "unconsumed gang score changes: {}/{}",
                n_gang,
                self.gang_score_changes.len()
            ));
        }
        if n_hu != self.hu_score_changes.len() {
            return Err(format!(
                "unconsumed hu score changes: {}/{}",
                n_hu,
                self.hu_score_changes.len()
            ));
        }

        for s in &mut seats {
            s.on_hand.sort_by_key(|&t| (index_from_id(t), t));
        }
        Ok(seats)
    }
}

fn apply_deltas(seats: &mut [ReplaySeat], change: &ScoreChange) -> Result<(), String> {
    for d in &change.deltas {
        let s = seats
            .iter_mut()
            .find(|s| s.uid == d.uid)
            .ok_or(format!("unknown uid in score change: {}", d.uid))?;
        s.score += d.delta;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySeat {
    pub uid: Uid,
    pub on_hand: Vec<TileId>,
    pub pong_kong: Vec<Vec<TileId>>,
    pub discards: Vec<TileId>,
    pub score: Score, // この局の得点変動
}

impl ReplaySeat {
    fn take(&mut self, t: TileId) -> Result<(), String> {
        match self.on_hand.iter().position(|&x| x == t) {
            Some(p) => {
                self.on_hand.remove(p);
                Ok(())
            }
            None => Err(format!("tile {} not in hand of {}", t, self.uid)),
        }
    }

    fn take_discard(&mut self, t: TileId) -> Result<(), String> {
        if self.discards.last() == Some(&t) {
            self.discards.pop();
            Ok(())
        } else {
            Err(format!("tile {} is not the last discard of {}", t, self.uid))
        }
    }
}

#[test]
fn test_replay_consumes_queues() {
    let mut ss = SnapShot::default();
    // 0..3: 1条x4 (uid 1), 36..: 1筒 (uid 2)
    ss.duan_pai.hands = vec![
        SeatTiles {
            uid: 1,
            tile_ids: vec![0, 1, 2, 3, 8],
        },
        SeatTiles {
            uid: 2,
            tile_ids: vec![36, 37, 40],
        },
    ];
    let change = |uid, d: Score| ScoreChange {
        uid,
        fan: 0,
        deltas: vec![
            ScoreDelta {
                uid: 1,
                delta: d,
                total: d,
            },
            ScoreDelta {
                uid: 2,
                delta: -d,
                total: -d,
            },
        ],
    };
    ss.push_do(OpType::Gang, vec![1], vec![0, 1, 2, 3]);
    ss.gang_score_changes.push(change(1, 2));
    ss.push_do(OpType::Draw, vec![1], vec![41]);
    ss.push_do(OpType::Discard, vec![1], vec![8]);
    ss.push_do(OpType::Pass, vec![2], vec![]);
    ss.push_do(OpType::Hu, vec![1], vec![41]);
    ss.hu_score_changes.push(change(1, 4));

    let json = serde_json::to_string(&ss).unwrap();
    assert!(json.contains("\"do\""));
    let ss2: SnapShot = serde_json::from_str(&json).unwrap();
    assert_eq!(ss, ss2);

    let seats = ss2.replay().unwrap();
    assert_eq!(seats[0].on_hand, vec![41]);
    assert_eq!(seats[0].pong_kong, vec![vec![0, 1, 2, 3]]);
    assert_eq!(seats[0].discards, vec![8]);
    assert_eq!(seats[0].score, 6);
    assert_eq!(seats[1].score, -6);

    let mut broken = ss2.clone();
    broken.hu_score_changes.push(change(1, 1));
    assert!(broken.replay().is_err());
}

#[test]
fn test_replay_rejects_short_peng() {
    let mut ss = SnapShot::default();
    ss.duan_pai.hands = vec![
        SeatTiles {
            uid: 1,
            tile_ids: vec![0, 1, 8],
        },
        SeatTiles {
            uid: 2,
            tile_ids: vec![2, 40],
        },
    ];
    ss.push_do(OpType::Discard, vec![2], vec![2]);
    let mut ok = ss.clone();

    ss.push_do(OpType::Peng, vec![1, 2], vec![]);
    assert!(ss.replay().is_err());

    let mut short = ok.clone();
    short.push_do(OpType::Peng, vec![1, 2], vec![2]);
    assert!(short.replay().is_err());

    ok.push_do(OpType::Peng, vec![1, 2], vec![2, 0, 1]);
    let seats = ok.replay().unwrap();
    assert_eq!(seats[0].on_hand, vec![8]);
    assert_eq!(seats[0].pong_kong, vec![vec![2, 0, 1]]);
    assert!(seats[1].discards.is_empty());
}
