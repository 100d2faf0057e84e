use super::player::DeskPlayer;
use crate::hand::*;
use crate::model::*;

use OpType::*;

// [Turn Action Check]
// ツモ番のプレイヤーに可能な操作をチェックする
// discard_only: 碰の後は打牌のみ

pub fn calc_turn_hint(pl: &DeskPlayer, wall_count: usize, discard_only: bool) -> Hint {
    let drawn = pl.ctx.drawn.map_or(NO_ID, |t| t.id);
    let mut hint = Hint::new(pl.uid, drawn);

    hint.discards = pl.legal_discards();
    if !hint.discards.is_empty() {
        hint.ops.push(Discard);
    }
    hint.tings = calc_tings(pl, &hint.discards);
    if discard_only {
        return hint;
    }

    if wall_count != 0 {
        hint.gangs.append(&mut check_an_gang(pl));
        hint.gangs.append(&mut check_ba_gang(pl));
        if !hint.gangs.is_empty() {
            hint.ops.push(Gang);
        }
    }
    if check_zimo(pl) {
        hint.ops.push(Hu);
    }

    hint
}

fn calc_tings(pl: &DeskPlayer, discards: &[TileId]) -> Vec<TingInfo> {
    match ting_discards(&pl.indexes()) {
        Ok(tings) => tings
            .into_iter()
            .filter(|t| discards.iter().any(|&id| index_from_id(id) == t.discard))
            .collect(),
        Err(_) => vec![],
    }
}

fn check_an_gang(pl: &DeskPlayer) -> Vec<GangChoice> {
    let st = stats_from_tiles(&pl.hand);
    let mut res = vec![];
    for (i, &n) in st.iter().enumerate() {
        if n != TILE || suit_of(i) + 1 == pl.que {
            continue;
        }
        if let Some(t) = pl.hand.iter().find(|t| t.index == i) {
            res.push(GangChoice {
                tile_id: t.id,
                gang_type: GangType::An,
            });
        }
    }
    res
}

fn check_ba_gang(pl: &DeskPlayer) -> Vec<GangChoice> {
    let mut res = vec![];
    for m in &pl.melds {
        if m.meld_type != MeldType::Peng {
            continue;
        }
        if let Some(t) = pl.hand.iter().find(|t| t.index == m.index) {
            res.push(GangChoice {
                tile_id: t.id,
                gang_type: GangType::Ba,
            });
        }
    }
    res
}

// 欠門の牌が残っている間は和了できない
fn check_zimo(pl: &DeskPlayer) -> bool {
    match pl.ctx.drawn {
        Some(t) => t.que() != pl.que && !pl.has_que_tiles() && check_win(&pl.indexes()),
        None => false,
    }
}

// 自摸和了時の番数
pub fn calc_zimo_fan(pl: &DeskPlayer, ctx: &mut WinContext, opts: &DeskOptions) -> Option<usize> {
    if !check_zimo(pl) {
        return None;
    }
    multiple(&pl.indexes(), &pl.melds, ctx, opts).ok()
}

// 出和了 (搶槓を含む) の番数. 0番は平胡ありの場合のみ
pub fn calc_ron_fan(
    pl: &DeskPlayer,
    tile: Tile,
    ctx: &mut WinContext,
    opts: &DeskOptions,
) -> Option<usize> {
    if tile.que() == pl.que || pl.has_que_tiles() {
        return None;
    }
    let mut h = pl.indexes();
    h.push(tile.index);
    match multiple(&h, &pl.melds, ctx, opts) {
        Ok(0) if !opts.pinghu => None,
        Ok(fan) => Some(fan),
        Err(_) => None,
    }
}

// [Call Action Check]
// 他家の打牌(または巴杠の牌)に対して可能な操作をチェックする
// hu_only: 搶槓の判定
pub fn calc_claim_hint(
    pl: &DeskPlayer,
    tile: Tile,
    wall_count: usize,
    hu_only: bool,
    ctx: &WinContext,
    opts: &DeskOptions,
) -> Option<Hint> {
    let mut hint = Hint::new(pl.uid, tile.id);

    let mut c = ctx.clone();
    if calc_ron_fan(pl, tile, &mut c, opts).is_some() {
        hint.ops.push(Hu);
    }
    if !hu_only && tile.que() != pl.que {
        let n = pl.count_index(tile.index);
        if n == 3 && wall_count != 0 {
            hint.ops.push(Gang);
        }
        if n >= 2 {
            hint.ops.push(Peng);
        }
    }

    if hint.ops.is_empty() {
        None
    } else {
        hint.ops.push(Pass);
        Some(hint)
    }
}

#[cfg(test)]
fn tiles_of(indexes: &[Index]) -> Vec<Tile> {
    let mut used: Vec<TileId> = vec![];
    let mut res = vec![];
    for &i in indexes {
        let base = (((i / 10) * RANK + i % 10 - 1) * TILE) as TileId;
        let id = (base..base + TILE as TileId)
            .find(|id| !used.contains(id))
            .unwrap();
        used.push(id);
        res.push(Tile::from_id(id));
    }
    res
}

#[test]
fn test_claim_hint_que() {
    let opts = DeskOptions::default();
    let ctx = WinContext::new(0, false);

    // 12で和了 (清一色)
    let mut pl = DeskPlayer::new(3, "p", 1);
    pl.hand = tiles_of(&[11, 11, 11, 13, 14, 15, 16, 17, 18, 19, 19, 19, 12]);
    pl.que = TIAO + 1;
    let tile = Tile::from_id(((TONG * RANK + 1) * TILE + 3) as TileId); // 12
    assert_eq!(tile.index, 12);
    let hint = calc_claim_hint(&pl, tile, 10, false, &ctx, &opts).unwrap();
    assert!(hint.allows(Hu));
    assert!(hint.allows(Pass));

    // 欠門(条)の牌が残っていると和了できない
    pl.hand[12] = Tile::from_id(4); // 2条
    assert!(calc_claim_hint(&pl, tile, 10, false, &ctx, &opts).is_none());

    // 碰, 杠
    let tile = Tile::from_id(((TONG * RANK + 8) * TILE + 3) as TileId); // 19
    let hint = calc_claim_hint(&pl, tile, 10, false, &ctx, &opts).unwrap();
    assert_eq!(hint.ops, vec![Gang, Peng, Pass]);
    let hint = calc_claim_hint(&pl, tile, 0, false, &ctx, &opts).unwrap();
    assert_eq!(hint.ops, vec![Peng, Pass]);
    assert!(calc_claim_hint(&pl, tile, 10, true, &ctx, &opts).is_none());
}

#[test]
fn test_turn_hint() {
    let mut pl = DeskPlayer::new(3, "p", 1);
    pl.hand = tiles_of(&[11, 11, 11, 11, 13, 14, 15, 16, 17, 18, 19, 19, 19, 2]);
    pl.que = TIAO + 1;
    pl.ctx.drawn = Some(pl.hand[13]);

    let hint = calc_turn_hint(&pl, 10, false);
    assert_eq!(hint.discards, vec![pl.hand[13].id]);
    assert!(hint.allows(Discard));
    assert!(hint.allows(Gang));
    assert!(!hint.allows(Hu));
    assert_eq!(hint.gangs.len(), 1);
    assert_eq!(hint.gangs[0].gang_type, GangType::An);
    assert!(hint.tings.iter().any(|t| t.discard == 2));

    let hint = calc_turn_hint(&pl, 0, false);
    assert!(!hint.allows(Gang));

    let hint = calc_turn_hint(&pl, 10, true);
    assert_eq!(hint.ops, vec![Discard]);
}
