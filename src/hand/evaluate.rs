use super::win::*;
use crate::error::{ErrorCode, GameResult};
use crate::model::*;

// [番数計算]
// on_hand: 和了牌を含む手牌 (len%3==2)
// melds: 公開した碰,杠
// 役の説明はctx.descに追加される

fn add(ctx: &mut WinContext, fan: &mut usize, name: &str, n: usize) {
    *fan += n;
    ctx.desc.push(format!("{} +{}", name, n));
}

fn is_qing_yi_se(st: &Stats) -> bool {
    suits_in_stats(st).count_ones() == 1
}

fn is_zhong_zhang(st: &Stats) -> bool {
    st.iter()
        .enumerate()
        .all(|(i, &n)| n == 0 || !is_terminal_index(i))
}

fn is_all_258(st: &Stats) -> bool {
    st.iter().enumerate().all(|(i, &n)| n == 0 || is_258(i))
}

fn is_all_terminal(st: &Stats) -> bool {
    st.iter()
        .enumerate()
        .all(|(i, &n)| n == 0 || is_terminal_index(i))
}

// 暗刻と雀頭のみで構成されているか
fn is_peng_peng(st: &Stats) -> bool {
    let mut n_pair = 0;
    for &n in st.iter() {
        match n {
            0 | 3 => {}
            2 => n_pair += 1,
            _ => return false,
        }
    }
    n_pair == 1
}

// 4枚揃った牌の数
fn count_gen(st: &Stats) -> usize {
    st.iter().filter(|&&n| n == TILE).count()
}

// 夾心五: 5で和了り, 4,5,6の順子を抜いても和了形が残る
fn is_jia_xin(on_hand: &Indexes, win_index: Index) -> bool {
    if !is_legal_index(win_index) || rank_of(win_index) != 5 {
        return false;
    }
    let mut h = on_hand.clone();
    for i in [win_index - 1, win_index, win_index + 1] {
        if !h.remove(i) {
            return false;
        }
    }
    check_win(&h)
}

pub fn multiple(
    on_hand: &Indexes,
    melds: &[PongKong],
    ctx: &mut WinContext,
    opts: &DeskOptions,
) -> GameResult<usize> {
    if !check_win(on_hand) {
        return Err(ErrorCode::NotWon);
    }

    let hand_st = on_hand.stats();
    let mut all = on_hand.to_vec();
    all.extend(indexes_of_melds(melds));
    let all_st = stats_from_indexes(&all);

    ctx.desc.clear();
    let mut fan = 0;

    if is_qing_yi_se(&all_st) {
        add(ctx, &mut fan, "清一色", 2);
    }
    if opts.menqing {
        if is_zhong_zhang(&all_st) {
            add(ctx, &mut fan, "中张", 1);
        }
        if melds.is_empty() {
            add(ctx, &mut fan, "门清", 1);
        }
    }
    if ctx.is_last_tile {
        add(ctx, &mut fan, "海底", 1);
    }
    if ctx.is_gang_shang_hua {
        add(ctx, &mut fan, "杠上花", 1);
    }
    if ctx.is_gang_shang_pao {
        add(ctx, &mut fan, "杠上炮", 1);
    }
    if ctx.is_qiang_gang_hu {
        add(ctx, &mut fan, "抢杠胡", 1);
    }

    if melds.is_empty() && is_seven_pairs(&hand_st) {
        add(ctx, &mut fan, "七对", 2);
        let gen = count_gen(&hand_st);
        if gen > 0 {
            add(ctx, &mut fan, "根", gen);
        }
        if opts.jiangdui && is_all_258(&all_st) {
            add(ctx, &mut fan, "将对", 2);
        }
        return Ok(finish(ctx, fan, opts));
    }

    if is_peng_peng(&hand_st) {
        add(ctx, &mut fan, "碰碰胡", 1);
        if opts.pengpeng {
            add(ctx, &mut fan, "对对胡", 1);
        }
        if opts.jiangdui && is_all_258(&all_st) {
            add(ctx, &mut fan, "将对", 2);
        }
        if on_hand.len() == 2 {
            add(ctx, &mut fan, "金钩钓", 1);
        }
    }
    if opts.jiaxin && is_jia_xin(on_hand, ctx.win_index) {
        add(ctx, &mut fan, "夹心五", 1);
    }
    if opts.yaojiu && is_all_terminal(&all_st) {
        add(ctx, &mut fan, "幺九", 3);
    }
    let gen = count_gen(&all_st);
    if gen > 0 {
        add(ctx, &mut fan, "根", gen);
    }

    Ok(finish(ctx, fan, opts))
}

fn finish(ctx: &mut WinContext, mut fan: usize, opts: &DeskOptions) -> usize {
    if ctx.is_zimo && opts.is_zimo_fan() {
        add(ctx, &mut fan, "自摸加番", 1);
    }
    if opts.max_fan > 0 && fan > opts.max_fan {
        fan = opts.max_fan;
        ctx.desc.push(format!("封顶 {}", fan));
    }
    fan
}

// 聴牌時の最大番数と和了牌 (流局時の査叫など)
pub fn max_multiple(
    hand: &Indexes,
    melds: &[PongKong],
    ctx: &WinContext,
    opts: &DeskOptions,
) -> Option<(usize, Index)> {
    let tiles = if hand.len() % 3 == 1 {
        ting_tiles(hand).ok()?
    } else {
        return None;
    };

    let mut best: Option<(usize, Index)> = None;
    for i in tiles {
        let mut h = hand.clone();
        h.push(i);
        let mut c = ctx.clone();
        c.win_index = i;
        if let Ok(fan) = multiple(&h, melds, &mut c, opts) {
            if best.map_or(true, |(f, _)| fan > f) {
                best = Some((fan, i));
            }
        }
    }
    best
}

#[cfg(test)]
fn peng(index: Index, from: Uid) -> PongKong {
    let tiles = (0..3)
        .map(|n| Tile::from_id(((index / 10) * 9 + index % 10 - 1) as TileId * 4 + n))
        .collect();
    PongKong {
        meld_type: MeldType::Peng,
        index,
        tiles,
        from,
    }
}

#[cfg(test)]
fn score(hand: &[Index], melds: &[PongKong], ctx: &mut WinContext, opts: &DeskOptions) -> usize {
    multiple(&Indexes::new(hand), melds, ctx, opts).unwrap()
}

#[test]
fn test_multiple_basic() {
    let opts = DeskOptions::default();

    // 平和 (0番)
    let mut ctx = WinContext::new(9, false);
    assert_eq!(score(&[1, 2, 3, 12, 13, 14, 22, 23, 24, 7, 8, 9, 5, 5], &[], &mut ctx, &opts), 0);
    assert!(ctx.desc.is_empty());

    // 清一色 + 根
    let mut ctx = WinContext::new(9, false);
    assert_eq!(score(&[1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 9], &[], &mut ctx, &opts), 3);

    // 七対 + 根x1 + 清一色
    let mut ctx = WinContext::new(7, false);
    assert_eq!(score(&[1, 1, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5, 7, 7], &[], &mut ctx, &opts), 5);

    assert_eq!(
        multiple(&Indexes::new(&[1, 2, 4, 5, 5]), &[], &mut ctx, &opts),
        Err(ErrorCode::NotWon)
    );
}

#[test]
fn test_multiple_peng_peng() {
    let opts = DeskOptions {
        pengpeng: true,
        jiangdui: true,
        ..Default::default()
    };

    // 金钩钓: 碰x4 + 単騎
    let melds = [peng(2, 2), peng(15, 3), peng(18, 2), peng(22, 4)];
    let mut ctx = WinContext::new(25, false);
    // 碰碰胡1 + 对对胡1 + 将对2 + 金钩钓1
    assert_eq!(score(&[25, 25], &melds, &mut ctx, &opts), 5);
    assert_eq!(ctx.desc.len(), 4);

    // 対々 + 雀頭 (将対条件を満たさない)
    let mut ctx = WinContext::new(3, false);
    assert_eq!(score(&[1, 1, 1, 3, 3, 3, 13, 13, 13, 21, 21], &[peng(9, 2)], &mut ctx, &opts), 2);
}

#[test]
fn test_multiple_flags() {
    let opts = DeskOptions {
        zimo: ZIMO_FAN.to_string(),
        menqing: true,
        jiaxin: true,
        max_fan: 3,
        ..Default::default()
    };

    let hand = [2, 3, 4, 12, 13, 14, 22, 23, 24, 24, 25, 26, 28, 28];
    let mut ctx = WinContext::new(25, true);
    ctx.is_last_tile = true;
    // 中张1 + 门清1 + 海底1 + 夹心五1 + 自摸1 = 5 -> 3
    assert_eq!(score(&hand, &[], &mut ctx, &opts), 3);
    assert!(ctx.desc.iter().any(|d| d.starts_with("夹心五")));
}

#[test]
fn test_multiple_yaojiu() {
    let opts = DeskOptions {
        yaojiu: true,
        ..Default::default()
    };
    let mut ctx = WinContext::new(19, false);
    // 幺九3 + 碰碰胡1
    assert_eq!(score(&[1, 1, 1, 9, 9, 9, 11, 11, 11, 19, 19, 19, 29, 29], &[], &mut ctx, &opts), 4);
}

#[test]
fn test_max_multiple() {
    let opts = DeskOptions::default();
    let ctx = WinContext::new(0, false);
    // 4で和了ると清一色+根
    let hand = Indexes::new(&[1, 1, 1, 2, 3, 4, 4, 4, 5, 6, 7, 8, 9]);
    let (fan, index) = max_multiple(&hand, &[], &ctx, &opts).unwrap();
    assert!(fan >= 3);
    assert!(index == 1 || index == 4);

    let hand = Indexes::new(&[1, 4, 7, 12, 15, 18, 21, 24, 27, 3, 6, 9, 13]);
    assert_eq!(max_multiple(&hand, &[], &ctx, &opts), None);
}
