use std::fmt;

use crate::error::ErrorCode;
use crate::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandError {
    BadHandSize(usize),
}

impl fmt::Display for HandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandError::BadHandSize(n) => write!(f, "bad hand size: {}", n),
        }
    }
}

impl std::error::Error for HandError {}

impl From<HandError> for ErrorCode {
    fn from(_: HandError) -> Self {
        ErrorCode::DismatchTileNum
    }
}

// [完成形判定]

// 七対子 (4枚は2組の対子として扱う)
pub fn is_seven_pairs(st: &Stats) -> bool {
    let mut n_pair = 0;
    for &n in st.iter() {
        match n {
            0 => {}
            2 => n_pair += 1,
            4 => n_pair += 2,
            _ => return false,
        }
    }
    n_pair == 7
}

// 雀頭 + 面子(刻子|順子) x (len-2)/3 で構成されているかの判定
pub fn check_win(indexes: &Indexes) -> bool {
    let n = indexes.len();
    if n % 3 != 2 {
        return false;
    }
    if indexes.to_vec().iter().any(|&i| !is_legal_index(i)) {
        return false;
    }
    if is_seven_pairs(&indexes.stats()) {
        return true;
    }

    let mut idx = indexes.clone();
    idx.reset();
    idx.sort();

    // 同じ値の雀頭候補は一度だけ試す
    let mut last_pair = None;
    for i in 0..n - 1 {
        let v = idx.get(i);
        if v != idx.get(i + 1) || last_pair == Some(v) {
            continue;
        }
        last_pair = Some(v);

        idx.mark(&[i, i + 1]);
        if cover_sets(&mut idx) {
            return true;
        }
        idx.reset();
    }

    false
}

// 未マークの牌をすべて面子で覆えるか (刻子優先, 失敗したら順子)
fn cover_sets(idx: &mut Indexes) -> bool {
    if idx.unmarked_count() == 0 {
        return true;
    }

    if let Some(t) = idx.unmarked_triplet() {
        let p = positions(&t);
        idx.mark(&p);
        if cover_sets(idx) {
            return true;
        }
        idx.unmark(&p);
    }

    if let Some(s) = idx.unmarked_sequence() {
        let p = positions(&s);
        idx.mark(&p);
        if cover_sets(idx) {
            return true;
        }
        idx.unmark(&p);
    }

    false
}

pub fn check_win_tiles(tiles: &[Tile]) -> bool {
    check_win(&Indexes::from_tiles(tiles))
}

// 手牌にindexを1枚加えた場合の和了判定
pub fn check_win_with(tiles: &[Tile], index: Index) -> bool {
    let mut idx = Indexes::from_tiles(tiles);
    idx.push(index);
    check_win(&idx)
}

// [聴牌判定]

// 和了牌の候補. 手牌に含まれない牌種は孤立牌にしかならないので除外
fn candidates(hand: &Indexes) -> Vec<Index> {
    let suits = suits_in_stats(&hand.stats());
    (1..=MAX_INDEX)
        .filter(|&i| is_legal_index(i) && suits & (1 << suit_of(i)) != 0)
        .collect()
}

fn tiles_to_win(hand: &Indexes) -> Vec<Index> {
    let mut res = vec![];
    for i in candidates(hand) {
        let mut h = hand.clone();
        h.push(i);
        if check_win(&h) {
            res.push(i);
        }
    }
    res
}

// 和了牌のリスト
// len%3==1: そのまま, len%3==2: いずれかの打牌後の和了牌の和集合
pub fn ting_tiles(hand: &Indexes) -> Result<Vec<Index>, HandError> {
    match hand.len() % 3 {
        1 => Ok(tiles_to_win(hand)),
        2 => {
            let mut res = vec![];
            for t in ting_discards(hand)? {
                res.extend(t.wins);
            }
            res.sort();
            res.dedup();
            Ok(res)
        }
        _ => Err(HandError::BadHandSize(hand.len())),
    }
}

pub fn is_ting(hand: &Indexes) -> Result<bool, HandError> {
    match hand.len() % 3 {
        1 => Ok(candidates(hand).into_iter().any(|i| {
            let mut h = hand.clone();
            h.push(i);
            check_win(&h)
        })),
        2 => Ok(!ting_discards(hand)?.is_empty()),
        _ => Err(HandError::BadHandSize(hand.len())),
    }
}

// ツモ番において聴牌となる打牌と和了牌の組み合わせ
pub fn ting_discards(hand: &Indexes) -> Result<Vec<TingInfo>, HandError> {
    if hand.len() % 3 != 2 {
        return Err(HandError::BadHandSize(hand.len()));
    }

    let st = hand.stats();
    let mut res = vec![];
    for (i, &n) in st.iter().enumerate() {
        if n == 0 {
            continue;
        }
        let mut h = hand.clone();
        h.remove(i);
        let wins = tiles_to_win(&h);
        if !wins.is_empty() {
            res.push(TingInfo { discard: i, wins });
        }
    }
    Ok(res)
}

#[cfg(test)]
fn idx(v: &[Index]) -> Indexes {
    Indexes::new(v)
}

#[test]
fn test_check_win_table() {
    let cases: [(&[Index], bool); 6] = [
        (&[1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 9], true),
        (&[1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 9, 21], false),
        (&[1, 1, 2, 2, 3, 3, 3, 3, 4, 4, 5, 5, 7, 7], true),
        (&[22, 22, 23, 23, 23, 24, 24, 24, 25, 5, 5, 7, 8, 9], true),
        (&[1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7], true),
        (&[31, 32, 33, 3, 4, 5, 6, 7, 8, 9, 9, 9, 21, 21], false),
    ];
    for (hand, expected) in cases {
        assert_eq!(check_win(&idx(hand)), expected, "{:?}", hand);
    }
}

#[test]
fn test_check_win_shapes() {
    // 刻子と順子の両方に取れる形
    assert!(check_win(&idx(&[1, 1, 1, 2, 3])));
    assert!(check_win(&idx(&[1, 1, 1, 2, 3, 4, 5, 5])));
    assert!(check_win(&idx(&[1, 1, 1, 2, 2, 2, 3, 3, 3, 9, 9])));
    // 重なった順子
    assert!(check_win(&idx(&[1, 2, 2, 3, 3, 4, 7, 7])));
    assert!(check_win(&idx(&[11, 12, 12, 13, 13, 14, 14, 15, 15, 16, 19, 19, 16, 17])));
    assert!(!check_win(&idx(&[1, 1, 1, 2, 3, 5, 6, 8])));
    // 雀頭のみ
    assert!(check_win(&idx(&[5, 5])));
    assert!(!check_win(&idx(&[5, 6])));
    // 枚数不正
    assert!(!check_win(&idx(&[1, 2, 3])));
    assert!(!check_win(&idx(&[1, 1, 1, 2, 3, 5, 5])));
    // 牌種をまたぐ順子
    assert!(!check_win(&idx(&[8, 9, 11, 5, 5])));
}

#[test]
fn test_check_win_keeps_input() {
    let hand = idx(&[3, 1, 2, 5, 5]);
    assert!(check_win(&hand));
    assert_eq!(hand.to_vec(), vec![3, 1, 2, 5, 5]);
    assert_eq!(hand.unmarked_count(), hand.len());
}

#[test]
fn test_ting() {
    let hand = idx(&[1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9]);
    let tiles = ting_tiles(&hand).unwrap();
    assert_eq!(tiles, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]); // 九蓮宝燈型
    assert!(is_ting(&hand).unwrap());

    let hand = idx(&[1, 1, 4, 4, 7, 7, 12, 12, 15, 15, 18, 18, 21]);
    assert_eq!(ting_tiles(&hand).unwrap(), vec![21]);

    let hand = idx(&[1, 4, 7, 12, 15, 18, 21, 24, 27, 3, 6, 9, 13]);
    assert!(!is_ting(&hand).unwrap());
    assert!(ting_tiles(&hand).unwrap().is_empty());

    assert_eq!(
        is_ting(&idx(&[1, 2, 3, 4, 5, 6])),
        Err(HandError::BadHandSize(6))
    );
}

#[test]
fn test_ting_matches_check_win() {
    use rand::prelude::*;

    let mut rng: rand::rngs::StdRng = rand::SeedableRng::seed_from_u64(7);
    let mut deck: Vec<Index> = (0..DECK_72 as TileId).map(index_from_id).collect();
    for _ in 0..200 {
        deck.shuffle(&mut rng);
        let hand = idx(&deck[..13]);
        let tiles = ting_tiles(&hand).unwrap();
        for i in (1..=MAX_INDEX).filter(|&i| is_legal_index(i)) {
            let mut h = hand.clone();
            h.push(i);
            assert_eq!(check_win(&h), tiles.contains(&i));
        }
        assert_eq!(is_ting(&hand).unwrap(), !tiles.is_empty());
    }
}

#[test]
fn test_ting_discards() {
    let hand = idx(&[1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9, 15]);
    let tings = ting_discards(&hand).unwrap();
    let d15 = tings.iter().find(|t| t.discard == 15).unwrap();
    assert_eq!(d15.wins.len(), 9);
    assert!(is_ting(&hand).unwrap());
}
