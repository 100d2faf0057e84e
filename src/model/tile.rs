use serde::{de, ser};

use super::*;

// 牌. idは牌山の中で一意, indexは同種の牌で共通
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    pub id: TileId,
    pub suit: usize,
    pub rank: usize,
    pub index: Index,
}

impl Tile {
    // id/4 で牌種と数字が決まる. 負のidは呼び出し側のバグ
    pub fn from_id(id: TileId) -> Self {
        assert!(id >= 0, "negative tile id: {}", id);
        assert!((id as usize) < DECK_108, "tile id out of range: {}", id);
        let k = id as usize / TILE;
        let suit = k / RANK;
        let rank = k % RANK + 1;
        Self {
            id,
            suit,
            rank,
            index: suit * 10 + rank,
        }
    }

    // idを持たない牌 (配牌前の検査用)
    pub fn from_index(index: Index) -> Option<Self> {
        if !is_legal_index(index) {
            return None;
        }
        Some(Self {
            id: NO_ID,
            suit: index / 10,
            rank: index % 10,
            index,
        })
    }

    #[inline]
    pub fn que(&self) -> usize {
        self.suit + 1
    }

    // 1,9牌
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.rank == 1 || self.rank == 9
    }

    // 2,5,8牌
    #[inline]
    pub fn is_258(&self) -> bool {
        is_258(self.index)
    }
}

#[inline]
pub fn tile_from_id(id: TileId) -> Tile {
    Tile::from_id(id)
}

#[inline]
pub fn index_from_id(id: TileId) -> Index {
    Tile::from_id(id).index
}

#[inline]
pub fn tile_from_index(index: Index) -> Option<Tile> {
    Tile::from_index(index)
}

#[inline]
pub fn is_legal_index(index: Index) -> bool {
    (1..=MAX_INDEX).contains(&index) && index % 10 != 0
}

#[inline]
pub fn suit_of(index: Index) -> usize {
    index / 10
}

#[inline]
pub fn rank_of(index: Index) -> usize {
    index % 10
}

#[inline]
pub fn is_258(index: Index) -> bool {
    matches!(index % 10, 2 | 5 | 8)
}

#[inline]
pub fn is_terminal_index(index: Index) -> bool {
    matches!(index % 10, 1 | 9)
}

pub fn index_symbol(index: Index) -> String {
    format!("{}{}", ['s', 'p', 'm'][suit_of(index) % SUIT], rank_of(index))
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", index_symbol(self.index))
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self, self.id)
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tile {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.index, self.id).cmp(&(other.index, other.id))
    }
}

// 通信上はidのみをやり取りする
impl ser::Serialize for Tile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_i32(self.id)
    }
}

impl<'de> de::Deserialize<'de> for Tile {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let id = TileId::deserialize(deserializer)?;
        if id < 0 || id as usize >= DECK_108 {
            return Err(de::Error::custom(format!("invalid tile id: {}", id)));
        }
        Ok(Tile::from_id(id))
    }
}

// [Stats]
// index毎の枚数
pub type Stats = [usize; STATS_LEN];

// 範囲外のindexは無視する (呼び出し側で検査すること)
pub fn stats_from_indexes(indexes: &[Index]) -> Stats {
    let mut st = [0; STATS_LEN];
    for &i in indexes {
        if i <= MAX_INDEX {
            st[i] += 1;
        }
    }
    st
}

pub fn stats_from_tiles(tiles: &[Tile]) -> Stats {
    let mut st = [0; STATS_LEN];
    for t in tiles {
        st[t.index] += 1;
    }
    st
}

pub fn indexes_from_stats(st: &Stats) -> Vec<Index> {
    let mut v = vec![];
    for (i, &n) in st.iter().enumerate() {
        for _ in 0..n {
            v.push(i);
        }
    }
    v
}

// 含まれている牌種の集合 (bit)
pub fn suits_in_stats(st: &Stats) -> usize {
    let mut bits = 0;
    for (i, &n) in st.iter().enumerate() {
        if n > 0 {
            bits |= 1 << suit_of(i);
        }
    }
    bits
}

#[test]
fn test_tile_from_id() {
    for id in 0..DECK_72 as TileId {
        let t = tile_from_id(id);
        assert!(t.suit == TIAO || t.suit == TONG);
        assert!((1..=9).contains(&t.rank));
        assert_eq!(t.index, t.suit * 10 + t.rank);
        assert_eq!(index_from_id(id), t.index);
    }
    assert_eq!(tile_from_id(0).index, 1);
    assert_eq!(tile_from_id(35).index, 9);
    assert_eq!(tile_from_id(36).index, 11);
    assert_eq!(tile_from_id(107).index, 29);
}

#[test]
#[should_panic]
fn test_tile_from_negative_id() {
    tile_from_id(-1);
}

#[test]
fn test_tile_from_index() {
    for i in 0..=MAX_INDEX + 2 {
        match tile_from_index(i) {
            Some(t) => {
                assert!(is_legal_index(i));
                assert_eq!(t.index, i);
                assert_eq!(t.id, NO_ID);
            }
            None => assert!(i == 0 || i % 10 == 0 || i > MAX_INDEX),
        }
    }
}

#[test]
fn test_tile_serde() {
    let t = tile_from_id(40);
    assert_eq!(serde_json::to_string(&t).unwrap(), "40");
    let t2: Tile = serde_json::from_str("40").unwrap();
    assert_eq!(t, t2);
    assert!(serde_json::from_str::<Tile>("-3").is_err());
}
