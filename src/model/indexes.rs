use super::*;

// 上位bitを和了判定中の"使用済み"フラグとして使う
// 判定の外側でマークが残っていてはならない
const MARK: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexInfo {
    pub pos: usize,   // 配列上の位置
    pub index: Index, // 牌の種類
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indexes(Vec<u8>);

impl Indexes {
    pub fn new(indexes: &[Index]) -> Self {
        Self(indexes.iter().map(|&i| encode(i)).collect())
    }

    pub fn from_tiles(tiles: &[Tile]) -> Self {
        Self(tiles.iter().map(|t| t.index as u8).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn get(&self, pos: usize) -> Index {
        (self.0[pos] & !MARK) as Index
    }

    pub fn push(&mut self, index: Index) {
        self.0.push(encode(index));
    }

    // 最初に見つかった未マークのindexを1つ削除
    pub fn remove(&mut self, index: Index) -> bool {
        if index > MAX_INDEX {
            return false;
        }
        match self.0.iter().position(|&v| v == index as u8) {
            Some(p) => {
                self.0.remove(p);
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Index> {
        self.0.iter().map(|&v| (v & !MARK) as Index).collect()
    }

    pub fn stats(&self) -> Stats {
        stats_from_indexes(&self.to_vec())
    }

    // 安定ソート (マークは値と一緒に移動する)
    pub fn sort(&mut self) {
        self.0.sort_by_key(|&v| v & !MARK);
    }

    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0] & !MARK <= w[1] & !MARK)
    }

    #[inline]
    pub fn is_marked(&self, pos: usize) -> bool {
        self.0[pos] & MARK != 0
    }

    pub fn mark(&mut self, pos: &[usize]) {
        for &p in pos {
            self.0[p] |= MARK;
        }
    }

    pub fn unmark(&mut self, pos: &[usize]) {
        for &p in pos {
            self.0[p] &= !MARK;
        }
    }

    pub fn reset(&mut self) {
        for v in &mut self.0 {
            *v &= !MARK;
        }
    }

    pub fn unmarked_count(&self) -> usize {
        self.0.iter().filter(|&&v| v & MARK == 0).count()
    }

    pub fn unmarked(&self) -> Vec<IndexInfo> {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v & MARK == 0)
            .map(|(pos, &v)| IndexInfo {
                pos,
                index: v as Index,
            })
            .collect()
    }

    fn first_unmarked(&self) -> Option<IndexInfo> {
        self.0
            .iter()
            .position(|&v| v & MARK == 0)
            .map(|pos| IndexInfo {
                pos,
                index: self.0[pos] as Index,
            })
    }

    fn find_unmarked(&self, from: usize, index: Index) -> Option<IndexInfo> {
        (from..self.0.len())
            .find(|&p| self.0[p] == index as u8)
            .map(|pos| IndexInfo { pos, index })
    }

    // 先頭(最小)の未マーク牌から始まる刻子. ソート済みであること
    pub fn unmarked_triplet(&self) -> Option<[IndexInfo; 3]> {
        let a = self.first_unmarked()?;
        let b = self.find_unmarked(a.pos + 1, a.index)?;
        let c = self.find_unmarked(b.pos + 1, a.index)?;
        Some([a, b, c])
    }

    // 先頭(最小)の未マーク牌から始まる順子. ソート済みであること
    // 牌種をまたぐ順子 (9,11,12など) は作らない
    pub fn unmarked_sequence(&self) -> Option<[IndexInfo; 3]> {
        let a = self.first_unmarked()?;
        let i = a.index;
        if i >= 30 || i % 10 > 7 || suit_of(i) != suit_of(i + 2) {
            return None;
        }
        let b = self.find_unmarked(a.pos + 1, i + 1)?;
        let c = self.find_unmarked(b.pos + 1, i + 2)?;
        Some([a, b, c])
    }
}

impl fmt::Display for Indexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v: Vec<String> = self.to_vec().iter().map(|&i| index_symbol(i)).collect();
        write!(f, "[{}]", v.join(" "))
    }
}

// 範囲外のindexは不正な値(0)として保持し, 和了判定で弾く
#[inline]
fn encode(index: Index) -> u8 {
    if index <= MAX_INDEX {
        index as u8
    } else {
        0
    }
}

#[inline]
pub fn positions(infos: &[IndexInfo]) -> Vec<usize> {
    infos.iter().map(|i| i.pos).collect()
}

#[test]
fn test_sort_idempotent() {
    let mut idx = Indexes::new(&[5, 3, 21, 3, 1, 12]);
    idx.sort();
    assert!(idx.is_sorted());
    assert_eq!(idx.to_vec(), vec![1, 3, 3, 5, 12, 21]);
    let once = idx.clone();
    idx.sort();
    assert_eq!(idx, once);
}

#[test]
fn test_mark_reset() {
    let mut idx = Indexes::new(&[1, 1, 1, 2, 3]);
    idx.mark(&[0, 3]);
    assert!(idx.is_marked(0));
    assert_eq!(idx.get(0), 1);
    assert_eq!(idx.unmarked_count(), 3);
    idx.reset();
    assert_eq!(idx.unmarked_count(), idx.len());
}

#[test]
fn test_unmarked_groups() {
    let mut idx = Indexes::new(&[2, 2, 2, 3, 4]);
    idx.sort();
    let t = idx.unmarked_triplet().unwrap();
    assert_eq!(positions(&t), vec![0, 1, 2]);
    let s = idx.unmarked_sequence().unwrap();
    assert_eq!(positions(&s), vec![0, 3, 4]);

    idx.mark(&positions(&t));
    assert!(idx.unmarked_triplet().is_none());
    assert!(idx.unmarked_sequence().is_none()); // 3,4のみ

    let mut cross = Indexes::new(&[9, 11, 12]);
    cross.sort();
    assert!(cross.unmarked_sequence().is_none());
    let mut edge = Indexes::new(&[18, 19, 21]);
    edge.sort();
    assert!(edge.unmarked_sequence().is_none());
}

#[test]
fn test_out_of_range_index() {
    // 129を1として扱わない
    let idx = Indexes::new(&[129, 1, 1, 2, 3]);
    assert_eq!(idx.to_vec(), vec![0, 1, 1, 2, 3]);
    assert!(!crate::hand::check_win(&idx));
    assert!(crate::hand::check_win(&Indexes::new(&[1, 1, 1, 2, 3])));

    let mut idx = Indexes::new(&[1, 1]);
    assert!(!idx.remove(129));
    assert_eq!(idx.len(), 2);
    idx.push(300);
    assert_eq!(idx.get(2), 0);
}
