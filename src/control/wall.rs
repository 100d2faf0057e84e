use rand::prelude::*;

use crate::model::*;
use crate::util::misc::unixtime_now;

// n: 72 (条,筒) | 108 (条,筒,万)
pub fn create_wall(seed: u64, n: usize) -> Vec<Tile> {
    assert!(n == DECK_72 || n == DECK_108, "unsupported deck size: {}", n);
    let mut wall: Vec<Tile> = (0..n as TileId).map(Tile::from_id).collect();
    let mut rng: rand::rngs::StdRng = rand::SeedableRng::seed_from_u64(seed);
    wall.shuffle(&mut rng);
    wall
}

// シード値を時刻から生成
pub fn new_deck(n: usize) -> Vec<Tile> {
    let seed = unixtime_now() as u64 ^ rand::thread_rng().next_u64();
    create_wall(seed, n)
}

// デバッグ用に作為的な牌山を生成 指定がない場所はシード値に従ってランダムに生成
// hands: 親から順に各席の配牌 (最大13枚), deal: 親の14枚目以降のツモ順
pub fn create_wall_debug(seed: u64, n: usize, hands: &[Vec<Index>], deal: &[Index]) -> Vec<Tile> {
    assert!(n == DECK_72 || n == DECK_108, "unsupported deck size: {}", n);
    let mut remain: Vec<Tile> = (0..n as TileId).map(Tile::from_id).collect();
    let mut take = |index: Index| -> Tile {
        match remain.iter().position(|t| t.index == index) {
            Some(p) => remain.remove(p),
            None => panic!("no more tile for index {}", index),
        }
    };

    let fixed_hands: Vec<Vec<Tile>> = hands
        .iter()
        .map(|h| {
            assert!(h.len() <= HAND);
            h.iter().map(|&i| take(i)).collect()
        })
        .collect();
    let fixed_deal: Vec<Tile> = deal.iter().map(|&i| take(i)).collect();

    // 余った牌をランダムにシャッフル
    let mut rng: rand::rngs::StdRng = rand::SeedableRng::seed_from_u64(seed);
    remain.shuffle(&mut rng);

    let mut wall = vec![];
    for h in &fixed_hands {
        wall.extend(h.iter().copied());
        move_tiles(&mut remain, &mut wall, HAND - h.len());
    }
    wall.extend(fixed_deal);
    wall.append(&mut remain);
    wall
}

fn move_tiles(source: &mut Vec<Tile>, target: &mut Vec<Tile>, count: usize) {
    for _ in 0..count {
        if let Some(t) = source.pop() {
            target.push(t);
        }
    }
}

#[test]
fn test_create_wall() {
    let w1 = create_wall(1, DECK_72);
    let w2 = create_wall(1, DECK_72);
    assert_eq!(w1, w2);
    assert_eq!(w1.len(), 72);
    let mut ids: Vec<TileId> = w1.iter().map(|t| t.id).collect();
    ids.sort();
    assert_eq!(ids, (0..72).collect::<Vec<_>>());
    assert!(w1.iter().all(|t| t.suit < 2));

    assert_eq!(create_wall(3, DECK_108).len(), 108);
    assert_eq!(new_deck(DECK_72).len(), 72);
}

#[test]
fn test_debug_wall() {
    let hands = vec![vec![1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 9, 9], vec![], vec![11, 11]];
    let wall = create_wall_debug(0, DECK_72, &hands, &[5]);
    assert_eq!(wall.len(), 72);
    let idx: Vec<Index> = wall[..13].iter().map(|t| t.index).collect();
    assert_eq!(idx, hands[0]);
    assert_eq!(wall[26].index, 11);
    assert_eq!(wall[27].index, 11);
    assert_eq!(wall[39].index, 5);
    let mut ids: Vec<TileId> = wall.iter().map(|t| t.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 72);
}
