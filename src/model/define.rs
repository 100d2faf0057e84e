// 型エイリアスと定数

pub type Seat = usize; // 座席 (0~3)
pub type Uid = i64; // ユーザーID
pub type TileId = i32; // 牌ID (牌山生成時に割り当てる一意な番号)
pub type Index = usize; // 牌の種類 suit * 10 + rank
pub type Score = i32;
pub type DeskNo = String; // 6桁の部屋番号

pub const SEAT_MAX: usize = 4; // 最大人数
pub const NO_SEAT: Seat = usize::MAX;
pub const NO_ID: TileId = -1; // IDが未割り当ての牌
pub const TILE: usize = 4; // 同種の牌の枚数
pub const RANK: usize = 9; // 数字の種類
pub const SUIT: usize = 3; // 牌種の最大数 (条, 筒, 万)
pub const MAX_INDEX: Index = 29;
pub const STATS_LEN: usize = MAX_INDEX + 1;
pub const HAND: usize = 13; // 配牌の枚数

// 牌種 (欠門(que)はsuit+1で表す. 0は未選択)
pub const TIAO: usize = 0; // 条
pub const TONG: usize = 1; // 筒
pub const WAN: usize = 2; // 万
pub const QUE_NONE: usize = 0;

pub const DECK_72: usize = 72; // 条,筒の2種
pub const DECK_108: usize = 108; // 条,筒,万の3種
