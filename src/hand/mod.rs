// 手牌の和了判定,聴牌判定,番数計算を行うモジュール
mod evaluate;
mod point;
mod win;

pub use self::{
    evaluate::{max_multiple, multiple},
    point::{gang_point, gang_title, hu_point},
    win::{
        check_win, check_win_tiles, check_win_with, is_seven_pairs, is_ting, ting_discards,
        ting_tiles, HandError,
    },
};
