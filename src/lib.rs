#![warn(rust_2018_idioms)]
// 構造的な意味合いや一貫性を保つために以下の警告は無効化
#![allow(clippy::useless_format)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::single_match)]
#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod control;
pub mod error;
pub mod hand;
pub mod listener;
pub mod model;
pub mod server;
pub mod storage;
pub mod util;
