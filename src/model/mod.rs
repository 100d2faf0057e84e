// 麻雀のデータモデル
mod action;
mod define;
mod indexes;
mod meld;
mod message;
mod option;
mod snapshot;
mod tile;
mod win_context;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use action::*;
pub use define::*;
pub use indexes::*;
pub use meld::*;
pub use message::*;
pub use option::*;
pub use snapshot::*;
pub use tile::*;
pub use win_context::*;
