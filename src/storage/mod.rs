// 永続化層との境界
// ゲーム進行に必要な操作のみを定義し, 実装(SQL, KV, ファイル)は問わない
mod memory;

use serde::{Deserialize, Serialize};

use crate::error::GameResult;
use crate::model::*;

pub use memory::MemoryStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: Uid,
    pub name: String,
    pub coin: i64,
    pub last_login: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeskRecord {
    pub id: i64, // insert_desk で採番
    pub desk_no: DeskNo,
    pub creator: Uid,
    pub club_id: i64,
    pub opts: DeskOptions,
    pub round: usize,
    pub scores: Vec<(Uid, Score)>,
    pub status: DeskStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub desk_id: i64,
    pub desk_no: DeskNo,
    pub mode: usize,
    pub round: usize,
    pub begin: i64,
    pub end: i64,
    pub player_names: Vec<String>,
    pub score_changes: Vec<Score>,
    pub snapshot: String, // SnapShotのjson
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConsume {
    pub uid: Uid,
    pub cards: i64,
    pub desk_id: i64,
    pub desk_no: DeskNo,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    pub id: i64,
    pub name: String,
    pub owner: Uid,
    pub balance: i64,
}

pub trait Storage: Send + Sync {
    fn query_user(&self, uid: Uid) -> GameResult<User>;
    fn update_user(&self, user: &User) -> GameResult;
    fn insert_user(&self, user: &User) -> GameResult;
    // 変更後の残高を返す
    fn user_add_coin(&self, uid: Uid, n: i64) -> GameResult<i64>;
    fn user_lose_coin(&self, uid: Uid, n: i64) -> GameResult<i64>;

    fn insert_desk(&self, desk: &DeskRecord) -> GameResult<i64>;
    fn update_desk(&self, desk: &DeskRecord) -> GameResult;
    fn insert_history(&self, history: &History) -> GameResult;
    fn insert_consume(&self, consume: &CardConsume) -> GameResult;

    fn club_list(&self, uid: Uid) -> GameResult<Vec<Club>>;
    fn apply_club(&self, uid: Uid, club_id: i64) -> GameResult;
    fn is_club_member(&self, club_id: i64, uid: Uid) -> GameResult<bool>;
    fn is_balance_enough(&self, club_id: i64) -> GameResult<bool>;
}
