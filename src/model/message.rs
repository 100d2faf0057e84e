use serde::de::DeserializeOwned;
use serde_json::Value;

use super::*;
use crate::error::{ErrorCode, GameResult};

// クライアントからのリクエスト
pub mod route {
    pub const LOGIN: &str = "User.Login";
    pub const CREATE: &str = "DeskManager.Create";
    pub const JOIN: &str = "DeskManager.Join";
    pub const REJOIN: &str = "DeskManager.ReJoin";
    pub const REENTER: &str = "DeskManager.ReEnter";
    pub const READY: &str = "Desk.Ready";
    pub const CLIENT_INIT: &str = "Desk.ClientInitCompleted";
    pub const SELECT_QUE: &str = "Desk.SelectQue";
    pub const OP_CHOOSE: &str = "Desk.OpChoose";
    pub const DISSOLVE: &str = "Desk.Dissolve";
    pub const DISSOLVE_STATUS: &str = "Desk.DissolveStatus";
    pub const EXIT: &str = "Desk.Exit";
}

// サーバーからのプッシュ
pub mod push {
    pub const DUAN_PAI: &str = "onDuanPai";
    pub const MO_PAI: &str = "onMoPai";
    pub const TYPE_DO: &str = "onTypeDo";
    pub const OP_TYPE_HINT: &str = "onOpTypeHint";
    pub const SCORE_CHANGE: &str = "onScoreChange";
    pub const GANG_SCORE_CHANGE: &str = "onGangPaiScoreChange";
    pub const ROUND_OVER: &str = "onRoundOver";
    pub const GAME_END: &str = "onGameEnd";
    pub const SYNC_DESK: &str = "onSyncDesk";
    pub const OFFLINE_STATUS: &str = "onPlayerOfflineStatus";
    pub const COIN_CHANGE: &str = "onCoinChange";
    pub const BROADCAST: &str = "onBroadcast";
    pub const PLAYER_JOIN: &str = "onPlayerJoin";
    pub const PLAYER_READY: &str = "onPlayerReady";
    pub const SELECT_QUE: &str = "onSelectQue";
    pub const DISSOLVE: &str = "onDissolve";
    pub const DISSOLVE_STATUS: &str = "onDissolveStatus";
    pub const DISSOLVE_RESULT: &str = "onDissolveResult";
    pub const PLAYER_EXIT: &str = "onPlayerExit";
    pub const KICK: &str = "onKick";
}

// [Frame]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub route: String,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    Response {
        route: String,
        id: Option<u64>,
        code: i32,
        error: String,
        data: Value,
    },
    Push {
        route: String,
        data: Value,
    },
}

impl ServerFrame {
    pub fn push<T: Serialize>(route: &str, data: &T) -> Self {
        Self::Push {
            route: route.to_string(),
            data: to_value(data),
        }
    }

    pub fn ok<T: Serialize>(route: &str, id: Option<u64>, data: &T) -> Self {
        Self::Response {
            route: route.to_string(),
            id,
            code: 0,
            error: String::new(),
            data: to_value(data),
        }
    }

    pub fn err(route: &str, id: Option<u64>, code: ErrorCode) -> Self {
        Self::Response {
            route: route.to_string(),
            id,
            code: code.code(),
            error: code.message().to_string(),
            data: Value::Null,
        }
    }

    pub fn result(route: &str, id: Option<u64>, res: GameResult<Value>) -> Self {
        match res {
            Ok(v) => Self::ok(route, id, &v),
            Err(e) => Self::err(route, id, e),
        }
    }

    pub fn route(&self) -> &str {
        match self {
            Self::Response { route, .. } | Self::Push { route, .. } => route,
        }
    }

    pub fn is_push(&self, name: &str) -> bool {
        matches!(self, Self::Push { route, .. } if route == name)
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Response { code, .. } => *code,
            Self::Push { .. } => 0,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Self::Response { data, .. } | Self::Push { data, .. } => data,
        }
    }
}

// Serializeの実装がpanicしない型のみを扱うのでNullにはならない
fn to_value<T: Serialize>(data: &T) -> Value {
    serde_json::to_value(data).unwrap_or(Value::Null)
}

pub fn to_json<T: Serialize>(data: &T) -> Value {
    to_value(data)
}

// リクエストのdata. 省略は空のオブジェクトとして扱う
pub fn parse_data<T: DeserializeOwned>(data: Value) -> GameResult<T> {
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|_| ErrorCode::WrongType)
}

// [Request]
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub uid: Uid,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeskRequest {
    #[serde(default)]
    pub opts: DeskOptions,
    #[serde(default)]
    pub club_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeskIdRequest {
    pub desk_id: DeskNo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientInitRequest {
    pub is_reenter: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectQueRequest {
    pub que: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DissolveStatusRequest {
    pub result: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExitRequest {
    pub is_destroy: bool,
}

// [Response / Push]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeskStatus {
    Create,       // 卓作成 (プレイヤー待ち)
    DuanPai,      // 配牌
    QiPai,        // 欠門選択
    Playing,      // 対局中
    RoundOver,    // 局終了
    Interruption, // 解散による中断
    Destroy,      // 終了
    Cleaned,      // 後始末完了
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub uid: Uid,
    pub name: String,
    pub seat: Seat,
    pub is_ready: bool,
    pub is_online: bool,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub desk_no: DeskNo,
    pub creator: Uid,
    pub opts: DeskOptions,
    pub status: DeskStatus,
    pub round: usize,
    pub dealer: Seat,
    pub players: Vec<PlayerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResponse {
    pub table_info: TableInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub uid: Uid,
    pub name: String,
    pub coin: i64,
    pub desk_no: Option<DeskNo>, // 再接続可能な卓
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandCount {
    pub uid: Uid,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuanPaiPush {
    pub round: usize,
    pub dice: [usize; 2],
    pub dealer: Uid,
    pub tiles: Vec<Tile>, // 自分の手牌のみ
    pub counts: Vec<HandCount>,
    pub wall_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoPaiPush {
    pub uid: Uid,
    pub tile_id: TileId,
    pub wall_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDoPush {
    pub op_type: OpType,
    pub uid: Uid,
    pub from: Option<Uid>,
    pub tile_ids: Vec<TileId>,
    pub gang_type: Option<GangType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDelta {
    pub uid: Uid,
    pub delta: Score,
    pub total: Score,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreChangePush {
    pub uid: Uid, // 得点を得たプレイヤー
    pub fan: usize,
    pub changes: Vec<ScoreDelta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GangScoreChangePush {
    pub uid: Uid,
    pub gang_type: GangType,
    pub changes: Vec<ScoreDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOverPlayer {
    pub uid: Uid,
    pub seat: Seat,
    pub on_hand: Vec<Tile>,
    pub pong_kong: Vec<PongKong>,
    pub win_tile: TileId,
    pub fan: usize,
    pub desc: Vec<String>,
    pub round_score: Score,
    pub total_score: Score,
    pub is_win: bool,
    pub is_zimo: bool,
    pub que: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOverStats {
    pub round: usize,
    pub dealer: Uid,
    pub is_draw: bool,
    pub winners: Vec<Uid>,
    pub players: Vec<RoundOverPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndPlayer {
    pub uid: Uid,
    pub name: String,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEndPush {
    pub desk_no: DeskNo,
    pub is_normal_finished: bool,
    pub reason: String,
    pub rounds: usize,
    pub players: Vec<GameEndPlayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDiscard {
    pub uid: Uid,
    pub tile_id: TileId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSeat {
    pub uid: Uid,
    pub seat: Seat,
    pub on_hand: Vec<Tile>, // 要求したプレイヤーのみ
    pub hand_count: usize,
    pub pong_kong: Vec<PongKong>,
    pub discards: Vec<Tile>,
    pub que: usize, // 欠門選択中は他家には0
    pub is_online: bool,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDesk {
    pub table_info: TableInfo,
    pub dice: [usize; 2],
    pub turn: Uid,
    pub last_discard: Option<LastDiscard>,
    pub wall_count: usize,
    pub seats: Vec<SyncSeat>,
    pub hint: Option<Hint>,
    pub dissolve: Option<DissolveStatusPush>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStatusPush {
    pub uid: Uid,
    pub is_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinChangePush {
    pub uid: Uid,
    pub coin: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastPush {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectQuePush {
    pub uid: Uid,
    pub que: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DissolvePush {
    pub proposer: Uid,
    pub remaining: u64, // 秒
    pub voters: Vec<Uid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissolveVote {
    pub uid: Uid,
    pub agree: Option<bool>, // Noneは未投票(または投票権なし)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DissolveStatusPush {
    pub proposer: Uid,
    pub remaining: u64,
    pub votes: Vec<DissolveVote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DissolveResultPush {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerExitPush {
    pub uid: Uid,
    pub is_destroy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickPush {
    pub reason: String,
}

#[test]
fn test_frame_json() {
    let f = ServerFrame::err(route::JOIN, Some(3), ErrorCode::DeskNotFound);
    let v: Value = serde_json::to_value(&f).unwrap();
    assert_eq!(v["type"], "Response");
    assert_eq!(v["code"], 3005);
    assert_eq!(v["id"], 3);

    let f = ServerFrame::push(push::BROADCAST, &BroadcastPush { message: "hi".into() });
    assert!(f.is_push(push::BROADCAST));
    assert_eq!(f.data()["message"], "hi");

    let c: ClientFrame = serde_json::from_str(r#"{"route":"Desk.Ready"}"#).unwrap();
    assert_eq!(c.route, route::READY);
    assert_eq!(c.id, None);
}
