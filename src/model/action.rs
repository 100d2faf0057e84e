use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    Draw,    // ツモ (記録用. クライアントからは選択できない)
    Discard, // 打牌
    Peng,    // ポン
    Gang,    // 槓 (暗槓, 明槓, 巴槓)
    Hu,      // 和了
    Pass,    // 鳴き,ロンのスキップ
}

// 鳴きの優先度 (大きいほど優先)
impl OpType {
    pub fn priority(self) -> usize {
        match self {
            OpType::Hu => 3,
            OpType::Gang => 2,
            OpType::Peng => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GangType {
    An,   // 暗槓 (下雨)
    Ming, // 明槓 (刮風)
    Ba,   // 巴槓 (加槓)
}

// クライアントが選択した操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "optype")]
    pub op: OpType,
    #[serde(rename = "idx", default = "no_id")]
    pub tile_id: TileId,
}

fn no_id() -> TileId {
    NO_ID
}

impl Action {
    #[inline]
    pub fn new(op: OpType, tile_id: TileId) -> Self {
        Self { op, tile_id }
    }

    #[inline]
    pub fn discard(tile_id: TileId) -> Self {
        Self::new(OpType::Discard, tile_id)
    }

    #[inline]
    pub fn pass() -> Self {
        Self::new(OpType::Pass, NO_ID)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tile_id == NO_ID {
            write!(f, "{:?}", self.op)
        } else {
            write!(f, "{:?}({})", self.op, tile_from_id(self.tile_id))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GangChoice {
    pub tile_id: TileId,
    pub gang_type: GangType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TingInfo {
    pub discard: Index,   // 聴牌となる打牌
    pub wins: Vec<Index>, // 和了牌
}

// 可能な操作の通知 (onOpTypeHint)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub uid: Uid,
    pub ops: Vec<OpType>,
    pub tile_id: TileId,         // 鳴き: 対象の牌, ツモ番: ツモ牌 (配牌直後や鳴きの後はNO_ID)
    pub gangs: Vec<GangChoice>,  // ツモ番で可能な槓
    pub discards: Vec<TileId>,   // 打牌可能な牌 (欠門の制約を反映)
    pub tings: Vec<TingInfo>,    // 打牌後に聴牌となる組み合わせ
}

impl Hint {
    pub fn new(uid: Uid, tile_id: TileId) -> Self {
        Self {
            uid,
            ops: vec![],
            tile_id,
            gangs: vec![],
            discards: vec![],
            tings: vec![],
        }
    }

    #[inline]
    pub fn allows(&self, op: OpType) -> bool {
        self.ops.contains(&op)
    }
}

#[test]
fn test_action_json() {
    let act: Action = serde_json::from_str(r#"{"optype":"Discard","idx":12}"#).unwrap();
    assert_eq!(act, Action::discard(12));
    let act: Action = serde_json::from_str(r#"{"optype":"Pass"}"#).unwrap();
    assert_eq!(act, Action::pass());
    assert!(OpType::Hu.priority() > OpType::Gang.priority());
    assert!(OpType::Gang.priority() > OpType::Peng.priority());
}
