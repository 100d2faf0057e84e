use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeldType {
    Peng,
    Gang(GangType),
}

// 公開した刻子,槓子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongKong {
    pub meld_type: MeldType,
    pub index: Index,
    pub tiles: Vec<Tile>,
    pub from: Uid, // 鳴いた相手 (暗槓は自分)
}

impl PongKong {
    #[inline]
    pub fn is_gang(&self) -> bool {
        matches!(self.meld_type, MeldType::Gang(_))
    }
}

impl fmt::Display for PongKong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.meld_type {
            MeldType::Peng => "peng",
            MeldType::Gang(GangType::An) => "angang",
            MeldType::Gang(GangType::Ming) => "minggang",
            MeldType::Gang(GangType::Ba) => "bagang",
        };
        write!(f, "{}({}x{})", name, index_symbol(self.index), self.tiles.len())
    }
}

pub fn indexes_of_melds(melds: &[PongKong]) -> Vec<Index> {
    melds
        .iter()
        .flat_map(|m| m.tiles.iter().map(|t| t.index))
        .collect()
}
