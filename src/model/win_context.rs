use super::*;

// 和了時の状況 (番数計算の入力と結果の説明)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinContext {
    pub win_index: Index,        // 和了牌
    pub is_zimo: bool,           // 自摸
    pub is_last_tile: bool,      // 海底
    pub is_gang_shang_hua: bool, // 槓上花
    pub is_gang_shang_pao: bool, // 槓上炮
    pub is_qiang_gang_hu: bool,  // 搶槓
    pub desc: Vec<String>,       // 役の説明 (局終了時の表示用)
}

impl WinContext {
    pub fn new(win_index: Index, is_zimo: bool) -> Self {
        Self {
            win_index,
            is_zimo,
            ..Default::default()
        }
    }
}
