use serde::{Deserialize, Serialize};

/// 规则参数。随对局状态一起保存，可由 `StartGame` 覆盖。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesConfig {
    /// 每副牌抽取的不同卡牌种类数。
    pub deck_size: usize,
    pub min_ship_defense: usize,
    pub min_planet_cards: usize,
    /// 开启后，每张发展牌的种族在牌库中至少要有两张非发展牌。
    pub tribal_decks: bool,
    pub max_deck_attempts: u32,
    pub offense_choices: usize,
    pub defense_budget: usize,
    pub ship_hits_to_destroy: u8,
    /// 调用方自动推进循环的上限。
    pub auto_continue_limit: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            deck_size: 5,
            min_ship_defense: 2,
            min_planet_cards: 2,
            tribal_decks: false,
            max_deck_attempts: 10_000,
            offense_choices: 2,
            defense_budget: 2,
            ship_hits_to_destroy: 2,
            auto_continue_limit: 400,
        }
    }
}
