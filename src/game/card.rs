use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::effects::SpecialTrigger;

/// 卡牌目录中的卡牌标识（如 `scrapHoppers`）。
pub type CardId = String;
/// 已打出卡牌的实例标识，同一局内永不重复。
pub type CardUid = u64;

static BUILTIN_CARDS: &str = include_str!("../../data/cards.json");

static BUILTIN_CATALOG: Lazy<Catalog> = Lazy::new(|| match Catalog::from_json(BUILTIN_CARDS) {
    Ok(catalog) => catalog,
    Err(err) => {
        log::error!("embedded card catalog is invalid: {err}");
        Catalog::default()
    }
});

/// AI 选牌时的优先级提示。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub const TIERS: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// 卡牌是在进攻还是防守阶段打出的。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayPhase {
    Offense,
    Defense,
}

fn default_count() -> u32 {
    1
}

/// 卡牌模板。目录中的卡牌不可变，牌库与选项中的副本可以被特效修改。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strength: i32,
    #[serde(default)]
    pub damage_strength: i32,
    #[serde(default)]
    pub shield_strength: i32,
    #[serde(default)]
    pub armor_strength: i32,
    #[serde(default)]
    pub offense: bool,
    #[serde(default)]
    pub defense: bool,
    #[serde(default)]
    pub development: bool,
    #[serde(default)]
    pub space: bool,
    #[serde(default)]
    pub planet: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tribe: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub recharge: u32,
    #[serde(default)]
    pub recharging: u32,
    #[serde(default)]
    pub tank: bool,
    #[serde(default)]
    pub shy: bool,
    #[serde(default)]
    pub generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<SpecialTrigger>,
    #[serde(default)]
    pub ai_offense_priority: Priority,
    #[serde(default)]
    pub ai_defense_priority: Priority,
}

impl Card {
    pub fn new(name: impl Into<String>, strength: i32) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            strength,
            damage_strength: 0,
            shield_strength: 0,
            armor_strength: 0,
            offense: false,
            defense: false,
            development: false,
            space: false,
            planet: false,
            tribe: None,
            count: 1,
            recharge: 0,
            recharging: 0,
            tank: false,
            shy: false,
            generated: false,
            special: None,
            ai_offense_priority: Priority::Normal,
            ai_defense_priority: Priority::Normal,
        }
    }

    pub fn is_recharging(&self) -> bool {
        self.recharging > 0
    }

    pub fn in_tribe(&self, tribe: &str) -> bool {
        self.tribe.as_deref() == Some(tribe)
    }
}

/// 场上的卡牌实例。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayedCard {
    #[serde(flatten)]
    pub card: Card,
    pub card_id: CardId,
    pub card_uid: CardUid,
    pub turn_played: u32,
    pub phase_played: PlayPhase,
    #[serde(default)]
    pub revived: bool,
    #[serde(default)]
    pub hovering: bool,
}

impl PlayedCard {
    pub fn new(
        card_id: impl Into<CardId>,
        card_uid: CardUid,
        card: Card,
        turn_played: u32,
        phase_played: PlayPhase,
    ) -> Self {
        Self {
            card,
            card_id: card_id.into(),
            card_uid,
            turn_played,
            phase_played,
            revived: false,
            hovering: false,
        }
    }

    pub fn is(&self, card_id: &str) -> bool {
        self.card_id == card_id
    }

    /// 进入墓地时力量与护甲清零。
    pub fn destroyed(mut self) -> Self {
        self.card.strength = 0;
        self.card.armor_strength = 0;
        self
    }
}

/// 牌库：卡牌标识到剩余副本（含 `count` 与充能计数）的映射。
pub type Deck = BTreeMap<CardId, Card>;

/// 从牌库中移除一张副本；最后一张副本被取走时删除整个条目。
pub fn remove_copy(deck: &mut Deck, card_id: &str) -> Option<Card> {
    let card = deck.get_mut(card_id)?;
    if card.count <= 1 {
        return deck.remove(card_id);
    }
    card.count -= 1;
    let mut taken = card.clone();
    taken.count = 1;
    Some(taken)
}

/// 向牌库加入 `copies` 份模板；已存在的条目保留原有模板并累加数量。
pub fn add_copies(deck: &mut Deck, card_id: &str, template: &Card, copies: u32) {
    let added = copies * template.count.max(1);
    match deck.get_mut(card_id) {
        Some(existing) => existing.count = existing.count.max(1) + added,
        None => {
            let mut card = template.clone();
            card.count = added;
            deck.insert(card_id.to_string(), card);
        }
    }
}

/// 每次结算出牌时所有牌库条目的充能计数减一（最低为零）。
pub fn tick_recharge(deck: &mut Deck) {
    for card in deck.values_mut() {
        card.recharging = card.recharging.saturating_sub(1);
    }
}

/// 卡牌目录，由外部数据加载器提供。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Catalog {
    cards: BTreeMap<CardId, Card>,
}

impl Catalog {
    pub fn new(cards: BTreeMap<CardId, Card>) -> Self {
        Self { cards }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 内置的示例目录，首次访问时解析。
    pub fn builtin() -> &'static Catalog {
        &BUILTIN_CATALOG
    }

    pub fn get(&self, card_id: &str) -> Option<&Card> {
        self.cards.get(card_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CardId, &Card)> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl FromIterator<(CardId, Card)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (CardId, Card)>>(iter: I) -> Self {
        Self {
            cards: iter.into_iter().collect(),
        }
    }
}
