use std::collections::{BTreeMap, HashSet};
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use super::card::{Card, CardId, CardUid, Catalog, Deck, PlayPhase, PlayedCard};
use super::config::RulesConfig;
use super::rules::RuleError;

/// 对战双方。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player,
    Ai,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Player, Side::Ai];

    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Ai,
            Side::Ai => Side::Player,
        }
    }
}

/// 三个战区。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ZoneKey {
    PlayerShip,
    AiShip,
    Planet,
}

impl ZoneKey {
    /// 特效收集与战斗结算都按这个固定顺序遍历战区。
    pub const ALL: [ZoneKey; 3] = [ZoneKey::PlayerShip, ZoneKey::AiShip, ZoneKey::Planet];

    pub fn ship_of(side: Side) -> ZoneKey {
        match side {
            Side::Player => ZoneKey::PlayerShip,
            Side::Ai => ZoneKey::AiShip,
        }
    }

    /// 某一方在给定阶段打出的太空牌所进入的飞船战区：进攻打对方的飞船，防守守自己的飞船。
    pub fn ship_target(side: Side, phase: PlayPhase) -> ZoneKey {
        match phase {
            PlayPhase::Offense => ZoneKey::ship_of(side.opponent()),
            PlayPhase::Defense => ZoneKey::ship_of(side),
        }
    }

    /// 胆小的卡牌被逼退时的去处：飞船之间互换，离开地面时转去对方飞船。
    pub fn flee_target(self, side: Side) -> ZoneKey {
        match self {
            ZoneKey::PlayerShip => ZoneKey::AiShip,
            ZoneKey::AiShip => ZoneKey::PlayerShip,
            ZoneKey::Planet => ZoneKey::ship_of(side.opponent()),
        }
    }
}

/// 一个战区内双方的存活卡牌与墓地。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCards {
    #[serde(default)]
    pub player_cards: Vec<PlayedCard>,
    #[serde(default)]
    pub ai_cards: Vec<PlayedCard>,
    #[serde(default)]
    pub player_graveyard: Vec<PlayedCard>,
    #[serde(default)]
    pub ai_graveyard: Vec<PlayedCard>,
}

impl ZoneCards {
    pub fn cards(&self, side: Side) -> &Vec<PlayedCard> {
        match side {
            Side::Player => &self.player_cards,
            Side::Ai => &self.ai_cards,
        }
    }

    pub fn cards_mut(&mut self, side: Side) -> &mut Vec<PlayedCard> {
        match side {
            Side::Player => &mut self.player_cards,
            Side::Ai => &mut self.ai_cards,
        }
    }

    pub fn graveyard(&self, side: Side) -> &Vec<PlayedCard> {
        match side {
            Side::Player => &self.player_graveyard,
            Side::Ai => &self.ai_graveyard,
        }
    }

    pub fn graveyard_mut(&mut self, side: Side) -> &mut Vec<PlayedCard> {
        match side {
            Side::Player => &mut self.player_graveyard,
            Side::Ai => &mut self.ai_graveyard,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    #[serde(flatten)]
    pub cards: ZoneCards,
    #[serde(default)]
    pub ship_damage: u8,
}

impl Deref for Ship {
    type Target = ZoneCards;

    fn deref(&self) -> &ZoneCards {
        &self.cards
    }
}

impl DerefMut for Ship {
    fn deref_mut(&mut self) -> &mut ZoneCards {
        &mut self.cards
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Planet {
    #[serde(flatten)]
    pub cards: ZoneCards,
    #[serde(default)]
    pub player_entrenched: bool,
    #[serde(default)]
    pub ai_entrenched: bool,
}

impl Planet {
    pub fn entrenched(&self, side: Side) -> bool {
        match side {
            Side::Player => self.player_entrenched,
            Side::Ai => self.ai_entrenched,
        }
    }

    /// 地面上已经没有卡牌的一方不能保持驻守。
    pub fn clear_lost_entrenchment(&mut self) {
        if self.cards.player_cards.is_empty() {
            self.player_entrenched = false;
        }
        if self.cards.ai_cards.is_empty() {
            self.ai_entrenched = false;
        }
    }
}

impl Deref for Planet {
    type Target = ZoneCards;

    fn deref(&self) -> &ZoneCards {
        &self.cards
    }
}

impl DerefMut for Planet {
    fn deref_mut(&mut self) -> &mut ZoneCards {
        &mut self.cards
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ships {
    #[serde(default)]
    pub player_ship: Ship,
    #[serde(default)]
    pub ai_ship: Ship,
}

/// 全部战区。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Zones {
    #[serde(default)]
    pub ships: Ships,
    #[serde(default)]
    pub planet: Planet,
}

impl Zones {
    pub fn zone(&self, key: ZoneKey) -> &ZoneCards {
        match key {
            ZoneKey::PlayerShip => &self.ships.player_ship.cards,
            ZoneKey::AiShip => &self.ships.ai_ship.cards,
            ZoneKey::Planet => &self.planet.cards,
        }
    }

    pub fn zone_mut(&mut self, key: ZoneKey) -> &mut ZoneCards {
        match key {
            ZoneKey::PlayerShip => &mut self.ships.player_ship.cards,
            ZoneKey::AiShip => &mut self.ships.ai_ship.cards,
            ZoneKey::Planet => &mut self.planet.cards,
        }
    }

    pub fn ship(&self, side: Side) -> &Ship {
        match side {
            Side::Player => &self.ships.player_ship,
            Side::Ai => &self.ships.ai_ship,
        }
    }

    /// 某一方在所有战区的存活卡牌，按固定战区顺序。
    pub fn live_cards(&self, side: Side) -> impl Iterator<Item = &PlayedCard> {
        ZoneKey::ALL
            .into_iter()
            .flat_map(move |key| self.zone(key).cards(side).iter())
    }

    pub fn graveyard_cards(&self, side: Side) -> impl Iterator<Item = &PlayedCard> {
        ZoneKey::ALL
            .into_iter()
            .flat_map(move |key| self.zone(key).graveyard(side).iter())
    }
}

/// 一次进攻或防守选择：双方的候选卡牌。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardChoices {
    #[serde(default)]
    pub player_cards: BTreeMap<CardId, Card>,
    #[serde(default)]
    pub ai_cards: BTreeMap<CardId, Card>,
}

impl CardChoices {
    pub fn for_player(player_cards: BTreeMap<CardId, Card>) -> Self {
        Self {
            player_cards,
            ai_cards: BTreeMap::new(),
        }
    }

    pub fn cards(&self, side: Side) -> &BTreeMap<CardId, Card> {
        match side {
            Side::Player => &self.player_cards,
            Side::Ai => &self.ai_cards,
        }
    }

    pub fn cards_mut(&mut self, side: Side) -> &mut BTreeMap<CardId, Card> {
        match side {
            Side::Player => &mut self.player_cards,
            Side::Ai => &mut self.ai_cards,
        }
    }

    pub fn contains(&self, side: Side, card_id: &str) -> bool {
        self.cards(side).contains_key(card_id)
    }
}

/// 对局结束结果，恰好一种。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameEndResult {
    PlayerShipDefeat,
    PlayerShipVictory,
    PlayerPlanetVictory,
    PlayerPlanetDefeat,
    PlayerTiebreakerVictory,
    PlayerTiebreakerDefeat,
    DrawShipsDestroyed,
    DrawStalemate,
}

impl GameEndResult {
    pub fn flags(self) -> GameEndFlags {
        let mut flags = GameEndFlags::default();
        match self {
            GameEndResult::PlayerShipDefeat => flags.player_ship_defeat = true,
            GameEndResult::PlayerShipVictory => flags.player_ship_victory = true,
            GameEndResult::PlayerPlanetVictory => flags.player_planet_victory = true,
            GameEndResult::PlayerPlanetDefeat => flags.player_planet_defeat = true,
            GameEndResult::PlayerTiebreakerVictory => flags.player_tiebreaker_victory = true,
            GameEndResult::PlayerTiebreakerDefeat => flags.player_tiebreaker_defeat = true,
            GameEndResult::DrawShipsDestroyed => flags.draw_ships_destroyed = true,
            GameEndResult::DrawStalemate => flags.draw_stalemate = true,
        }
        flags
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// 供语音层等外部协作者读取的结果记录，只会有一个字段为 true。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameEndFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub player_ship_defeat: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub player_ship_victory: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub player_planet_victory: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub player_planet_defeat: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub player_tiebreaker_victory: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub player_tiebreaker_defeat: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub draw_ships_destroyed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub draw_stalemate: bool,
}

/// 回合状态机。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TurnPhase {
    NotStarted,
    AwaitingOffense {
        offense: CardChoices,
    },
    AwaitingDefense {
        offense: CardChoices,
        defense: CardChoices,
    },
    /// 非法选择之后停在这里，由调用方决定如何恢复。
    Halted,
    Finished {
        result: GameEndResult,
    },
}

impl Default for TurnPhase {
    fn default() -> Self {
        TurnPhase::NotStarted
    }
}

/// 上一次防守结算前的战区与选择快照。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(flatten)]
    pub zones: Zones,
    #[serde(default)]
    pub offense_card_choices: Option<CardChoices>,
    #[serde(default)]
    pub defense_card_choices: Option<CardChoices>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum IntegrityError {
    DuplicateCardUid { card_uid: CardUid },
    ShipDamageOutOfRange { side: Side, value: u8 },
    EntrenchedWithoutPresence { side: Side },
}

/// 游戏整体状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(default)]
    pub phase: TurnPhase,
    #[serde(flatten)]
    pub zones: Zones,
    #[serde(default)]
    pub prev_state: Snapshot,
    #[serde(default)]
    pub player_deck: Deck,
    #[serde(default)]
    pub ai_deck: Deck,
    #[serde(default)]
    pub all_cards: Catalog,
    #[serde(default)]
    pub current_turn: u32,
    #[serde(default)]
    pub next_card_uid: CardUid,
    #[serde(default)]
    pub config: RulesConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleError>,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_config(RulesConfig::default())
    }

    pub fn with_config(config: RulesConfig) -> Self {
        Self {
            phase: TurnPhase::NotStarted,
            zones: Zones::default(),
            prev_state: Snapshot::default(),
            player_deck: Deck::new(),
            ai_deck: Deck::new(),
            all_cards: Catalog::default(),
            current_turn: 0,
            next_card_uid: 1,
            config,
            error: None,
        }
    }

    pub fn deck(&self, side: Side) -> &Deck {
        match side {
            Side::Player => &self.player_deck,
            Side::Ai => &self.ai_deck,
        }
    }

    pub fn deck_mut(&mut self, side: Side) -> &mut Deck {
        match side {
            Side::Player => &mut self.player_deck,
            Side::Ai => &mut self.ai_deck,
        }
    }

    pub fn offense_card_choices(&self) -> Option<&CardChoices> {
        match &self.phase {
            TurnPhase::AwaitingOffense { offense } | TurnPhase::AwaitingDefense { offense, .. } => {
                Some(offense)
            }
            _ => None,
        }
    }

    pub fn defense_card_choices(&self) -> Option<&CardChoices> {
        match &self.phase {
            TurnPhase::AwaitingDefense { defense, .. } => Some(defense),
            _ => None,
        }
    }

    /// 当前正在结算的选择：防守优先于进攻。
    pub fn current_choices(&self) -> Option<&CardChoices> {
        self.defense_card_choices()
            .or_else(|| self.offense_card_choices())
    }

    pub fn current_choices_mut(&mut self) -> Option<&mut CardChoices> {
        match &mut self.phase {
            TurnPhase::AwaitingDefense { defense, .. } => Some(defense),
            TurnPhase::AwaitingOffense { offense } => Some(offense),
            _ => None,
        }
    }

    pub fn current_play_phase(&self) -> Option<PlayPhase> {
        match self.phase {
            TurnPhase::AwaitingOffense { .. } => Some(PlayPhase::Offense),
            TurnPhase::AwaitingDefense { .. } => Some(PlayPhase::Defense),
            _ => None,
        }
    }

    pub fn game_end_results(&self) -> Option<GameEndResult> {
        match self.phase {
            TurnPhase::Finished { result } => Some(result),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, TurnPhase::Finished { .. })
    }

    /// 玩家当前是否有可选的卡牌。
    pub fn has_player_choice(&self) -> bool {
        self.current_choices()
            .map(|choices| !choices.player_cards.is_empty())
            .unwrap_or(false)
    }

    pub fn finish(&mut self, result: GameEndResult) {
        log::info!("game over on turn {}: {:?}", self.current_turn, result);
        self.phase = TurnPhase::Finished { result };
    }

    pub fn halt(&mut self, error: RuleError) {
        log::warn!("engine halted: {error}");
        self.phase = TurnPhase::Halted;
        self.error = Some(error);
    }

    /// 把一张卡牌放入战区前生成场上实例。
    pub fn instantiate(&mut self, card_id: &str, card: Card, phase: PlayPhase) -> PlayedCard {
        let uid = self.next_card_uid;
        self.next_card_uid += 1;
        PlayedCard::new(card_id, uid, card, self.current_turn, phase)
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut seen = HashSet::new();
        for key in ZoneKey::ALL {
            let zone = self.zones.zone(key);
            for side in Side::BOTH {
                for card in zone.cards(side).iter().chain(zone.graveyard(side).iter()) {
                    if !seen.insert(card.card_uid) {
                        return Err(IntegrityError::DuplicateCardUid {
                            card_uid: card.card_uid,
                        });
                    }
                }
            }
        }

        let limit = self.config.ship_hits_to_destroy;
        for side in Side::BOTH {
            let damage = self.zones.ship(side).ship_damage;
            if damage > limit {
                return Err(IntegrityError::ShipDamageOutOfRange { side, value: damage });
            }
            if self.zones.planet.entrenched(side) && self.zones.planet.cards(side).is_empty() {
                return Err(IntegrityError::EntrenchedWithoutPresence { side });
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn played(uid: CardUid, strength: i32) -> PlayedCard {
        PlayedCard::new("grunt", uid, Card::new("Grunt", strength), 1, PlayPhase::Offense)
    }

    #[test]
    fn new_state_awaits_nothing() {
        let state = GameState::new();
        assert!(state.offense_card_choices().is_none());
        assert!(state.defense_card_choices().is_none());
        assert!(state.game_end_results().is_none());
        assert!(!state.has_player_choice());
    }

    #[test]
    fn finished_state_exposes_no_choices() {
        let mut state = GameState::new();
        state.phase = TurnPhase::AwaitingDefense {
            offense: CardChoices::default(),
            defense: CardChoices::default(),
        };
        state.finish(GameEndResult::DrawStalemate);

        assert!(state.offense_card_choices().is_none());
        assert!(state.defense_card_choices().is_none());
        assert!(state.game_end_results().map(|r| r.flags().draw_stalemate).unwrap_or(false));
    }

    #[test]
    fn end_flags_serialize_a_single_field() {
        let json = serde_json::to_string(&GameEndResult::PlayerPlanetVictory.flags())
            .expect("flags should serialize");
        assert_eq!(json, r#"{"playerPlanetVictory":true}"#);
    }

    #[test]
    fn integrity_detects_duplicate_uids() {
        let mut state = GameState::new();
        state.zones.planet.player_cards.push(played(7, 2));
        state.zones.ships.ai_ship.ai_graveyard.push(played(7, 0));

        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::DuplicateCardUid { card_uid: 7 })
        );
    }

    #[test]
    fn integrity_rejects_entrenchment_over_empty_ground() {
        let mut state = GameState::new();
        state.zones.planet.ai_entrenched = true;
        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::EntrenchedWithoutPresence { side: Side::Ai })
        );
    }

    #[test]
    fn instantiate_never_reuses_uids() {
        let mut state = GameState::new();
        let first = state.instantiate("grunt", Card::new("Grunt", 1), PlayPhase::Offense);
        let second = state.instantiate("grunt", Card::new("Grunt", 1), PlayPhase::Defense);
        assert_ne!(first.card_uid, second.card_uid);
        assert_eq!(second.phase_played, PlayPhase::Defense);
    }
}
