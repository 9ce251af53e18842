//! 卡牌特效引擎：按阶段收集场上/选项/墓地中的特效，并以固定顺序依次折叠到状态上。

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::card::{CardId, CardUid, PlayedCard};
use super::specials;
use super::state::{GameState, Side, ZoneKey, Zones};

static REGISTRY: Lazy<SpecialRegistry> = Lazy::new(specials::builtin_registry);

/// 回合中特效可以挂接的时机。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialPhase {
    PrePlayCards,
    PreCombat,
    PostCombat,
    Strength,
    CheckForVictory,
}

impl SpecialPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialPhase::PrePlayCards => "preplaycards",
            SpecialPhase::PreCombat => "precombat",
            SpecialPhase::PostCombat => "postcombat",
            SpecialPhase::Strength => "strength",
            SpecialPhase::CheckForVictory => "checkforvictory",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "preplaycards" => Some(SpecialPhase::PrePlayCards),
            "precombat" => Some(SpecialPhase::PreCombat),
            "postcombat" => Some(SpecialPhase::PostCombat),
            "strength" => Some(SpecialPhase::Strength),
            "checkforvictory" => Some(SpecialPhase::CheckForVictory),
            _ => None,
        }
    }
}

/// 卡牌声明的触发条件，例如 `postcombat` 或 `graveyard-precombat`。
/// 墓地触发在卡牌留在墓地期间的每个同名阶段都会生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpecialTrigger {
    pub phase: SpecialPhase,
    pub graveyard: bool,
}

impl SpecialTrigger {
    pub fn live(phase: SpecialPhase) -> Self {
        Self {
            phase,
            graveyard: false,
        }
    }

    pub fn graveyard(phase: SpecialPhase) -> Self {
        Self {
            phase,
            graveyard: true,
        }
    }
}

impl fmt::Display for SpecialTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.graveyard {
            write!(f, "graveyard-{}", self.phase.as_str())
        } else {
            f.write_str(self.phase.as_str())
        }
    }
}

impl TryFrom<String> for SpecialTrigger {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (graveyard, phase) = match value.strip_prefix("graveyard-") {
            Some(rest) => (true, rest),
            None => (false, value.as_str()),
        };
        SpecialPhase::parse(phase)
            .map(|phase| Self { phase, graveyard })
            .ok_or_else(|| format!("unknown special trigger `{value}`"))
    }
}

impl From<SpecialTrigger> for String {
    fn from(trigger: SpecialTrigger) -> Self {
        trigger.to_string()
    }
}

/// 力量阶段特效给出的按实例替换值，只在计算战斗力量时读取。
pub type StrengthOverrides = BTreeMap<CardUid, PlayedCard>;

/// 胜负判定阶段特效给出的条件覆盖，多个特效之间取或。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictoryOverrides {
    pub player_ship_damage: bool,
    pub ai_ship_damage: bool,
    pub player_entrenching: bool,
    pub ai_entrenching: bool,
}

impl VictoryOverrides {
    pub fn ship_damage(&self, side: Side) -> bool {
        match side {
            Side::Player => self.player_ship_damage,
            Side::Ai => self.ai_ship_damage,
        }
    }

    pub fn entrenching(&self, side: Side) -> bool {
        match side {
            Side::Player => self.player_entrenching,
            Side::Ai => self.ai_entrenching,
        }
    }

    fn merge(self, other: VictoryOverrides) -> Self {
        Self {
            player_ship_damage: self.player_ship_damage || other.player_ship_damage,
            ai_ship_damage: self.ai_ship_damage || other.ai_ship_damage,
            player_entrenching: self.player_entrenching || other.player_entrenching,
            ai_entrenching: self.ai_entrenching || other.ai_entrenching,
        }
    }
}

/// 特效处理函数的几种形态。
#[derive(Clone, Copy)]
pub enum Special {
    /// 只读写当前状态。
    Current(fn(GameState) -> GameState),
    /// 额外读取战斗前的战区快照，用来比较谁刚刚阵亡。
    WithSnapshot(fn(GameState, &Zones) -> GameState),
    Strength(fn(&GameState) -> StrengthOverrides),
    Victory(fn(&GameState) -> VictoryOverrides),
}

impl fmt::Debug for Special {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Special::Current(_) => "Current",
            Special::WithSnapshot(_) => "WithSnapshot",
            Special::Strength(_) => "Strength",
            Special::Victory(_) => "Victory",
        };
        f.write_str(kind)
    }
}

/// 卡牌标识到特效实现的注册表。
#[derive(Debug, Default, Clone)]
pub struct SpecialRegistry {
    handlers: HashMap<CardId, Special>,
}

impl SpecialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, card_id: impl Into<CardId>, special: Special) -> Self {
        self.handlers.insert(card_id.into(), special);
        self
    }

    pub fn get(&self, card_id: &str) -> Option<Special> {
        self.handlers.get(card_id).copied()
    }

    pub fn global() -> &'static SpecialRegistry {
        &REGISTRY
    }
}

fn push_unique(ids: &mut Vec<CardId>, card_id: &str) {
    if !ids.iter().any(|existing| existing == card_id) {
        ids.push(card_id.to_string());
    }
}

fn collect_zone_ids(ids: &mut Vec<CardId>, zones: &Zones, trigger: SpecialTrigger) {
    for key in ZoneKey::ALL {
        let zone = zones.zone(key);
        for card in zone.player_cards.iter().chain(zone.ai_cards.iter()) {
            if card.card.special == Some(trigger) {
                push_unique(ids, &card.card_id);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EffectEngine<'a> {
    registry: &'a SpecialRegistry,
}

impl Default for EffectEngine<'static> {
    fn default() -> Self {
        Self {
            registry: SpecialRegistry::global(),
        }
    }
}

impl<'a> EffectEngine<'a> {
    pub fn new(registry: &'a SpecialRegistry) -> Self {
        Self { registry }
    }

    /// 按确定顺序收集本阶段要触发的卡牌标识。
    ///
    /// 出牌前与战斗前读取当前选择（玩家在前），战斗后读取当前战区再读取战斗前快照，
    /// 力量与胜负阶段读取当前战区；最后追加墓地触发。
    pub fn collect_special_ids(
        &self,
        phase: SpecialPhase,
        state: &GameState,
        snapshot: Option<&Zones>,
    ) -> Vec<CardId> {
        let trigger = SpecialTrigger::live(phase);
        let mut ids = Vec::new();

        match phase {
            SpecialPhase::PrePlayCards | SpecialPhase::PreCombat => {
                if let Some(choices) = state.current_choices() {
                    for side in Side::BOTH {
                        for (card_id, card) in choices.cards(side) {
                            let develops = card.development && phase == SpecialPhase::PrePlayCards;
                            if card.special == Some(trigger) || develops {
                                push_unique(&mut ids, card_id);
                            }
                        }
                    }
                }
            }
            SpecialPhase::PostCombat => {
                collect_zone_ids(&mut ids, &state.zones, trigger);
                if let Some(zones) = snapshot {
                    collect_zone_ids(&mut ids, zones, trigger);
                }
            }
            SpecialPhase::Strength | SpecialPhase::CheckForVictory => {
                collect_zone_ids(&mut ids, &state.zones, trigger);
            }
        }

        let graveyard_trigger = SpecialTrigger::graveyard(phase);
        for key in ZoneKey::ALL {
            let zone = state.zones.zone(key);
            for card in zone.player_graveyard.iter().chain(zone.ai_graveyard.iter()) {
                if card.card.special == Some(graveyard_trigger) {
                    push_unique(&mut ids, &card.card_id);
                }
            }
        }

        ids
    }

    /// 依次执行本阶段的状态特效。未注册的标识直接跳过。
    pub fn play_specials(
        &self,
        phase: SpecialPhase,
        state: GameState,
        snapshot: Option<&Zones>,
    ) -> GameState {
        let ids = self.collect_special_ids(phase, &state, snapshot);
        ids.iter().fold(state, |state, card_id| {
            match self.registry.get(card_id) {
                Some(Special::Current(apply)) => {
                    log::debug!("special {card_id} fired at {}", phase.as_str());
                    apply(state)
                }
                Some(Special::WithSnapshot(apply)) => match snapshot {
                    Some(zones) => {
                        log::debug!("special {card_id} fired at {}", phase.as_str());
                        apply(state, zones)
                    }
                    None => state,
                },
                _ => state,
            }
        })
    }

    pub fn strength_overrides(&self, state: &GameState) -> StrengthOverrides {
        self.collect_special_ids(SpecialPhase::Strength, state, None)
            .iter()
            .filter_map(|card_id| match self.registry.get(card_id) {
                Some(Special::Strength(compute)) => Some(compute(state)),
                _ => None,
            })
            .fold(StrengthOverrides::new(), |mut acc, overrides| {
                acc.extend(overrides);
                acc
            })
    }

    pub fn victory_overrides(&self, state: &GameState) -> VictoryOverrides {
        self.collect_special_ids(SpecialPhase::CheckForVictory, state, None)
            .iter()
            .filter_map(|card_id| match self.registry.get(card_id) {
                Some(Special::Victory(check)) => Some(check(state)),
                _ => None,
            })
            .fold(VictoryOverrides::default(), VictoryOverrides::merge)
    }
}
