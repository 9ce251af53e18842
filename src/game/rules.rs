use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::card::{remove_copy, tick_recharge, Card, CardId, Catalog, Deck, PlayPhase, PlayedCard};
use super::combat::run_combat;
use super::config::RulesConfig;
use super::effects::{EffectEngine, SpecialPhase, SpecialRegistry};
use super::rng::sample_ids;
use super::state::{CardChoices, GameState, IntegrityError, Side, Snapshot, TurnPhase, ZoneKey};
use super::victory::check_for_victory;
use crate::ai::picker;

/// 引擎接受的动作。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    StartGame {
        #[serde(default)]
        include_card_ids: Vec<CardId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<Catalog>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<RulesConfig>,
    },
    PickOffenseCard {
        card_id: CardId,
    },
    PickDefenseCard {
        card_id: CardId,
    },
    ContinueWithoutSelection,
}

impl Action {
    pub fn start_game(include_card_ids: Vec<CardId>, catalog: Option<Catalog>) -> Self {
        Action::StartGame {
            include_card_ids,
            catalog,
            config: None,
        }
    }

    pub fn pick_offense_card(card_id: impl Into<CardId>) -> Self {
        Action::PickOffenseCard {
            card_id: card_id.into(),
        }
    }

    pub fn pick_defense_card(card_id: impl Into<CardId>) -> Self {
        Action::PickDefenseCard {
            card_id: card_id.into(),
        }
    }

    pub fn continue_without_selection() -> Self {
        Action::ContinueWithoutSelection
    }
}

/// 可恢复的规则错误，写入 `GameState::error` 并让状态停在 `Halted`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum RuleError {
    IllegalCardChoice { card_id: CardId },
    DeckBuildFailed { attempts: u32 },
    IntegrityViolation { error: IntegrityError },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::IllegalCardChoice { .. } => f.write_str("Illegal card choice"),
            RuleError::DeckBuildFailed { attempts } => {
                write!(f, "no valid deck after {attempts} attempts")
            }
            RuleError::IntegrityViolation { error } => write!(f, "state integrity violated: {error:?}"),
        }
    }
}

impl std::error::Error for RuleError {}

/// 调用方驱动循环的错误。引擎本身从不产生。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EngineError {
    LoopExceeded { limit: u32 },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::LoopExceeded { limit } => {
                write!(f, "engine made no progress after {limit} automatic steps")
            }
        }
    }
}

impl std::error::Error for EngineError {}

fn deck_is_valid(deck: &Deck, config: &RulesConfig) -> bool {
    let ship_defense = deck.values().filter(|card| card.space && card.defense).count();
    let planet = deck.values().filter(|card| card.planet).count();
    if ship_defense < config.min_ship_defense || planet < config.min_planet_cards {
        return false;
    }
    if !config.tribal_decks {
        return true;
    }
    deck.values()
        .filter(|card| card.development)
        .filter_map(|card| card.tribe.as_deref())
        .all(|tribe| {
            deck.values()
                .filter(|card| !card.development && card.in_tribe(tribe))
                .count()
                >= 2
        })
}

/// 从目录中反复抽样直到得到合法牌库，尝试次数由配置限定。
pub fn build_deck<R: Rng + ?Sized>(
    catalog: &Catalog,
    config: &RulesConfig,
    include: &[CardId],
    rng: &mut R,
) -> Result<Deck, RuleError> {
    let pool: Vec<&CardId> = catalog
        .iter()
        .filter(|(_, card)| !card.generated)
        .map(|(card_id, _)| card_id)
        .collect();

    for _ in 0..config.max_deck_attempts {
        let deck: Deck = sample_ids(&pool, config.deck_size, rng)
            .into_iter()
            .filter_map(|card_id| catalog.get(&card_id).cloned().map(|card| (card_id, card)))
            .collect();
        if deck_is_valid(&deck, config) && include.iter().all(|card_id| deck.contains_key(card_id)) {
            return Ok(deck);
        }
    }

    Err(RuleError::DeckBuildFailed {
        attempts: config.max_deck_attempts,
    })
}

fn narrow(cards: &mut BTreeMap<CardId, Card>, selected: Option<&CardId>) {
    cards.retain(|card_id, _| Some(card_id) == selected);
}

#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    effect_engine: EffectEngine<'a>,
}

impl Default for RuleEngine<'static> {
    fn default() -> Self {
        Self {
            effect_engine: EffectEngine::default(),
        }
    }
}

impl<'a> RuleEngine<'a> {
    pub fn new(registry: &'a SpecialRegistry) -> Self {
        Self {
            effect_engine: EffectEngine::new(registry),
        }
    }

    pub fn effects(&self) -> &EffectEngine<'a> {
        &self.effect_engine
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_offered(state: &GameState, phase: PlayPhase, card_id: &str) -> Result<(), RuleError> {
        let offered = state.current_play_phase() == Some(phase)
            && state
                .current_choices()
                .map(|choices| choices.contains(Side::Player, card_id))
                .unwrap_or(false);
        if !offered {
            return Err(RuleError::IllegalCardChoice {
                card_id: card_id.to_string(),
            });
        }
        Ok(())
    }

    /// 状态转移函数：消费旧状态，返回新状态。对局结束后任何动作都不再改变状态。
    pub fn apply<R: Rng + ?Sized>(&self, mut state: GameState, action: Action, rng: &mut R) -> GameState {
        if state.is_finished() {
            return state;
        }

        let (phase, card_id) = match action {
            Action::StartGame {
                include_card_ids,
                catalog,
                config,
            } => {
                let config = config.unwrap_or_else(|| state.config.clone());
                return self.start_game(config, &include_card_ids, catalog, rng);
            }
            Action::PickOffenseCard { card_id } => (PlayPhase::Offense, Some(card_id)),
            Action::PickDefenseCard { card_id } => (PlayPhase::Defense, Some(card_id)),
            Action::ContinueWithoutSelection => match state.current_play_phase() {
                Some(phase) => (phase, None),
                None => return state,
            },
        };

        let checked = Self::ensure_integrity(&state).and_then(|()| match &card_id {
            Some(card_id) => Self::ensure_offered(&state, phase, card_id),
            None => Ok(()),
        });
        if let Err(error) = checked {
            state.halt(error);
            return state;
        }

        match phase {
            PlayPhase::Offense => self.offense_turn(state, card_id, rng),
            PlayPhase::Defense => self.defense_turn(state, card_id, rng),
        }
    }

    fn start_game<R: Rng + ?Sized>(
        &self,
        config: RulesConfig,
        include_card_ids: &[CardId],
        catalog: Option<Catalog>,
        rng: &mut R,
    ) -> GameState {
        let mut state = GameState::with_config(config);
        state.all_cards = catalog.unwrap_or_else(|| Catalog::builtin().clone());

        let decks = build_deck(&state.all_cards, &state.config, include_card_ids, rng).and_then(|player| {
            build_deck(&state.all_cards, &state.config, &[], rng).map(|ai| (player, ai))
        });
        match decks {
            Ok((player_deck, ai_deck)) => {
                state.player_deck = player_deck;
                state.ai_deck = ai_deck;
            }
            Err(error) => {
                state.halt(error);
                return state;
            }
        }

        state.current_turn = 1;
        let offense = picker::offense_choices(&state.player_deck, state.config.offense_choices, rng);
        state.phase = TurnPhase::AwaitingOffense {
            offense: CardChoices::for_player(offense),
        };
        log::debug!(
            "game started: player deck {:?}, ai deck {:?}",
            state.player_deck.keys().collect::<Vec<_>>(),
            state.ai_deck.keys().collect::<Vec<_>>()
        );
        state
    }

    fn offense_turn<R: Rng + ?Sized>(
        &self,
        mut state: GameState,
        selected: Option<CardId>,
        rng: &mut R,
    ) -> GameState {
        if let Some(card_id) = &selected {
            remove_copy(&mut state.player_deck, card_id);
        }
        let ai_cards = picker::pick_ai_offense(&state, rng);
        for card_id in ai_cards.keys() {
            remove_copy(&mut state.ai_deck, card_id);
        }
        if let TurnPhase::AwaitingOffense { offense } = &mut state.phase {
            narrow(&mut offense.player_cards, selected.as_ref());
            offense.ai_cards = ai_cards;
        }

        let mut state = self.play_cards(state, PlayPhase::Offense);

        let defense = CardChoices::for_player(picker::defense_candidates(&state, Side::Player, rng));
        let offense = match std::mem::take(&mut state.phase) {
            TurnPhase::AwaitingOffense { offense } => offense,
            _ => CardChoices::default(),
        };
        log::debug!(
            "turn {} offense: player {:?}, ai {:?}",
            state.current_turn,
            offense.player_cards.keys().collect::<Vec<_>>(),
            offense.ai_cards.keys().collect::<Vec<_>>()
        );
        state.phase = TurnPhase::AwaitingDefense { offense, defense };
        state
    }

    fn defense_turn<R: Rng + ?Sized>(
        &self,
        mut state: GameState,
        selected: Option<CardId>,
        rng: &mut R,
    ) -> GameState {
        if let Some(card_id) = &selected {
            remove_copy(&mut state.player_deck, card_id);
        }
        let ai_cards = picker::pick_ai_defense(&state, rng);
        for card_id in ai_cards.keys() {
            remove_copy(&mut state.ai_deck, card_id);
        }
        if let TurnPhase::AwaitingDefense { defense, .. } = &mut state.phase {
            narrow(&mut defense.player_cards, selected.as_ref());
            defense.ai_cards = ai_cards;
        }

        state.prev_state = Snapshot {
            zones: state.zones.clone(),
            offense_card_choices: state.offense_card_choices().cloned(),
            defense_card_choices: state.defense_card_choices().cloned(),
        };

        let state = self.play_cards(state, PlayPhase::Defense);
        let state = check_for_victory(&self.effect_engine, state);
        if state.is_finished() {
            return state;
        }

        let mut state = run_combat(&self.effect_engine, state);
        state.current_turn += 1;
        let offense = picker::offense_choices(&state.player_deck, state.config.offense_choices, rng);
        state.phase = TurnPhase::AwaitingOffense {
            offense: CardChoices::for_player(offense),
        };
        log::debug!("turn {} begins", state.current_turn);
        state
    }

    /// 把当前选择中的卡牌放入战区：先执行出牌前特效，再推进充能，最后按落点摆放。
    fn play_cards(&self, state: GameState, phase: PlayPhase) -> GameState {
        let selected = state.current_choices().cloned().unwrap_or_default();
        let mut state = self
            .effect_engine
            .play_specials(SpecialPhase::PrePlayCards, state, None);

        tick_recharge(&mut state.player_deck);
        tick_recharge(&mut state.ai_deck);

        let choices = state.current_choices().cloned().unwrap_or_default();
        let mut placements = Vec::new();
        for side in Side::BOTH {
            for (card_id, card) in choices.cards(side) {
                let target = if card.planet {
                    ZoneKey::Planet
                } else if card.space {
                    ZoneKey::ship_target(side, phase)
                } else {
                    continue;
                };
                placements.push((side, card_id.clone(), card.clone(), target));
            }
        }

        let arrivals: Vec<(Side, ZoneKey)> = placements
            .iter()
            .map(|(side, _, _, target)| (*side, *target))
            .collect();
        let contested = |side: Side, zone: ZoneKey| {
            arrivals
                .iter()
                .any(|(other, target)| *other == side.opponent() && *target == zone)
        };

        let mut retreats = Vec::new();
        for side in Side::BOTH {
            for key in ZoneKey::ALL {
                if contested(side, key) {
                    retreats.push((side, key, Self::take_shy(&mut state, side, key)));
                }
            }
        }
        for (side, from, fleeing) in retreats {
            if !fleeing.is_empty() {
                log::debug!("{} shy card(s) of {side:?} leave {from:?}", fleeing.len());
            }
            state
                .zones
                .zone_mut(from.flee_target(side))
                .cards_mut(side)
                .extend(fleeing);
        }
        state.zones.planet.clear_lost_entrenchment();

        for (side, card_id, card, target) in placements {
            let target = if card.shy && contested(side, target) {
                target.flee_target(side)
            } else {
                target
            };
            let tank = card.tank;
            let played = state.instantiate(&card_id, card, phase);
            let cards = state.zones.zone_mut(target).cards_mut(side);
            if tank {
                cards.insert(0, played);
            } else {
                cards.push(played);
            }
        }

        for side in Side::BOTH {
            let deck = state.deck_mut(side);
            for card_id in selected.cards(side).keys() {
                if let Some(card) = deck.get_mut(card_id) {
                    if card.recharge > 0 {
                        card.recharging = card.recharge;
                    }
                }
            }
        }

        state
    }

    /// 取出这一方在该战区中已在场的胆小卡牌，其余卡牌保持原顺序。
    fn take_shy(state: &mut GameState, side: Side, from: ZoneKey) -> Vec<PlayedCard> {
        let cards = state.zones.zone_mut(from).cards_mut(side);
        let (fleeing, staying) = std::mem::take(cards)
            .into_iter()
            .partition(|played| played.card.shy);
        *cards = staying;
        fleeing
    }

    /// 玩家没有可选卡牌时自动推进，直到出现选择、对局结束或超过上限。
    pub fn run_until_choice<R: Rng + ?Sized>(
        &self,
        mut state: GameState,
        rng: &mut R,
        limit: u32,
    ) -> Result<GameState, EngineError> {
        let mut steps = 0;
        while state.current_play_phase().is_some() && !state.has_player_choice() {
            if steps >= limit {
                log::warn!("auto-continue exceeded {limit} steps on turn {}", state.current_turn);
                return Err(EngineError::LoopExceeded { limit });
            }
            state = self.apply(state, Action::ContinueWithoutSelection, rng);
            steps += 1;
        }
        Ok(state)
    }
}

/// 使用内置特效注册表执行一次状态转移。
pub fn apply<R: Rng + ?Sized>(state: GameState, action: Action, rng: &mut R) -> GameState {
    RuleEngine::default().apply(state, action, rng)
}

/// 使用状态中配置的上限自动推进。
pub fn run_until_choice<R: Rng + ?Sized>(state: GameState, rng: &mut R) -> Result<GameState, EngineError> {
    let limit = state.config.auto_continue_limit;
    RuleEngine::default().run_until_choice(state, rng, limit)
}
