pub mod ai;
pub mod game;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use ai::{defense_candidates, offense_choices, pick_ai_defense, pick_ai_offense, Front};
pub use game::{
    apply, build_deck, check_for_victory, run_combat, run_until_choice, zone_strength, Action,
    Card, CardChoices, CardId, CardUid, Catalog, Deck, EffectEngine, EngineError, GameEndFlags,
    GameEndResult, GameState, IntegrityError, PlayPhase, PlayedCard, Priority, RuleEngine,
    RuleError, RulesConfig, Side, Special, SpecialPhase, SpecialRegistry, SpecialTrigger,
    StrengthOverrides, TurnPhase, VictoryOverrides, ZoneKey, ZoneStrength, Zones,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn seeded_or_entropy(seed: Option<u32>) -> SmallRng {
    match seed {
        Some(seed) => game::rng::seeded(u64::from(seed)),
        None => SmallRng::from_entropy(),
    }
}

/// 持有一局对局状态与随机源的浏览器端包装。只做数据转换，规则全部在 `game` 模块中。
#[wasm_bindgen]
pub struct GameEngine {
    state: GameState,
    rng: SmallRng,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(initial_state_json: Option<String>, seed: Option<u32>) -> Result<GameEngine, JsValue> {
        let state = match initial_state_json {
            Some(json) => serde_json::from_str(&json).map_err(to_js_error)?,
            None => GameState::new(),
        };
        Ok(GameEngine {
            state,
            rng: seeded_or_entropy(seed),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = serde_json::from_str(json).map_err(to_js_error)?;
        Ok(())
    }

    /// 结束结果的单标记视图，对局未结束时为 `null`。
    pub fn game_end_results(&self) -> Result<JsValue, JsValue> {
        let flags = self.state.game_end_results().map(GameEndResult::flags);
        to_value(&flags).map_err(JsValue::from)
    }

    pub fn apply_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: Action = serde_json::from_str(action_json).map_err(to_js_error)?;
        self.dispatch(action)
    }

    pub fn start_game(&mut self, include_card_ids: JsValue) -> Result<String, JsValue> {
        let include: Option<Vec<CardId>> = from_value(include_card_ids).map_err(JsValue::from)?;
        self.dispatch(Action::start_game(include.unwrap_or_default(), None))
    }

    pub fn pick_offense_card(&mut self, card_id: &str) -> Result<String, JsValue> {
        self.dispatch(Action::pick_offense_card(card_id))
    }

    pub fn pick_defense_card(&mut self, card_id: &str) -> Result<String, JsValue> {
        self.dispatch(Action::pick_defense_card(card_id))
    }

    pub fn continue_without_selection(&mut self) -> Result<String, JsValue> {
        self.dispatch(Action::continue_without_selection())
    }

    pub fn run_until_choice(&mut self) -> Result<String, JsValue> {
        match run_until_choice(self.state.clone(), &mut self.rng) {
            Ok(next) => {
                self.state = next;
                self.state_json()
            }
            Err(error) => {
                log::error!("{error}");
                Err(to_js_error(error))
            }
        }
    }

    fn dispatch(&mut self, action: Action) -> Result<String, JsValue> {
        let state = std::mem::take(&mut self.state);
        self.state = apply(state, action, &mut self.rng);
        self.state_json()
    }
}

/// 返回一个尚未开始的对局状态。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::new()).map_err(JsValue::from)
}

/// 纯函数形式的状态转移：相同的状态、动作与种子总是得到相同结果。
#[wasm_bindgen(js_name = "applyAction")]
pub fn apply_action(state: JsValue, action: JsValue, seed: u32) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: Action = from_value(action).map_err(JsValue::from)?;
    let mut rng = game::rng::seeded(u64::from(seed));
    to_value(&apply(state, action, &mut rng)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
