//! 游戏核心逻辑模块（状态机、特效引擎、战斗与胜负判定）。

pub mod card;
pub mod combat;
pub mod config;
pub mod effects;
pub mod rng;
pub mod rules;
pub mod specials;
pub mod state;
pub mod victory;

pub use card::{Card, CardId, CardUid, Catalog, Deck, PlayPhase, PlayedCard, Priority};
pub use combat::{run_combat, zone_strength, ZoneStrength};
pub use config::RulesConfig;
pub use effects::{
    EffectEngine,
    Special,
    SpecialPhase,
    SpecialRegistry,
    SpecialTrigger,
    StrengthOverrides,
    VictoryOverrides,
};
pub use rules::{apply, build_deck, run_until_choice, Action, EngineError, RuleEngine, RuleError};
pub use state::{
    CardChoices,
    GameEndFlags,
    GameEndResult,
    GameState,
    IntegrityError,
    Side,
    TurnPhase,
    ZoneKey,
    Zones,
};
pub use victory::check_for_victory;
