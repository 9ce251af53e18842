//! 对手选牌策略。

pub mod picker;

pub use picker::{defense_candidates, offense_choices, pick_ai_defense, pick_ai_offense, Front};
