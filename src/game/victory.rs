//! 胜负判定：飞船伤害、地面驻守、同归于尽时的决胜以及僵局检测。

use super::combat::{run_combat, zone_strength};
use super::effects::EffectEngine;
use super::state::{GameEndResult, GameState, Side, ZoneCards};

fn ship_hit(state: &GameState, defender: Side, forced: bool) -> bool {
    let ship = state.zones.ship(defender);
    forced || (ship.cards(defender).is_empty() && !ship.cards(defender.opponent()).is_empty())
}

fn entrenching(state: &GameState, side: Side, forced: bool) -> bool {
    let planet = &state.zones.planet;
    forced || (planet.cards(side.opponent()).is_empty() && !planet.cards(side).is_empty())
}

fn holds(before: &ZoneCards, after: &ZoneCards) -> bool {
    !after.player_cards.is_empty()
        && !after.ai_cards.is_empty()
        && before.player_cards == after.player_cards
        && before.ai_cards == after.ai_cards
}

/// 双方牌库都没有进攻牌，且再打一轮战斗（只在副本上推演）不会改变任何战区时判定僵局。
pub fn is_stalemate(effects: &EffectEngine<'_>, state: &GameState) -> bool {
    let can_attack = Side::BOTH
        .into_iter()
        .any(|side| state.deck(side).values().any(|card| card.offense));
    if can_attack {
        return false;
    }

    let after = run_combat(effects, state.clone());
    let zones = &state.zones;
    let planet_settled = (zones.planet.player_cards.is_empty() && zones.planet.ai_cards.is_empty())
        || holds(&zones.planet, &after.zones.planet);
    let player_ship_settled = zones.ships.player_ship.ai_cards.is_empty()
        || holds(&zones.ships.player_ship, &after.zones.ships.player_ship);
    let ai_ship_settled = zones.ships.ai_ship.player_cards.is_empty()
        || holds(&zones.ships.ai_ship, &after.zones.ships.ai_ship);

    planet_settled && player_ship_settled && ai_ship_settled
}

/// 判定本回合是否结束。对局结束时状态进入 `Finished`，否则写回新的飞船伤害与驻守标记。
pub fn check_for_victory(effects: &EffectEngine<'_>, mut state: GameState) -> GameState {
    let overrides = effects.victory_overrides(&state);
    let limit = state.config.ship_hits_to_destroy;

    let damage = Side::BOTH.map(|side| {
        let current = state.zones.ship(side).ship_damage;
        let hit = ship_hit(&state, side, overrides.ship_damage(side));
        current.saturating_add(u8::from(hit)).min(limit)
    });
    let [player_damage, ai_damage] = damage;
    let player_destroyed = player_damage >= limit;
    let ai_destroyed = ai_damage >= limit;

    let player_entrenching = entrenching(&state, Side::Player, overrides.entrenching(Side::Player));
    let ai_entrenching = entrenching(&state, Side::Ai, overrides.entrenching(Side::Ai));
    let planet = &state.zones.planet;

    let result = if player_destroyed && !ai_destroyed {
        Some(GameEndResult::PlayerShipDefeat)
    } else if ai_destroyed && !player_destroyed {
        Some(GameEndResult::PlayerShipVictory)
    } else if !player_destroyed && !ai_destroyed && player_entrenching && planet.player_entrenched {
        Some(GameEndResult::PlayerPlanetVictory)
    } else if !player_destroyed && !ai_destroyed && ai_entrenching && planet.ai_entrenched {
        Some(GameEndResult::PlayerPlanetDefeat)
    } else if player_destroyed && ai_destroyed {
        let overrides = effects.strength_overrides(&state);
        let player = zone_strength(&planet.player_cards, &overrides).strength;
        let ai = zone_strength(&planet.ai_cards, &overrides).strength;
        Some(if player > ai {
            GameEndResult::PlayerTiebreakerVictory
        } else if ai > player {
            GameEndResult::PlayerTiebreakerDefeat
        } else {
            GameEndResult::DrawShipsDestroyed
        })
    } else if is_stalemate(effects, &state) {
        Some(GameEndResult::DrawStalemate)
    } else {
        None
    };

    match result {
        Some(result) => state.finish(result),
        None => {
            state.zones.ships.player_ship.ship_damage = player_damage;
            state.zones.ships.ai_ship.ship_damage = ai_damage;
            let planet = &mut state.zones.planet;
            planet.player_entrenched |= player_entrenching;
            planet.ai_entrenched |= ai_entrenching;
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::{Card, Deck, PlayPhase, PlayedCard};
    use crate::game::effects::SpecialRegistry;
    use crate::game::state::{CardChoices, TurnPhase, ZoneKey};

    fn deploy(state: &mut GameState, key: ZoneKey, side: Side, strength: i32) {
        let card = state.instantiate("grunt", Card::new("Grunt", strength), PlayPhase::Offense);
        state.zones.zone_mut(key).cards_mut(side).push(card);
    }

    fn awaiting_defense() -> GameState {
        let mut state = GameState::new();
        state.current_turn = 1;
        state.phase = TurnPhase::AwaitingDefense {
            offense: CardChoices::default(),
            defense: CardChoices::default(),
        };
        let mut attacker = Card::new("Attacker", 2);
        attacker.offense = true;
        state.player_deck.insert("attacker".into(), attacker.clone());
        state.ai_deck.insert("attacker".into(), attacker);
        state
    }

    #[test]
    fn ground_victory_needs_two_consecutive_checks() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = awaiting_defense();
        deploy(&mut state, ZoneKey::Planet, Side::Player, 2);

        let state = check_for_victory(&effects, state);
        assert!(state.game_end_results().is_none(), "first check only entrenches");
        assert!(state.zones.planet.player_entrenched);

        let state = check_for_victory(&effects, state);
        assert_eq!(state.game_end_results(), Some(GameEndResult::PlayerPlanetVictory));
        assert!(state.offense_card_choices().is_none());
        assert!(state.defense_card_choices().is_none());
    }

    #[test]
    fn undefended_ship_takes_damage_until_destroyed() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = awaiting_defense();
        deploy(&mut state, ZoneKey::AiShip, Side::Player, 1);

        let state = check_for_victory(&effects, state);
        assert_eq!(state.zones.ships.ai_ship.ship_damage, 1);
        assert!(!state.is_finished());

        let state = check_for_victory(&effects, state);
        assert_eq!(state.game_end_results(), Some(GameEndResult::PlayerShipVictory));
    }

    #[test]
    fn ship_loss_outranks_ground_victory() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = awaiting_defense();
        deploy(&mut state, ZoneKey::Planet, Side::Player, 2);
        deploy(&mut state, ZoneKey::PlayerShip, Side::Ai, 2);
        state.zones.planet.player_entrenched = true;
        state.zones.ships.player_ship.ship_damage = 1;

        let state = check_for_victory(&effects, state);
        assert_eq!(state.game_end_results(), Some(GameEndResult::PlayerShipDefeat));
    }

    #[test]
    fn double_destruction_goes_to_ground_strength() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = awaiting_defense();
        deploy(&mut state, ZoneKey::PlayerShip, Side::Ai, 1);
        deploy(&mut state, ZoneKey::AiShip, Side::Player, 1);
        state.zones.ships.player_ship.ship_damage = 1;
        state.zones.ships.ai_ship.ship_damage = 1;

        let tied = check_for_victory(&effects, state.clone());
        assert_eq!(tied.game_end_results(), Some(GameEndResult::DrawShipsDestroyed));

        deploy(&mut state, ZoneKey::Planet, Side::Ai, 3);
        deploy(&mut state, ZoneKey::Planet, Side::Player, 2);
        let decided = check_for_victory(&effects, state);
        assert_eq!(decided.game_end_results(), Some(GameEndResult::PlayerTiebreakerDefeat));
    }

    #[test]
    fn empty_board_without_attackers_is_a_stalemate() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = awaiting_defense();
        state.player_deck = Deck::new();
        state.ai_deck = Deck::new();

        let state = check_for_victory(&effects, state);
        assert_eq!(state.game_end_results(), Some(GameEndResult::DrawStalemate));
    }

    #[test]
    fn deadlocked_walls_are_a_stalemate() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = awaiting_defense();
        state.player_deck = Deck::new();
        state.ai_deck = Deck::new();

        let mut wall = Card::new("Wall", 1);
        wall.shield_strength = 5;
        for (side, uid) in [(Side::Player, 100), (Side::Ai, 101)] {
            let card = PlayedCard::new("wall", uid, wall.clone(), 1, PlayPhase::Defense);
            state.zones.planet.cards_mut(side).push(card);
        }
        assert!(is_stalemate(&effects, &state), "shielded walls cannot hurt each other");

        state.zones.planet.ai_cards[0].card.shield_strength = 0;
        state.zones.planet.player_cards[0].card.damage_strength = 1;
        assert!(!is_stalemate(&effects, &state));
    }

    #[test]
    fn offense_cards_in_a_deck_prevent_stalemate() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let state = awaiting_defense();
        assert!(!is_stalemate(&effects, &state));
        let state = check_for_victory(&effects, state);
        assert!(!state.is_finished());
    }
}
