//! 战区战斗结算：汇总双方力量、计算净伤害，并按数组顺序把伤害分配到卡牌上。

use serde::{Deserialize, Serialize};

use super::card::PlayedCard;
use super::effects::{EffectEngine, SpecialPhase, StrengthOverrides};
use super::state::{GameState, Side, ZoneCards, ZoneKey};

/// 一方在某个战区的力量汇总。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStrength {
    pub strength: i32,
    pub damage_strength: i32,
    pub shield_strength: i32,
}

/// 汇总存活卡牌的力量。力量阶段特效给出的替换值优先；充能中的卡牌只提供护盾。
pub fn zone_strength(cards: &[PlayedCard], overrides: &StrengthOverrides) -> ZoneStrength {
    cards.iter().fold(ZoneStrength::default(), |mut total, raw| {
        let card = overrides.get(&raw.card_uid).unwrap_or(raw);
        if !card.card.is_recharging() {
            total.strength += card.card.strength;
            total.damage_strength += card.card.damage_strength;
        }
        total.shield_strength += card.card.shield_strength;
        total
    })
}

/// 按顺序分配伤害，先扣护甲再扣力量。返回 `(存活, 阵亡)`，阵亡卡牌已清零。
pub fn damage_cards(cards: Vec<PlayedCard>, damage: i32) -> (Vec<PlayedCard>, Vec<PlayedCard>) {
    let mut survivors = Vec::with_capacity(cards.len());
    let mut dead = Vec::new();
    let mut damage_left = damage;

    for mut card in cards {
        let strength = card.card.strength;
        let armor = card.card.armor_strength;
        if damage_left >= strength + armor || strength <= 0 {
            damage_left -= (strength + armor).max(0);
            dead.push(card.destroyed());
            continue;
        }
        card.card.armor_strength = (armor - damage_left).max(0);
        card.card.strength = strength.min(strength - (damage_left - armor));
        damage_left = 0;
        survivors.push(card);
    }

    (survivors, dead)
}

fn damage_taken(own: ZoneStrength, own_bonus: i32, opponent: ZoneStrength) -> i32 {
    let net = own.strength + own.shield_strength + own_bonus
        - (opponent.strength + opponent.damage_strength);
    (own.strength - net).max(0)
}

/// 结算单个战区。力量严格更高的一方本次获得 +1 护盾。
pub fn resolve_zone(zone: &mut ZoneCards, overrides: &StrengthOverrides) {
    let player = zone_strength(&zone.player_cards, overrides);
    let ai = zone_strength(&zone.ai_cards, overrides);
    let player_bonus = i32::from(player.strength > ai.strength);
    let ai_bonus = i32::from(ai.strength > player.strength);

    let damage = [
        (Side::Player, damage_taken(player, player_bonus, ai)),
        (Side::Ai, damage_taken(ai, ai_bonus, player)),
    ];
    for (side, amount) in damage {
        let cards = std::mem::take(zone.cards_mut(side));
        let (survivors, dead) = damage_cards(cards, amount);
        *zone.cards_mut(side) = survivors;
        zone.graveyard_mut(side).extend(dead);
    }
}

/// 完整战斗：战斗前特效、三个战区结算、清理无效驻守、战斗后特效。
pub fn run_combat(effects: &EffectEngine<'_>, state: GameState) -> GameState {
    let mut state = effects.play_specials(SpecialPhase::PreCombat, state, None);
    let overrides = effects.strength_overrides(&state);
    let before = state.zones.clone();

    for key in ZoneKey::ALL {
        resolve_zone(state.zones.zone_mut(key), &overrides);
    }

    state.zones.planet.clear_lost_entrenchment();

    log::debug!("combat resolved on turn {}", state.current_turn);
    effects.play_specials(SpecialPhase::PostCombat, state, Some(&before))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::{Card, PlayPhase};
    use crate::game::effects::SpecialRegistry;

    fn played(uid: u64, strength: i32) -> PlayedCard {
        PlayedCard::new("grunt", uid, Card::new("Grunt", strength), 1, PlayPhase::Offense)
    }

    fn zone(player: &[i32], ai: &[i32]) -> ZoneCards {
        let mut uid = 0;
        let mut cards = |strengths: &[i32]| {
            strengths
                .iter()
                .map(|strength| {
                    uid += 1;
                    played(uid, *strength)
                })
                .collect::<Vec<_>>()
        };
        ZoneCards {
            player_cards: cards(player),
            ai_cards: cards(ai),
            ..ZoneCards::default()
        }
    }

    fn strengths(cards: &[PlayedCard]) -> Vec<i32> {
        cards.iter().map(|card| card.card.strength).collect()
    }

    #[test]
    fn stronger_side_survives_wounded() {
        let mut zone = zone(&[4], &[3]);
        resolve_zone(&mut zone, &StrengthOverrides::new());

        assert_eq!(strengths(&zone.player_cards), vec![2]);
        assert!(zone.ai_cards.is_empty(), "ai card should be destroyed");
        assert_eq!(strengths(&zone.ai_graveyard), vec![0]);
        assert!(zone.player_graveyard.is_empty());
    }

    #[test]
    fn equal_strengths_destroy_each_other() {
        let mut zone = zone(&[3], &[3]);
        resolve_zone(&mut zone, &StrengthOverrides::new());

        assert!(zone.player_cards.is_empty());
        assert!(zone.ai_cards.is_empty());
        assert_eq!(strengths(&zone.player_graveyard), vec![0]);
        assert_eq!(strengths(&zone.ai_graveyard), vec![0]);
    }

    #[test]
    fn empty_zone_is_unchanged() {
        let mut empty = ZoneCards::default();
        resolve_zone(&mut empty, &StrengthOverrides::new());
        assert_eq!(empty, ZoneCards::default());
    }

    #[test]
    fn uncontested_cards_take_no_damage() {
        let mut zone = zone(&[2, 1], &[]);
        resolve_zone(&mut zone, &StrengthOverrides::new());
        assert_eq!(strengths(&zone.player_cards), vec![2, 1]);
    }

    #[test]
    fn damage_fills_cards_in_array_order() {
        let (survivors, dead) = damage_cards(vec![played(1, 2), played(2, 3), played(3, 4)], 4);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].card_uid, 1);
        assert_eq!(strengths(&survivors), vec![1, 4]);
    }

    #[test]
    fn armor_absorbs_before_strength() {
        let mut armored = played(1, 3);
        armored.card.armor_strength = 2;
        let (survivors, dead) = damage_cards(vec![armored.clone()], 1);
        assert!(dead.is_empty());
        assert_eq!(survivors[0].card.strength, 3, "armor should soak the hit");
        assert_eq!(survivors[0].card.armor_strength, 1);

        let (survivors, _) = damage_cards(vec![armored], 4);
        assert_eq!(survivors[0].card.strength, 1);
        assert_eq!(survivors[0].card.armor_strength, 0);
    }

    #[test]
    fn shields_and_damage_bonuses_shift_the_result() {
        let mut zone = zone(&[3], &[3]);
        zone.player_cards[0].card.shield_strength = 1;
        resolve_zone(&mut zone, &StrengthOverrides::new());
        assert_eq!(strengths(&zone.player_cards), vec![1]);
        assert!(zone.ai_cards.is_empty());
    }

    #[test]
    fn recharging_cards_only_shield() {
        let mut card = played(1, 5);
        card.card.recharging = 1;
        card.card.shield_strength = 2;
        let total = zone_strength(&[card], &StrengthOverrides::new());
        assert_eq!(total, ZoneStrength { strength: 0, damage_strength: 0, shield_strength: 2 });
    }

    #[test]
    fn overrides_replace_card_values() {
        let card = played(9, 1);
        let mut boosted = card.clone();
        boosted.card.damage_strength = 3;
        let overrides: StrengthOverrides = [(9, boosted)].into_iter().collect();
        assert_eq!(zone_strength(&[card], &overrides).damage_strength, 3);
    }

    #[test]
    fn strengths_never_go_negative() {
        let mut zone = zone(&[1, 1, 6], &[9, 2]);
        resolve_zone(&mut zone, &StrengthOverrides::new());
        for card in zone.player_cards.iter().chain(zone.ai_cards.iter()) {
            assert!(card.card.strength > 0, "live cards keep positive strength");
            assert!(card.card.armor_strength >= 0);
        }
        for card in zone.player_graveyard.iter().chain(zone.ai_graveyard.iter()) {
            assert_eq!(card.card.strength, 0);
        }
    }

    #[test]
    fn recharging_cards_in_a_loaded_state_only_shield() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = GameState::new();
        state.zones.planet.cards = zone(&[3], &[2]);
        state.zones.planet.player_cards[0].card.recharging = 1;

        let state = run_combat(&effects, state);
        assert_eq!(strengths(&state.zones.planet.player_cards), vec![1]);
        assert_eq!(strengths(&state.zones.planet.ai_cards), vec![2], "a recharging card deals no damage");
    }

    #[test]
    fn combat_clears_entrenchment_over_lost_ground() {
        let registry = SpecialRegistry::new();
        let effects = EffectEngine::new(&registry);
        let mut state = GameState::new();
        state.zones.planet.cards = zone(&[1], &[4]);
        state.zones.planet.player_entrenched = true;

        let state = run_combat(&effects, state);
        assert!(state.zones.planet.player_cards.is_empty());
        assert!(!state.zones.planet.player_entrenched);
        assert!(state.integrity_check().is_ok());
    }
}
