//! 内置卡牌特效。每个处理函数只关心自己的卡牌标识，由 [`builtin_registry`] 统一登记。

use std::collections::HashSet;

use super::card::{add_copies, Card, CardUid, PlayPhase, PlayedCard};
use super::effects::{Special, SpecialRegistry, StrengthOverrides, VictoryOverrides};
use super::state::{GameState, Side, ZoneKey, Zones};

const SEED_POD: &str = "seedPod";
const STAR_SPLINTERS: &str = "starSplinters";
const BUBBLE_SHUTTLES: &str = "bubbleShuttles";
const BUBBLE_BOTS: &str = "bubbleBots";

pub fn builtin_registry() -> SpecialRegistry {
    SpecialRegistry::new()
        .register("planetaryBombers", Special::Current(planetary_bombers))
        .register("nanightStorm", Special::Current(nanight_storm))
        .register("moltenSawTower", Special::Current(molten_saw_tower))
        .register("scrapHoppers", Special::Current(scrap_hoppers))
        .register("reinforcedGleam", Special::Current(reinforced_gleam))
        .register("scrapReanimator", Special::Current(scrap_reanimator))
        .register("hoverTanks", Special::Current(hover_tanks))
        .register("bubbleFactory", Special::Current(bubble_factory))
        .register("seedPodDropper", Special::Current(seed_pod_dropper))
        .register("sporeSoldiers", Special::Current(spore_soldiers))
        .register("seedVault", Special::Current(seed_vault))
        .register("trenchFighters", Special::Strength(trench_fighters))
        .register("puffingPlant", Special::Strength(puffing_plant))
        .register("staccatoFlyers", Special::Victory(staccato_flyers))
        .register("scrapHarvesters", Special::WithSnapshot(scrap_harvesters))
        .register("reanimatingSlivers", Special::WithSnapshot(reanimating_slivers))
        .register("treeOfTheStars", Special::WithSnapshot(tree_of_the_stars))
}

// ---- helpers ----

fn chose(state: &GameState, side: Side, card_id: &str) -> bool {
    state
        .current_choices()
        .map(|choices| choices.contains(side, card_id))
        .unwrap_or(false)
}

/// 开发牌结算后从当前选择中移除，不会进入战区。
fn consume_development(mut state: GameState, card_id: &str) -> GameState {
    if let Some(choices) = state.current_choices_mut() {
        for side in Side::BOTH {
            choices.cards_mut(side).remove(card_id);
        }
    }
    state
}

fn adjust_deck_strength(mut state: GameState, card_id: &str, delta: i32) -> GameState {
    for side in Side::BOTH {
        if !chose(&state, side, card_id) {
            continue;
        }
        if let Some(card) = state.deck_mut(side).get_mut(card_id) {
            card.strength += delta;
        }
    }
    state
}

fn generate_into_deck(state: &mut GameState, side: Side, card_id: &str, copies: usize) {
    if copies == 0 {
        return;
    }
    let Some(template) = state.all_cards.get(card_id).cloned() else {
        log::warn!("catalog has no `{card_id}` to generate");
        return;
    };
    add_copies(state.deck_mut(side), card_id, &template, copies as u32);
}

fn count_on_planet(state: &GameState, side: Side, card_id: &str) -> usize {
    state
        .zones
        .planet
        .cards(side)
        .iter()
        .filter(|card| card.is(card_id))
        .count()
}

/// 快照中存在、战斗后不再存活的卡牌（按实例标识比较）。
fn fallen<'a>(before: &'a [PlayedCard], after: &[PlayedCard]) -> Vec<&'a PlayedCard> {
    let alive: HashSet<CardUid> = after.iter().map(|card| card.card_uid).collect();
    before
        .iter()
        .filter(|card| !alive.contains(&card.card_uid))
        .collect()
}

fn override_live_copies(
    state: &GameState,
    card_id: &str,
    adjust: impl Fn(Side, &PlayedCard) -> PlayedCard,
) -> StrengthOverrides {
    let mut overrides = StrengthOverrides::new();
    for side in Side::BOTH {
        for card in state.zones.live_cards(side).filter(|card| card.is(card_id)) {
            overrides.insert(card.card_uid, adjust(side, card));
        }
    }
    overrides
}

// ---- preplaycards / precombat ----

/// 轰炸地面：只留下本回合防守时部署的卡牌，其余进入墓地，双方失去驻守。
fn planetary_bombers(mut state: GameState) -> GameState {
    let turn = state.current_turn;
    let planet = &mut state.zones.planet;
    for side in Side::BOTH {
        let cards = std::mem::take(planet.cards_mut(side));
        let (kept, bombed): (Vec<_>, Vec<_>) = cards
            .into_iter()
            .partition(|card| card.turn_played == turn && card.phase_played == PlayPhase::Defense);
        *planet.cards_mut(side) = kept;
        planet
            .graveyard_mut(side)
            .extend(bombed.into_iter().map(PlayedCard::destroyed));
    }
    planet.player_entrenched = false;
    planet.ai_entrenched = false;
    state
}

fn nanight_storm(state: GameState) -> GameState {
    adjust_deck_strength(state, "nanightStorm", -1)
}

fn molten_saw_tower(state: GameState) -> GameState {
    adjust_deck_strength(state, "moltenSawTower", 3)
}

/// 飞船战区每有一张阵亡卡牌，本次打出的拾荒跳虫力量加一。
fn scrap_hoppers(mut state: GameState) -> GameState {
    let Some(phase) = state.current_play_phase() else {
        return state;
    };
    let deaths = |zones: &Zones, side: Side| {
        let zone = zones.zone(ZoneKey::ship_target(side, phase));
        (zone.player_graveyard.len() + zone.ai_graveyard.len()) as i32
    };
    let bonus = [
        (Side::Player, deaths(&state.zones, Side::Player)),
        (Side::Ai, deaths(&state.zones, Side::Ai)),
    ];
    if let Some(choices) = state.current_choices_mut() {
        for (side, extra) in bonus {
            if let Some(card) = choices.cards_mut(side).get_mut("scrapHoppers") {
                card.strength += extra;
            }
        }
    }
    state
}

fn reinforced_gleam(mut state: GameState) -> GameState {
    for side in Side::BOTH {
        if !chose(&state, side, "reinforcedGleam") {
            continue;
        }
        for card in state.deck_mut(side).values_mut() {
            if card.in_tribe("bubble") {
                card.armor_strength += 4;
            }
        }
    }
    consume_development(state, "reinforcedGleam")
}

fn scrap_reanimator(mut state: GameState) -> GameState {
    for side in Side::BOTH {
        if !chose(&state, side, "scrapReanimator") {
            continue;
        }
        let dead_scrap: Vec<String> = state
            .zones
            .graveyard_cards(side)
            .filter(|card| card.card.in_tribe("scrap"))
            .map(|card| card.card_id.clone())
            .collect();
        for card_id in dead_scrap {
            if let Some(existing) = state.deck_mut(side).get_mut(&card_id) {
                existing.count = existing.count.max(1) + 1;
                continue;
            }
            if let Some(template) = state.all_cards.get(&card_id).cloned() {
                state.deck_mut(side).insert(card_id, Card { count: 1, ..template });
            }
        }
    }
    consume_development(state, "scrapReanimator")
}

fn seed_pod_dropper(mut state: GameState) -> GameState {
    let Some(seed_pod) = state.all_cards.get(SEED_POD).cloned() else {
        return state;
    };
    if let Some(choices) = state.current_choices_mut() {
        for side in Side::BOTH {
            if choices.contains(side, "seedPodDropper") {
                choices.cards_mut(side).insert(SEED_POD.to_string(), seed_pod.clone());
            }
        }
    }
    state
}

/// 墓地特效：地面墓地里每有一张孢子士兵，本次打出的植物地面牌力量加一。
fn spore_soldiers(mut state: GameState) -> GameState {
    let dead = Side::BOTH.map(|side| {
        state
            .zones
            .planet
            .graveyard(side)
            .iter()
            .filter(|card| card.is("sporeSoldiers"))
            .count() as i32
    });
    if let Some(choices) = state.current_choices_mut() {
        for (side, spores) in Side::BOTH.into_iter().zip(dead) {
            for card in choices.cards_mut(side).values_mut() {
                if card.in_tribe("plant") && card.planet {
                    card.strength += spores;
                }
            }
        }
    }
    state
}

// ---- postcombat ----

fn hover_tanks(mut state: GameState) -> GameState {
    for side in Side::BOTH {
        for card in state.zones.planet.cards_mut(side) {
            if card.is("hoverTanks") && !card.hovering {
                card.hovering = true;
                card.card.strength = card.card.strength.max(3);
            }
        }
    }
    state
}

fn bubble_factory(mut state: GameState) -> GameState {
    for side in Side::BOTH {
        let factories = count_on_planet(&state, side, "bubbleFactory");
        generate_into_deck(&mut state, side, BUBBLE_SHUTTLES, factories);
        generate_into_deck(&mut state, side, BUBBLE_BOTS, factories);
    }
    state
}

fn seed_vault(mut state: GameState) -> GameState {
    if state.current_turn % 3 != 0 {
        return state;
    }
    for side in Side::BOTH {
        let vaults = count_on_planet(&state, side, "seedVault");
        generate_into_deck(&mut state, side, SEED_POD, vaults);
    }
    state
}

fn scrap_harvesters(mut state: GameState, before: &Zones) -> GameState {
    for key in ZoneKey::ALL {
        let prior = before.zone(key);
        let zone = state.zones.zone_mut(key);
        for side in Side::BOTH {
            let enemy = side.opponent();
            if prior.cards(enemy).len() <= zone.cards(enemy).len() {
                continue;
            }
            for card in zone.cards_mut(side) {
                if card.is("scrapHarvesters") {
                    card.card.strength += 1;
                }
            }
        }
    }
    state
}

fn reanimating_slivers(mut state: GameState, before: &Zones) -> GameState {
    for key in ZoneKey::ALL {
        let prior = before.zone(key);
        let zone = state.zones.zone_mut(key);
        for side in Side::BOTH {
            let risen: Vec<PlayedCard> = fallen(prior.cards(side), zone.cards(side))
                .into_iter()
                .filter(|card| card.is("reanimatingSlivers") && !card.revived)
                .map(|card| {
                    let mut sliver = card.clone();
                    sliver.revived = true;
                    sliver.card.strength = 2;
                    sliver
                })
                .collect();
            if risen.is_empty() {
                continue;
            }
            let uids: HashSet<CardUid> = risen.iter().map(|card| card.card_uid).collect();
            zone.graveyard_mut(side)
                .retain(|card| !uids.contains(&card.card_uid));
            zone.cards_mut(side).extend(risen);
        }
    }
    state
}

fn tree_of_the_stars(mut state: GameState, before: &Zones) -> GameState {
    for side in Side::BOTH {
        let dead_trees: usize = [ZoneKey::PlayerShip, ZoneKey::AiShip]
            .into_iter()
            .map(|key| {
                fallen(before.zone(key).cards(side), state.zones.zone(key).cards(side))
                    .into_iter()
                    .filter(|card| card.is("treeOfTheStars"))
                    .count()
            })
            .sum();
        generate_into_deck(&mut state, side, STAR_SPLINTERS, dead_trees);
    }
    state
}

// ---- strength / checkforvictory ----

fn trench_fighters(state: &GameState) -> StrengthOverrides {
    override_live_copies(state, "trenchFighters", |side, card| {
        let entrenched = state.zones.planet.entrenched(side);
        let mut fighter = card.clone();
        fighter.card.damage_strength = if entrenched { 1 } else { 0 };
        fighter.card.shield_strength = if entrenched { 2 } else { 0 };
        fighter
    })
}

fn puffing_plant(state: &GameState) -> StrengthOverrides {
    override_live_copies(state, "puffingPlant", |side, card| {
        let opposing = state.zones.planet.cards(side.opponent()).len() as i32;
        let mut plant = card.clone();
        plant.card.damage_strength = opposing;
        plant.card.shield_strength = opposing;
        plant
    })
}

/// 防守方在自己飞船中的总力量不超过 1，且攻击方有力量至少为 2 的断续飞艇时，飞船受到伤害。
fn staccato_flyers(state: &GameState) -> VictoryOverrides {
    let exposed = |defender: Side| {
        let ship = state.zones.ship(defender);
        let guard: i32 = ship.cards(defender).iter().map(|card| card.card.strength).sum();
        guard <= 1
            && ship
                .cards(defender.opponent())
                .iter()
                .any(|card| card.is("staccatoFlyers") && card.card.strength >= 2)
    };
    VictoryOverrides {
        player_ship_damage: exposed(Side::Player),
        ai_ship_damage: exposed(Side::Ai),
        ..VictoryOverrides::default()
    }
}
