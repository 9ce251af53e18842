use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::card::{Card, CardId, Deck, Priority};
use crate::game::rng::sample_ids;
use crate::game::state::{GameState, Side};

/// 防守需要覆盖的战线。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Front {
    Space,
    Planet,
}

impl Front {
    fn covers(self, card: &Card) -> bool {
        match self {
            Front::Space => card.space,
            Front::Planet => card.planet,
        }
    }

    fn of(card: &Card) -> Option<Front> {
        if card.space {
            Some(Front::Space)
        } else if card.planet {
            Some(Front::Planet)
        } else {
            None
        }
    }
}

/// 按优先级分层抽样：先在高优先级中抽，不足时依次用普通、低优先级补齐。
pub fn pick_tiered<R, F, P>(
    deck: &Deck,
    count: usize,
    eligible: F,
    priority: P,
    rng: &mut R,
) -> BTreeMap<CardId, Card>
where
    R: Rng + ?Sized,
    F: Fn(&Card) -> bool,
    P: Fn(&Card) -> Priority,
{
    let mut picked = BTreeMap::new();
    for tier in Priority::TIERS {
        let remaining = count.saturating_sub(picked.len());
        if remaining == 0 {
            break;
        }
        let candidates: Vec<&CardId> = deck
            .iter()
            .filter(|&(_, card)| eligible(card) && priority(card) == tier)
            .map(|(card_id, _)| card_id)
            .collect();
        for card_id in sample_ids(&candidates, remaining, rng) {
            if let Some(card) = deck.get(&card_id) {
                picked.insert(card_id, card.clone());
            }
        }
    }
    picked
}

pub fn offense_choices<R: Rng + ?Sized>(deck: &Deck, count: usize, rng: &mut R) -> BTreeMap<CardId, Card> {
    pick_tiered(
        deck,
        count,
        |card| card.offense && !card.is_recharging(),
        |card| card.ai_offense_priority,
        rng,
    )
}

/// 某一方需要防守的战线：对方最近一次进攻选择的目标，以及已有对方卡牌驻扎的战区。
pub fn threatened_fronts(state: &GameState, side: Side) -> Vec<Front> {
    let enemy = side.opponent();
    let mut fronts = Vec::new();
    let mut add = |front: Front| {
        if !fronts.contains(&front) {
            fronts.push(front);
        }
    };

    if let Some(offense) = state.offense_card_choices() {
        offense.cards(enemy).values().filter_map(Front::of).for_each(&mut add);
    }
    if !state.zones.ship(side).cards(enemy).is_empty() {
        add(Front::Space);
    }
    if !state.zones.planet.cards(enemy).is_empty() {
        add(Front::Planet);
    }
    fronts
}

fn defenders<R: Rng + ?Sized>(deck: &Deck, front: Front, count: usize, rng: &mut R) -> BTreeMap<CardId, Card> {
    pick_tiered(
        deck,
        count,
        |card| card.defense && front.covers(card) && !card.is_recharging(),
        |card| card.ai_defense_priority,
        rng,
    )
}

/// 一方本回合可用的防守候选。两条战线都受威胁时各取一张，其中一条没有可用卡牌时把全部名额给另一条；
/// 另外总会尝试附带一张不在充能中的发展牌。
pub fn defense_candidates<R: Rng + ?Sized>(
    state: &GameState,
    side: Side,
    rng: &mut R,
) -> BTreeMap<CardId, Card> {
    let deck = state.deck(side);
    let budget = state.config.defense_budget;
    let fronts = threatened_fronts(state, side);

    let mut candidates = match fronts.as_slice() {
        [] => BTreeMap::new(),
        [front] => defenders(deck, *front, budget, rng),
        _ => {
            let space = defenders(deck, Front::Space, 1, rng);
            if space.is_empty() {
                defenders(deck, Front::Planet, budget, rng)
            } else {
                let planet = defenders(deck, Front::Planet, 1, rng);
                if planet.is_empty() {
                    defenders(deck, Front::Space, budget, rng)
                } else {
                    space.into_iter().chain(planet).collect()
                }
            }
        }
    };

    let development = pick_tiered(
        deck,
        1,
        |card| card.development && !card.is_recharging(),
        |card| card.ai_defense_priority,
        rng,
    );
    candidates.extend(development);
    candidates
}

/// 对手的进攻选择：至多一张。
pub fn pick_ai_offense<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> BTreeMap<CardId, Card> {
    offense_choices(&state.ai_deck, 1, rng)
}

/// 对手的防守选择：从自己的防守候选中按优先级挑出一张。
pub fn pick_ai_defense<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> BTreeMap<CardId, Card> {
    let candidates = defense_candidates(state, Side::Ai, rng);
    pick_tiered(&candidates, 1, |_| true, |card| card.ai_defense_priority, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::{PlayPhase, PlayedCard};
    use crate::game::rng::seeded;
    use crate::game::state::{CardChoices, TurnPhase};

    fn card(strength: i32, build: impl FnOnce(&mut Card)) -> Card {
        let mut card = Card::new("Test", strength);
        build(&mut card);
        card
    }

    fn space_defender() -> Card {
        card(2, |c| {
            c.defense = true;
            c.space = true;
        })
    }

    fn planet_defender() -> Card {
        card(2, |c| {
            c.defense = true;
            c.planet = true;
        })
    }

    fn under_attack(player_offense: &[(&str, Card)]) -> GameState {
        let mut state = GameState::new();
        let offense = CardChoices::for_player(
            player_offense
                .iter()
                .map(|(id, card)| (id.to_string(), card.clone()))
                .collect(),
        );
        state.phase = TurnPhase::AwaitingDefense {
            offense,
            defense: CardChoices::default(),
        };
        state
    }

    #[test]
    fn offense_prefers_high_priority_and_skips_recharging() {
        let mut deck = Deck::new();
        deck.insert("ace".into(), card(3, |c| {
            c.offense = true;
            c.ai_offense_priority = Priority::High;
        }));
        deck.insert("plain".into(), card(2, |c| c.offense = true));
        deck.insert("tired".into(), card(5, |c| {
            c.offense = true;
            c.ai_offense_priority = Priority::High;
            c.recharging = 1;
        }));

        for seed in 0..20 {
            let picked = offense_choices(&deck, 1, &mut seeded(seed));
            assert_eq!(picked.keys().collect::<Vec<_>>(), vec!["ace"]);
        }
        let both = offense_choices(&deck, 2, &mut seeded(3));
        assert!(both.contains_key("ace") && both.contains_key("plain"));
    }

    #[test]
    fn low_priority_is_only_a_fallback() {
        let mut deck = Deck::new();
        deck.insert("reserve".into(), card(1, |c| {
            c.offense = true;
            c.ai_offense_priority = Priority::Low;
        }));
        deck.insert("regular".into(), card(1, |c| c.offense = true));

        let picked = offense_choices(&deck, 1, &mut seeded(11));
        assert!(picked.contains_key("regular"));
        assert_eq!(offense_choices(&deck, 5, &mut seeded(11)).len(), 2);
    }

    #[test]
    fn no_threat_means_no_defense_except_developments() {
        let mut state = under_attack(&[]);
        state.ai_deck.insert("wall".into(), space_defender());
        assert!(defense_candidates(&state, Side::Ai, &mut seeded(1)).is_empty());

        state.ai_deck.insert("upgrade".into(), card(0, |c| c.development = true));
        let picked = defense_candidates(&state, Side::Ai, &mut seeded(1));
        assert_eq!(picked.keys().collect::<Vec<_>>(), vec!["upgrade"]);
    }

    #[test]
    fn single_front_gets_the_whole_budget() {
        let mut state = under_attack(&[("raider", card(2, |c| c.space = true))]);
        state.ai_deck.insert("wallA".into(), space_defender());
        state.ai_deck.insert("wallB".into(), space_defender());
        state.ai_deck.insert("wallC".into(), space_defender());
        state.ai_deck.insert("trench".into(), planet_defender());

        let picked = defense_candidates(&state, Side::Ai, &mut seeded(5));
        assert_eq!(picked.len(), 2);
        assert!(!picked.contains_key("trench"));
    }

    #[test]
    fn two_fronts_take_one_each() {
        let mut state = under_attack(&[("raider", card(2, |c| c.space = true))]);
        let lander = PlayedCard::new("lander", 1, card(2, |c| c.planet = true), 1, PlayPhase::Offense);
        state.zones.planet.player_cards.push(lander);
        state.ai_deck.insert("wallA".into(), space_defender());
        state.ai_deck.insert("wallB".into(), space_defender());
        state.ai_deck.insert("trench".into(), planet_defender());

        assert_eq!(threatened_fronts(&state, Side::Ai), vec![Front::Space, Front::Planet]);
        let picked = defense_candidates(&state, Side::Ai, &mut seeded(8));
        assert_eq!(picked.len(), 2);
        assert!(picked.contains_key("trench"));
    }

    #[test]
    fn empty_front_hands_its_budget_to_the_other() {
        let mut state = under_attack(&[
            ("raider", card(2, |c| c.space = true)),
            ("lander", card(2, |c| c.planet = true)),
        ]);
        state.ai_deck.insert("trenchA".into(), planet_defender());
        state.ai_deck.insert("trenchB".into(), planet_defender());
        state.ai_deck.insert("trenchC".into(), planet_defender());

        let picked = defense_candidates(&state, Side::Ai, &mut seeded(2));
        assert_eq!(picked.len(), 2);
        assert!(picked.keys().all(|id| id.starts_with("trench")));
    }

    #[test]
    fn ai_defends_with_a_single_card() {
        let mut state = under_attack(&[("raider", card(2, |c| c.space = true))]);
        state.ai_deck.insert("wallA".into(), space_defender());
        state.ai_deck.insert("wallB".into(), space_defender());

        let picked = pick_ai_defense(&state, &mut seeded(4));
        assert_eq!(picked.len(), 1);
        assert!(pick_ai_offense(&state, &mut seeded(4)).is_empty());
    }
}
