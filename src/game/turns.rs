use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use super::actions::{apply_damage, RulesError};
use super::catalog::BalanceSet;
use super::deck;
use super::effects;
use super::state::{
    CharacterId, DamageSource, MatchEvent, MatchPhase, MatchState, PlayerId, SetupMode,
    TurnPhase,
};

/// Roster entry handed over by the lobby when a match is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterId>,
    #[serde(default)]
    pub ready: bool,
}

/// Validates the lobby roster, assigns characters, fixes the turn order,
/// builds and shuffles the shared deck, deals opening hands and moves the
/// match into `Playing` with the first player's turn in `Start`.
pub fn setup_match(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
) -> Result<Vec<MatchEvent>, RulesError> {
    if state.phase != MatchPhase::Lobby {
        return Err(RulesError::InvalidMatchPhase {
            expected: MatchPhase::Lobby,
            actual: state.phase,
        });
    }
    if state.players.is_empty() {
        return Err(RulesError::EmptyRoster);
    }

    for player in &state.players {
        if !player.ready {
            return Err(RulesError::PlayerNotReady {
                player_id: player.id.clone(),
            });
        }
        if state.setup_mode == SetupMode::Select && player.character_id.is_empty() {
            return Err(RulesError::CharacterNotSelected {
                player_id: player.id.clone(),
            });
        }
        if !player.character_id.is_empty() {
            balance.character(&player.character_id)?;
        }
    }

    state.phase = MatchPhase::Setup;

    if state.setup_mode == SetupMode::Random {
        assign_random_characters(state, balance, rng);
    }

    // Stats come from the catalog once characters are settled.
    for index in 0..state.players.len() {
        let character_id = state.players[index].character_id.clone();
        let character = balance.character(&character_id)?;
        let player = &mut state.players[index];
        player.max_hp = character.max_hp;
        player.hp = character.max_hp;
        player.shield = 0;
        player.hand.clear();
        player.effects.clear();
        player.cooldowns.clear();
    }

    // Fastest character first; the stable sort keeps lobby-join order on
    // speed ties.
    let mut order: Vec<(PlayerId, i32)> = Vec::with_capacity(state.players.len());
    for player in &state.players {
        let speed = balance.character(&player.character_id)?.speed;
        order.push((player.id.clone(), speed));
    }
    order.sort_by_key(|(_, speed)| Reverse(*speed));
    state.turn_order = order.into_iter().map(|(id, _)| id).collect();

    deck::build_shared_deck(state, balance, rng)?;

    let mut events = vec![MatchEvent::MatchStarted {
        turn_order: state.turn_order.clone(),
    }];
    for player_id in state.turn_order.clone() {
        deck::draw(
            state,
            balance,
            rng,
            &player_id,
            balance.rules.starting_hand,
            &mut events,
        );
    }

    state.phase = MatchPhase::Playing;
    state.current_player_index = 0;
    state.current_round = 1;
    state.turn_phase = TurnPhase::Start;
    state.actions_per_turn = balance.rules.actions_per_turn;
    state.actions_remaining = 0;
    debug!(
        "match {} started with order {:?}",
        state.match_id, state.turn_order
    );

    Ok(events)
}

/// Assigns characters to players that have none: uniformly at random from
/// the unused pool without replacement, then with replacement once the
/// roster outnumbers the cast.
fn assign_random_characters(state: &mut MatchState, balance: &BalanceSet, rng: &mut impl Rng) {
    let mut all: Vec<CharacterId> = balance.characters.keys().cloned().collect();
    all.sort();
    let mut unused: Vec<CharacterId> = all
        .iter()
        .filter(|id| !state.players.iter().any(|player| &player.character_id == *id))
        .cloned()
        .collect();

    for player in &mut state.players {
        if !player.character_id.is_empty() {
            continue;
        }
        player.character_id = if unused.is_empty() {
            all[rng.gen_range(0..all.len())].clone()
        } else {
            unused.remove(rng.gen_range(0..unused.len()))
        };
    }
}

/// Runs the start phase for the current player: start-of-turn effect
/// resolution, effect-driven discards, the per-turn draw and the action
/// budget, then hands over to `Main`.
pub fn start_turn(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
) -> Result<Vec<MatchEvent>, RulesError> {
    ensure_turn_phase(state, TurnPhase::Start)?;
    let player_id = current_player(state)?;

    let mut events = vec![MatchEvent::TurnStarted {
        player_id: player_id.clone(),
        round: state.current_round,
    }];

    // A restored snapshot may name players in `turn_order` that are not in
    // the roster; that is a rejection, not a panic.
    let upkeep = match state.player(&player_id) {
        Some(player) => effects::evaluate_start_of_turn(player, balance),
        None => return Err(RulesError::PlayerNotFound { player_id }),
    };

    if upkeep.damage > 0 {
        apply_damage(
            state,
            balance,
            rng,
            &player_id,
            upkeep.damage,
            DamageSource::Effect,
            None,
            false,
            &mut events,
        );
        if state.is_finished() {
            return Ok(events);
        }
        if !state.player(&player_id).map(|p| p.is_alive()).unwrap_or(false) {
            // Upkeep killed the player but the match goes on; their turn is
            // forfeited and the next player is queued up.
            advance_current(state, &mut events);
            return Ok(events);
        }
    }

    for _ in 0..upkeep.cards_to_discard {
        let hand_len = state
            .player(&player_id)
            .map(|player| player.hand.len())
            .unwrap_or(0);
        if hand_len == 0 {
            break;
        }
        let index = rng.gen_range(0..hand_len);
        deck::discard_from_hand(state, &player_id, index, &mut events);
    }

    deck::draw(
        state,
        balance,
        rng,
        &player_id,
        balance.rules.cards_per_turn,
        &mut events,
    );

    state.actions_remaining = balance
        .rules
        .actions_per_turn
        .saturating_sub(upkeep.actions_reduced);
    state.turn_phase = TurnPhase::Main;

    Ok(events)
}

/// Ends the current player's turn: end-of-turn hook, effect/cooldown decay,
/// then advance to the next living player (incrementing the round on wrap)
/// and leave them in `Start`.
pub fn end_turn(
    state: &mut MatchState,
    balance: &BalanceSet,
) -> Result<Vec<MatchEvent>, RulesError> {
    ensure_turn_phase(state, TurnPhase::Main)?;
    let player_id = current_player(state)?;

    state.turn_phase = TurnPhase::End;
    let mut events = Vec::new();

    // Reserved hook: nothing ticks at end of turn yet.
    if let Some(player) = state.player(&player_id) {
        let _ = effects::evaluate_end_of_turn(player, balance);
    }

    if let Some(player) = state.player_mut(&player_id) {
        events.extend(effects::decay_effects(player, balance));
    }

    events.push(MatchEvent::TurnEnded {
        player_id: player_id.clone(),
    });

    advance_current(state, &mut events);
    Ok(events)
}

fn ensure_turn_phase(state: &MatchState, expected: TurnPhase) -> Result<(), RulesError> {
    if state.is_finished() {
        return Err(RulesError::MatchFinished);
    }
    if state.phase != MatchPhase::Playing {
        return Err(RulesError::InvalidMatchPhase {
            expected: MatchPhase::Playing,
            actual: state.phase,
        });
    }
    if state.turn_phase != expected {
        return Err(RulesError::InvalidTurnPhase {
            expected,
            actual: state.turn_phase,
        });
    }
    Ok(())
}

fn current_player(state: &MatchState) -> Result<PlayerId, RulesError> {
    state
        .current_player_id()
        .cloned()
        .ok_or(RulesError::MatchFinished)
}

/// Advances `current_player_index` to the next living player, skipping the
/// eliminated; the round counter increments whenever the index wraps.
fn advance_current(state: &mut MatchState, events: &mut Vec<MatchEvent>) {
    let len = state.turn_order.len();
    for _ in 0..len {
        state.current_player_index = (state.current_player_index + 1) % len;
        if state.current_player_index == 0 {
            state.current_round += 1;
            events.push(MatchEvent::RoundAdvanced {
                round: state.current_round,
            });
        }
        let alive = state
            .current_player_id()
            .and_then(|id| state.player(id))
            .map(|player| player.is_alive())
            .unwrap_or(false);
        if alive {
            break;
        }
    }
    state.turn_phase = TurnPhase::Start;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::Catalog;
    use crate::game::state::{EffectKind, PlayerState, StatusEffect};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn lobby_player(id: &str, character: &str) -> PlayerState {
        PlayerState {
            id: id.into(),
            display_name: id.to_uppercase(),
            character_id: character.into(),
            hp: 0,
            max_hp: 0,
            shield: 0,
            hand: Vec::new(),
            effects: Vec::new(),
            cooldowns: BTreeMap::new(),
            ready: true,
        }
    }

    fn lobby_state(players: Vec<PlayerState>) -> MatchState {
        let mut state = MatchState::new("m1", "1");
        state.players = players;
        state
    }

    #[test]
    fn turn_order_is_speed_descending_with_stable_ties() {
        // guerrero speed 3, maga speed 5, clerigo speed 4: join order
        // [A, B, C] must become [B, C, A].
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().unwrap();
        let mut state = lobby_state(vec![
            lobby_player("a", "guerrero"),
            lobby_player("b", "maga"),
            lobby_player("c", "clerigo"),
        ]);
        let mut rng = SmallRng::seed_from_u64(1);

        setup_match(&mut state, balance, &mut rng).expect("setup should succeed");

        assert_eq!(
            state.turn_order,
            vec!["b".to_string(), "c".to_string(), "a".to_string()]
        );
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.turn_phase, TurnPhase::Start);
        assert_eq!(state.current_round, 1);
    }

    #[test]
    fn setup_deals_the_starting_hand_in_turn_order() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().unwrap();
        let mut state = lobby_state(vec![
            lobby_player("a", "guerrero"),
            lobby_player("b", "maga"),
        ]);
        let mut rng = SmallRng::seed_from_u64(1);

        let events = setup_match(&mut state, balance, &mut rng).expect("setup should succeed");

        let starting = balance.rules.starting_hand as usize;
        for player in &state.players {
            assert_eq!(player.hand.len(), starting);
            assert_eq!(player.hp, player.max_hp);
        }
        // Deck composition: guerrero 5 + maga 5 cards, minus the deal.
        assert_eq!(state.shared_draw.len(), 10 - 2 * starting);
        assert!(matches!(events[0], MatchEvent::MatchStarted { .. }));
    }

    #[test]
    fn setup_rejects_unready_and_unselected_players() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        let mut unready = lobby_state(vec![lobby_player("a", "guerrero")]);
        unready.players[0].ready = false;
        let error = setup_match(&mut unready, balance, &mut rng)
            .expect_err("unready player should be rejected");
        assert_eq!(error, RulesError::PlayerNotReady { player_id: "a".into() });

        let mut unselected = lobby_state(vec![lobby_player("a", "")]);
        let error = setup_match(&mut unselected, balance, &mut rng)
            .expect_err("select mode requires a chosen character");
        assert_eq!(
            error,
            RulesError::CharacterNotSelected { player_id: "a".into() }
        );
    }

    #[test]
    fn random_mode_assigns_unused_characters_without_duplicates() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().unwrap();
        let mut state = lobby_state(vec![
            lobby_player("a", ""),
            lobby_player("b", ""),
            lobby_player("c", ""),
            lobby_player("d", ""),
        ]);
        state.setup_mode = SetupMode::Random;
        let mut rng = SmallRng::seed_from_u64(9);

        setup_match(&mut state, balance, &mut rng).expect("setup should succeed");

        let mut assigned: Vec<_> = state
            .players
            .iter()
            .map(|player| player.character_id.clone())
            .collect();
        assigned.sort();
        assigned.dedup();
        assert_eq!(assigned.len(), 4, "four players, four distinct characters");
    }

    fn started_match(players: Vec<PlayerState>) -> (MatchState, Catalog, SmallRng) {
        let catalog = Catalog::default_ruleset();
        let mut state = lobby_state(players);
        let mut rng = SmallRng::seed_from_u64(5);
        setup_match(&mut state, catalog.active().unwrap(), &mut rng)
            .expect("setup should succeed");
        (state, catalog, rng)
    }

    #[test]
    fn start_turn_applies_burn_damage_and_discards_then_enters_main() {
        let (mut state, catalog, mut rng) = started_match(vec![
            lobby_player("a", "maga"),
            lobby_player("b", "guerrero"),
        ]);
        let balance = catalog.active().unwrap();

        let current = state.current_player_id().unwrap().clone();
        let hand_before = state.player(&current).unwrap().hand.len();
        state
            .player_mut(&current)
            .unwrap()
            .effects
            .push(StatusEffect::new(EffectKind::Burn, 2));

        let events = start_turn(&mut state, balance, &mut rng).expect("start should succeed");

        let player = state.player(&current).unwrap();
        assert_eq!(player.max_hp - player.hp, 2, "burn ticks for 2");
        // One burn discard, one per-turn draw.
        assert_eq!(player.hand.len(), hand_before);
        assert!(events
            .iter()
            .any(|event| matches!(event, MatchEvent::CardDiscarded { .. })));
        assert_eq!(state.turn_phase, TurnPhase::Main);
        assert_eq!(state.actions_remaining, balance.rules.actions_per_turn);
    }

    #[test]
    fn start_turn_shrinks_the_budget_under_paralysis() {
        let (mut state, catalog, mut rng) = started_match(vec![
            lobby_player("a", "maga"),
            lobby_player("b", "guerrero"),
        ]);
        let balance = catalog.active().unwrap();
        let current = state.current_player_id().unwrap().clone();
        state
            .player_mut(&current)
            .unwrap()
            .effects
            .push(StatusEffect::new(EffectKind::Paralysis, 1));

        start_turn(&mut state, balance, &mut rng).expect("start should succeed");

        assert_eq!(
            state.actions_remaining,
            balance.rules.actions_per_turn - 1
        );
    }

    #[test]
    fn end_turn_decays_effects_and_advances_with_round_wrap() {
        let (mut state, catalog, mut rng) = started_match(vec![
            lobby_player("a", "maga"),
            lobby_player("b", "guerrero"),
        ]);
        let balance = catalog.active().unwrap();

        // maga is faster, so order is [a, b].
        start_turn(&mut state, balance, &mut rng).expect("start a");
        state.player_mut("a").unwrap().effects.extend([
            StatusEffect::new(EffectKind::Burn, 1),
            StatusEffect::new(EffectKind::Paralysis, 3),
        ]);

        end_turn(&mut state, balance).expect("end a");

        let alice = state.player("a").unwrap();
        assert!(!alice.has_effect(EffectKind::Burn), "duration 1 expires");
        assert_eq!(alice.effects[0].remaining_turns, 2, "duration 3 becomes 2");
        assert_eq!(state.current_player_id().unwrap(), "b");
        assert_eq!(state.current_round, 1);

        start_turn(&mut state, balance, &mut rng).expect("start b");
        let events = end_turn(&mut state, balance).expect("end b");

        assert_eq!(state.current_player_id().unwrap(), "a");
        assert_eq!(state.current_round, 2, "full cycle bumps the round");
        assert!(events
            .iter()
            .any(|event| matches!(event, MatchEvent::RoundAdvanced { round: 2 })));
    }

    #[test]
    fn advance_skips_eliminated_players() {
        let (mut state, catalog, mut rng) = started_match(vec![
            lobby_player("a", "maga"),
            lobby_player("b", "guerrero"),
            lobby_player("c", "clerigo"),
        ]);
        let balance = catalog.active().unwrap();

        // Order is [a (speed 5), c (speed 4), b (speed 3)]; eliminate c.
        state.player_mut("c").unwrap().hp = 0;

        start_turn(&mut state, balance, &mut rng).expect("start a");
        end_turn(&mut state, balance).expect("end a");

        assert_eq!(state.current_player_id().unwrap(), "b", "c is skipped");
    }

    #[test]
    fn start_turn_rejects_a_turn_order_entry_missing_from_the_roster() {
        let catalog = Catalog::default_ruleset();
        let balance = catalog.active().unwrap();
        let mut state = MatchState::new("m1", "1");
        state.phase = MatchPhase::Playing;
        state.turn_phase = TurnPhase::Start;
        state.turn_order = vec!["ghost".into()];
        let mut rng = SmallRng::seed_from_u64(1);

        let error = start_turn(&mut state, balance, &mut rng)
            .expect_err("unknown turn-order entry should be rejected");
        assert_eq!(
            error,
            RulesError::PlayerNotFound {
                player_id: "ghost".into()
            }
        );
    }

    #[test]
    fn actions_are_rejected_outside_the_main_phase() {
        let (mut state, catalog, _rng) = started_match(vec![
            lobby_player("a", "maga"),
            lobby_player("b", "guerrero"),
        ]);
        let balance = catalog.active().unwrap();

        // Still in Start: ending the turn is premature.
        let error = end_turn(&mut state, balance).expect_err("not in main phase");
        assert_eq!(
            error,
            RulesError::InvalidTurnPhase {
                expected: TurnPhase::Main,
                actual: TurnPhase::Start
            }
        );
    }
}
