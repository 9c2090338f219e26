use log::debug;
use rand::Rng;

use super::catalog::BalanceSet;
use super::state::{MatchEvent, MatchState, PlayerState};

/// Aggregated result of scanning a player's status effects at a turn
/// boundary. Pure data; the turn controller applies it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpkeepOutcome {
    pub damage: i32,
    pub actions_reduced: u32,
    pub cards_to_discard: u32,
}

impl UpkeepOutcome {
    pub fn is_empty(&self) -> bool {
        *self == UpkeepOutcome::default()
    }
}

/// Scans active effects against the effect-parameter table and accumulates
/// start-of-turn consequences. Performs no mutation; tags without a catalog
/// entry are ignored.
pub fn evaluate_start_of_turn(player: &PlayerState, balance: &BalanceSet) -> UpkeepOutcome {
    let mut outcome = UpkeepOutcome::default();
    for effect in &player.effects {
        let Some(params) = balance.effect_params(effect.kind) else {
            debug!("no effect params for {:?}, skipping", effect.kind);
            continue;
        };
        if params.per_turn_damage > 0 {
            outcome.damage += effect.value.unwrap_or(params.per_turn_damage);
            outcome.cards_to_discard += params.discard_on_tick;
        }
        outcome.actions_reduced += params.action_penalty;
    }
    outcome
}

/// End-of-turn counterpart of [`evaluate_start_of_turn`]. Currently nothing
/// ticks at end of turn, but the hook stays distinct so new mechanics can be
/// added without touching the turn controller.
pub fn evaluate_end_of_turn(_player: &PlayerState, _balance: &BalanceSet) -> UpkeepOutcome {
    UpkeepOutcome::default()
}

/// Decrements effect durations and skill cooldowns, dropping entries that
/// reach zero. The only place countdown happens; runs exactly once per
/// owning player's turn. Effects the catalog marks non-decaying (and any
/// instance already at `remaining_turns <= 0`) are left alone.
pub fn decay_effects(player: &mut PlayerState, balance: &BalanceSet) -> Vec<MatchEvent> {
    let mut events = Vec::new();

    let mut index = 0;
    while index < player.effects.len() {
        let effect = &mut player.effects[index];
        let decays = balance
            .effect_params(effect.kind)
            .map(|params| params.decays)
            .unwrap_or(true);
        if !decays || effect.remaining_turns <= 0 {
            index += 1;
            continue;
        }

        effect.remaining_turns -= 1;
        if effect.remaining_turns <= 0 {
            let expired = player.effects.remove(index);
            events.push(MatchEvent::EffectExpired {
                player_id: player.id.clone(),
                kind: expired.kind,
            });
        } else {
            index += 1;
        }
    }

    let expired_cooldowns: Vec<_> = player
        .cooldowns
        .iter_mut()
        .filter_map(|(skill_id, remaining)| {
            *remaining = remaining.saturating_sub(1);
            (*remaining == 0).then(|| skill_id.clone())
        })
        .collect();
    for skill_id in expired_cooldowns {
        player.cooldowns.remove(&skill_id);
        events.push(MatchEvent::CooldownExpired {
            player_id: player.id.clone(),
            skill_id,
        });
    }

    events
}

/// Sums the damage reflected by the defender's counter effects.
///
/// Each counter instance is optionally gated on a d6 roll (skipped below the
/// configured threshold) and reflects `floor(incoming * percent / 100)`
/// using the instance value over the catalog default. The caller enforces
/// the minimum of 1 when the sum is positive.
pub fn resolve_counter(
    defender: &PlayerState,
    balance: &BalanceSet,
    incoming: i32,
    rng: &mut impl Rng,
    events: &mut Vec<MatchEvent>,
) -> i32 {
    if incoming <= 0 {
        return 0;
    }

    let mut reflected = 0;
    for effect in &defender.effects {
        if effect.kind != super::state::EffectKind::Counter {
            continue;
        }
        let Some(params) = balance.effect_params(effect.kind) else {
            continue;
        };
        if params.roll_gated {
            let roll = rng.gen_range(1..=6u8);
            events.push(MatchEvent::DiceRolled {
                player_id: defender.id.clone(),
                roll,
            });
            if roll < params.roll_threshold {
                continue;
            }
        }
        let percent = effect
            .value
            .unwrap_or(params.reflect_percent as i32)
            .max(0);
        reflected += incoming * percent / 100;
    }
    reflected
}

/// Clears non-decaying effects from every living player. Invoked on the
/// explicit game event that ends their lifetime: an opponent being
/// eliminated.
pub fn clear_persistent_effects(state: &mut MatchState, events: &mut Vec<MatchEvent>) {
    for player in &mut state.players {
        if !player.is_alive() {
            continue;
        }
        let mut index = 0;
        while index < player.effects.len() {
            if player.effects[index].remaining_turns <= 0 {
                let expired = player.effects.remove(index);
                events.push(MatchEvent::EffectExpired {
                    player_id: player.id.clone(),
                    kind: expired.kind,
                });
            } else {
                index += 1;
            }
        }
    }
}
