use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog::{BalanceSet, CatalogError, EffectGrant, TargetKind};
use super::effects;
use super::state::{
    CardId, DamageSource, MatchEvent, MatchOutcome, MatchPhase, MatchState, PlayerId, SkillId,
    StatusEffect, TurnPhase,
};

/// Validation rejections and per-request faults.
///
/// Rejections are expected outcomes carried as values: callers treat them as
/// normal control flow and no state is mutated on the rejected path.
/// `Catalog` wraps a data-integrity fault that aborts the single operation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RulesError {
    #[error("match '{match_id}' not found")]
    MatchNotFound { match_id: String },
    #[error("match '{match_id}' already exists")]
    MatchAlreadyExists { match_id: String },
    #[error("player '{player_id}' not found")]
    PlayerNotFound { player_id: PlayerId },
    #[error("the match is already finished")]
    MatchFinished,
    #[error("expected match phase {expected:?}, found {actual:?}")]
    InvalidMatchPhase {
        expected: MatchPhase,
        actual: MatchPhase,
    },
    #[error("expected turn phase {expected:?}, found {actual:?}")]
    InvalidTurnPhase {
        expected: TurnPhase,
        actual: TurnPhase,
    },
    #[error("it is not the turn of player '{player_id}'")]
    NotYourTurn { player_id: PlayerId },
    #[error("no actions remaining this turn")]
    NoActionsRemaining,
    #[error("card '{card_id}' is not in hand")]
    CardNotInHand { card_id: CardId },
    #[error("skill '{skill_id}' does not belong to this character")]
    SkillNotOwned { skill_id: SkillId },
    #[error("skill '{skill_id}' is on cooldown for {remaining} more turns")]
    SkillOnCooldown { skill_id: SkillId, remaining: u32 },
    #[error("no valid target for this action")]
    NoValidTarget,
    #[error("player '{player_id}' is not ready")]
    PlayerNotReady { player_id: PlayerId },
    #[error("player '{player_id}' has not selected a character")]
    CharacterNotSelected { player_id: PlayerId },
    #[error("player '{player_id}' appears more than once in the roster")]
    DuplicatePlayer { player_id: PlayerId },
    #[error("cannot start a match with an empty roster")]
    EmptyRoster,
    #[error("catalog fault: {message}")]
    Catalog { message: String },
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl From<CatalogError> for RulesError {
    fn from(error: CatalogError) -> Self {
        RulesError::Catalog {
            message: error.to_string(),
        }
    }
}

/// The validation ladder every player-initiated action runs first. Nothing
/// is mutated when any rung fails.
fn ensure_can_act(state: &MatchState, player_id: &str) -> Result<(), RulesError> {
    if state.is_finished() {
        return Err(RulesError::MatchFinished);
    }
    if state.phase != MatchPhase::Playing {
        return Err(RulesError::InvalidMatchPhase {
            expected: MatchPhase::Playing,
            actual: state.phase,
        });
    }
    if state.player(player_id).is_none() {
        return Err(RulesError::PlayerNotFound {
            player_id: player_id.to_string(),
        });
    }
    if state.current_player_id().map(String::as_str) != Some(player_id) {
        warn!("rejected action: not the turn of {player_id}");
        return Err(RulesError::NotYourTurn {
            player_id: player_id.to_string(),
        });
    }
    if state.turn_phase != TurnPhase::Main {
        return Err(RulesError::InvalidTurnPhase {
            expected: TurnPhase::Main,
            actual: state.turn_phase,
        });
    }
    if state.actions_remaining == 0 {
        return Err(RulesError::NoActionsRemaining);
    }
    Ok(())
}

/// Resolves a target set for `actor_id`.
///
/// `self` is the actor; `single` the first living opponent in roster order
/// unless one is supplied; `all`/`area` every living opponent.
fn resolve_targets(
    state: &MatchState,
    actor_id: &str,
    kind: TargetKind,
    supplied: Option<&str>,
) -> Result<Vec<PlayerId>, RulesError> {
    match kind {
        TargetKind::SelfTarget => Ok(vec![actor_id.to_string()]),
        TargetKind::Single => {
            if let Some(target_id) = supplied {
                let alive = state
                    .player(target_id)
                    .map(|player| player.is_alive())
                    .unwrap_or(false);
                if !alive {
                    return Err(RulesError::NoValidTarget);
                }
                Ok(vec![target_id.to_string()])
            } else {
                state
                    .living_opponents(actor_id)
                    .into_iter()
                    .next()
                    .map(|target| vec![target])
                    .ok_or(RulesError::NoValidTarget)
            }
        }
        TargetKind::All | TargetKind::Area => {
            let targets = state.living_opponents(actor_id);
            if targets.is_empty() {
                return Err(RulesError::NoValidTarget);
            }
            Ok(targets)
        }
    }
}

/// Shared damage primitive.
///
/// Counter reflection is computed on the pre-shield amount, the shield pool
/// absorbs before hit points, and a positive reflection (minimum 1) is
/// applied back onto the immediate attacker exactly once: the reflected hit
/// re-enters with `allow_reflect == false`, so mutual counters cannot loop.
/// Eliminations trigger the match-termination evaluation.
pub(crate) fn apply_damage(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
    target_id: &str,
    amount: i32,
    source: DamageSource,
    attacker_id: Option<&str>,
    allow_reflect: bool,
    events: &mut Vec<MatchEvent>,
) {
    if amount <= 0 {
        return;
    }

    let reflecting_attacker = attacker_id.filter(|attacker| {
        allow_reflect
            && *attacker != target_id
            && state
                .player(attacker)
                .map(|player| player.is_alive())
                .unwrap_or(false)
    });
    let reflected_raw = match (reflecting_attacker, state.player(target_id)) {
        (Some(_), Some(defender)) => {
            effects::resolve_counter(defender, balance, amount, rng, events)
        }
        _ => 0,
    };

    let Some(target) = state.player_mut(target_id) else {
        return;
    };
    if !target.is_alive() {
        return;
    }

    let shield_absorbed = target.shield.min(amount);
    target.shield -= shield_absorbed;
    let hp_damage = amount - shield_absorbed;
    target.hp = (target.hp - hp_damage).max(0);
    let eliminated = target.hp == 0;

    let reflected = if reflected_raw > 0 { reflected_raw.max(1) } else { 0 };
    events.push(MatchEvent::DamageResolved {
        target_id: target_id.to_string(),
        source,
        attacker_id: attacker_id.map(str::to_string),
        amount,
        shield_absorbed,
        hp_damage,
        reflected,
    });

    if let (Some(attacker), true) = (reflecting_attacker, reflected > 0) {
        let attacker = attacker.to_string();
        apply_damage(
            state,
            balance,
            rng,
            &attacker,
            reflected,
            DamageSource::Counter,
            None,
            false,
            events,
        );
    }

    if eliminated {
        events.push(MatchEvent::PlayerEliminated {
            player_id: target_id.to_string(),
        });
        effects::clear_persistent_effects(state, events);
        evaluate_termination(state, events);
    }
}

/// One living player remaining wins the match; none is a draw; more than
/// one and play continues.
fn evaluate_termination(state: &mut MatchState, events: &mut Vec<MatchEvent>) {
    if state.is_finished() {
        return;
    }
    let mut living = state.living_players().map(|player| player.id.clone());
    let outcome = match (living.next(), living.next()) {
        (Some(winner), None) => MatchOutcome::Winner { player_id: winner },
        (None, _) => MatchOutcome::Draw,
        _ => return,
    };
    drop(living);
    events.push(MatchEvent::MatchEnded {
        outcome: outcome.clone(),
    });
    state.declare_outcome(outcome);
}

/// Applies the damage/heal/shield/effect payload shared by skills and
/// cards. Heal and shield always land on the actor; damage and granted
/// effects follow the target set.
#[allow(clippy::too_many_arguments)]
fn resolve_payload(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
    actor_id: &str,
    damage: i32,
    heal: i32,
    shield: i32,
    grants: &[EffectGrant],
    targets: &[PlayerId],
    source: DamageSource,
    events: &mut Vec<MatchEvent>,
) {
    if damage > 0 {
        for target_id in targets {
            if state.is_finished() {
                break;
            }
            apply_damage(
                state,
                balance,
                rng,
                target_id,
                damage,
                source,
                Some(actor_id),
                true,
                events,
            );
        }
    }

    // An actor eliminated by their own payload (counter reflection) stays
    // eliminated; heal and shield only land on the living.
    if heal > 0 {
        if let Some(actor) = state.player_mut(actor_id).filter(|actor| actor.is_alive()) {
            let healed = heal.min(actor.max_hp - actor.hp);
            if healed > 0 {
                actor.hp += healed;
                events.push(MatchEvent::Healed {
                    player_id: actor_id.to_string(),
                    amount: healed,
                });
            }
        }
    }

    if shield > 0 {
        if let Some(actor) = state.player_mut(actor_id).filter(|actor| actor.is_alive()) {
            actor.shield += shield;
            events.push(MatchEvent::ShieldGained {
                player_id: actor_id.to_string(),
                amount: shield,
            });
        }
    }

    for grant in grants {
        for target_id in targets {
            let Some(target) = state.player_mut(target_id) else {
                continue;
            };
            if !target.is_alive() {
                continue;
            }
            let mut effect = StatusEffect::new(grant.kind, grant.duration);
            effect.value = grant.value;
            target.effects.push(effect.clone());
            events.push(MatchEvent::EffectApplied {
                player_id: target_id.to_string(),
                effect,
            });
        }
    }
}

/// Basic attack: damage equals the attacker character's base attack stat.
pub fn perform_attack(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
    attacker_id: &str,
    target_id: &str,
) -> Result<Vec<MatchEvent>, RulesError> {
    ensure_can_act(state, attacker_id)?;
    if target_id == attacker_id {
        return Err(RulesError::NoValidTarget);
    }
    let targets = resolve_targets(state, attacker_id, TargetKind::Single, Some(target_id))?;

    let character_id = state
        .player(attacker_id)
        .map(|player| player.character_id.clone())
        .expect("acting player was validated");
    let damage = balance.character(&character_id)?.attack;

    let mut events = vec![MatchEvent::AttackPerformed {
        attacker_id: attacker_id.to_string(),
        target_id: target_id.to_string(),
        damage,
    }];
    apply_damage(
        state,
        balance,
        rng,
        &targets[0],
        damage,
        DamageSource::Attack,
        Some(attacker_id),
        true,
        &mut events,
    );

    state.actions_remaining = state.actions_remaining.saturating_sub(1);
    Ok(events)
}

/// Uses a character skill, honoring ownership and cooldown gating.
pub fn use_skill(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
    player_id: &str,
    skill_id: &str,
    target_id: Option<&str>,
) -> Result<Vec<MatchEvent>, RulesError> {
    ensure_can_act(state, player_id)?;

    let character_id = state
        .player(player_id)
        .map(|player| player.character_id.clone())
        .expect("acting player was validated");
    let character = balance.character(&character_id)?;

    // Unknown skill ids from the wire are rejections, not catalog faults.
    let skill = balance
        .skill(skill_id)
        .map_err(|_| RulesError::SkillNotOwned {
            skill_id: skill_id.to_string(),
        })?;
    if skill.character_id != character.id || !character.skills.iter().any(|id| id == skill_id) {
        return Err(RulesError::SkillNotOwned {
            skill_id: skill_id.to_string(),
        });
    }

    let on_cooldown = state
        .player(player_id)
        .and_then(|player| player.cooldowns.get(skill_id))
        .copied()
        .filter(|remaining| *remaining > 0);
    if let Some(remaining) = on_cooldown {
        return Err(RulesError::SkillOnCooldown {
            skill_id: skill_id.to_string(),
            remaining,
        });
    }

    let targets = resolve_targets(state, player_id, skill.target, target_id)?;

    let mut events = vec![MatchEvent::SkillUsed {
        player_id: player_id.to_string(),
        skill_id: skill_id.to_string(),
        target_id: target_id.map(str::to_string),
    }];
    resolve_payload(
        state,
        balance,
        rng,
        player_id,
        skill.damage,
        skill.heal,
        skill.shield,
        &skill.effects,
        &targets,
        DamageSource::Skill,
        &mut events,
    );

    if skill.cooldown > 0 {
        if let Some(player) = state.player_mut(player_id) {
            player
                .cooldowns
                .insert(skill_id.to_string(), skill.cooldown);
        }
    }

    state.actions_remaining = state.actions_remaining.saturating_sub(1);
    Ok(events)
}

/// Plays a card from hand. Dice-damage cards roll one d6 per living player
/// and deal the count of rolls above 3 as flat damage to every living
/// opponent; all other cards resolve their payload like skills. The card
/// always moves from hand to the shared discard pile.
pub fn play_card(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
    player_id: &str,
    card_id: &str,
    target_id: Option<&str>,
) -> Result<Vec<MatchEvent>, RulesError> {
    ensure_can_act(state, player_id)?;

    let hand_index = state
        .player(player_id)
        .and_then(|player| player.find_card_in_hand_index(card_id))
        .ok_or_else(|| RulesError::CardNotInHand {
            card_id: card_id.to_string(),
        })?;

    // The card came out of the catalog-built deck; a missing record is a
    // data-integrity fault, not player error.
    let card = balance.card(card_id)?;
    let targets = resolve_targets(state, player_id, card.target, target_id)?;

    let mut events = vec![MatchEvent::CardPlayed {
        player_id: player_id.to_string(),
        card_id: card_id.to_string(),
        target_id: target_id.map(str::to_string),
    }];

    if card.dice_damage {
        let living: Vec<PlayerId> = state
            .living_players()
            .map(|player| player.id.clone())
            .collect();
        let mut hits = 0;
        for roller in &living {
            let roll = rng.gen_range(1..=6u8);
            events.push(MatchEvent::DiceRolled {
                player_id: roller.clone(),
                roll,
            });
            if roll > 3 {
                hits += 1;
            }
        }
        for target in &targets {
            if state.is_finished() {
                break;
            }
            apply_damage(
                state,
                balance,
                rng,
                target,
                hits,
                DamageSource::Card,
                Some(player_id),
                true,
                &mut events,
            );
        }
    } else {
        resolve_payload(
            state,
            balance,
            rng,
            player_id,
            card.damage,
            card.heal,
            card.shield,
            &card.effects,
            &targets,
            DamageSource::Card,
            &mut events,
        );
    }

    if let Some(player) = state.player_mut(player_id) {
        let played = player.hand.remove(hand_index);
        state.shared_discard.push(played);
    }

    state.actions_remaining = state.actions_remaining.saturating_sub(1);
    Ok(events)
}
