use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use super::catalog::{BalanceSet, CatalogError};
use super::state::{CardId, MatchEvent, MatchState};

/// Builds the single shared draw pile from the deck composition of every
/// participating character (card id repeated per configured copies), then
/// shuffles it once.
pub fn build_shared_deck(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
) -> Result<(), CatalogError> {
    let mut pile: Vec<CardId> = Vec::new();
    for player in &state.players {
        let character = balance.character(&player.character_id)?;
        for entry in &character.deck {
            balance.card(&entry.card_id)?;
            for _ in 0..entry.copies {
                pile.push(entry.card_id.clone());
            }
        }
    }
    pile.shuffle(rng);
    state.shared_draw = pile;
    state.shared_discard.clear();
    Ok(())
}

/// Draws up to `count` cards into the player's hand.
///
/// Stops early at the hand cap; recycles the discard pile (with a
/// reshuffle) when the draw pile runs dry; stops silently when both piles
/// are empty. Returns the cards actually drawn.
pub fn draw(
    state: &mut MatchState,
    balance: &BalanceSet,
    rng: &mut impl Rng,
    player_id: &str,
    count: u32,
    events: &mut Vec<MatchEvent>,
) -> Vec<CardId> {
    let max_hand_size = balance.rules.max_hand_size;
    let mut drawn = Vec::new();

    for _ in 0..count {
        let hand_len = match state.player(player_id) {
            Some(player) => player.hand.len(),
            None => return drawn,
        };
        if hand_len >= max_hand_size {
            debug!("draw stopped: hand of {player_id} at cap {max_hand_size}");
            break;
        }

        if state.shared_draw.is_empty() {
            if state.shared_discard.is_empty() {
                break;
            }
            recycle(state, rng, events);
        }

        let Some(card_id) = state.shared_draw.pop() else {
            break;
        };
        if let Some(player) = state.player_mut(player_id) {
            player.hand.push(card_id.clone());
        }
        events.push(MatchEvent::CardDrawn {
            player_id: player_id.to_string(),
            card_id: card_id.clone(),
        });
        drawn.push(card_id);
    }

    drawn
}

/// Moves the hand card at `index` to the shared discard pile.
pub fn discard_from_hand(
    state: &mut MatchState,
    player_id: &str,
    index: usize,
    events: &mut Vec<MatchEvent>,
) -> Option<CardId> {
    let player = state.player_mut(player_id)?;
    if index >= player.hand.len() {
        return None;
    }
    let card_id = player.hand.remove(index);
    state.shared_discard.push(card_id.clone());
    events.push(MatchEvent::CardDiscarded {
        player_id: player_id.to_string(),
        card_id: card_id.clone(),
    });
    Some(card_id)
}

fn recycle(state: &mut MatchState, rng: &mut impl Rng, events: &mut Vec<MatchEvent>) {
    let recycled = state.shared_discard.len();
    state.shared_draw.append(&mut state.shared_discard);
    state.shared_draw.shuffle(rng);
    events.push(MatchEvent::DeckRecycled { recycled });
}
