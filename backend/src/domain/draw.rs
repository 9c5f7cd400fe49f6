//! # Draw Engine
//!
//! Ranks every ticket holder of a lottery by weighted sampling without
//! replacement. The result is a full permutation: rank 0 is the first
//! holder drawn, rank `N - 1` the last.
//!
//! ## Reproducibility
//!
//! The generator is seeded from the lottery id alone:
//!
//! ```text
//! "abd1acef-c472-4444-bb17-e356a41a560b"
//!        ↓ keep decimal digits, in order
//! "147244441735641560"
//!        ↓ parse
//! 147244441735641560  →  ChaCha20 seed
//! ```
//!
//! Same id, same tickets and same weights always give the same ranking.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::models::{Lottery, LotteryWinner};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrawError {
    #[error("Lottery {0} has no tickets to draw")]
    NoTickets(Uuid),

    #[error("Identifier contains no decimal digit: {0}")]
    SeedlessIdentifier(String),

    #[error("Seed derived from {0} does not fit in 128 bits")]
    SeedOverflow(String),

    #[error("Ticket weights of lottery {0} cannot be normalized")]
    InvalidWeights(Uuid),

    #[error("Lottery {0} has tickets without any chance of being drawn")]
    InsufficientWeight(Uuid),

    #[error("Lottery {0} was already drawn")]
    AlreadyDrawn(Uuid),

    #[error("Rank {0} assigned twice")]
    DuplicateRank(u32),
}

/// Concatenate the decimal digits of `identifier` into one integer.
pub fn draw_seed(identifier: &str) -> Result<u128, DrawError> {
    let mut digits = identifier.chars().filter_map(|c| c.to_digit(10)).peekable();
    if digits.peek().is_none() {
        return Err(DrawError::SeedlessIdentifier(identifier.to_string()));
    }

    digits.try_fold(0u128, |seed, digit| {
        seed.checked_mul(10)
            .and_then(|seed| seed.checked_add(u128::from(digit)))
            .ok_or_else(|| DrawError::SeedOverflow(identifier.to_string()))
    })
}

pub fn seeded_rng(seed: u128) -> ChaCha20Rng {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(&seed.to_le_bytes());
    ChaCha20Rng::from_seed(bytes)
}

/// Scale `weights` so they sum to 1.
///
/// Rejects empty, negative, non-finite and zero-sum inputs, as well as
/// any entry that would never be drawn.
pub fn normalize(weights: &[f64], lottery_id: Uuid) -> Result<Vec<f64>, DrawError> {
    if weights.is_empty() {
        return Err(DrawError::NoTickets(lottery_id));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(DrawError::InvalidWeights(lottery_id));
    }

    let sum: f64 = weights.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(DrawError::InvalidWeights(lottery_id));
    }

    let normalized: Vec<f64> = weights.iter().map(|w| w / sum).collect();
    if normalized.iter().any(|p| *p <= 0.0) {
        return Err(DrawError::InsufficientWeight(lottery_id));
    }

    Ok(normalized)
}

/// Draw every index of `probabilities` once, weighted, without replacement.
///
/// Returns the indices in draw order.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    rng: &mut R,
    probabilities: &[f64],
    lottery_id: Uuid,
) -> Result<Vec<usize>, DrawError> {
    let mut remaining: Vec<(usize, f64)> = probabilities.iter().copied().enumerate().collect();
    let mut order = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let index = WeightedIndex::new(remaining.iter().map(|(_, p)| *p))
            .map_err(|_| DrawError::InsufficientWeight(lottery_id))?;
        let (picked, _) = remaining.remove(index.sample(rng));
        order.push(picked);
    }

    Ok(order)
}

/// Rank every ticket holder of `lottery`.
pub fn raffle_draw(lottery: &Lottery) -> Result<Vec<LotteryWinner>, DrawError> {
    let weights: Vec<f64> = lottery
        .tickets
        .iter()
        .map(|ticket| ticket.winning_likelyhood)
        .collect();
    let probabilities = normalize(&weights, lottery.uuid)?;

    let seed = draw_seed(&lottery.uuid.to_string())?;
    let mut rng = seeded_rng(seed);

    debug!(
        "Drawing {} tickets for lottery {} with seed {}",
        probabilities.len(),
        lottery.uuid,
        seed
    );

    let order = sample_without_replacement(&mut rng, &probabilities, lottery.uuid)?;

    let winners = order
        .into_iter()
        .zip(0u32..)
        .map(|(index, rank)| LotteryWinner {
            delegator_address_id: lottery.tickets[index].delegator_id.clone(),
            rank,
        })
        .collect();

    Ok(winners)
}
