//! Seeded deterministic selection with continuity.
//!
//! Selection order for each kind:
//! 1. Keep today's DayState pick if it is still eligible
//! 2. Else use the WeekSeed pick for today if it is eligible
//! 3. Else hash the seed string and index into the id-sorted pool

use crate::types::*;
use sha2::{Digest, Sha256};

/// Components of the selection seed
#[derive(Clone, Copy, Debug)]
pub struct SeedParts<'a> {
    pub user_id: &'a str,
    pub date_key: &'a str,
    pub profile: Profile,
    pub last_quick_signal: Option<QuickSignal>,
    pub lib_version: &'a str,
    pub check_in_signature: &'a str,
}

/// `user|date|profile|signal|lib_version|check_in_signature`
pub fn seed_string(parts: &SeedParts<'_>) -> String {
    [
        parts.user_id,
        parts.date_key,
        parts.profile.label(),
        parts.last_quick_signal.map_or("", |s| s.as_str()),
        parts.lib_version,
        parts.check_in_signature,
    ]
    .join("|")
}

/// Lowercase hex SHA-256 of a string
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Unsigned value of the first 8 hex characters of the seed's SHA-256
pub fn seed_hash(seed: &str) -> u32 {
    let digest = Sha256::digest(seed.as_bytes());
    // First 8 hex chars are the first 4 bytes, big-endian
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

pub fn seeded_index(seed: &str, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(seed_hash(seed) as usize % len)
}

/// Seeded pick from a pool, independent of the pool's incoming order
pub fn pick<'a, T: ContentItem>(pool: &'a [T], seed: &str) -> Option<&'a T> {
    let mut sorted: Vec<&T> = pool.iter().collect();
    sorted.sort_by(|a, b| a.id().cmp(b.id()));
    seeded_index(seed, sorted.len()).map(|i| sorted[i])
}

/// Where a selection came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickSource {
    DayState,
    WeekSeed,
    Seeded,
}

/// Previously chosen ids that should be kept when still eligible
#[derive(Clone, Copy, Debug, Default)]
pub struct Continuity<'a> {
    pub day_state_id: Option<&'a str>,
    pub week_seed_id: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Picked<T> {
    pub item: T,
    pub source: PickSource,
}

/// Select one item, preferring continuity over a fresh seeded pick
pub fn select<T: ContentItem + Clone>(
    pool: &[T],
    continuity: Continuity<'_>,
    seed: &str,
) -> Option<Picked<T>> {
    let find = |id: Option<&str>| id.and_then(|id| pool.iter().find(|item| item.id() == id));

    if let Some(item) = find(continuity.day_state_id) {
        tracing::debug!("Keeping day state {:?} pick {}", T::KIND, item.id());
        return Some(Picked {
            item: item.clone(),
            source: PickSource::DayState,
        });
    }

    if let Some(item) = find(continuity.week_seed_id) {
        tracing::debug!("Using week seed {:?} pick {}", T::KIND, item.id());
        return Some(Picked {
            item: item.clone(),
            source: PickSource::WeekSeed,
        });
    }

    pick(pool, seed).map(|item| {
        tracing::debug!("Seeded {:?} pick {}", T::KIND, item.id());
        Picked {
            item: item.clone(),
            source: PickSource::Seeded,
        }
    })
}
