//! Content identifiers and their generator.
//!
//! [`ContentId`] is a newtype over the `BIGINT` primary key shared by the
//! pending, approved, rejected and legacy tables of one content kind, so
//! an id keeps its identity while the row moves between tables.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of low bits filled with randomness below the millisecond clock.
const RANDOM_BITS: u32 = 12;

/// Identifier of a script, giveaway, ad or one of their child rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ContentId(i64);

impl ContentId {
    /// Wraps a raw database key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw database key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ContentId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<ContentId> for i64 {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

/// Generates ids before rows reach the database.
///
/// Ids are `(unix_millis << 12) | random_12_bits`, clamped so every id
/// handed out by one generator is strictly greater than the previous one.
/// The values stay below 2^53 and survive a round trip through JSON
/// numbers in browser clients.
///
/// One generator is built at startup and shared by every service.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    /// Creates a generator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    pub fn next_id(&self) -> ContentId {
        let suffix = rand::thread_rng().gen_range(0..(1_i64 << RANDOM_BITS));
        let candidate = (Utc::now().timestamp_millis() << RANDOM_BITS) | suffix;

        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(previous.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return ContentId(next),
                Err(actual) => previous = actual,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let generator = IdGenerator::new();
        let mut previous = generator.next_id();
        for _ in 0..10_000 {
            let next = generator.next_id();
            assert!(next > previous, "{next} should follow {previous}");
            previous = next;
        }
    }

    #[test]
    fn ids_fit_in_a_json_safe_integer() {
        let id = IdGenerator::new().next_id();
        assert!(id.get() > 0);
        assert!(id.get() < (1_i64 << 53));
    }

    #[test]
    fn concurrent_generation_never_collides() {
        let generator = Arc::new(IdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..2_000).map(|_| generator.next_id()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let Ok(ids) = handle.join() else {
                panic!("generator thread panicked");
            };
            for id in ids {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    #[test]
    fn serializes_as_a_bare_number() {
        let id = ContentId::new(42);
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("42"));
    }
}
