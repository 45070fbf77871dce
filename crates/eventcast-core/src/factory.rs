//! Synthetic event construction.
//!
//! [`make_event`] is the production entry point: thread-local RNG and the
//! current wall clock. [`make_event_with`] takes both as arguments so tests
//! can pin the output with a seeded RNG and a fixed instant.

use chrono::{DateTime, Utc};
use eventcast_types::{Event, EventKind};
use rand::Rng;
use rand::seq::IndexedRandom;

/// Number of characters in an event id.
pub const ID_LENGTH: usize = 8;

/// Characters an event id is drawn from.
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Lower bound of the sampled value.
pub const VALUE_MIN: f64 = 0.0;

/// Upper bound of the sampled value.
pub const VALUE_MAX: f64 = 100.0;

/// Values are rounded to this many decimal places.
const VALUE_SCALE: f64 = 1000.0;

/// `YYYY-MM-DDTHH:MM:SS.ffffffZ`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Build one event from the thread RNG and the current UTC time.
pub fn make_event() -> Event {
    make_event_with(&mut rand::rng(), Utc::now())
}

/// Build one event from an explicit RNG and instant.
pub fn make_event_with(rng: &mut impl Rng, now: DateTime<Utc>) -> Event {
    Event {
        id: random_id(rng),
        ts: format_timestamp(now),
        value: random_value(rng),
        kind: EventKind::ALL
            .choose(rng)
            .copied()
            .unwrap_or(EventKind::Click),
    }
}

/// Format an instant the way the `ts` field expects.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

fn random_id(rng: &mut impl Rng) -> String {
    (0..ID_LENGTH)
        .filter_map(|_| ID_ALPHABET.choose(rng).copied().map(char::from))
        .collect()
}

fn random_value(rng: &mut impl Rng) -> f64 {
    let raw: f64 = rng.random_range(VALUE_MIN..=VALUE_MAX);
    round_value(raw)
}

/// Round to 3 decimal places, staying inside `[VALUE_MIN, VALUE_MAX]`.
fn round_value(raw: f64) -> f64 {
    ((raw * VALUE_SCALE).round() / VALUE_SCALE).clamp(VALUE_MIN, VALUE_MAX)
}
