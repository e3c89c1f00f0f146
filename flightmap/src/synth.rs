//! Deterministic stand-ins for data the backend could not provide.
//!
//! Everything here is a pure function of a string key: the same airport code
//! or entity id always yields the same values, within and across runs.

use shared::{Airport, GeoPoint};

const SEED_MODULUS: u32 = 100_000;

/// Rolling polynomial hash, `hash = (hash * 31 + unit) mod 100000`, over the
/// UTF-16 code units of `key`.
pub fn seed(key: &str) -> u32 {
    key.encode_utf16()
        .fold(0u32, |hash, unit| (hash * 31 + u32::from(unit)) % SEED_MODULUS)
}

/// Stable last-resort location for `key`: latitude in [-59.5, 59.5],
/// longitude in [-179.5, 179.5], always on a half-degree lattice.
pub fn synthetic_coordinate(key: &str) -> GeoPoint {
    let seed = seed(key);
    let latitude = f64::from(seed % 120) - 60.0 + 0.5;
    let longitude = f64::from((seed / 120) % 360) - 180.0 + 0.5;
    GeoPoint::new(latitude, longitude)
}

pub fn synthetic_airport(code: &str) -> Airport {
    Airport::new(code, code, synthetic_coordinate(code))
}

/// A bounded synthetic numeric field: `base + seed(entity:name) mod range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticField {
    pub name: &'static str,
    pub base: u32,
    pub range: u32,
}

pub const DELAY_MINUTES: SyntheticField = SyntheticField {
    name: "delay_minutes",
    base: 15,
    range: 166,
};
pub const PASSENGERS_IMPACTED: SyntheticField = SyntheticField {
    name: "passengers_impacted",
    base: 80,
    range: 240,
};
pub const CONNECTIONS_AT_RISK: SyntheticField = SyntheticField {
    name: "connections_at_risk",
    base: 5,
    range: 60,
};
pub const COHORT_SIZE: SyntheticField = SyntheticField {
    name: "cohort_size",
    base: 10,
    range: 90,
};
pub const CONFIDENCE_PERCENT: SyntheticField = SyntheticField {
    name: "confidence_percent",
    base: 70,
    range: 30,
};

impl SyntheticField {
    /// Value for `entity_id`, in `base..base + range`.
    pub fn value(&self, entity_id: &str) -> u32 {
        let range = self.range.max(1);
        self.base + seed(&format!("{entity_id}:{}", self.name)) % range
    }

    pub fn bounds(&self) -> std::ops::Range<u32> {
        self.base..self.base + self.range.max(1)
    }
}

pub fn synthetic_delay_minutes(entity_id: &str) -> u32 {
    DELAY_MINUTES.value(entity_id)
}

pub fn synthetic_confidence(entity_id: &str) -> u32 {
    CONFIDENCE_PERCENT.value(entity_id)
}
