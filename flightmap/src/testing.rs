//! In-memory fakes shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use shared::{
    Airport, FlightStatus, FlightSummary,
    wire::{TrajectoryPayload, WireAirport, WireSample},
};

use crate::{error::LookupError, resolver::AirportLookup};

/// Serves a fixed airport table, counting calls. Codes can be given their
/// own delay to stage out-of-order completions.
#[derive(Default)]
pub struct FakeLookup {
    airports: HashMap<String, Airport>,
    delay: Option<Duration>,
    per_code_delay: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl FakeLookup {
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_airports(airports: impl IntoIterator<Item = Airport>) -> Self {
        Self {
            airports: airports.into_iter().map(|a| (a.code.clone(), a)).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn delay_code(&self, code: &str, delay: Duration) {
        self.per_code_delay
            .lock()
            .unwrap()
            .insert(code.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AirportLookup for FakeLookup {
    async fn lookup(&self, code: &str) -> Result<Airport, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .per_code_delay
            .lock()
            .unwrap()
            .get(code)
            .copied()
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.airports
            .get(code)
            .cloned()
            .ok_or_else(|| LookupError::Malformed(format!("no airport {code}")))
    }
}

pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 30, 12, 0, 0).unwrap()
}

pub fn flight(number: &str, origin: &str, dest: &str, status: FlightStatus) -> FlightSummary {
    FlightSummary {
        flight_number: number.to_string(),
        airline_code: number[..2].to_string(),
        origin_code: origin.to_string(),
        dest_code: dest.to_string(),
        scheduled_departure: reference_time(),
        status,
        progress: None,
    }
}

/// The trajectory body the crisis backend sends: straight-line positions,
/// altitude and speed rising towards mid-flight, ground speed only at the
/// very ends.
pub fn backend_payload(
    number: &str,
    origin: &Airport,
    destination: &Airport,
    now: DateTime<Utc>,
) -> TrajectoryPayload {
    let (from, to) = (origin.location, destination.location);
    let positions: Vec<WireSample> = (-12..=12)
        .map(|hour_offset: i32| {
            let progress = f64::from(hour_offset + 12) / 24.0;
            let climb = 0.5 - (progress - 0.5).abs();
            let altitude = if progress > 0.05 && progress < 0.95 {
                (35_000.0 + 5_000.0 * climb).trunc()
            } else {
                0.0
            };
            let speed = if progress < 0.02 || progress > 0.98 {
                0.0
            } else {
                (450.0 + 50.0 * climb).trunc()
            };
            WireSample {
                timestamp: now + ChronoDuration::hours(i64::from(hour_offset)),
                latitude: from.latitude + (to.latitude - from.latitude) * progress,
                longitude: from.longitude + (to.longitude - from.longitude) * progress,
                altitude,
                speed,
                hour_offset,
            }
        })
        .collect();

    let wire = |airport: &Airport| WireAirport {
        code: airport.code.clone(),
        name: Some(airport.display_name.clone()),
        lat: airport.location.latitude,
        lon: airport.location.longitude,
    };
    TrajectoryPayload {
        flight_number: Some(number.to_string()),
        origin: wire(origin),
        destination: wire(destination),
        departure_time: now - ChronoDuration::hours(12),
        arrival_time: now + ChronoDuration::hours(12),
        current_position: positions.get(12).cloned(),
        positions,
    }
}
