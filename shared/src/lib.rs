use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

pub mod wire;

/// Number of samples in a trajectory: hour offsets -12..=12.
pub const TRAJECTORY_SAMPLES: usize = 25;
pub const TRAJECTORY_HALF_SPAN_HOURS: i32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub location: GeoPoint,
}

impl Airport {
    pub fn new(
        code: impl Into<String>,
        display_name: impl Into<String>,
        location: GeoPoint,
    ) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum FlightStatus {
    Scheduled,
    Boarding,
    InFlight,
    Delayed,
    Cancelled,
}

impl FlightStatus {
    pub const ALL: [FlightStatus; 5] = [
        FlightStatus::Scheduled,
        FlightStatus::Boarding,
        FlightStatus::InFlight,
        FlightStatus::Delayed,
        FlightStatus::Cancelled,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "Scheduled",
            FlightStatus::Boarding => "Boarding",
            FlightStatus::InFlight => "In Flight",
            FlightStatus::Delayed => "Delayed",
            FlightStatus::Cancelled => "Cancelled",
        }
    }
}

/// The backend mixes `IN_FLIGHT`, `in-flight` and lowercase spellings.
/// Anything unrecognised is shown as scheduled.
impl From<String> for FlightStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BOARDING" => FlightStatus::Boarding,
            "IN_FLIGHT" | "INFLIGHT" => FlightStatus::InFlight,
            "DELAYED" => FlightStatus::Delayed,
            "CANCELLED" | "CANCELED" => FlightStatus::Cancelled,
            _ => FlightStatus::Scheduled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSummary {
    #[serde(rename = "flightNumber")]
    pub flight_number: String,
    #[serde(rename = "airline")]
    pub airline_code: String,
    #[serde(rename = "origin")]
    pub origin_code: String,
    #[serde(rename = "destination")]
    pub dest_code: String,
    #[serde(rename = "scheduledDeparture", with = "wire::timestamp")]
    pub scheduled_departure: DateTime<Utc>,
    pub status: FlightStatus,
    /// Percent of the route flown, only meaningful while in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectorySample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_feet: u32,
    pub speed_mph: u32,
    pub hour_offset: i32,
}

impl TrajectorySample {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_grounded(&self) -> bool {
        self.altitude_feet == 0 && self.speed_mph == 0
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedTrajectory {
    #[error("expected {TRAJECTORY_SAMPLES} samples, got {0}")]
    SampleCount(usize),
    #[error("sample {index} has hour offset {found}, expected {expected}")]
    HourOffset {
        index: usize,
        expected: i32,
        found: i32,
    },
    #[error("sample {0} has an invalid position")]
    Position(usize),
    #[error("ground state must only appear on the first and last sample (sample {0})")]
    GroundState(usize),
    #[error("interior samples must share one cruise altitude/speed (sample {0})")]
    CruiseMismatch(usize),
}

/// A full 25-sample flight trajectory.
///
/// Samples are private so that every `Trajectory` in the program satisfies
/// the ordering and ground/cruise invariants checked in [`Trajectory::new`].
/// Serializes with a `currentPosition` copy of the hour-0 sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub flight_number: Option<String>,
    pub origin: Airport,
    pub destination: Airport,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    samples: Vec<TrajectorySample>,
}

impl Trajectory {
    pub fn new(
        flight_number: Option<String>,
        origin: Airport,
        destination: Airport,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        samples: Vec<TrajectorySample>,
    ) -> Result<Self, MalformedTrajectory> {
        validate_samples(&samples)?;
        Ok(Self {
            flight_number,
            origin,
            destination,
            departure_time,
            arrival_time,
            samples,
        })
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn current_position(&self) -> &TrajectorySample {
        // hour offsets are validated to run -12..=12, so offset 0 sits in the middle
        &self.samples[TRAJECTORY_HALF_SPAN_HOURS as usize]
    }

    pub fn path(&self) -> Vec<GeoPoint> {
        self.samples.iter().map(TrajectorySample::location).collect()
    }

    pub fn bounds(&self) -> MapBounds {
        // non-empty by construction
        MapBounds::enclosing(self.samples.iter().map(TrajectorySample::location))
            .unwrap_or_else(|| MapBounds::point(self.origin.location))
    }
}

impl Serialize for Trajectory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.flight_number.is_some() { 7 } else { 6 };
        let mut state = serializer.serialize_struct("Trajectory", len)?;
        if let Some(number) = &self.flight_number {
            state.serialize_field("flightNumber", number)?;
        } else {
            state.skip_field("flightNumber")?;
        }
        state.serialize_field("origin", &self.origin)?;
        state.serialize_field("destination", &self.destination)?;
        state.serialize_field("departureTime", &self.departure_time)?;
        state.serialize_field("arrivalTime", &self.arrival_time)?;
        state.serialize_field("samples", &self.samples)?;
        state.serialize_field("currentPosition", self.current_position())?;
        state.end()
    }
}

fn validate_samples(samples: &[TrajectorySample]) -> Result<(), MalformedTrajectory> {
    if samples.len() != TRAJECTORY_SAMPLES {
        return Err(MalformedTrajectory::SampleCount(samples.len()));
    }

    let last = samples.len() - 1;
    let mut cruise: Option<(u32, u32)> = None;

    for (index, sample) in samples.iter().enumerate() {
        let expected = index as i32 - TRAJECTORY_HALF_SPAN_HOURS;
        if sample.hour_offset != expected {
            return Err(MalformedTrajectory::HourOffset {
                index,
                expected,
                found: sample.hour_offset,
            });
        }
        if !sample.location().is_valid() {
            return Err(MalformedTrajectory::Position(index));
        }

        let is_end = index == 0 || index == last;
        if is_end != sample.is_grounded() {
            return Err(MalformedTrajectory::GroundState(index));
        }
        if !is_end {
            let pair = (sample.altitude_feet, sample.speed_mph);
            match cruise {
                None => cruise = Some(pair),
                Some(expected) if expected != pair => {
                    return Err(MalformedTrajectory::CruiseMismatch(index));
                }
                Some(_) => {}
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl MapBounds {
    pub fn point(p: GeoPoint) -> Self {
        Self {
            min_lat: p.latitude,
            max_lat: p.latitude,
            min_lon: p.longitude,
            max_lon: p.longitude,
        }
    }

    pub fn enclosing(points: impl IntoIterator<Item = GeoPoint>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::point(first), |acc, p| Self {
            min_lat: acc.min_lat.min(p.latitude),
            max_lat: acc.max_lat.max(p.latitude),
            min_lon: acc.min_lon.min(p.longitude),
            max_lon: acc.max_lon.max(p.longitude),
        }))
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.latitude)
            && (self.min_lon..=self.max_lon).contains(&p.longitude)
    }
}
