//! JSON shapes exchanged with the crisis-operations backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Airport, FlightSummary, GeoPoint, MalformedTrajectory, Trajectory, TrajectorySample,
};

/// Timestamps come either as RFC 3339 or as naive ISO-8601 strings, the
/// latter meaning UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp {raw:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlineEntry {
    #[serde(alias = "iataCode")]
    pub code: String,
    #[serde(alias = "businessName", default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AirlinesResponse {
    Wrapped { airlines: Vec<AirlineEntry> },
    Bare(Vec<AirlineEntry>),
}

impl AirlinesResponse {
    pub fn into_vec(self) -> Vec<AirlineEntry> {
        match self {
            AirlinesResponse::Wrapped { airlines } => airlines,
            AirlinesResponse::Bare(airlines) => airlines,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlightsResponse {
    Wrapped { flights: Vec<FlightSummary> },
    Bare(Vec<FlightSummary>),
}

impl FlightsResponse {
    pub fn into_vec(self) -> Vec<FlightSummary> {
        match self {
            FlightsResponse::Wrapped { flights } => flights,
            FlightsResponse::Bare(flights) => flights,
        }
    }
}

/// `GET /airport/<code>` body. Coordinates are optional so that a payload
/// missing them decodes and is then rejected as malformed by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportCoords {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl AirportCoords {
    pub fn location(&self) -> Option<GeoPoint> {
        let point = GeoPoint::new(self.lat?, self.lon?);
        point.is_valid().then_some(point)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireAirport {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl From<WireAirport> for Airport {
    fn from(wire: WireAirport) -> Self {
        let display_name = wire.name.unwrap_or_else(|| wire.code.clone());
        Airport::new(wire.code, display_name, GeoPoint::new(wire.lat, wire.lon))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSample {
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(alias = "altitudeFeet")]
    pub altitude: f64,
    #[serde(alias = "speedMph")]
    pub speed: f64,
    pub hour_offset: i32,
}

impl From<WireSample> for TrajectorySample {
    fn from(wire: WireSample) -> Self {
        TrajectorySample {
            timestamp: wire.timestamp,
            latitude: wire.latitude,
            longitude: wire.longitude,
            altitude_feet: wire.altitude.max(0.0).round() as u32,
            speed_mph: wire.speed.max(0.0).round() as u32,
            hour_offset: wire.hour_offset,
        }
    }
}

/// `GET /flight-trajectory/<flightNumber>` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPayload {
    #[serde(default)]
    pub flight_number: Option<String>,
    pub origin: WireAirport,
    pub destination: WireAirport,
    #[serde(with = "timestamp")]
    pub departure_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub arrival_time: DateTime<Utc>,
    pub positions: Vec<WireSample>,
    #[serde(default)]
    pub current_position: Option<WireSample>,
}

impl TryFrom<TrajectoryPayload> for Trajectory {
    type Error = MalformedTrajectory;

    fn try_from(payload: TrajectoryPayload) -> Result<Self, Self::Error> {
        let samples = payload.positions.into_iter().map(TrajectorySample::from).collect();
        Trajectory::new(
            payload.flight_number,
            payload.origin.into(),
            payload.destination.into(),
            payload.departure_time,
            payload.arrival_time,
            samples,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisRequest {
    pub crisis_type: String,
    pub affected_airlines: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrisisResponse {
    #[serde(default)]
    pub flights: Option<Vec<FlightSummary>>,
}
