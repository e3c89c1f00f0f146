use chrono::{DateTime, Duration, Utc};
use shared::{
    Airport, FlightSummary, TRAJECTORY_HALF_SPAN_HOURS, Trajectory, TrajectorySample,
    wire::TrajectoryPayload,
};

use crate::{
    resolver::{AirportLookup, CoordinateResolver},
    sphere, synth,
};

/// Parameters of the synthesized flight profile.
///
/// `schedule_half_window` sets the reported departure/arrival times
/// (`now ∓ window`). It is not tied to the ±12 h sample window.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub cruise_altitude_ft: u32,
    pub cruise_speed_mph: u32,
    pub schedule_half_window: Duration,
    pub fallback_origin: String,
    pub fallback_destination: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cruise_altitude_ft: 32_000,
            cruise_speed_mph: 460,
            schedule_half_window: Duration::hours(2),
            fallback_origin: "JFK".to_string(),
            fallback_destination: "LAX".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrajectorySampler {
    config: SamplerConfig,
}

impl TrajectorySampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// 25 samples at hour offsets -12..=12 along the great circle from
    /// `origin` to `destination`, grounded at both ends and cruising between.
    pub fn sample(
        &self,
        origin: Airport,
        destination: Airport,
        now: DateTime<Utc>,
        flight_number: Option<String>,
    ) -> Trajectory {
        let origin = usable(origin);
        let destination = usable(destination);
        let (cruise_altitude, cruise_speed) = self.cruise_pair();
        let span = TRAJECTORY_HALF_SPAN_HOURS;

        let samples: Vec<TrajectorySample> = (-span..=span)
            .map(|hour_offset| {
                let fraction = f64::from(hour_offset + span) / f64::from(2 * span);
                let position = sphere::interpolate(origin.location, destination.location, fraction);
                let (altitude_feet, speed_mph) = if hour_offset.abs() == span {
                    (0, 0)
                } else {
                    (cruise_altitude, cruise_speed)
                };
                TrajectorySample {
                    timestamp: now + Duration::hours(i64::from(hour_offset)),
                    latitude: position.latitude,
                    longitude: position.longitude,
                    altitude_feet,
                    speed_mph,
                    hour_offset,
                }
            })
            .collect();

        let half_window = self.config.schedule_half_window.max(Duration::zero());
        let departure_time = now - half_window;
        let arrival_time = now + half_window;

        match Trajectory::new(
            flight_number,
            origin,
            destination,
            departure_time,
            arrival_time,
            samples,
        ) {
            Ok(trajectory) => trajectory,
            Err(err) => {
                tracing::error!("synthesized trajectory rejected ({err}), using default profile");
                let defaults = Self::default();
                defaults.sample_codes(
                    &defaults.config.fallback_origin,
                    &defaults.config.fallback_destination,
                    now,
                )
            }
        }
    }

    /// Takes a backend trajectory as sent when it validates. Otherwise the
    /// backend's own airports are resampled, anchored on its hour-0 time and
    /// keeping its schedule. `None` when those airports are unusable.
    pub fn accept_backend(
        &self,
        payload: TrajectoryPayload,
        now: DateTime<Utc>,
    ) -> Option<Trajectory> {
        let origin = Airport::from(payload.origin.clone());
        let destination = Airport::from(payload.destination.clone());
        let flight_number = payload.flight_number.clone();
        let (departure_time, arrival_time) = (payload.departure_time, payload.arrival_time);
        let anchor = payload
            .current_position
            .as_ref()
            .or_else(|| payload.positions.iter().find(|p| p.hour_offset == 0))
            .map_or(now, |p| p.timestamp);

        let err = match Trajectory::try_from(payload) {
            Ok(trajectory) => return Some(trajectory),
            Err(err) => err,
        };
        let label = flight_number.as_deref().unwrap_or("<unnumbered>");
        if !origin.location.is_valid() || !destination.location.is_valid() {
            tracing::warn!(
                "backend trajectory {label} rejected ({err}) and {} -> {} has no usable location",
                origin.code,
                destination.code
            );
            return None;
        }

        tracing::warn!(
            "backend trajectory {label} rejected ({err}), resampling {} -> {}",
            origin.code,
            destination.code
        );
        let mut trajectory = self.sample(origin, destination, anchor, flight_number);
        if departure_time <= arrival_time {
            trajectory.departure_time = departure_time;
            trajectory.arrival_time = arrival_time;
        }
        Some(trajectory)
    }

    /// A (0, 0) cruise pair would read as ground state mid-flight.
    fn cruise_pair(&self) -> (u32, u32) {
        match (self.config.cruise_altitude_ft, self.config.cruise_speed_mph) {
            (0, 0) => {
                let defaults = SamplerConfig::default();
                (defaults.cruise_altitude_ft, defaults.cruise_speed_mph)
            }
            pair => pair,
        }
    }

    /// Builds a trajectory for `flight`, resolving its endpoints through
    /// `resolver`. Without a flight the configured fallback pair is used.
    pub async fn build_trajectory<L: AirportLookup>(
        &self,
        resolver: &CoordinateResolver<L>,
        flight: Option<&FlightSummary>,
        now: DateTime<Utc>,
    ) -> Trajectory {
        let (origin_code, dest_code, flight_number) = match flight {
            Some(f) => (
                f.origin_code.as_str(),
                f.dest_code.as_str(),
                Some(f.flight_number.clone()),
            ),
            None => (
                self.config.fallback_origin.as_str(),
                self.config.fallback_destination.as_str(),
                None,
            ),
        };

        let origin = resolver.resolve_airport(origin_code).await;
        let destination = resolver.resolve_airport(dest_code).await;
        tracing::debug!(
            "sampling trajectory {} {} -> {}",
            flight_number.as_deref().unwrap_or("<unmatched>"),
            origin.code,
            destination.code
        );
        self.sample(origin, destination, now, flight_number)
    }

    /// Looks `flight_number` up in `flights`; an unknown number still gets a
    /// trajectory, over the fallback pair, labelled with that number.
    pub async fn build_for_flight_number<L: AirportLookup>(
        &self,
        resolver: &CoordinateResolver<L>,
        flight_number: &str,
        flights: &[FlightSummary],
        now: DateTime<Utc>,
    ) -> Trajectory {
        let flight = flights.iter().find(|f| f.flight_number == flight_number);
        if flight.is_none() {
            tracing::info!("flight {flight_number} not in the current list, using fallback route");
        }
        let mut trajectory = self.build_trajectory(resolver, flight, now).await;
        trajectory
            .flight_number
            .get_or_insert_with(|| flight_number.to_string());
        trajectory
    }

    /// Synthesizes without any resolver, for callers that have nothing but codes.
    pub fn sample_codes(&self, origin: &str, destination: &str, now: DateTime<Utc>) -> Trajectory {
        self.sample(
            synth::synthetic_airport(origin),
            synth::synthetic_airport(destination),
            now,
            None,
        )
    }
}

fn usable(airport: Airport) -> Airport {
    if airport.location.is_valid() {
        airport
    } else {
        tracing::warn!("airport {} has unusable location, synthesizing", airport.code);
        synth::synthetic_airport(&airport.code)
    }
}

#[cfg(test)]
mod tests {
    use shared::{FlightStatus, GeoPoint};

    use super::*;
    use crate::{
        resolver::known_airports,
        testing::{FakeLookup, backend_payload, flight, reference_time},
    };

    fn resolver() -> CoordinateResolver<FakeLookup> {
        CoordinateResolver::new(FakeLookup::with_airports(known_airports()))
    }

    fn assert_profile(trajectory: &Trajectory) {
        let samples = trajectory.samples();
        assert_eq!(samples.len(), 25);
        for (i, window) in samples.windows(2).enumerate() {
            assert!(window[0].hour_offset < window[1].hour_offset, "order at {i}");
        }
        assert_eq!(samples[0].hour_offset, -12);
        assert_eq!(samples[24].hour_offset, 12);
        assert!(samples[0].is_grounded());
        assert!(samples[24].is_grounded());
        for s in &samples[1..24] {
            assert_eq!((s.altitude_feet, s.speed_mph), (32_000, 460));
        }
    }

    #[tokio::test]
    async fn sfo_to_jfk_current_position_is_now() {
        let sampler = TrajectorySampler::default();
        let t = reference_time();
        let sfo_jfk = flight("UA100", "SFO", "JFK", FlightStatus::InFlight);
        let trajectory = sampler.build_trajectory(&resolver(), Some(&sfo_jfk), t).await;

        assert_profile(&trajectory);
        let current = trajectory.current_position();
        assert_eq!(current.hour_offset, 0);
        assert_eq!(current.timestamp, t);
        assert_eq!(trajectory.origin.code, "SFO");
        assert_eq!(trajectory.destination.code, "JFK");
        assert_eq!(trajectory.flight_number.as_deref(), Some("UA100"));
        assert_eq!(trajectory.samples()[0].location(), trajectory.origin.location);
        assert_eq!(trajectory.samples()[24].location(), trajectory.destination.location);
    }

    #[tokio::test]
    async fn schedule_window_is_separate_from_samples() {
        let sampler = TrajectorySampler::default();
        let t = reference_time();
        let trajectory = sampler.build_trajectory(&resolver(), None, t).await;
        assert_eq!(trajectory.departure_time, t - Duration::hours(2));
        assert_eq!(trajectory.arrival_time, t + Duration::hours(2));
        assert_eq!(trajectory.samples()[0].timestamp, t - Duration::hours(12));

        let wide = TrajectorySampler::new(SamplerConfig {
            schedule_half_window: Duration::hours(12),
            ..SamplerConfig::default()
        });
        let aligned = wide.build_trajectory(&resolver(), None, t).await;
        assert_eq!(aligned.departure_time, aligned.samples()[0].timestamp);
    }

    #[test]
    fn negative_schedule_window_collapses_to_now() {
        let sampler = TrajectorySampler::new(SamplerConfig {
            schedule_half_window: Duration::hours(-3),
            ..SamplerConfig::default()
        });
        let t = reference_time();
        let trajectory = sampler.sample_codes("AAA", "BBB", t);
        assert_eq!(trajectory.departure_time, t);
        assert_eq!(trajectory.arrival_time, t);
    }

    #[tokio::test]
    async fn unknown_flight_uses_fallback_pair() {
        let sampler = TrajectorySampler::default();
        let flights = vec![flight("DL888", "JFK", "LAX", FlightStatus::Cancelled)];
        let trajectory = sampler
            .build_for_flight_number(&resolver(), "XX999", &flights, reference_time())
            .await;
        assert_profile(&trajectory);
        assert_eq!(trajectory.origin.code, "JFK");
        assert_eq!(trajectory.destination.code, "LAX");
        assert_eq!(trajectory.flight_number.as_deref(), Some("XX999"));
    }

    #[tokio::test]
    async fn unresolvable_endpoints_still_sample() {
        let sampler = TrajectorySampler::default();
        let resolver = CoordinateResolver::new(FakeLookup::failing());
        let lost = flight("ZZ001", "ZZZ", "QQQ", FlightStatus::Scheduled);
        let trajectory = sampler.build_trajectory(&resolver, Some(&lost), reference_time()).await;
        assert_profile(&trajectory);
        assert_eq!(trajectory.origin.location, synth::synthetic_coordinate("ZZZ"));
    }

    #[test]
    fn zero_cruise_config_still_yields_valid_trajectory() {
        let sampler = TrajectorySampler::new(SamplerConfig {
            cruise_altitude_ft: 0,
            cruise_speed_mph: 0,
            ..SamplerConfig::default()
        });
        let trajectory = sampler.sample_codes("AAA", "BBB", reference_time());
        assert_eq!(trajectory.samples().len(), 25);
        assert!(!trajectory.samples()[12].is_grounded());
    }

    fn sea() -> Airport {
        Airport::new("SEA", "Seattle-Tacoma", GeoPoint::new(47.4502, -122.3088))
    }

    fn lhr() -> Airport {
        Airport::new("LHR", "London Heathrow", GeoPoint::new(51.47, -0.4543))
    }

    #[test]
    fn varying_backend_profile_is_resampled_over_its_airports() {
        let sampler = TrajectorySampler::default();
        let t = reference_time();
        let payload = backend_payload("BA100", &sea(), &lhr(), t);
        assert!(Trajectory::try_from(payload.clone()).is_err());

        let trajectory = sampler.accept_backend(payload, t + Duration::days(3)).expect("usable");
        assert_profile(&trajectory);
        assert_eq!(trajectory.origin, sea());
        assert_eq!(trajectory.destination, lhr());
        assert_eq!(trajectory.flight_number.as_deref(), Some("BA100"));
        assert_eq!(trajectory.samples()[0].location(), sea().location);
        assert_eq!(trajectory.samples()[24].location(), lhr().location);
        // the backend's clock and schedule win over the local one
        assert_eq!(trajectory.current_position().timestamp, t);
        assert_eq!(trajectory.departure_time, t - Duration::hours(12));
        assert_eq!(trajectory.arrival_time, t + Duration::hours(12));
    }

    #[test]
    fn valid_backend_trajectory_is_kept_verbatim() {
        let sampler = TrajectorySampler::default();
        let t = reference_time();
        let mut payload = backend_payload("BA100", &sea(), &lhr(), t);
        for position in &mut payload.positions {
            let grounded = position.hour_offset.abs() == 12;
            position.altitude = if grounded { 0.0 } else { 36_000.0 };
            position.speed = if grounded { 0.0 } else { 470.0 };
        }
        let first = payload.positions[0].clone();

        let trajectory = sampler.accept_backend(payload, t).expect("valid");
        assert_eq!(trajectory.samples()[1].altitude_feet, 36_000);
        assert_eq!(trajectory.samples()[0].latitude, first.latitude);
    }

    #[test]
    fn backend_airports_without_location_are_refused() {
        let sampler = TrajectorySampler::default();
        let broken = Airport::new("SEA", "Seattle", GeoPoint::new(120.0, -122.3));
        let payload = backend_payload("BA100", &broken, &lhr(), reference_time());
        assert!(sampler.accept_backend(payload, reference_time()).is_none());
    }

    #[test]
    fn inverted_backend_schedule_falls_back_to_local_window() {
        let sampler = TrajectorySampler::default();
        let t = reference_time();
        let mut payload = backend_payload("BA100", &sea(), &lhr(), t);
        std::mem::swap(&mut payload.departure_time, &mut payload.arrival_time);
        let trajectory = sampler.accept_backend(payload, t).expect("usable");
        assert_eq!(trajectory.departure_time, t - Duration::hours(2));
        assert!(trajectory.departure_time <= trajectory.arrival_time);
    }
}
