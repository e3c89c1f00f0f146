use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use shared::{FlightStatus, FlightSummary, Trajectory, wire::CrisisRequest};

use crate::{
    client::BackendClient,
    resolver::{AirportLookup, CoordinateResolver, normalize_code},
    surface::MapSurface,
    sync::{DesiredGeometry, MapSurfaceSync, RenderMode, RouteGeometry, SyncOutcome, SyncTicket},
    trajectory::TrajectorySampler,
};

#[derive(Debug, Default)]
struct ViewState {
    flights: Vec<FlightSummary>,
    status_filter: Option<FlightStatus>,
    selected: Option<String>,
}

/// Drives the map from application data: resolves coordinates, samples
/// trajectories and hands the result to [`MapSurfaceSync`].
///
/// Locks are only taken between awaits.
pub struct FlightMapView<L, S> {
    resolver: CoordinateResolver<L>,
    sampler: TrajectorySampler,
    sync: Mutex<MapSurfaceSync<S>>,
    state: Mutex<ViewState>,
}

impl<L: AirportLookup, S: MapSurface> FlightMapView<L, S> {
    pub fn new(resolver: CoordinateResolver<L>, sampler: TrajectorySampler, surface: S) -> Self {
        Self {
            resolver,
            sampler,
            sync: Mutex::new(MapSurfaceSync::new(surface)),
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn resolver(&self) -> &CoordinateResolver<L> {
        &self.resolver
    }

    pub fn sampler(&self) -> &TrajectorySampler {
        &self.sampler
    }

    fn lock_sync(&self) -> MutexGuard<'_, MapSurfaceSync<S>> {
        self.sync.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.lock_sync().surface())
    }

    pub fn mode(&self) -> RenderMode {
        self.lock_sync().mode()
    }

    pub fn generation(&self) -> u64 {
        self.lock_sync().generation()
    }

    pub fn flights(&self) -> Vec<FlightSummary> {
        self.lock_state().flights.clone()
    }

    pub fn status_filter(&self) -> Option<FlightStatus> {
        self.lock_state().status_filter
    }

    pub fn selected(&self) -> Option<String> {
        self.lock_state().selected.clone()
    }

    /// Replaces the flight list and draws it.
    pub async fn show_flights(&self, flights: Vec<FlightSummary>) -> SyncOutcome {
        tracing::info!("showing {} flights", flights.len());
        {
            let mut state = self.lock_state();
            state.flights = flights;
            state.selected = None;
        }
        self.redraw_flights().await
    }

    /// Shows only flights in `status`, or all of them for `None`.
    pub async fn set_status_filter(&self, status: Option<FlightStatus>) -> SyncOutcome {
        {
            let mut state = self.lock_state();
            state.status_filter = status;
            state.selected = None;
        }
        self.redraw_flights().await
    }

    /// Per-status counts over the whole list, filter ignored.
    pub fn status_counts(&self) -> BTreeMap<FlightStatus, usize> {
        let mut counts: BTreeMap<FlightStatus, usize> =
            FlightStatus::ALL.iter().map(|&s| (s, 0)).collect();
        for flight in &self.lock_state().flights {
            *counts.entry(flight.status).or_default() += 1;
        }
        counts
    }

    /// Cancels every flight of the affected airlines and redraws the list.
    pub async fn apply_crisis_override(&self, affected_airlines: &[String]) -> SyncOutcome {
        let affected: BTreeSet<String> = affected_airlines
            .iter()
            .map(String::as_str)
            .map(normalize_code)
            .collect();
        let cancelled = {
            let mut state = self.lock_state();
            state.selected = None;
            let mut cancelled = 0;
            for flight in &mut state.flights {
                if affected.contains(&normalize_code(&flight.airline_code)) {
                    flight.status = FlightStatus::Cancelled;
                    cancelled += 1;
                }
            }
            cancelled
        };
        tracing::info!("crisis override cancelled {cancelled} flights of {affected:?}");
        self.redraw_flights().await
    }

    async fn redraw_flights(&self) -> SyncOutcome {
        let ticket = self.lock_sync().begin();
        let visible: Vec<FlightSummary> = {
            let state = self.lock_state();
            state
                .flights
                .iter()
                .filter(|f| state.status_filter.map_or(true, |s| f.status == s))
                .cloned()
                .collect()
        };

        let codes: BTreeSet<String> = visible
            .iter()
            .flat_map(|f| [normalize_code(&f.origin_code), normalize_code(&f.dest_code)])
            .collect();
        let mut airports = HashMap::with_capacity(codes.len());
        for code in codes {
            let airport = self.resolver.resolve_airport(&code).await;
            airports.insert(code, airport);
        }

        let routes = visible
            .into_iter()
            .filter_map(|flight| {
                let origin = airports.get(&normalize_code(&flight.origin_code))?.clone();
                let destination = airports.get(&normalize_code(&flight.dest_code))?.clone();
                Some(RouteGeometry {
                    flight,
                    origin,
                    destination,
                })
            })
            .collect();

        self.lock_sync().apply(ticket, &DesiredGeometry::flight_list(routes))
    }

    pub fn show_trajectory(&self, trajectory: Trajectory) -> SyncOutcome {
        let ticket = self.lock_sync().begin();
        self.finish_trajectory(ticket, trajectory)
    }

    /// Samples a trajectory for `flight_number` from the current list and draws it.
    pub async fn show_synthesized(
        &self,
        flight_number: &str,
        now: DateTime<Utc>,
    ) -> (Trajectory, SyncOutcome) {
        let ticket = self.lock_sync().begin();
        let trajectory = self.synthesize(flight_number, now).await;
        let outcome = self.finish_trajectory(ticket, trajectory.clone());
        (trajectory, outcome)
    }

    async fn synthesize(&self, flight_number: &str, now: DateTime<Utc>) -> Trajectory {
        let flights = self.flights();
        self.sampler
            .build_for_flight_number(&self.resolver, flight_number, &flights, now)
            .await
    }

    fn finish_trajectory(&self, ticket: SyncTicket, trajectory: Trajectory) -> SyncOutcome {
        let outcome = self
            .lock_sync()
            .apply(ticket, &DesiredGeometry::single_trajectory(trajectory.clone()));
        if outcome != SyncOutcome::Stale {
            self.lock_state().selected = trajectory.flight_number;
        }
        outcome
    }

    /// Removes everything drawn and forgets the loaded flights.
    pub fn clear(&self) -> SyncOutcome {
        {
            let mut state = self.lock_state();
            state.flights.clear();
            state.selected = None;
        }
        let ticket = self.lock_sync().begin();
        self.lock_sync().apply(ticket, &DesiredGeometry::default())
    }
}

impl<S: MapSurface> FlightMapView<BackendClient, S> {
    /// An unreachable backend shows an empty map.
    pub async fn load_airline(&self, airline: &str) -> SyncOutcome {
        let flights = match self.resolver.lookup().flights(airline).await {
            Ok(flights) => flights,
            Err(err) => {
                tracing::warn!("could not load flights for {airline}: {err}");
                Vec::new()
            }
        };
        self.show_flights(flights).await
    }

    /// Uses the backend trajectory, resampled over the backend's airports
    /// when its profile does not validate. Without a usable backend answer
    /// the trajectory is synthesized from the loaded list.
    pub async fn load_flight(
        &self,
        flight_number: &str,
        now: DateTime<Utc>,
    ) -> (Trajectory, SyncOutcome) {
        let ticket = self.lock_sync().begin();
        let backend = match self.resolver.lookup().trajectory(flight_number).await {
            Ok(payload) => self.sampler.accept_backend(payload, now),
            Err(err) => {
                tracing::warn!("trajectory for {flight_number} unavailable ({err})");
                None
            }
        };
        let trajectory = match backend {
            Some(trajectory) => trajectory,
            None => {
                tracing::info!("synthesizing trajectory for {flight_number}");
                self.synthesize(flight_number, now).await
            }
        };
        let outcome = self.finish_trajectory(ticket, trajectory.clone());
        (trajectory, outcome)
    }

    /// Falls back to cancelling locally when the backend cannot be reached
    /// or returns no updated list.
    pub async fn activate_crisis(&self, request: &CrisisRequest) -> SyncOutcome {
        match self.resolver.lookup().activate_crisis(request).await {
            Ok(Some(flights)) => self.show_flights(flights).await,
            Ok(None) => self.apply_crisis_override(&request.affected_airlines).await,
            Err(err) => {
                tracing::warn!("crisis activation failed ({err}), applying locally");
                self.apply_crisis_override(&request.affected_airlines).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        resolver::known_airports,
        surface::RecordingSurface,
        testing::{FakeLookup, flight, reference_time},
    };

    fn view_with(lookup: FakeLookup) -> FlightMapView<FakeLookup, RecordingSurface> {
        FlightMapView::new(
            CoordinateResolver::new(lookup),
            TrajectorySampler::default(),
            RecordingSurface::new(),
        )
    }

    fn view() -> FlightMapView<FakeLookup, RecordingSurface> {
        view_with(FakeLookup::with_airports(known_airports()))
    }

    fn board() -> Vec<FlightSummary> {
        vec![
            flight("AA100", "JFK", "LAX", FlightStatus::InFlight),
            flight("AA200", "JFK", "BOS", FlightStatus::Delayed),
            flight("DL300", "ATL", "LAX", FlightStatus::Scheduled),
        ]
    }

    fn route_layers(view: &FlightMapView<FakeLookup, RecordingSurface>) -> Vec<String> {
        view.with_surface(|s| {
            s.snapshot()
                .layers
                .iter()
                .filter(|l| l.id.starts_with("route-"))
                .map(|l| l.id.clone())
                .collect()
        })
    }

    #[tokio::test]
    async fn flights_are_drawn_with_one_lookup_per_airport() {
        let view = view();
        let outcome = view.show_flights(board()).await;
        assert!(matches!(outcome, SyncOutcome::Applied(r) if r.failed == 0));
        assert_eq!(view.mode(), RenderMode::FlightList);
        assert_eq!(route_layers(&view), vec!["route-0", "route-1", "route-2"]);
        // JFK, LAX, BOS, ATL
        assert_eq!(view.resolver().lookup().calls(), 4);
    }

    #[tokio::test]
    async fn overlapping_loads_keep_the_newest() {
        let lookup = FakeLookup::with_airports(known_airports());
        lookup.delay_code("SYD", Duration::from_millis(50));
        let view = view_with(lookup);

        let slow = vec![flight("QF1", "SYD", "LAX", FlightStatus::Scheduled)];
        let fast = vec![
            flight("AA1", "JFK", "BOS", FlightStatus::Scheduled),
            flight("AA2", "ORD", "MIA", FlightStatus::Delayed),
        ];
        let (first, second) = tokio::join!(view.show_flights(slow), view.show_flights(fast));

        assert_eq!(first, SyncOutcome::Stale);
        assert!(matches!(second, SyncOutcome::Applied(_)));
        assert_eq!(route_layers(&view), vec!["route-0", "route-1"]);
        let codes: Vec<String> = view.flights().into_iter().map(|f| f.flight_number).collect();
        assert_eq!(codes, vec!["AA1", "AA2"]);
        assert!(!view.with_surface(|s| {
            s.snapshot()
                .markers
                .values()
                .any(|m| m.popup.as_deref().is_some_and(|p| p.contains("QF1")))
        }));
    }

    #[tokio::test]
    async fn status_filter_hides_other_routes() {
        let view = view();
        view.show_flights(board()).await;
        view.set_status_filter(Some(FlightStatus::Delayed)).await;
        assert_eq!(route_layers(&view), vec!["route-0"]);
        assert_eq!(view.status_filter(), Some(FlightStatus::Delayed));

        let counts = view.status_counts();
        assert_eq!(counts[&FlightStatus::Delayed], 1);
        assert_eq!(counts[&FlightStatus::InFlight], 1);
        assert_eq!(counts[&FlightStatus::Cancelled], 0);

        view.set_status_filter(None).await;
        assert_eq!(route_layers(&view).len(), 3);
    }

    #[tokio::test]
    async fn crisis_override_cancels_only_affected_airlines() {
        let view = view();
        view.show_flights(board()).await;
        view.apply_crisis_override(&["aa".to_string()]).await;

        let statuses: Vec<(String, FlightStatus)> = view
            .flights()
            .into_iter()
            .map(|f| (f.flight_number, f.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("AA100".to_string(), FlightStatus::Cancelled),
                ("AA200".to_string(), FlightStatus::Cancelled),
                ("DL300".to_string(), FlightStatus::Scheduled),
            ]
        );
        assert_eq!(view.status_counts()[&FlightStatus::Cancelled], 2);
    }

    #[tokio::test]
    async fn selecting_a_flight_switches_to_its_trajectory() {
        let view = view();
        view.show_flights(board()).await;
        let (trajectory, outcome) = view.show_synthesized("DL300", reference_time()).await;

        assert!(matches!(
            outcome,
            SyncOutcome::Applied(r) if r.mode == RenderMode::SingleTrajectory
        ));
        assert_eq!(trajectory.origin.code, "ATL");
        assert_eq!(view.selected().as_deref(), Some("DL300"));
        assert!(route_layers(&view).is_empty());
        assert!(view.with_surface(|s| s.has_layer("trajectory-line")));
    }

    #[tokio::test]
    async fn clear_returns_to_empty() {
        let view = view();
        view.show_flights(board()).await;
        view.show_synthesized("AA100", reference_time()).await;
        view.clear();

        assert_eq!(view.mode(), RenderMode::Empty);
        assert!(view.flights().is_empty());
        assert!(view.with_surface(|s| s.snapshot().layers.is_empty()));
    }
}
