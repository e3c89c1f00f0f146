use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::json;
use shared::{
    Airport, FlightStatus, FlightSummary, TRAJECTORY_HALF_SPAN_HOURS, Trajectory,
    TrajectorySample,
};

use crate::{
    error::SurfaceError,
    sphere,
    surface::{LayerSpec, LayerStyle, MapSurface, MarkerSpec, Paint, PointFeature, SourceData},
};

/// Segments per drawn route arc.
pub const ROUTE_ARC_SEGMENTS: usize = 50;

const STATUS_BLUE: &str = "#3B82F6";
const STATUS_RED: &str = "#EF4444";
const STATUS_AMBER: &str = "#F59E0B";
const STATUS_GREEN: &str = "#10B981";
const HIGHLIGHT_YELLOW: &str = "#FDE047";

const FADE_NEAR: (u8, u8, u8) = (0xFD, 0xE0, 0x47);
const FADE_FAR: (u8, u8, u8) = (0x3B, 0x82, 0xF6);
const FADE_MAX_RADIUS: f64 = 8.0;
const FADE_MIN_RADIUS: f64 = 3.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderMode {
    #[default]
    Empty,
    FlightList,
    SingleTrajectory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    Origin,
    Destination,
}

/// Stable identity of one drawn entity on the surface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKey {
    Route(usize),
    Plane(usize),
    RouteAirport(usize, Endpoint),
    TrajectoryLine,
    TrajectoryPoints,
    CurrentPosition,
    OriginMarker,
    DestinationMarker,
    Custom(String),
}

impl LayerKey {
    pub fn id(&self) -> String {
        match self {
            LayerKey::Route(i) => format!("route-{i}"),
            LayerKey::Plane(i) => format!("plane-{i}"),
            LayerKey::RouteAirport(i, Endpoint::Origin) => format!("route-{i}-origin"),
            LayerKey::RouteAirport(i, Endpoint::Destination) => format!("route-{i}-destination"),
            LayerKey::TrajectoryLine => "trajectory-line".to_string(),
            LayerKey::TrajectoryPoints => "trajectory-points".to_string(),
            LayerKey::CurrentPosition => "current-position".to_string(),
            LayerKey::OriginMarker => "origin-marker".to_string(),
            LayerKey::DestinationMarker => "destination-marker".to_string(),
            LayerKey::Custom(id) => format!("marker-{id}"),
        }
    }

    /// The mode that owns this key; `None` for caller markers.
    pub fn mode(&self) -> Option<RenderMode> {
        match self {
            LayerKey::Route(_) | LayerKey::Plane(_) | LayerKey::RouteAirport(..) => {
                Some(RenderMode::FlightList)
            }
            LayerKey::TrajectoryLine
            | LayerKey::TrajectoryPoints
            | LayerKey::CurrentPosition
            | LayerKey::OriginMarker
            | LayerKey::DestinationMarker => Some(RenderMode::SingleTrajectory),
            LayerKey::Custom(_) => None,
        }
    }
}

/// A flight with both endpoints already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    pub flight: FlightSummary,
    pub origin: Airport,
    pub destination: Airport,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredGeometry {
    pub routes: Vec<RouteGeometry>,
    pub trajectory: Option<Trajectory>,
    /// Extra markers keyed by a caller-chosen id.
    pub markers: Vec<(String, MarkerSpec)>,
}

impl DesiredGeometry {
    pub fn flight_list(routes: Vec<RouteGeometry>) -> Self {
        Self {
            routes,
            ..Self::default()
        }
    }

    pub fn single_trajectory(trajectory: Trajectory) -> Self {
        Self {
            trajectory: Some(trajectory),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> RenderMode {
        if self.trajectory.is_some() {
            RenderMode::SingleTrajectory
        } else if !self.routes.is_empty() {
            RenderMode::FlightList
        } else {
            RenderMode::Empty
        }
    }
}

/// Proof that a sync was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTicket(u64);

impl SyncTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: RenderMode,
    pub added: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied(SyncReport),
    /// A newer sync began after this ticket was issued; nothing was touched.
    Stale,
}

enum Drawable {
    Layer { source: SourceData, layer: LayerSpec },
    Marker(MarkerSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DrawnItem {
    Layer { source_id: String, layer_id: String },
    Marker { id: String },
}

/// Sole owner of the map surface. Reconciles what is drawn with a
/// [`DesiredGeometry`], keeping at most one drawn item per [`LayerKey`].
pub struct MapSurfaceSync<S> {
    surface: S,
    registry: BTreeMap<LayerKey, DrawnItem>,
    generation: u64,
    mode: RenderMode,
}

impl<S: MapSurface> MapSurfaceSync<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            registry: BTreeMap::new(),
            generation: 0,
            mode: RenderMode::Empty,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn drawn_ids(&self) -> Vec<String> {
        self.registry.keys().map(LayerKey::id).collect()
    }

    /// Supersedes every ticket issued so far.
    pub fn begin(&mut self) -> SyncTicket {
        self.generation += 1;
        SyncTicket(self.generation)
    }

    pub fn sync(&mut self, desired: &DesiredGeometry) -> SyncReport {
        let ticket = self.begin();
        match self.apply(ticket, desired) {
            SyncOutcome::Applied(report) => report,
            // begin() just issued the only current ticket
            SyncOutcome::Stale => SyncReport {
                mode: self.mode,
                added: 0,
                removed: 0,
                failed: 0,
            },
        }
    }

    pub fn apply(&mut self, ticket: SyncTicket, desired: &DesiredGeometry) -> SyncOutcome {
        if ticket.0 != self.generation {
            tracing::debug!(
                "discarding stale sync {} (current generation {})",
                ticket.0,
                self.generation
            );
            return SyncOutcome::Stale;
        }

        let mode = desired.mode();
        if mode != self.mode {
            tracing::info!("map mode {:?} -> {:?}", self.mode, mode);
        }
        let items = desired_items(desired);
        let wanted: BTreeSet<&LayerKey> = items.iter().map(|(key, _)| key).collect();
        let mut report = SyncReport {
            mode,
            added: 0,
            removed: 0,
            failed: 0,
        };

        let outdated: Vec<LayerKey> = self
            .registry
            .keys()
            .filter(|key| !wanted.contains(key) || key.mode().is_some_and(|m| m != mode))
            .cloned()
            .collect();
        for key in outdated {
            if let Some(item) = self.registry.remove(&key) {
                self.tear_down(&item);
                report.removed += 1;
            }
        }

        for (key, drawable) in items {
            if let Some(previous) = self.registry.remove(&key) {
                self.tear_down(&previous);
                report.removed += 1;
            }
            match self.draw(&key, drawable) {
                Ok(item) => {
                    self.registry.insert(key, item);
                    report.added += 1;
                }
                Err(err) => {
                    tracing::warn!("could not draw {}: {err}", key.id());
                    report.failed += 1;
                }
            }
        }

        if let Some(trajectory) = &desired.trajectory {
            self.surface.fit_bounds(trajectory.bounds());
        }

        self.mode = mode;
        tracing::debug!(
            "sync {}: {:?} +{} -{} failed {}",
            ticket.0,
            report.mode,
            report.added,
            report.removed,
            report.failed
        );
        SyncOutcome::Applied(report)
    }

    fn draw(&mut self, key: &LayerKey, drawable: Drawable) -> Result<DrawnItem, SurfaceError> {
        let id = key.id();
        match drawable {
            Drawable::Layer { source, layer } => {
                let layer_id = layer.id.clone();
                self.surface.add_source(&id, source)?;
                if let Err(err) = self.surface.add_layer(layer) {
                    if let Err(rollback) = self.surface.remove_source(&id) {
                        tracing::warn!("rollback of source {id} failed: {rollback}");
                    }
                    return Err(err);
                }
                Ok(DrawnItem::Layer {
                    source_id: id,
                    layer_id,
                })
            }
            Drawable::Marker(marker) => {
                self.surface.add_marker(&id, marker)?;
                Ok(DrawnItem::Marker { id })
            }
        }
    }

    /// Absent targets are fine; anything else is logged and forgotten.
    fn tear_down(&mut self, item: &DrawnItem) {
        let results = match item {
            DrawnItem::Layer {
                source_id,
                layer_id,
            } => vec![
                self.surface.remove_layer(layer_id),
                self.surface.remove_source(source_id),
            ],
            DrawnItem::Marker { id } => vec![self.surface.remove_marker(id)],
        };
        for result in results {
            match result {
                Ok(()) | Err(SurfaceError::Missing(_)) => {}
                Err(err) => tracing::warn!("surface removal failed: {err}"),
            }
        }
    }
}

pub fn status_color(status: FlightStatus) -> &'static str {
    match status {
        FlightStatus::Cancelled => STATUS_RED,
        FlightStatus::Delayed => STATUS_AMBER,
        FlightStatus::Boarding => STATUS_GREEN,
        _ => STATUS_BLUE,
    }
}

/// Radius and colour of a trajectory sample, brightest at the current hour.
pub fn sample_fade(hour_offset: i32) -> (f64, String) {
    let span = f64::from(TRAJECTORY_HALF_SPAN_HOURS);
    let nearness = 1.0 - (f64::from(hour_offset.abs()) / span).min(1.0);
    let radius = FADE_MIN_RADIUS + (FADE_MAX_RADIUS - FADE_MIN_RADIUS) * nearness;
    let blend = |far: u8, near: u8| {
        (f64::from(far) + (f64::from(near) - f64::from(far)) * nearness).round() as u8
    };
    let color = format!(
        "#{:02X}{:02X}{:02X}",
        blend(FADE_FAR.0, FADE_NEAR.0),
        blend(FADE_FAR.1, FADE_NEAR.1),
        blend(FADE_FAR.2, FADE_NEAR.2),
    );
    (radius, color)
}

fn airport_popup(airport: &Airport, detail: &str) -> String {
    format!("{}\n{}\n{}", airport.code, airport.display_name, detail)
}

fn desired_items(desired: &DesiredGeometry) -> Vec<(LayerKey, Drawable)> {
    let mut items = Vec::new();
    match &desired.trajectory {
        Some(trajectory) => trajectory_items(trajectory, &mut items),
        None => {
            for (index, route) in desired.routes.iter().enumerate() {
                route_items(index, route, &mut items);
            }
        }
    }
    for (id, marker) in &desired.markers {
        items.push((LayerKey::Custom(id.clone()), Drawable::Marker(marker.clone())));
    }
    items
}

fn route_items(index: usize, route: &RouteGeometry, items: &mut Vec<(LayerKey, Drawable)>) {
    let flight = &route.flight;
    let color = status_color(flight.status);
    let start = route.origin.location;
    let end = route.destination.location;

    let key = LayerKey::Route(index);
    let id = key.id();
    items.push((
        key,
        Drawable::Layer {
            source: SourceData::line(&sphere::arc(start, end, ROUTE_ARC_SEGMENTS)),
            layer: LayerSpec {
                id: id.clone(),
                source: id,
                style: LayerStyle::Line {
                    color: color.to_string(),
                    width: 3.0,
                    opacity: 0.9,
                    blur: 1.0,
                },
            },
        },
    ));

    if let (FlightStatus::InFlight, Some(progress)) = (flight.status, flight.progress) {
        let key = LayerKey::Plane(index);
        let id = key.id();
        let position = sphere::interpolate(start, end, progress / 100.0);
        let properties =
            BTreeMap::from([("flightNumber".to_string(), json!(flight.flight_number))]);
        items.push((
            key,
            Drawable::Layer {
                source: SourceData::point(position, properties),
                layer: LayerSpec {
                    id: id.clone(),
                    source: id,
                    style: LayerStyle::Circle {
                        radius: Paint::Constant(json!(8)),
                        color: Paint::Constant(json!(color)),
                        stroke_color: "#ffffff".to_string(),
                        stroke_width: 2.0,
                    },
                },
            },
        ));
    }

    let marker_color = if flight.status == FlightStatus::Cancelled {
        STATUS_RED
    } else {
        STATUS_GREEN
    };
    let detail = format!("{} - {}", flight.flight_number, flight.status.label());
    for (endpoint, airport) in [
        (Endpoint::Origin, &route.origin),
        (Endpoint::Destination, &route.destination),
    ] {
        items.push((
            LayerKey::RouteAirport(index, endpoint),
            Drawable::Marker(MarkerSpec {
                location: airport.location,
                color: marker_color.to_string(),
                scale: 0.8,
                popup: Some(airport_popup(airport, &detail)),
            }),
        ));
    }
}

fn sample_feature(sample: &TrajectorySample) -> PointFeature {
    let (radius, color) = sample_fade(sample.hour_offset);
    let properties = BTreeMap::from([
        ("radius".to_string(), json!(radius)),
        ("color".to_string(), json!(color)),
        ("hourOffset".to_string(), json!(sample.hour_offset)),
        ("altitude".to_string(), json!(sample.altitude_feet)),
        ("speed".to_string(), json!(sample.speed_mph)),
        ("timestamp".to_string(), json!(sample.timestamp.to_rfc3339())),
    ]);
    PointFeature::new(sample.location(), properties)
}

fn trajectory_items(trajectory: &Trajectory, items: &mut Vec<(LayerKey, Drawable)>) {
    let label = trajectory.flight_number.as_deref().unwrap_or("Flight");

    let key = LayerKey::TrajectoryLine;
    let id = key.id();
    items.push((
        key,
        Drawable::Layer {
            source: SourceData::line(&trajectory.path()),
            layer: LayerSpec {
                id: id.clone(),
                source: id,
                style: LayerStyle::Line {
                    color: STATUS_BLUE.to_string(),
                    width: 3.0,
                    opacity: 0.8,
                    blur: 0.0,
                },
            },
        },
    ));

    let key = LayerKey::TrajectoryPoints;
    let id = key.id();
    items.push((
        key,
        Drawable::Layer {
            source: SourceData::Points(trajectory.samples().iter().map(sample_feature).collect()),
            layer: LayerSpec {
                id: id.clone(),
                source: id,
                style: LayerStyle::Circle {
                    radius: Paint::property("radius"),
                    color: Paint::property("color"),
                    stroke_color: "#ffffff".to_string(),
                    stroke_width: 1.0,
                },
            },
        },
    ));

    let current = trajectory.current_position();
    items.push((
        LayerKey::CurrentPosition,
        Drawable::Marker(MarkerSpec {
            location: current.location(),
            color: HIGHLIGHT_YELLOW.to_string(),
            scale: 1.2,
            popup: Some(format!(
                "{label}\n{} ft - {} mph",
                current.altitude_feet, current.speed_mph
            )),
        }),
    ));

    for (key, airport, color, detail) in [
        (LayerKey::OriginMarker, &trajectory.origin, STATUS_GREEN, "departure"),
        (LayerKey::DestinationMarker, &trajectory.destination, STATUS_RED, "arrival"),
    ] {
        items.push((
            key,
            Drawable::Marker(MarkerSpec {
                location: airport.location,
                color: color.to_string(),
                scale: 0.8,
                popup: Some(airport_popup(airport, &format!("{label} {detail}"))),
            }),
        ));
    }
}
