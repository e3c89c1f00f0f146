use std::collections::BTreeMap;

use geo_types::{LineString, Point};
use serde::Serialize;
use shared::{GeoPoint, MapBounds};

use crate::error::SurfaceError;

/// Geometry a layer can draw. Coordinates are `x = lon, y = lat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SourceData {
    Line(LineString<f64>),
    Points(Vec<PointFeature>),
}

impl SourceData {
    pub fn line(path: &[GeoPoint]) -> Self {
        SourceData::Line(path.iter().map(|p| (p.longitude, p.latitude)).collect())
    }

    pub fn point(location: GeoPoint, properties: BTreeMap<String, serde_json::Value>) -> Self {
        SourceData::Points(vec![PointFeature::new(location, properties)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointFeature {
    pub point: Point<f64>,
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl PointFeature {
    pub fn new(location: GeoPoint, properties: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            point: Point::new(location.longitude, location.latitude),
            properties,
        }
    }
}

/// A paint value: fixed, or read per feature from a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Paint {
    Constant(serde_json::Value),
    Property { property: String },
}

impl Paint {
    pub fn property(name: &str) -> Self {
        Paint::Property {
            property: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerStyle {
    Line {
        color: String,
        width: f64,
        opacity: f64,
        blur: f64,
    },
    Circle {
        radius: Paint,
        color: Paint,
        stroke_color: String,
        stroke_width: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub style: LayerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub location: GeoPoint,
    pub color: String,
    pub scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup: Option<String>,
}

/// The rendering provider's declarative geometry operations.
///
/// Adding an id that is already present is an error, and so is removing an
/// absent one; callers that want idempotence track what they drew.
pub trait MapSurface {
    fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn add_marker(&mut self, id: &str, marker: MarkerSpec) -> Result<(), SurfaceError>;
    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn fit_bounds(&mut self, bounds: MapBounds);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "id", rename_all = "snake_case")]
pub enum SurfaceOp {
    AddSource(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    AddMarker(String),
    RemoveMarker(String),
    FitBounds,
}

/// Serializable view of everything currently drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSnapshot {
    pub sources: BTreeMap<String, SourceData>,
    pub layers: Vec<LayerSpec>,
    pub markers: BTreeMap<String, MarkerSpec>,
    pub fitted_bounds: Option<MapBounds>,
}

impl SurfaceSnapshot {
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }
}

/// In-memory surface. Used headless by the map service and by tests, which
/// can make selected layer adds fail.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    sources: BTreeMap<String, SourceData>,
    layers: Vec<LayerSpec>,
    markers: BTreeMap<String, MarkerSpec>,
    fitted_bounds: Option<MapBounds>,
    ops: Vec<SurfaceOp>,
    fail_layers_matching: Option<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later `add_layer` whose id contains `pattern` is rejected.
    pub fn fail_layer_adds_matching(&mut self, pattern: impl Into<String>) {
        self.fail_layers_matching = Some(pattern.into());
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    pub fn has_marker(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            sources: self.sources.clone(),
            layers: self.layers.clone(),
            markers: self.markers.clone(),
            fitted_bounds: self.fitted_bounds,
        }
    }
}

impl MapSurface for RecordingSurface {
    fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::Duplicate(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        self.ops.push(SurfaceOp::AddSource(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.layers.iter().any(|l| l.source == id) {
            return Err(SurfaceError::Rejected(format!("source {id} is still in use")));
        }
        self.sources
            .remove(id)
            .ok_or_else(|| SurfaceError::Missing(id.to_string()))?;
        self.ops.push(SurfaceOp::RemoveSource(id.to_string()));
        Ok(())
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), SurfaceError> {
        let injected = self
            .fail_layers_matching
            .as_deref()
            .is_some_and(|pattern| layer.id.contains(pattern));
        if injected {
            return Err(SurfaceError::Rejected(format!("layer {}", layer.id)));
        }
        if self.has_layer(&layer.id) {
            return Err(SurfaceError::Duplicate(layer.id));
        }
        if !self.sources.contains_key(&layer.source) {
            return Err(SurfaceError::Missing(layer.source));
        }
        self.ops.push(SurfaceOp::AddLayer(layer.id.clone()));
        self.layers.push(layer);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let index = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| SurfaceError::Missing(id.to_string()))?;
        self.layers.remove(index);
        self.ops.push(SurfaceOp::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn add_marker(&mut self, id: &str, marker: MarkerSpec) -> Result<(), SurfaceError> {
        if self.markers.contains_key(id) {
            return Err(SurfaceError::Duplicate(id.to_string()));
        }
        self.markers.insert(id.to_string(), marker);
        self.ops.push(SurfaceOp::AddMarker(id.to_string()));
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.markers
            .remove(id)
            .ok_or_else(|| SurfaceError::Missing(id.to_string()))?;
        self.ops.push(SurfaceOp::RemoveMarker(id.to_string()));
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: MapBounds) {
        self.fitted_bounds = Some(bounds);
        self.ops.push(SurfaceOp::FitBounds);
    }
}
