//! Vector layers, the active-layer registry and GeoJSON import.

use crate::error::LayerError;
use crate::feature::{AttrValue, Attributes, Feature};
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect};
use serde_json::Value;
use std::collections::BTreeMap;

/// Identifier of a loaded layer.
pub type LayerId = String;

/// Source of the features a stroke is tested against.
///
/// Implemented by the host's layer registry; the active layer is tracked
/// outside the selection engine.
pub trait LayerRegistry {
    /// Id of the currently active layer, if any.
    fn active_layer_id(&self) -> Option<LayerId>;

    /// Features of the active layer. Empty when no layer is active.
    fn active_layer_features(&self) -> Vec<Feature>;
}

/// A named collection of features.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(id: impl Into<LayerId>, features: Vec<Feature>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of the features' bounding boxes.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features.iter().filter_map(Feature::bounds).reduce(|acc, b| {
            Rect::new(
                Coord {
                    x: acc.min().x.min(b.min().x),
                    y: acc.min().y.min(b.min().y),
                },
                Coord {
                    x: acc.max().x.max(b.max().x),
                    y: acc.max().y.max(b.max().y),
                },
            )
        })
    }

    /// Import a GeoJSON `FeatureCollection` (or a single `Feature`).
    ///
    /// Features with missing or unsupported geometry are skipped with a warning.
    pub fn from_geojson(id: impl Into<LayerId>, json: &str) -> Result<Self, LayerError> {
        let data: Value = serde_json::from_str(json)?;
        let members = match data.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => data
                .get("features")
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| LayerError::Format("Missing 'features' array".to_string()))?,
            Some("Feature") => vec![data.clone()],
            Some(other) => return Err(LayerError::Format(format!("Unsupported GeoJSON type '{}'", other))),
            None => return Err(LayerError::Format("Missing 'type'".to_string())),
        };

        let mut layer = Self::new(id, Vec::with_capacity(members.len()));
        if let Some(name) = data.get("name").and_then(Value::as_str) {
            layer.name = name.to_string();
        }

        for (index, member) in members.iter().enumerate() {
            match parse_feature(member) {
                Ok(feature) => layer.features.push(feature),
                Err(e) => log::warn!("Skipping feature #{} of layer '{}': {}", index, layer.id, e),
            }
        }
        log::info!("Loaded layer '{}' with {} features", layer.id, layer.features.len());
        Ok(layer)
    }
}

fn parse_feature(member: &Value) -> Result<Feature, LayerError> {
    let geometry = member
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or_else(|| LayerError::Format("Missing geometry".to_string()))?;
    let geometry = parse_geometry(geometry)?;

    let attributes: Attributes = member
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.iter().map(|(k, v)| (k.clone(), AttrValue::from_json(v))).collect())
        .unwrap_or_default();

    let feature = match member.get("id") {
        Some(Value::String(id)) => Feature::with_id(id, geometry, attributes),
        Some(Value::Number(id)) => Feature::with_id(id, geometry, attributes),
        _ => Feature::new(geometry, attributes),
    };
    Ok(feature)
}

/// Parse a GeoJSON geometry object.
pub fn parse_geometry(value: &Value) -> Result<Geometry<f64>, LayerError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| LayerError::Format("Geometry without 'type'".to_string()))?;

    if kind == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| LayerError::Format("Missing 'geometries' array".to_string()))?;
        let geometries = members.iter().map(parse_geometry).collect::<Result<Vec<_>, _>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection::from(geometries)));
    }

    let coords = value
        .get("coordinates")
        .ok_or_else(|| LayerError::Format(format!("{} without 'coordinates'", kind)))?;

    let geometry = match kind {
        "Point" => Geometry::Point(Point::from(parse_coord(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint::new(
            parse_coords(coords)?.into_iter().map(Point::from).collect(),
        )),
        "LineString" => Geometry::LineString(LineString::from(parse_coords(coords)?)),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString::new(
            parse_list(coords)?
                .iter()
                .map(|line| parse_coords(line).map(LineString::from))
                .collect::<Result<_, _>>()?,
        )),
        "Polygon" => Geometry::Polygon(parse_polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon::new(
            parse_list(coords)?.iter().map(parse_polygon).collect::<Result<_, _>>()?,
        )),
        other => return Err(LayerError::Format(format!("Unsupported geometry type '{}'", other))),
    };
    Ok(geometry)
}

fn parse_list(value: &Value) -> Result<&Vec<Value>, LayerError> {
    value
        .as_array()
        .ok_or_else(|| LayerError::Format("Expected an array of coordinates".to_string()))
}

fn parse_coord(value: &Value) -> Result<Coord<f64>, LayerError> {
    let pair = parse_list(value)?;
    let x = pair.first().and_then(Value::as_f64);
    let y = pair.get(1).and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(LayerError::Format(format!("Invalid position {}", value))),
    }
}

fn parse_coords(value: &Value) -> Result<Vec<Coord<f64>>, LayerError> {
    parse_list(value)?.iter().map(parse_coord).collect()
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>, LayerError> {
    let mut rings = parse_list(value)?
        .iter()
        .map(|ring| parse_coords(ring).map(LineString::from))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| LayerError::Format("Polygon without rings".to_string()))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

/// In-memory registry of loaded layers with one active layer.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: BTreeMap<LayerId, Layer>,
    active: Option<LayerId>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a layer. The first layer added becomes active.
    pub fn add_layer(&mut self, layer: Layer) {
        if self.active.is_none() {
            self.active = Some(layer.id.clone());
        }
        self.layers.insert(layer.id.clone(), layer);
    }

    /// Make `id` the active layer. Returns false for unknown ids.
    pub fn set_active(&mut self, id: &str) -> bool {
        if self.layers.contains_key(id) {
            self.active = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Deactivate every layer.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.active.as_deref().and_then(|id| self.layers.get(id))
    }

    pub fn remove_layer(&mut self, id: &str) -> Option<Layer> {
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        self.layers.remove(id)
    }
}

impl LayerRegistry for LayerStore {
    fn active_layer_id(&self) -> Option<LayerId> {
        self.active.clone()
    }

    fn active_layer_features(&self) -> Vec<Feature> {
        self.active_layer().map(|layer| layer.features.clone()).unwrap_or_default()
    }
}
