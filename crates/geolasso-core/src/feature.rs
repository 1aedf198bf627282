//! Vector features: geometry, scalar attributes and stable identity.

use geo::{BoundingRect, Geometry, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// Numeric reading of the value. Text counts when it parses as a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) if n.is_finite() => Some(*n),
            AttrValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Convert an arbitrary JSON value into a scalar. Nested values keep their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(AttrValue::Number).unwrap_or(AttrValue::Null),
            serde_json::Value::String(s) => AttrValue::Text(s.clone()),
            other => AttrValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "null"),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Number(n) => write!(f, "{}", format_number(*n)),
            AttrValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Number(value as f64)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Attribute map, ordered by key so serialization is canonical.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Stable identity of a feature within a layer.
///
/// Explicit ids are used when the source provides one. Otherwise the key is
/// the canonical JSON of the attribute map, so two features with identical
/// attributes and no id are the same feature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureKey(String);

impl FeatureKey {
    /// Key for an explicit source id.
    pub fn explicit(id: impl fmt::Display) -> Self {
        Self(format!("id:{}", id))
    }

    /// Key derived from the attribute map.
    pub fn derived(attributes: &Attributes) -> Self {
        // A BTreeMap of scalars always serializes; the fallback keeps this total.
        let canonical = serde_json::to_string(attributes).unwrap_or_else(|_| format!("{:?}", attributes));
        Self(format!("attrs:{}", canonical))
    }

    /// Whether this key came from an explicit id.
    pub fn is_explicit(&self) -> bool {
        self.0.starts_with("id:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One geometry plus attributes plus identity.
///
/// Geometry and attributes are shared, so cloning a feature into a selection
/// is cheap. The bounding box is computed once at construction.
#[derive(Debug, Clone)]
pub struct Feature {
    key: FeatureKey,
    geometry: Arc<Geometry<f64>>,
    attributes: Arc<Attributes>,
    bounds: Option<Rect<f64>>,
}

impl Feature {
    /// Create a feature without an explicit id.
    pub fn new(geometry: impl Into<Geometry<f64>>, attributes: Attributes) -> Self {
        let key = FeatureKey::derived(&attributes);
        Self::with_key(key, geometry.into(), attributes)
    }

    /// Create a feature with an explicit id.
    pub fn with_id(id: impl fmt::Display, geometry: impl Into<Geometry<f64>>, attributes: Attributes) -> Self {
        Self::with_key(FeatureKey::explicit(id), geometry.into(), attributes)
    }

    fn with_key(key: FeatureKey, geometry: Geometry<f64>, attributes: Attributes) -> Self {
        let bounds = geometry.bounding_rect();
        Self {
            key,
            geometry: Arc::new(geometry),
            attributes: Arc::new(attributes),
            bounds,
        }
    }

    pub fn key(&self) -> &FeatureKey {
        &self.key
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Value of one attribute, if present.
    pub fn attribute(&self, field: &str) -> Option<&AttrValue> {
        self.attributes.get(field)
    }

    /// Cached bounding box. `None` for empty geometries.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    /// Short geometry type name, used in logs.
    pub fn kind(&self) -> &'static str {
        geometry_kind(&self.geometry)
    }
}

/// GeoJSON-style name of a geometry variant.
pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Build an attribute map from `(key, value)` pairs.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<AttrValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    #[test]
    fn test_derived_identity_is_structural() {
        let a = Feature::new(point!(x: 1.0, y: 2.0), attributes([("name", "a"), ("kind", "x")]));
        let b = Feature::new(point!(x: 5.0, y: 5.0), attributes([("kind", "x"), ("name", "a")]));
        assert_eq!(a.key(), b.key());
        assert!(!a.key().is_explicit());
    }

    #[test]
    fn test_explicit_identity() {
        let a = Feature::with_id(7, point!(x: 1.0, y: 2.0), Attributes::new());
        let b = Feature::with_id("7", point!(x: 1.0, y: 2.0), Attributes::new());
        assert_eq!(a.key(), b.key());
        assert!(a.key().is_explicit());

        let derived = Feature::new(point!(x: 1.0, y: 2.0), Attributes::new());
        assert_ne!(a.key(), derived.key());
    }

    #[test]
    fn test_bounds_cached() {
        let feature = Feature::new(
            polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 2.0), (x: 0.0, y: 0.0)],
            Attributes::new(),
        );
        let bounds = feature.bounds().unwrap();
        assert_eq!(bounds.min().x, 0.0);
        assert_eq!(bounds.max().x, 4.0);
        assert_eq!(bounds.max().y, 2.0);
        assert_eq!(feature.kind(), "Polygon");
    }

    #[test]
    fn test_attr_numbers() {
        assert_eq!(AttrValue::Number(2.5).as_number(), Some(2.5));
        assert_eq!(AttrValue::Text(" 12 ".into()).as_number(), Some(12.0));
        assert_eq!(AttrValue::Text("abc".into()).as_number(), None);
        assert_eq!(AttrValue::Bool(true).as_number(), None);
        assert_eq!(AttrValue::Number(f64::NAN).as_number(), None);
    }

    #[test]
    fn test_attr_display() {
        assert_eq!(AttrValue::Number(3.0).to_string(), "3");
        assert_eq!(AttrValue::Number(2.5).to_string(), "2.5");
        assert_eq!(AttrValue::Text("road".into()).to_string(), "road");
    }

    #[test]
    fn test_attr_from_json() {
        let value = serde_json::json!({"a": 1});
        assert_eq!(AttrValue::from_json(&value), AttrValue::Text("{\"a\":1}".into()));
        assert_eq!(AttrValue::from_json(&serde_json::json!(4)), AttrValue::Number(4.0));
        assert_eq!(AttrValue::from_json(&serde_json::Value::Null), AttrValue::Null);
    }
}
