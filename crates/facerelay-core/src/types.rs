use serde::{Deserialize, Deserializer, Serialize};

/// One polygon corner as reported by the detection provider.
///
/// The provider omits a coordinate when it has no value for it, so each axis
/// is optional. Values that are present but not finite numbers are read as
/// absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default, deserialize_with = "numeric", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, deserialize_with = "numeric", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y) }
    }
}

/// A single face detection: the provider's bounding polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

impl RawAnnotation {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }
}

/// Axis-aligned face rectangle. `w` and `h` are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rectangle {
    /// Bounding rectangle of an annotation's usable coordinates.
    ///
    /// Returns `None` when no vertex supplies an x coordinate, or none supplies
    /// a y coordinate. Such polygons are dropped rather than defaulted to zero.
    /// An axis whose extent overflows `f64` is treated as unusable too.
    pub fn from_annotation(annotation: &RawAnnotation) -> Option<Self> {
        let (x, w) = span(annotation.vertices.iter().filter_map(|v| v.x))?;
        let (y, h) = span(annotation.vertices.iter().filter_map(|v| v.y))?;
        Some(Self { x, y, w, h })
    }
}

/// Leading edge and length of an axis, or `None` if it has no finite values
/// or its length is not representable.
fn span(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = extent(values)?;
    let len = hi - lo;
    len.is_finite().then_some((lo, len))
}

/// Min and max over the finite values, or `None` if there are none.
fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn numeric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_f64()).filter(|v| v.is_finite()))
}
