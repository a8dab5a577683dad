use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Input feature model: GeoJSON-like geometries in WGS84 degrees (+ optional height in metres)

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    Circle,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Point => "Point",
            GeometryKind::LineString => "LineString",
            GeometryKind::Polygon => "Polygon",
            GeometryKind::Circle => "Circle",
            GeometryKind::MultiPoint => "MultiPoint",
            GeometryKind::MultiLineString => "MultiLineString",
            GeometryKind::MultiPolygon => "MultiPolygon",
            GeometryKind::GeometryCollection => "GeometryCollection",
        };
        f.write_str(name)
    }
}

/// Whether the source coordinates carry a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryLayout {
    XY,
    XYZ,
}

impl GeometryLayout {
    pub fn stride(self) -> usize {
        match self {
            GeometryLayout::XY => 2,
            GeometryLayout::XYZ => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Vec<f64>,
    },
    LineString {
        coordinates: Vec<Vec<f64>>,
    },
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    /// Circle with a radius in metres
    Circle {
        center: Vec<f64>,
        radius: f64,
    },
    MultiPoint {
        coordinates: Vec<Vec<f64>>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
    },
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point { .. } => GeometryKind::Point,
            Geometry::LineString { .. } => GeometryKind::LineString,
            Geometry::Polygon { .. } => GeometryKind::Polygon,
            Geometry::Circle { .. } => GeometryKind::Circle,
            Geometry::MultiPoint { .. } => GeometryKind::MultiPoint,
            Geometry::MultiLineString { .. } => GeometryKind::MultiLineString,
            Geometry::MultiPolygon { .. } => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection { .. } => GeometryKind::GeometryCollection,
        }
    }

    /// All positions of the geometry in order. A circle contributes its center.
    pub fn coordinates(&self) -> Vec<&[f64]> {
        match self {
            Geometry::Point { coordinates } => vec![coordinates.as_slice()],
            Geometry::Circle { center, .. } => vec![center.as_slice()],
            Geometry::LineString { coordinates } | Geometry::MultiPoint { coordinates } => {
                coordinates.iter().map(Vec::as_slice).collect()
            }
            Geometry::Polygon { coordinates } | Geometry::MultiLineString { coordinates } => {
                coordinates.iter().flatten().map(Vec::as_slice).collect()
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .map(Vec::as_slice)
                .collect(),
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().flat_map(|g| g.coordinates()).collect()
            }
        }
    }

    /// XYZ as soon as the first position carries a height.
    pub fn layout(&self) -> GeometryLayout {
        match self.coordinates().first() {
            Some(c) if c.len() >= 3 => GeometryLayout::XYZ,
            _ => GeometryLayout::XY,
        }
    }

    /// Coordinates flattened with the stride of `layout()`. Missing heights become NaN.
    pub fn flat_coordinates(&self) -> Vec<f64> {
        let stride = self.layout().stride();
        let coordinates = self.coordinates();
        let mut flat = Vec::with_capacity(coordinates.len() * stride);
        for c in coordinates {
            for i in 0..stride {
                flat.push(c.get(i).copied().unwrap_or(f64::NAN));
            }
        }
        flat
    }

    /// Splits multi geometries and collections into their simple parts.
    pub fn simple_geometries(&self) -> Vec<Geometry> {
        match self {
            Geometry::MultiPoint { coordinates } => coordinates
                .iter()
                .map(|c| Geometry::Point {
                    coordinates: c.clone(),
                })
                .collect(),
            Geometry::MultiLineString { coordinates } => coordinates
                .iter()
                .map(|c| Geometry::LineString {
                    coordinates: c.clone(),
                })
                .collect(),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .map(|c| Geometry::Polygon {
                    coordinates: c.clone(),
                })
                .collect(),
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().flat_map(|g| g.simple_geometries()).collect()
            }
            simple => vec![simple.clone()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, deserialize_with = "deserialize_feature_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry: Some(geometry),
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }
}

// GeoJSON allows string and numeric ids
fn deserialize_feature_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Validation gates. Callers skip geometries failing these before any factory call.

fn is_valid_coordinate(coordinate: &[f64]) -> bool {
    (2..=3).contains(&coordinate.len()) && coordinate.iter().all(|v| v.is_finite())
}

fn is_valid_path(coordinates: &[Vec<f64>], min_len: usize) -> bool {
    let Some(first) = coordinates.first() else {
        return false;
    };
    coordinates.len() >= min_len
        && coordinates
            .iter()
            .all(|c| c.len() == first.len() && is_valid_coordinate(c))
}

pub fn validate_point(geometry: &Geometry) -> bool {
    matches!(geometry, Geometry::Point { coordinates } if is_valid_coordinate(coordinates))
}

pub fn validate_line_string(geometry: &Geometry) -> bool {
    matches!(geometry, Geometry::LineString { coordinates } if is_valid_path(coordinates, 2))
}

pub fn validate_polygon(geometry: &Geometry) -> bool {
    let Geometry::Polygon { coordinates } = geometry else {
        return false;
    };
    let Some(stride) = coordinates.first().and_then(|ring| ring.first()).map(Vec::len) else {
        return false;
    };
    coordinates
        .iter()
        .all(|ring| is_valid_path(ring, 3) && ring[0].len() == stride)
}

pub fn validate_circle(geometry: &Geometry) -> bool {
    matches!(
        geometry,
        Geometry::Circle { center, radius }
            if is_valid_coordinate(center) && radius.is_finite() && *radius > 0.0
    )
}

/// Dispatches to the gate matching the geometry's kind. Multi geometries are not simple and fail.
pub fn validate_geometry(geometry: &Geometry) -> bool {
    match geometry.kind() {
        GeometryKind::Point => validate_point(geometry),
        GeometryKind::LineString => validate_line_string(geometry),
        GeometryKind::Polygon => validate_polygon(geometry),
        GeometryKind::Circle => validate_circle(geometry),
        _ => false,
    }
}

/// Drops the closing position of a ring if it repeats the first one.
pub fn open_ring(ring: &[Vec<f64>]) -> &[Vec<f64>] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_geojson_like_geometries() {
        let geometry: Geometry = serde_json::from_value(json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 0.0, 1.0]]]
        }))
        .unwrap();
        assert_eq!(geometry.kind(), GeometryKind::Polygon);
        assert_eq!(geometry.layout(), GeometryLayout::XYZ);
        assert_eq!(geometry.flat_coordinates().len(), 12);

        let circle: Geometry =
            serde_json::from_value(json!({ "type": "Circle", "center": [1.0, 1.0], "radius": 10.0 }))
                .unwrap();
        assert_eq!(circle.layout(), GeometryLayout::XY);
    }

    #[test]
    fn numeric_feature_ids_become_strings() {
        let feature: Feature = serde_json::from_value(json!({
            "id": 42,
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
        }))
        .unwrap();
        assert_eq!(feature.id.as_deref(), Some("42"));
    }

    #[test]
    fn validation_rejects_ragged_and_non_finite_coordinates() {
        let ragged = Geometry::LineString {
            coordinates: vec![vec![0.0, 0.0, 1.0], vec![1.0, 1.0]],
        };
        assert!(!validate_line_string(&ragged));

        let non_finite = Geometry::Point {
            coordinates: vec![f64::NAN, 1.0],
        };
        assert!(!validate_point(&non_finite));

        let short_ring = Geometry::Polygon {
            coordinates: vec![vec![vec![0.0, 0.0], vec![1.0, 1.0]]],
        };
        assert!(!validate_polygon(&short_ring));

        let zero_radius = Geometry::Circle {
            center: vec![1.0, 1.0],
            radius: 0.0,
        };
        assert!(!validate_circle(&zero_radius));
    }

    #[test]
    fn validation_rejects_wrong_kind() {
        let point = Geometry::Point {
            coordinates: vec![1.0, 2.0],
        };
        assert!(validate_point(&point));
        assert!(!validate_line_string(&point));
        assert!(!validate_polygon(&point));
        assert!(!validate_circle(&point));
    }

    #[test]
    fn multi_geometries_split_into_simple_parts() {
        let multi = Geometry::GeometryCollection {
            geometries: vec![
                Geometry::MultiPoint {
                    coordinates: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
                },
                Geometry::Circle {
                    center: vec![1.0, 1.0],
                    radius: 2.0,
                },
            ],
        };
        let simple = multi.simple_geometries();
        assert_eq!(simple.len(), 3);
        assert!(simple.iter().all(validate_geometry));
    }

    #[test]
    fn open_ring_drops_closing_position() {
        let ring = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        assert_eq!(open_ring(&ring).len(), 3);
        assert_eq!(open_ring(&ring[..3]).len(), 3);
    }
}
