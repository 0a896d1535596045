use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Axis-aligned geographic bounding box in WGS84 degrees.
///
/// Construction through [`BoundingBox::new`] is unchecked; use
/// [`BoundingBox::try_new`] or [`BoundingBox::validate`] at input boundaries.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundsError {
    NonFinite,
    Inverted { axis: &'static str, min: f64, max: f64 },
    LatitudeOutOfRange(f64),
    Parse(String),
}

impl std::fmt::Display for BoundsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundsError::NonFinite => write!(f, "bbox contains a non-finite coordinate"),
            BoundsError::Inverted { axis, min, max } => {
                write!(f, "bbox {axis} range is inverted: min={min} max={max}")
            }
            BoundsError::LatitudeOutOfRange(lat) => {
                write!(f, "latitude {lat} is outside [-90, 90]")
            }
            BoundsError::Parse(msg) => write!(f, "invalid bbox: {msg}"),
        }
    }
}

impl std::error::Error for BoundsError {}

impl BoundingBox {
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn try_new(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundsError> {
        let bbox = Self::new(min_lon, min_lat, max_lon, max_lat);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Checks `min <= max` on both axes, finiteness and the latitude range.
    pub fn validate(&self) -> Result<(), BoundsError> {
        let coords = [self.min_lon, self.min_lat, self.max_lon, self.max_lat];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(BoundsError::NonFinite);
        }
        if self.min_lon > self.max_lon {
            return Err(BoundsError::Inverted {
                axis: "longitude",
                min: self.min_lon,
                max: self.max_lon,
            });
        }
        if self.min_lat > self.max_lat {
            return Err(BoundsError::Inverted {
                axis: "latitude",
                min: self.min_lat,
                max: self.max_lat,
            });
        }
        for lat in [self.min_lat, self.max_lat] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(BoundsError::LatitudeOutOfRange(lat));
            }
        }
        Ok(())
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Scales the box symmetrically about its center.
    pub fn expand(&self, factor: f64) -> Self {
        let (lon, lat) = self.center();
        let half_w = self.width() * factor / 2.0;
        let half_h = self.height() * factor / 2.0;
        Self::new(lon - half_w, lat - half_h, lon + half_w, lat + half_h)
    }

    /// True when `other` lies entirely inside `self` (edges inclusive).
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_lon >= self.min_lon
            && other.max_lon <= self.max_lon
            && other.min_lat >= self.min_lat
            && other.max_lat <= self.max_lat
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    /// `minLon,minLat,maxLon,maxLat` with fixed precision, used in request URLs.
    pub fn to_query_value(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

impl FromStr for BoundingBox {
    type Err = BoundsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|e| BoundsError::Parse(format!("{p:?}: {e}")))
            })
            .collect::<Result<_, _>>()?;

        let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
            return Err(BoundsError::Parse(format!(
                "expected 4 comma-separated values, got {}",
                parts.len()
            )));
        };
        Self::try_new(min_lon, min_lat, max_lon, max_lat)
    }
}
