//! Coordinates and great-circle distance helpers.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0088;
// Slightly under the true arc length so the box never clips the circle.
const KM_PER_DEGREE_LAT: f64 = 111.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeoError {
    #[error("Latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("Longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    /// Smallest latitude/longitude box containing the circle of `radius_km`.
    ///
    /// Near ±180° the longitude range wraps, leaving `min_longitude` greater
    /// than `max_longitude`; see [`BoundingBox::crosses_antimeridian`].
    pub fn bounding_box(&self, radius_km: f64) -> BoundingBox {
        let d_lat = radius_km / KM_PER_DEGREE_LAT;
        let cos_lat = self.latitude.to_radians().cos();
        let d_lon = if cos_lat.abs() < 1e-9 {
            180.0
        } else {
            radius_km / (KM_PER_DEGREE_LAT * cos_lat.abs())
        };

        let (min_longitude, max_longitude) = if d_lon >= 180.0 {
            (-180.0, 180.0)
        } else {
            let (min, max) = (self.longitude - d_lon, self.longitude + d_lon);
            if min < -180.0 {
                (min + 360.0, max)
            } else if max > 180.0 {
                (min, max - 360.0)
            } else {
                (min, max)
            }
        };

        BoundingBox {
            min_latitude: (self.latitude - d_lat).max(-90.0),
            max_latitude: (self.latitude + d_lat).min(90.0),
            min_longitude,
            max_longitude,
        }
    }

    pub fn to_geojson(&self) -> GeoJsonPoint {
        GeoJsonPoint {
            kind: "Point".to_string(),
            coordinates: [self.longitude, self.latitude],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_longitude > self.max_longitude
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        let longitude_ok = if self.crosses_antimeridian() {
            point.longitude >= self.min_longitude || point.longitude <= self.max_longitude
        } else {
            (self.min_longitude..=self.max_longitude).contains(&point.longitude)
        };
        longitude_ok && (self.min_latitude..=self.max_latitude).contains(&point.latitude)
    }
}

/// GeoJSON `Point`, coordinates ordered `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(point: GeoJsonPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(point.coordinates[1], point.coordinates[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(GeoPoint::new(91.0, 0.0), Err(GeoError::Latitude(91.0)));
        assert_eq!(GeoPoint::new(0.0, -181.0), Err(GeoError::Longitude(-181.0)));
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn nairobi_to_thika_is_about_forty_km() {
        let nairobi = GeoPoint::new(-1.2921, 36.8219).unwrap();
        let thika = GeoPoint::new(-1.0333, 37.0693).unwrap();
        let d = nairobi.distance_km(&thika);
        assert!((d - 39.8).abs() < 0.5, "got {}", d);
        assert_eq!(nairobi.distance_km(&nairobi), 0.0);
    }

    #[test]
    fn bounding_box_covers_the_search_circle() {
        let center = GeoPoint::new(-0.5, 35.0).unwrap();
        let bbox = center.bounding_box(10.0);
        let north = GeoPoint::new(-0.5 + 0.089, 35.0).unwrap();
        let east = GeoPoint::new(-0.5, 35.089).unwrap();
        assert!(bbox.contains(&north));
        assert!(bbox.contains(&east));
        assert!(!bbox.contains(&GeoPoint::new(-0.5, 35.2).unwrap()));
        assert!(!bbox.crosses_antimeridian());
    }

    #[test]
    fn bounding_box_wraps_across_the_antimeridian() {
        let fiji = GeoPoint::new(-17.0, 179.98).unwrap();
        let bbox = fiji.bounding_box(10.0);
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.max_longitude < -179.9);

        let across = GeoPoint::new(-17.0, -179.97).unwrap();
        assert!(bbox.contains(&across));
        assert!(fiji.distance_km(&across) < 10.0);
        assert!(!bbox.contains(&GeoPoint::new(-17.0, 0.0).unwrap()));
    }

    #[test]
    fn geojson_uses_longitude_first() {
        let point = GeoPoint::new(-1.5, 36.9).unwrap();
        let json = serde_json::to_value(point.to_geojson()).unwrap();
        assert_eq!(json["type"], "Point");
        assert_eq!(json["coordinates"][0], 36.9);
        assert_eq!(GeoPoint::try_from(point.to_geojson()).unwrap(), point);
    }
}
