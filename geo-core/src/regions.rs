use geo_types::{CatalogEntry, LatLng};
use rand::Rng;

/// Latitude/longitude bounding box used to sample seed coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub lat_min: f64,
    pub lng_min: f64,
    pub lat_max: f64,
    pub lng_max: f64,
}

pub const DEFAULT_REGION: &str = "WORLD";

const REGIONS: &[(&str, &str, Bbox)] = &[
    ("WORLD", "World", bbox(-55.0, -170.0, 70.0, 170.0)),
    ("EUROPE", "Europe", bbox(34.0, -11.0, 71.0, 40.0)),
    ("N_AMERICA", "North America", bbox(15.0, -168.0, 72.0, -52.0)),
    ("S_AMERICA", "South America", bbox(-56.0, -82.0, 13.0, -34.0)),
    ("ASIA", "Asia", bbox(1.0, 25.0, 78.0, 180.0)),
    ("AFRICA", "Africa", bbox(-35.0, -20.0, 38.0, 55.0)),
    ("OCEANIA", "Oceania", bbox(-47.0, 110.0, -5.0, 180.0)),
    ("RU", "Russia", bbox(41.0, 19.0, 82.0, 180.0)),
];

const COUNTRIES: &[(&str, &str, Bbox)] = &[
    ("RU", "Russia", bbox(41.0, 19.0, 82.0, 180.0)),
    ("KZ", "Kazakhstan", bbox(40.5, 46.5, 55.5, 87.5)),
    ("TR", "Turkey", bbox(35.8, 25.6, 42.2, 44.8)),
    ("DE", "Germany", bbox(47.2, 5.9, 55.1, 15.1)),
    ("FR", "France", bbox(41.0, -5.2, 51.3, 9.6)),
    ("GB", "United Kingdom", bbox(49.8, -8.6, 60.9, 1.8)),
    ("US", "USA (continental)", bbox(24.5, -124.8, 49.4, -66.9)),
    ("JP", "Japan", bbox(30.0, 129.0, 45.8, 146.0)),
];

const fn bbox(lat_min: f64, lng_min: f64, lat_max: f64, lng_max: f64) -> Bbox {
    Bbox {
        lat_min,
        lng_min,
        lat_max,
        lng_max,
    }
}

pub fn is_region(id: &str) -> bool {
    REGIONS.iter().any(|(rid, _, _)| *rid == id)
}

pub fn is_country(id: &str) -> bool {
    COUNTRIES.iter().any(|(cid, _, _)| *cid == id)
}

/// Resolve the guess-pool bbox for a room's settings. A valid country
/// filter takes precedence over the region; anything unknown falls back
/// to the whole world.
pub fn bbox_for(region: &str, country: &str) -> Bbox {
    if !country.is_empty() {
        if let Some((_, _, b)) = COUNTRIES.iter().find(|(id, _, _)| *id == country) {
            return *b;
        }
    }
    REGIONS
        .iter()
        .find(|(id, _, _)| *id == region)
        .or_else(|| REGIONS.iter().find(|(id, _, _)| *id == DEFAULT_REGION))
        .map(|(_, _, b)| *b)
        .unwrap_or(bbox(-55.0, -170.0, 70.0, 170.0))
}

pub fn region_catalog() -> Vec<CatalogEntry> {
    REGIONS
        .iter()
        .map(|(id, name, _)| CatalogEntry {
            id: (*id).to_string(),
            name: (*name).to_string(),
        })
        .collect()
}

pub fn country_catalog() -> Vec<CatalogEntry> {
    COUNTRIES
        .iter()
        .map(|(id, name, _)| CatalogEntry {
            id: (*id).to_string(),
            name: (*name).to_string(),
        })
        .collect()
}

/// Uniformly sample a seed coordinate inside a bbox.
pub fn sample_point<R: Rng + ?Sized>(bbox: &Bbox, rng: &mut R) -> LatLng {
    LatLng {
        lat: rng.gen_range(bbox.lat_min..=bbox.lat_max),
        lng: rng.gen_range(bbox.lng_min..=bbox.lng_max),
    }
}
