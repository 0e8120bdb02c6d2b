// Utility functions to generate consistent cache keys across the application.

use crate::document::Bounds;

/// Generate a consistent key for a bounding box: "minLon_minLat_maxLon_maxLat".
pub fn make_bounds_key(bounds: &Bounds) -> String {
    format!(
        "{}_{}_{}_{}",
        bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lists_lon_before_lat() {
        let bounds = Bounds {
            min_lat: 48.1,
            min_lon: 11.5,
            max_lat: 48.2,
            max_lon: 11.6,
        };
        assert_eq!(make_bounds_key(&bounds), "11.5_48.1_11.6_48.2");
    }
}
