use std::f64::consts::PI;

use crate::document::Bounds;
use crate::polygon::Point2;

const EARTH_RADIUS: f64 = 6_378_137.0;

/// Maps geographic coordinates to planar metres. Pure, no state.
pub trait Projection: Send + Sync {
    fn project(&self, lat: f64, lon: f64) -> Point2;
}

/// Spherical Web Mercator (EPSG:3857).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl Projection for WebMercator {
    fn project(&self, lat: f64, lon: f64) -> Point2 {
        let origin_shift = PI * EARTH_RADIUS / 180.0;
        let x = origin_shift * lon;
        let y = origin_shift * ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
        Point2 { x, y }
    }
}

/// Projected extent of the loaded tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBound {
    pub top_left: Point2,
    pub bottom_right: Point2,
    pub center: Point2,
}

impl TileBound {
    pub fn new(top_left: Point2, bottom_right: Point2) -> Self {
        let width = bottom_right.x - top_left.x;
        let height = top_left.y - bottom_right.y;
        let center = Point2 {
            x: top_left.x + width * 0.5,
            y: bottom_right.y + height * 0.5,
        };
        Self {
            top_left,
            bottom_right,
            center,
        }
    }

    pub fn from_bounds(bounds: &Bounds, projection: &dyn Projection) -> Self {
        Self::new(
            projection.project(bounds.max_lat, bounds.min_lon),
            projection.project(bounds.min_lat, bounds.max_lon),
        )
    }
}

/// Projection re-centred on the tile so coordinates stay small.
pub struct PlanarFrame {
    projection: Box<dyn Projection>,
    tile: TileBound,
}

impl PlanarFrame {
    pub fn new(projection: Box<dyn Projection>, bounds: &Bounds) -> Self {
        let tile = TileBound::from_bounds(bounds, projection.as_ref());
        Self { projection, tile }
    }

    pub fn web_mercator(bounds: &Bounds) -> Self {
        Self::new(Box::new(WebMercator), bounds)
    }

    pub fn tile(&self) -> &TileBound {
        &self.tile
    }

    pub fn to_local(&self, lat: f64, lon: f64) -> Point2 {
        let p = self.projection.project(lat, lon);
        Point2 {
            x: p.x - self.tile.center.x,
            y: p.y - self.tile.center.y,
        }
    }
}
