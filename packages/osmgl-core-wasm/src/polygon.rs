use geo_types::Coord;

/// Planar point in tile-relative metres.
pub type Point2 = Coord<f64>;

/// How one polygon's vertices relate to another polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// None of the other polygon's vertices are inside.
    Disjoint,
    /// Every vertex of the other polygon is inside.
    Contains,
    /// Some, but not all, vertices are inside.
    Overlaps,
}

impl Containment {
    /// Integer form: 0 disjoint, -1 contains, +1 partial overlap.
    pub fn sentinel(self) -> i32 {
        match self {
            Containment::Disjoint => 0,
            Containment::Contains => -1,
            Containment::Overlaps => 1,
        }
    }

    pub fn is_disjoint(self) -> bool {
        self == Containment::Disjoint
    }
}

/// Ordered ring of planar points. Insertion order is the winding order and
/// the ring is closed only when the last point repeats the first exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point2>,
}

impl Polygon {
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.points.len() >= 3 && self.points.first() == self.points.last()
    }

    /// Points without the closing duplicate.
    pub fn open_points(&self) -> &[Point2] {
        if self.is_closed() {
            &self.points[..self.points.len() - 1]
        } else {
            &self.points
        }
    }

    // (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.points.first()?;
        let mut bounds = (first.x, first.y, first.x, first.y);
        for p in &self.points {
            bounds.0 = bounds.0.min(p.x);
            bounds.1 = bounds.1.min(p.y);
            bounds.2 = bounds.2.max(p.x);
            bounds.3 = bounds.3.max(p.y);
        }
        Some(bounds)
    }

    /// Shoelace area, positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let points = self.open_points();
        let n = points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            sum += points[i].x * points[j].y - points[j].x * points[i].y;
        }
        sum * 0.5
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Even-odd ray casting with a bounding box early-out.
    pub fn contains(&self, p: Point2) -> bool {
        let Some((min_x, min_y, max_x, max_y)) = self.bounds() else {
            return false;
        };
        if p.x < min_x || p.x > max_x || p.y < min_y || p.y > max_y {
            return false;
        }

        let points = &self.points;
        let n = points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (pi, pj) = (points[i], points[j]);
            if (pi.y > p.y) != (pj.y > p.y)
                && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Counts how many of `other`'s vertices lie inside `self`.
    pub fn intersects(&self, other: &Polygon) -> Containment {
        let count = other.points.iter().filter(|p| self.contains(**p)).count();
        if count == 0 {
            Containment::Disjoint
        } else if count == other.points.len() {
            Containment::Contains
        } else {
            Containment::Overlaps
        }
    }
}

impl From<Vec<Point2>> for Polygon {
    fn from(points: Vec<Point2>) -> Self {
        Polygon::new(points)
    }
}

/// Outer ring plus holes. `holes` is always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiPolygon {
    pub outer: Polygon,
    pub holes: Vec<Polygon>,
}

impl MultiPolygon {
    pub fn new(outer: Polygon) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn with_holes(outer: Polygon, holes: Vec<Polygon>) -> Self {
        Self { outer, holes }
    }

    /// Number of stored points across the outer ring and every hole.
    pub fn total_points(&self) -> usize {
        self.outer.len() + self.holes.iter().map(Polygon::len).sum::<usize>()
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(outer: Polygon) -> Self {
        MultiPolygon::new(outer)
    }
}

#[cfg(test)]
pub(crate) fn square(cx: f64, cy: f64, size: f64) -> Polygon {
    let h = size * 0.5;
    Polygon::new(vec![
        Coord { x: cx - h, y: cy - h },
        Coord { x: cx + h, y: cy - h },
        Coord { x: cx + h, y: cy + h },
        Coord { x: cx - h, y: cy + h },
    ])
}
