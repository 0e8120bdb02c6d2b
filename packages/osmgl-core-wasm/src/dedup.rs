use crate::polygon::Polygon;

/// Drops standalone `building` footprints that touch a `building:part`
/// footprint already emitted. Overlapping buildings are excluded whole; no
/// clipping is attempted.
#[derive(Debug, Default)]
pub struct DedupFilter {
    parts: Vec<Polygon>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_part(&mut self, footprint: &Polygon) {
        self.parts.push(footprint.clone());
    }

    /// True when no recorded part has a vertex inside `building`.
    pub fn admits(&self, building: &Polygon) -> bool {
        self.parts
            .iter()
            .all(|part| building.intersects(part).is_disjoint())
    }
}
