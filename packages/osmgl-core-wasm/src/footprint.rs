use crate::document::{MapDocument, Node, Way};
use crate::polygon::{Point2, Polygon};
use crate::projection::PlanarFrame;

/// Projects way vertices into the tile's planar frame.
pub struct FootprintBuilder<'a> {
    document: &'a dyn MapDocument,
    frame: &'a PlanarFrame,
}

impl<'a> FootprintBuilder<'a> {
    pub fn new(document: &'a dyn MapDocument, frame: &'a PlanarFrame) -> Self {
        Self { document, frame }
    }

    pub fn node_position(&self, node: &Node) -> Point2 {
        self.frame.to_local(node.lat, node.lon)
    }

    /// Polygon in node-reference order. References to nodes the document does
    /// not contain are skipped.
    pub fn way_footprint(&self, way: &Way) -> Polygon {
        let points = way
            .node_refs
            .iter()
            .filter_map(|id| self.document.node(*id))
            .map(|node| self.node_position(node))
            .collect();
        Polygon::new(points)
    }
}
