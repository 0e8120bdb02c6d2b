use crate::compound::{Compound, Role};
use crate::console_log;
use crate::document::MapDocument;
use crate::footprint::FootprintBuilder;
use crate::polygon::{MultiPolygon, Point2};
use crate::traversal::ConsumedWays;

/// Stitches same-role way fragments of a compound into closed rings.
pub struct RingAssembler<'a> {
    document: &'a dyn MapDocument,
    footprints: &'a FootprintBuilder<'a>,
}

impl<'a> RingAssembler<'a> {
    pub fn new(document: &'a dyn MapDocument, footprints: &'a FootprintBuilder<'a>) -> Self {
        Self {
            document,
            footprints,
        }
    }

    /// Assembles the next closed ring of `role` and returns the index of the
    /// structure that seeded it. Joined fragments are marked assigned and
    /// their ids committed to `consumed` only once the ring closes. An
    /// abandoned ring retires its seed alone, so the fragments it borrowed
    /// can still close a ring of their own.
    pub fn next_ring(
        &self,
        compound: &mut Compound,
        role: Role,
        consumed: &mut ConsumedWays,
    ) -> Option<usize> {
        loop {
            let seed = compound
                .structures
                .iter()
                .position(|s| s.is_unassigned() && s.role == role)?;
            compound.structures[seed].mark_assigned();

            let seed_id = compound.structures[seed].id;
            if consumed.contains(seed_id) {
                continue;
            }
            let Some(way) = self.document.way(seed_id) else {
                continue;
            };

            let mut ring = self.footprints.way_footprint(way).points;
            let mut joined = Vec::new();

            while !is_closed(&ring) {
                match self.join_next(compound, role, consumed, &joined, &mut ring) {
                    Some(index) => joined.push(index),
                    None => break,
                }
            }

            if !is_closed(&ring) {
                console_log!(
                    "Relation {}: discarding open {:?} ring seeded by way {} ({} fragments)",
                    compound.id,
                    role,
                    seed_id,
                    joined.len() + 1
                );
                continue;
            }

            consumed.insert(seed_id);
            for index in joined {
                let structure = &mut compound.structures[index];
                structure.mark_assigned();
                consumed.insert(structure.id);
            }
            let structure = &mut compound.structures[seed];
            structure.polygon = Some(MultiPolygon::new(ring.into()));
            structure.source = seed_id;
            return Some(seed);
        }
    }

    /// Every closed ring of `role`, as structure indices.
    pub fn assemble_all(
        &self,
        compound: &mut Compound,
        role: Role,
        consumed: &mut ConsumedWays,
    ) -> Vec<usize> {
        let mut rings = Vec::new();
        while let Some(index) = self.next_ring(compound, role, consumed) {
            rings.push(index);
        }
        rings
    }

    // One pass over the remaining candidates. Joins the first fragment that
    // shares an endpoint with the open ring and returns its structure index.
    fn join_next(
        &self,
        compound: &Compound,
        role: Role,
        consumed: &ConsumedWays,
        joined: &[usize],
        ring: &mut Vec<Point2>,
    ) -> Option<usize> {
        let first = *ring.first()?;
        let last = *ring.last()?;

        for (index, structure) in compound.structures.iter().enumerate() {
            if !structure.is_unassigned()
                || structure.role != role
                || joined.contains(&index)
                || consumed.contains(structure.id)
            {
                continue;
            }
            let Some(way) = self.document.way(structure.id) else {
                continue;
            };
            let fragment = self.footprints.way_footprint(way).points;
            let (Some(&head), Some(&tail)) = (fragment.first(), fragment.last()) else {
                continue;
            };

            if last == head {
                ring.pop();
                ring.extend(fragment);
            } else if last == tail {
                ring.pop();
                ring.extend(fragment.into_iter().rev());
            } else if first == head {
                let mut merged: Vec<Point2> = fragment.into_iter().rev().collect();
                merged.extend_from_slice(&ring[1..]);
                *ring = merged;
            } else if first == tail {
                let mut merged = fragment;
                merged.extend_from_slice(&ring[1..]);
                *ring = merged;
            } else {
                continue;
            }

            return Some(index);
        }
        None
    }
}

fn is_closed(points: &[Point2]) -> bool {
    points.len() >= 3 && points.first() == points.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::CompoundSet;
    use crate::document::OsmDocument;
    use crate::projection::PlanarFrame;

    // Unit square A(0,0) B(1,0) C(1,1) D(0,1), scaled to ~11 m in degrees.
    const NODES: &str = r#"
      <bounds minlat="0" minlon="0" maxlat="0.0001" maxlon="0.0001"/>
      <node id="1" lat="0" lon="0"/>
      <node id="2" lat="0" lon="0.0001"/>
      <node id="3" lat="0.0001" lon="0.0001"/>
      <node id="4" lat="0.0001" lon="0"/>
      <node id="5" lat="0.0002" lon="0.0002"/>
      <node id="6" lat="0.0003" lon="0.0003"/>"#;

    fn way(id: i64, refs: &[i64]) -> String {
        let nds: String = refs.iter().map(|r| format!(r#"<nd ref="{r}"/>"#)).collect();
        format!(r#"<way id="{id}">{nds}</way>"#)
    }

    fn document(ways: &[(i64, Vec<i64>)], member_order: &[i64]) -> OsmDocument {
        let ways: String = ways.iter().map(|(id, refs)| way(*id, refs)).collect();
        let members: String = member_order
            .iter()
            .map(|id| format!(r#"<member type="way" ref="{id}" role="outer"/>"#))
            .collect();
        let xml = format!(
            r#"<osm>{NODES}{ways}<relation id="100">{members}<tag k="type" v="multipolygon"/><tag k="building" v="yes"/></relation></osm>"#
        );
        OsmDocument::from_xml(&xml).unwrap()
    }

    fn assemble(doc: &OsmDocument) -> (Compound, Vec<usize>, ConsumedWays) {
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let footprints = FootprintBuilder::new(doc, &frame);
        let assembler = RingAssembler::new(doc, &footprints);
        let mut compound = CompoundSet::resolve(doc).get(100).unwrap().clone();
        let mut consumed = ConsumedWays::default();
        let rings = assembler.assemble_all(&mut compound, Role::Outer, &mut consumed);
        (compound, rings, consumed)
    }

    #[test]
    fn fragments_close_in_any_order_and_direction() {
        let fragments: [(i64, Vec<i64>); 3] = [(10, vec![1, 2]), (11, vec![2, 3, 4]), (12, vec![4, 1])];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in orders {
            for flips in 0..8u8 {
                let ways: Vec<(i64, Vec<i64>)> = order
                    .iter()
                    .enumerate()
                    .map(|(slot, &i)| {
                        let (id, refs) = &fragments[i];
                        let mut refs = refs.clone();
                        if flips & (1 << slot) != 0 {
                            refs.reverse();
                        }
                        (*id, refs)
                    })
                    .collect();
                let member_order: Vec<i64> = ways.iter().map(|(id, _)| *id).collect();
                let doc = document(&ways, &member_order);

                let (compound, rings, consumed) = assemble(&doc);
                assert_eq!(rings.len(), 1, "order {order:?} flips {flips}");
                let polygon = compound.structures[rings[0]].polygon.as_ref().unwrap();
                assert_eq!(polygon.outer.len(), 5);
                assert!(polygon.outer.is_closed());
                assert!(polygon.holes.is_empty());
                for id in [10, 11, 12] {
                    assert!(consumed.contains(id));
                }
                assert!(compound.structures.iter().all(|s| !s.is_unassigned()));
            }
        }
    }

    #[test]
    fn dangling_fragment_yields_no_ring() {
        let ways = vec![(10, vec![1, 2]), (11, vec![2, 3]), (12, vec![5, 6])];
        let doc = document(&ways, &[10, 11, 12]);
        let (compound, rings, consumed) = assemble(&doc);
        assert!(rings.is_empty());
        assert!(consumed.is_empty());
        assert!(compound.structures.iter().all(|s| s.polygon.is_none()));
    }

    #[test]
    fn broken_seed_does_not_swallow_a_closable_ring() {
        let ways = vec![
            (9, vec![2, 5]),
            (10, vec![1, 2]),
            (11, vec![2, 3, 4]),
            (12, vec![4, 1]),
        ];
        let doc = document(&ways, &[9, 10, 11, 12]);
        let (compound, rings, consumed) = assemble(&doc);

        assert_eq!(rings, vec![1]);
        let polygon = compound.structures[1].polygon.as_ref().unwrap();
        assert_eq!(polygon.outer.len(), 5);
        assert!(polygon.outer.is_closed());
        assert!(compound.structures[0].polygon.is_none());
        for id in [10, 11, 12] {
            assert!(consumed.contains(id));
        }
        assert!(!consumed.contains(9));
        assert_eq!(consumed.len(), 3);
        assert!(compound.structures.iter().all(|s| !s.is_unassigned()));
    }

    #[test]
    fn closed_ways_are_rings_on_their_own() {
        let ways = vec![(10, vec![1, 2, 3, 1]), (11, vec![1, 3, 4, 1])];
        let doc = document(&ways, &[10, 11]);
        let (compound, rings, consumed) = assemble(&doc);
        assert_eq!(rings.len(), 2);
        assert_eq!(compound.structures[rings[0]].source, 10);
        assert_eq!(compound.structures[rings[1]].source, 11);
        assert_eq!(consumed.len(), 2);
    }

    #[test]
    fn consumed_and_missing_seeds_are_skipped() {
        let ways = vec![(10, vec![1, 2, 3, 1]), (11, vec![1, 3, 4, 1])];
        let doc = document(&ways, &[10, 99, 11]);
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let footprints = FootprintBuilder::new(&doc, &frame);
        let assembler = RingAssembler::new(&doc, &footprints);
        let mut compound = CompoundSet::resolve(&doc).get(100).unwrap().clone();
        let mut consumed = ConsumedWays::default();
        consumed.insert(10);

        let rings = assembler.assemble_all(&mut compound, Role::Outer, &mut consumed);
        assert_eq!(rings, vec![2]);
        assert!(!consumed.contains(99));
    }
}
