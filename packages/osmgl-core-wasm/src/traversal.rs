//! Pull-based resolution of a document into buildings and trees.
//!
//! Buildings come out in five stages: multipolygon building parts,
//! multipolygon buildings, `type=building` relations, standalone
//! `building:part` ways, then standalone `building` ways that survive the
//! [`DedupFilter`]. Each call to `next` does just enough work to produce one
//! entity, so a consumer can stop at any point.

use std::collections::{HashSet, VecDeque};

use crate::attributes::{
    merge_part, merge_roof, resolve_natural, resolve_part, resolve_roof, PartData, RoofData,
};
use crate::colors::Color;
use crate::compound::{CompoundKind, CompoundSet, Role};
use crate::console_log;
use crate::dedup::DedupFilter;
use crate::document::{ElementId, MapDocument, Tags, Way};
use crate::footprint::FootprintBuilder;
use crate::polygon::{Containment, MultiPolygon, Polygon};
use crate::projection::PlanarFrame;
use crate::ring_assembler::RingAssembler;
use crate::shape::{BuildingPart, Natural};

/// Way ids already turned into output (or into holes) during one traversal.
#[derive(Debug, Clone, Default)]
pub struct ConsumedWays {
    ids: HashSet<ElementId>,
}

impl ConsumedWays {
    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn insert(&mut self, id: ElementId) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Extend<ElementId> for ConsumedWays {
    fn extend<I: IntoIterator<Item = ElementId>>(&mut self, iter: I) {
        self.ids.extend(iter);
    }
}

const COMPOUND_STAGES: [CompoundKind; 3] = [
    CompoundKind::MultipolygonBuildingPart,
    CompoundKind::MultipolygonBuilding,
    CompoundKind::Building,
];

const PART_KEY: &str = "building:part";
const BUILDING_KEY: &str = "building";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Compounds(usize),
    SimpleParts,
    SimpleBuildings,
    Done,
}

enum Step {
    Emit(BuildingPart),
    Continue,
    StageDone,
}

// Compound currently being drained
struct Cursor {
    id: ElementId,
    kind: CompoundKind,
    parent_part: PartData,
    parent_roof: RoofData,
    inners: Vec<Polygon>,
    next_structure: usize,
}

/// Lazy, one-shot sequence of building parts for one document.
pub struct BuildingParts<'a> {
    document: &'a dyn MapDocument,
    footprints: FootprintBuilder<'a>,
    compounds: CompoundSet,
    consumed: ConsumedWays,
    dedup: DedupFilter,
    stage: Stage,
    roots: VecDeque<ElementId>,
    pending: VecDeque<ElementId>,
    cursor: Option<Cursor>,
    ways: Option<Box<dyn Iterator<Item = &'a Way> + 'a>>,
    emitted: usize,
    excluded: usize,
}

impl<'a> BuildingParts<'a> {
    pub fn new(document: &'a dyn MapDocument, frame: &'a PlanarFrame) -> Self {
        let compounds = CompoundSet::resolve(document);
        console_log!("Resolved {} building relations", compounds.len());
        let roots = compounds.ids_of_kind(COMPOUND_STAGES[0]).into();
        Self {
            document,
            footprints: FootprintBuilder::new(document, frame),
            compounds,
            consumed: ConsumedWays::default(),
            dedup: DedupFilter::new(),
            stage: Stage::Compounds(0),
            roots,
            pending: VecDeque::new(),
            cursor: None,
            ways: None,
            emitted: 0,
            excluded: 0,
        }
    }

    pub fn consumed(&self) -> &ConsumedWays {
        &self.consumed
    }

    /// Building parts produced so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Standalone buildings dropped because they overlap a building part.
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Visible ways carrying a `building` or `building:part` key that no
    /// stage consumed.
    pub fn unconsumed_buildings(&self) -> usize {
        self.document
            .visible_ways()
            .filter(|way| !self.consumed.contains(way.id))
            .filter(|way| way.tags.contains_key(BUILDING_KEY) || way.tags.contains_key(PART_KEY))
            .count()
    }

    fn advance_stage(&mut self) {
        self.stage = match self.stage {
            Stage::Compounds(k) if k + 1 < COMPOUND_STAGES.len() => {
                self.roots = self.compounds.ids_of_kind(COMPOUND_STAGES[k + 1]).into();
                Stage::Compounds(k + 1)
            }
            Stage::Compounds(_) => Stage::SimpleParts,
            Stage::SimpleParts => Stage::SimpleBuildings,
            Stage::SimpleBuildings | Stage::Done => {
                console_log!(
                    "Traversal done: {} parts, {} overlapping buildings dropped, {} building ways unconsumed",
                    self.emitted,
                    self.excluded,
                    self.unconsumed_buildings()
                );
                Stage::Done
            }
        };
    }

    fn step_compounds(&mut self) -> Step {
        if self.cursor.is_some() {
            return match self.advance_cursor() {
                Some(part) => Step::Emit(part),
                None => {
                    self.cursor = None;
                    Step::Continue
                }
            };
        }
        if let Some(id) = self.pending.pop_front() {
            self.open_cursor(id);
            return Step::Continue;
        }
        if let Some(root) = self.roots.pop_front() {
            self.pending = self.compounds.expand(root).order.into();
            return Step::Continue;
        }
        Step::StageDone
    }

    fn open_cursor(&mut self, id: ElementId) {
        let Some(relation) = self.document.relation(id) else {
            return;
        };
        let parent_part = resolve_part(&relation.tags);
        let parent_roof = resolve_roof(&relation.tags);
        let Some(compound) = self.compounds.get_mut(id) else {
            return;
        };

        // Holes are assembled up front; outer rings are pulled one at a time.
        let mut inners = Vec::new();
        if compound.kind.is_multipolygon() {
            let assembler = RingAssembler::new(self.document, &self.footprints);
            for index in assembler.assemble_all(compound, Role::Inner, &mut self.consumed) {
                if let Some(ring) = &compound.structures[index].polygon {
                    inners.push(ring.outer.clone());
                }
            }
        }

        self.cursor = Some(Cursor {
            id,
            kind: compound.kind,
            parent_part,
            parent_roof,
            inners,
            next_structure: 0,
        });
    }

    fn advance_cursor(&mut self) -> Option<BuildingPart> {
        let cursor = self.cursor.as_mut()?;
        let compound = self.compounds.get_mut(cursor.id)?;

        if cursor.kind.is_multipolygon() {
            let assembler = RingAssembler::new(self.document, &self.footprints);
            let index = assembler.next_ring(compound, Role::Outer, &mut self.consumed)?;
            let structure = &compound.structures[index];
            let mut footprint = structure.polygon.clone()?;
            footprint.holes = cursor
                .inners
                .iter()
                .filter(|inner| footprint.outer.intersects(inner) == Containment::Contains)
                .cloned()
                .collect();

            let empty = Tags::new();
            let tags = self
                .document
                .way(structure.source)
                .map(|way| &way.tags)
                .unwrap_or(&empty);
            return Some(BuildingPart::new(
                structure.id,
                footprint,
                merge_part(&cursor.parent_part, tags),
                merge_roof(&cursor.parent_roof, tags),
                Color::LIGHT_GREEN,
            ));
        }

        // Outline members are ignored; each `part` way is its own entity.
        while cursor.next_structure < compound.structures.len() {
            let structure = &mut compound.structures[cursor.next_structure];
            cursor.next_structure += 1;
            if structure.role != Role::Part || self.consumed.contains(structure.id) {
                continue;
            }
            let Some(way) = self.document.way(structure.id) else {
                continue;
            };
            structure.mark_assigned();
            self.consumed.insert(way.id);

            let footprint = MultiPolygon::new(self.footprints.way_footprint(way));
            return Some(BuildingPart::new(
                way.id,
                footprint,
                merge_part(&cursor.parent_part, &way.tags),
                merge_roof(&cursor.parent_roof, &way.tags),
                Color::GREEN,
            ));
        }
        None
    }

    fn step_simple(&mut self, key: &str) -> Step {
        let document = self.document;
        let ways = self.ways.get_or_insert_with(|| document.visible_ways());

        for way in ways.by_ref() {
            if self.consumed.contains(way.id) || !is_tagged(way, key) {
                continue;
            }
            self.consumed.insert(way.id);
            let footprint = self.footprints.way_footprint(way);

            let color = if key == PART_KEY {
                self.dedup.record_part(&footprint);
                Color::LIGHT_BLUE
            } else if self.dedup.admits(&footprint) {
                Color::BLUE
            } else {
                self.excluded += 1;
                continue;
            };
            return Step::Emit(BuildingPart::new(
                way.id,
                MultiPolygon::new(footprint),
                resolve_part(&way.tags),
                resolve_roof(&way.tags),
                color,
            ));
        }

        self.ways = None;
        Step::StageDone
    }
}

impl<'a> Iterator for BuildingParts<'a> {
    type Item = BuildingPart;

    fn next(&mut self) -> Option<BuildingPart> {
        loop {
            let step = match self.stage {
                Stage::Compounds(_) => self.step_compounds(),
                Stage::SimpleParts => self.step_simple(PART_KEY),
                Stage::SimpleBuildings => self.step_simple(BUILDING_KEY),
                Stage::Done => return None,
            };
            match step {
                Step::Emit(part) => {
                    self.emitted += 1;
                    return Some(part);
                }
                Step::Continue => {}
                Step::StageDone => self.advance_stage(),
            }
        }
    }
}

fn is_tagged(way: &Way, key: &str) -> bool {
    way.tags.get(key).is_some_and(|value| value != "no")
}

/// Visible nodes tagged `natural=tree`, in document order.
pub fn naturals<'a>(
    document: &'a dyn MapDocument,
    frame: &'a PlanarFrame,
) -> impl Iterator<Item = Natural> + 'a {
    document
        .visible_nodes()
        .filter(|node| node.tags.get("natural") == Some("tree"))
        .map(move |node| {
            Natural::new(
                node.id,
                frame.to_local(node.lat, node.lon),
                resolve_natural(&node.tags),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::FLOOR_HEIGHT;
    use crate::document::OsmDocument;

    // Coordinates are in units of 0.0001 degrees.
    fn node(id: i64, lat: i32, lon: i32) -> String {
        format!(
            r#"<node id="{id}" lat="{}" lon="{}"/>"#,
            lat as f64 * 0.0001,
            lon as f64 * 0.0001
        )
    }

    fn way(id: i64, refs: &[i64], tags: &[(&str, &str)]) -> String {
        let nds: String = refs.iter().map(|r| format!(r#"<nd ref="{r}"/>"#)).collect();
        let tags: String = tags
            .iter()
            .map(|(k, v)| format!(r#"<tag k="{k}" v="{v}"/>"#))
            .collect();
        format!(r#"<way id="{id}">{nds}{tags}</way>"#)
    }

    fn fixture() -> OsmDocument {
        let mut xml = String::from(
            r#"<osm><bounds minlat="0" minlon="0" maxlat="0.01" maxlon="0.01"/>"#,
        );
        let squares = [
            (1, 0),   // multipolygon outer
            (21, 20), // building relation part
            (31, 40), // nested relation part
            (41, 60), // standalone building:part
            (51, 80), // standalone building far away
            (61, 100),
        ];
        for (first, lat) in squares {
            xml += &node(first, lat, 0);
            xml += &node(first + 1, lat, 10);
            xml += &node(first + 2, lat + 10, 10);
            xml += &node(first + 3, lat + 10, 0);
        }
        // hole inside the multipolygon
        xml += &node(5, 4, 4);
        xml += &node(6, 4, 6);
        xml += &node(7, 6, 6);
        xml += &node(8, 6, 4);
        xml += r#"<node id="90" lat="0.005" lon="0.005"><tag k="natural" v="tree"/><tag k="height" v="7"/></node>"#;
        xml += r#"<node id="91" lat="0.005" lon="0.006" visible="false"><tag k="natural" v="tree"/></node>"#;
        xml += r#"<node id="92" lat="0.005" lon="0.007"><tag k="natural" v="rock"/></node>"#;

        xml += &way(10, &[1, 2, 3], &[("building:colour", "red")]);
        xml += &way(11, &[3, 4, 1], &[]);
        xml += &way(12, &[5, 6, 7, 8, 5], &[]);
        xml += &way(20, &[21, 22, 23, 24, 21], &[]);
        xml += &way(21, &[21, 22, 23, 24, 21], &[("building:part", "yes"), ("building:levels", "2")]);
        xml += &way(30, &[31, 32, 33, 34, 31], &[("building:part", "yes")]);
        xml += &way(40, &[41, 42, 43, 44, 41], &[("building:part", "yes")]);
        xml += &way(41, &[41, 42, 43, 44, 41], &[("building", "yes")]);
        xml += &way(42, &[51, 52, 53, 54, 51], &[("building", "yes")]);
        xml += &way(43, &[61, 62, 63, 64, 61], &[("building", "no")]);

        xml += r#"<relation id="100">
            <member type="way" ref="10" role="outer"/>
            <member type="way" ref="11" role="outer"/>
            <member type="way" ref="12" role="inner"/>
            <tag k="type" v="multipolygon"/><tag k="building:part" v="yes"/><tag k="height" v="20"/>
          </relation>
          <relation id="200">
            <member type="way" ref="20" role="outline"/>
            <member type="way" ref="21" role="part"/>
            <member type="relation" ref="300" role="part"/>
            <tag k="type" v="building"/><tag k="building:colour" v="white"/>
          </relation>
          <relation id="300">
            <member type="way" ref="30" role="part"/>
            <member type="relation" ref="200" role="part"/>
            <tag k="type" v="building"/>
          </relation>
          </osm>"#;
        OsmDocument::from_xml(&xml).unwrap()
    }

    #[test]
    fn stages_come_out_in_order_with_their_colours() {
        let doc = fixture();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let parts: Vec<BuildingPart> = BuildingParts::new(&doc, &frame).collect();

        let ids: Vec<_> = parts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 21, 30, 40, 42]);
        let colors: Vec<_> = parts.iter().map(|p| p.color).collect();
        assert_eq!(
            colors,
            vec![
                Color::LIGHT_GREEN,
                Color::GREEN,
                Color::GREEN,
                Color::LIGHT_BLUE,
                Color::BLUE
            ]
        );
    }

    #[test]
    fn multipolygon_part_gets_hole_and_inherited_attributes() {
        let doc = fixture();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let part = BuildingParts::new(&doc, &frame).next().unwrap();

        assert_eq!(part.id, 10);
        assert_eq!(part.footprint.outer.len(), 5);
        assert!(part.footprint.outer.is_closed());
        assert_eq!(part.footprint.holes.len(), 1);
        assert!((part.body.height - 20.0).abs() < 1e-9);
        assert!(!part.body.height_estimated);
        assert_eq!(part.body.surface.color, Color::from_rgb8(255, 0, 0));
    }

    #[test]
    fn relation_parts_inherit_from_parent_relation() {
        let doc = fixture();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let parts: Vec<BuildingPart> = BuildingParts::new(&doc, &frame).collect();
        let white = Color::from_name("white").unwrap();

        let part = parts.iter().find(|p| p.id == 21).unwrap();
        assert_eq!(part.body.surface.color, white);
        assert!((part.body.height - 2.0 * FLOOR_HEIGHT).abs() < 1e-9);

        // nested relation handled under its own parent
        let nested = parts.iter().find(|p| p.id == 30).unwrap();
        assert_eq!(nested.body.surface.color, crate::attributes::DEFAULT_BUILDING_COLOR);
    }

    #[test]
    fn stopping_early_leaves_later_ways_untouched() {
        let doc = fixture();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let mut parts = BuildingParts::new(&doc, &frame);
        parts.next().unwrap();

        let consumed = parts.consumed();
        for id in [10, 11, 12] {
            assert!(consumed.contains(id));
        }
        for id in [21, 30, 40, 41, 42] {
            assert!(!consumed.contains(id));
        }
        assert!(!parts.is_finished());
    }

    #[test]
    fn overlapping_building_is_dropped_and_reported() {
        let doc = fixture();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let mut parts = BuildingParts::new(&doc, &frame);
        let ids: Vec<_> = parts.by_ref().map(|p| p.id).collect();

        assert!(!ids.contains(&41));
        assert!(ids.contains(&42));
        assert_eq!(parts.excluded(), 1);
        assert_eq!(parts.emitted(), 5);
        assert!(parts.is_finished());
        // only the building=no way is left over
        assert_eq!(parts.unconsumed_buildings(), 1);
        assert!(parts.consumed().contains(41));
        assert!(!parts.consumed().contains(20));
    }

    #[test]
    fn broken_outer_member_leaves_the_closable_ring() {
        let mut xml = String::from(
            r#"<osm><bounds minlat="0" minlon="0" maxlat="0.01" maxlon="0.01"/>"#,
        );
        xml += &node(1, 0, 0);
        xml += &node(2, 0, 10);
        xml += &node(3, 10, 10);
        xml += &node(4, 10, 0);
        xml += &node(5, 30, 30);
        xml += &way(70, &[2, 5], &[]);
        xml += &way(71, &[1, 2], &[]);
        xml += &way(72, &[2, 3, 4], &[]);
        xml += &way(73, &[4, 1], &[]);
        xml += r#"<relation id="500">
            <member type="way" ref="70" role="outer"/>
            <member type="way" ref="71" role="outer"/>
            <member type="way" ref="72" role="outer"/>
            <member type="way" ref="73" role="outer"/>
            <tag k="type" v="multipolygon"/><tag k="building" v="yes"/>
          </relation></osm>"#;
        let doc = OsmDocument::from_xml(&xml).unwrap();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let mut parts = BuildingParts::new(&doc, &frame);
        let emitted: Vec<BuildingPart> = parts.by_ref().collect();

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].id, 71);
        assert_eq!(emitted[0].color, Color::LIGHT_GREEN);
        assert!(emitted[0].footprint.outer.is_closed());
        for id in [71, 72, 73] {
            assert!(parts.consumed().contains(id));
        }
        assert!(!parts.consumed().contains(70));
    }

    #[test]
    fn trees_come_from_visible_nodes_only() {
        let doc = fixture();
        let frame = PlanarFrame::web_mercator(&doc.bounds());
        let trees: Vec<Natural> = naturals(&doc, &frame).collect();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].id, 90);
        assert!((trees[0].data.height - 7.0).abs() < 1e-9);
        assert_eq!(trees[0].color, Color::GREEN);
    }
}
