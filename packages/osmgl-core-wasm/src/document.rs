use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DocumentError;

pub type ElementId = i64;

/// Geographic extent of the document, from its `<bounds>` element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Key/value pairs in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tags(Vec<(String, String)>);

impl Tags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: ElementId,
    pub lat: f64,
    pub lon: f64,
    pub visible: bool,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: ElementId,
    pub visible: bool,
    pub node_refs: Vec<ElementId>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: MemberKind,
    pub reference: ElementId,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: ElementId,
    pub visible: bool,
    pub members: Vec<Member>,
    pub tags: Tags,
}

/// Read-only queries the resolution pipeline needs from a map document.
pub trait MapDocument: Send + Sync {
    fn bounds(&self) -> Bounds;
    fn node(&self, id: ElementId) -> Option<&Node>;
    fn way(&self, id: ElementId) -> Option<&Way>;
    fn relation(&self, id: ElementId) -> Option<&Relation>;
    fn visible_nodes(&self) -> Box<dyn Iterator<Item = &Node> + '_>;
    fn visible_ways(&self) -> Box<dyn Iterator<Item = &Way> + '_>;
    fn visible_relations(&self) -> Box<dyn Iterator<Item = &Relation> + '_>;
}

/// In-memory OSM snapshot. Iteration keeps document order, lookups go
/// through per-kind id indexes.
#[derive(Debug, Clone)]
pub struct OsmDocument {
    bounds: Bounds,
    nodes: Vec<Node>,
    ways: Vec<Way>,
    relations: Vec<Relation>,
    node_index: HashMap<ElementId, usize>,
    way_index: HashMap<ElementId, usize>,
    relation_index: HashMap<ElementId, usize>,
}

// Element currently open in the XML stream, collecting its children
enum OpenElement {
    None,
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl OsmDocument {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut bounds: Option<Bounds> = None;
        let mut nodes = Vec::new();
        let mut ways = Vec::new();
        let mut relations = Vec::new();
        let mut open = OpenElement::None;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(e) => {
                    if let Some(element) = start_element(&e, &mut open, &mut bounds)? {
                        open = element;
                    }
                }
                Event::Empty(e) => {
                    if let Some(element) = start_element(&e, &mut open, &mut bounds)? {
                        close_element(element, &mut nodes, &mut ways, &mut relations);
                    }
                }
                Event::End(e) => {
                    if matches!(e.name().as_ref(), b"node" | b"way" | b"relation") {
                        let element = std::mem::replace(&mut open, OpenElement::None);
                        close_element(element, &mut nodes, &mut ways, &mut relations);
                    }
                }
                _ => {}
            }
        }

        let bounds = match bounds {
            Some(bounds) => bounds,
            None => node_extent(&nodes).ok_or(DocumentError::MissingBounds)?,
        };

        Ok(Self::from_parts(bounds, nodes, ways, relations))
    }

    pub fn from_parts(
        bounds: Bounds,
        nodes: Vec<Node>,
        ways: Vec<Way>,
        relations: Vec<Relation>,
    ) -> Self {
        let node_index = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        let way_index = ways.iter().enumerate().map(|(i, w)| (w.id, i)).collect();
        let relation_index = relations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        Self {
            bounds,
            nodes,
            ways,
            relations,
            node_index,
            way_index,
            relation_index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

impl MapDocument for OsmDocument {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn node(&self, id: ElementId) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    fn way(&self, id: ElementId) -> Option<&Way> {
        self.way_index.get(&id).map(|&i| &self.ways[i])
    }

    fn relation(&self, id: ElementId) -> Option<&Relation> {
        self.relation_index.get(&id).map(|&i| &self.relations[i])
    }

    fn visible_nodes(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        Box::new(self.nodes.iter().filter(|n| n.visible))
    }

    fn visible_ways(&self) -> Box<dyn Iterator<Item = &Way> + '_> {
        Box::new(self.ways.iter().filter(|w| w.visible))
    }

    fn visible_relations(&self) -> Box<dyn Iterator<Item = &Relation> + '_> {
        Box::new(self.relations.iter().filter(|r| r.visible))
    }
}

// Handle an opening (or self-closing) tag. Returns a new top-level element
// when one starts; children are attached to `open` in place.
fn start_element(
    e: &BytesStart<'_>,
    open: &mut OpenElement,
    bounds: &mut Option<Bounds>,
) -> Result<Option<OpenElement>, DocumentError> {
    match e.name().as_ref() {
        b"bounds" => {
            *bounds = Some(Bounds {
                min_lat: required(e, "bounds", "minlat")?,
                min_lon: required(e, "bounds", "minlon")?,
                max_lat: required(e, "bounds", "maxlat")?,
                max_lon: required(e, "bounds", "maxlon")?,
            });
            Ok(None)
        }
        b"node" => Ok(Some(OpenElement::Node(Node {
            id: required(e, "node", "id")?,
            lat: required(e, "node", "lat")?,
            lon: required(e, "node", "lon")?,
            visible: visible(e)?,
            tags: Tags::new(),
        }))),
        b"way" => Ok(Some(OpenElement::Way(Way {
            id: required(e, "way", "id")?,
            visible: visible(e)?,
            node_refs: Vec::new(),
            tags: Tags::new(),
        }))),
        b"relation" => Ok(Some(OpenElement::Relation(Relation {
            id: required(e, "relation", "id")?,
            visible: visible(e)?,
            members: Vec::new(),
            tags: Tags::new(),
        }))),
        b"tag" => {
            let key = attribute(e, b"k")?;
            let value = attribute(e, b"v")?;
            if let (Some(key), Some(value)) = (key, value) {
                match open {
                    OpenElement::Node(node) => node.tags.insert(key, value),
                    OpenElement::Way(way) => way.tags.insert(key, value),
                    OpenElement::Relation(relation) => relation.tags.insert(key, value),
                    OpenElement::None => {}
                }
            }
            Ok(None)
        }
        b"nd" => {
            if let OpenElement::Way(way) = open {
                way.node_refs.push(required(e, "nd", "ref")?);
            }
            Ok(None)
        }
        b"member" => {
            if let OpenElement::Relation(relation) = open {
                let kind = match attribute(e, b"type")?.map(|t| t.to_lowercase()).as_deref() {
                    Some("node") => Some(MemberKind::Node),
                    Some("way") => Some(MemberKind::Way),
                    Some("relation") => Some(MemberKind::Relation),
                    _ => None,
                };
                if let Some(kind) = kind {
                    relation.members.push(Member {
                        kind,
                        reference: required(e, "member", "ref")?,
                        role: attribute(e, b"role")?.unwrap_or_default(),
                    });
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn close_element(
    element: OpenElement,
    nodes: &mut Vec<Node>,
    ways: &mut Vec<Way>,
    relations: &mut Vec<Relation>,
) {
    match element {
        OpenElement::Node(node) => nodes.push(node),
        OpenElement::Way(way) => ways.push(way),
        OpenElement::Relation(relation) => relations.push(relation),
        OpenElement::None => {}
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, DocumentError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required<T: std::str::FromStr>(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &'static str,
) -> Result<T, DocumentError> {
    let value = attribute(e, name.as_bytes())?.unwrap_or_default();
    value
        .trim()
        .parse::<T>()
        .map_err(|_| DocumentError::InvalidAttribute {
            element,
            attribute: name,
            value,
        })
}

// A missing attribute means visible: editor exports omit it.
fn visible(e: &BytesStart<'_>) -> Result<bool, DocumentError> {
    Ok(attribute(e, b"visible")?
        .map(|v| !v.trim().eq_ignore_ascii_case("false"))
        .unwrap_or(true))
}

fn node_extent(nodes: &[Node]) -> Option<Bounds> {
    let first = nodes.first()?;
    let mut bounds = Bounds {
        min_lat: first.lat,
        min_lon: first.lon,
        max_lat: first.lat,
        max_lon: first.lon,
    };
    for node in nodes {
        bounds.min_lat = bounds.min_lat.min(node.lat);
        bounds.min_lon = bounds.min_lon.min(node.lon);
        bounds.max_lat = bounds.max_lat.max(node.lat);
        bounds.max_lon = bounds.max_lon.max(node.lon);
    }
    Some(bounds)
}
