use std::collections::{HashMap, HashSet};

use crate::console_warn;
use crate::document::{ElementId, MapDocument, MemberKind, Relation};
use crate::polygon::MultiPolygon;

/// How a relation contributes buildings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundKind {
    /// `type=building`: parts listed as `part` way members.
    Building,
    /// `type=multipolygon` tagged `building`.
    MultipolygonBuilding,
    /// `type=multipolygon` tagged `building:part`.
    MultipolygonBuildingPart,
}

impl CompoundKind {
    pub fn classify(relation: &Relation) -> Option<Self> {
        match relation.tags.get("type")? {
            "building" => Some(CompoundKind::Building),
            "multipolygon" => relation.tags.iter().find_map(|(k, _)| match k {
                "building" => Some(CompoundKind::MultipolygonBuilding),
                "building:part" => Some(CompoundKind::MultipolygonBuildingPart),
                _ => None,
            }),
            _ => None,
        }
    }

    pub fn is_multipolygon(self) -> bool {
        !matches!(self, CompoundKind::Building)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Outline,
    Part,
    Outer,
    Inner,
    None,
}

impl Role {
    pub fn parse(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "outline" => Role::Outline,
            "part" => Role::Part,
            "outer" => Role::Outer,
            "inner" => Role::Inner,
            _ => Role::None,
        }
    }
}

/// One way member of a compound.
#[derive(Debug, Clone)]
pub struct Structure {
    pub id: ElementId,
    pub role: Role,
    /// Filled in once the structure seeds a closed ring.
    pub polygon: Option<MultiPolygon>,
    /// Way whose tags the assembled ring inherits.
    pub source: ElementId,
    unassigned: bool,
}

impl Structure {
    pub fn new(id: ElementId, role: Role) -> Self {
        Self {
            id,
            role,
            polygon: None,
            source: id,
            unassigned: true,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.unassigned
    }

    pub fn mark_assigned(&mut self) {
        self.unassigned = false;
    }
}

#[derive(Debug, Clone)]
pub struct Compound {
    pub id: ElementId,
    pub kind: CompoundKind,
    pub structures: Vec<Structure>,
    /// Child relations referenced with role `part`.
    pub references: Vec<ElementId>,
}

impl Compound {
    pub fn from_relation(relation: &Relation, kind: CompoundKind) -> Self {
        let mut structures = Vec::new();
        let mut references = Vec::new();
        for member in &relation.members {
            match member.kind {
                MemberKind::Way => {
                    structures.push(Structure::new(member.reference, Role::parse(&member.role)))
                }
                MemberKind::Relation if member.role == "part" => {
                    references.push(member.reference)
                }
                _ => {}
            }
        }
        Self {
            id: relation.id,
            kind,
            structures,
            references,
        }
    }
}

/// Classified relations of one document, keyed by relation id.
#[derive(Debug, Clone, Default)]
pub struct CompoundSet {
    order: Vec<ElementId>,
    compounds: HashMap<ElementId, Compound>,
}

/// Result of flattening a compound and its descendants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// Root first, then descendants depth-first in member order.
    pub order: Vec<ElementId>,
    /// `(parent, child)` edges that pointed back at an ancestor.
    pub cycles: Vec<(ElementId, ElementId)>,
}

enum Frame {
    Enter(ElementId),
    Exit(ElementId),
}

impl CompoundSet {
    pub fn resolve(document: &dyn MapDocument) -> Self {
        let mut set = CompoundSet::default();
        for relation in document.visible_relations() {
            if let Some(kind) = CompoundKind::classify(relation) {
                if set
                    .compounds
                    .insert(relation.id, Compound::from_relation(relation, kind))
                    .is_none()
                {
                    set.order.push(relation.id);
                }
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&Compound> {
        self.compounds.get(&id)
    }

    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Compound> {
        self.compounds.get_mut(&id)
    }

    /// Ids of every compound of `kind`, in document order.
    pub fn ids_of_kind(&self, kind: CompoundKind) -> Vec<ElementId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.compounds.get(id).map(|c| c.kind) == Some(kind))
            .collect()
    }

    /// Flattens `root` and its `part` relations. Each relation is listed at
    /// most once; a reference to a relation on the current path is skipped.
    pub fn expand(&self, root: ElementId) -> Expansion {
        let mut expansion = Expansion::default();
        let mut visited = HashSet::new();
        let mut path = HashSet::new();
        let mut stack = vec![Frame::Enter(root)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    if !visited.insert(id) {
                        continue;
                    }
                    let Some(compound) = self.compounds.get(&id) else {
                        continue;
                    };
                    expansion.order.push(id);
                    path.insert(id);
                    stack.push(Frame::Exit(id));
                    for child in compound.references.iter().rev() {
                        if path.contains(child) {
                            console_warn!(
                                "Relation {} refers back to ancestor {}, skipping branch",
                                id,
                                child
                            );
                            expansion.cycles.push((id, *child));
                            continue;
                        }
                        stack.push(Frame::Enter(*child));
                    }
                }
                Frame::Exit(id) => {
                    path.remove(&id);
                }
            }
        }
        expansion
    }
}
