use std::sync::OnceLock;

use crate::attributes::{NaturalData, PartData, RoofData};
use crate::colors::Color;
use crate::console_log;
use crate::document::ElementId;
use crate::extrude::MeshBuilder;
use crate::mesh::Mesh;
use crate::models::ShapeOutput;
use crate::polygon::{MultiPolygon, Point2};

/// A building or building part ready for extrusion.
#[derive(Debug)]
pub struct BuildingPart {
    pub id: ElementId,
    pub footprint: MultiPolygon,
    pub body: PartData,
    pub roof: RoofData,
    pub color: Color,
    mesh: OnceLock<Option<Mesh>>,
}

impl BuildingPart {
    pub fn new(
        id: ElementId,
        footprint: MultiPolygon,
        body: PartData,
        roof: RoofData,
        color: Color,
    ) -> Self {
        Self {
            id,
            footprint,
            body,
            roof,
            color,
            mesh: OnceLock::new(),
        }
    }

    /// Built on first access and kept. Flat parts and footprints that fail
    /// to triangulate have no mesh.
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh
            .get_or_init(|| {
                if !self.body.volume {
                    return None;
                }
                match MeshBuilder::new().build_part(&self.footprint, &self.body, &self.roof) {
                    Ok(mesh) => Some(mesh),
                    Err(e) => {
                        console_log!("Building {}: no mesh ({})", self.id, e);
                        None
                    }
                }
            })
            .as_ref()
    }

    pub fn has_cached_mesh(&self) -> bool {
        self.mesh.get().is_some()
    }
}

/// A point feature, currently only trees.
#[derive(Debug)]
pub struct Natural {
    pub id: ElementId,
    pub anchor: Point2,
    pub data: NaturalData,
    pub color: Color,
    mesh: OnceLock<Mesh>,
}

impl Natural {
    pub fn new(id: ElementId, anchor: Point2, data: NaturalData) -> Self {
        Self {
            id,
            anchor,
            data,
            color: Color::GREEN,
            mesh: OnceLock::new(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        self.mesh
            .get_or_init(|| MeshBuilder::new().build_natural(self.anchor, &self.data, self.color))
    }

    pub fn has_cached_mesh(&self) -> bool {
        self.mesh.get().is_some()
    }
}

#[derive(Debug)]
pub enum Shape {
    Building(BuildingPart),
    Natural(Natural),
}

impl Shape {
    pub fn id(&self) -> ElementId {
        match self {
            Shape::Building(part) => part.id,
            Shape::Natural(natural) => natural.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Building(_) => "building",
            Shape::Natural(_) => "natural",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Shape::Building(part) => part.color,
            Shape::Natural(natural) => natural.color,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match self {
            Shape::Building(part) => part.mesh(),
            Shape::Natural(natural) => Some(natural.mesh()),
        }
    }

    pub fn has_cached_mesh(&self) -> bool {
        match self {
            Shape::Building(part) => part.has_cached_mesh(),
            Shape::Natural(natural) => natural.has_cached_mesh(),
        }
    }

    /// Serializable view. Geometry is included only when `with_mesh` is set.
    pub fn to_output(&self, with_mesh: bool) -> ShapeOutput {
        let color = self.color();
        let (name, height, min_height) = match self {
            Shape::Building(part) => (part.body.name.clone(), part.body.height, part.body.min_height),
            Shape::Natural(natural) => (None, natural.data.height, 0.0),
        };
        ShapeOutput {
            id: self.id().to_string(),
            kind: self.kind().to_string(),
            color: [color.r, color.g, color.b],
            name,
            height,
            min_height,
            geometry: if with_mesh {
                self.mesh().map(Mesh::to_buffer_geometry)
            } else {
                None
            },
        }
    }
}

impl From<BuildingPart> for Shape {
    fn from(part: BuildingPart) -> Self {
        Shape::Building(part)
    }
}

impl From<Natural> for Shape {
    fn from(natural: Natural) -> Self {
        Shape::Natural(natural)
    }
}
