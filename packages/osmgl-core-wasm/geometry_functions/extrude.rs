use earcutr::earcut;
use nalgebra::Vector3;

use crate::attributes::{NaturalData, PartData, RoofData};
use crate::colors::Color;
use crate::error::MeshError;
use crate::mesh::Mesh;
use crate::polygon::{MultiPolygon, Point2, Polygon};

/// Planar triangulation of a ring with holes.
pub trait Triangulator: Send + Sync {
    /// Returns triangles indexing the concatenation of `outer` followed by
    /// each hole in order.
    fn triangulate(
        &self,
        outer: &[Point2],
        holes: &[&[Point2]],
    ) -> Result<Vec<[usize; 3]>, MeshError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EarcutTriangulator;

impl Triangulator for EarcutTriangulator {
    fn triangulate(
        &self,
        outer: &[Point2],
        holes: &[&[Point2]],
    ) -> Result<Vec<[usize; 3]>, MeshError> {
        // Flat [x0, y0, x1, y1, ...] with hole start offsets, as earcut wants
        let mut data: Vec<f64> = Vec::new();
        for pt in outer {
            data.push(pt.x);
            data.push(pt.y);
        }
        let mut hole_indices: Vec<usize> = Vec::new();
        let mut idx_offset = outer.len();
        for hole in holes {
            hole_indices.push(idx_offset);
            for pt in hole.iter() {
                data.push(pt.x);
                data.push(pt.y);
            }
            idx_offset += hole.len();
        }

        let indices = earcut(&data, &hole_indices, 2)
            .map_err(|e| MeshError::Triangulation(format!("{:?}", e)))?;
        if indices.is_empty() {
            return Err(MeshError::Triangulation("no triangles produced".to_string()));
        }
        Ok(indices
            .chunks_exact(3)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect())
    }
}

/// Turns footprints into extruded meshes and trees into billboards.
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder<T: Triangulator = EarcutTriangulator> {
    triangulator: T,
}

impl MeshBuilder<EarcutTriangulator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Triangulator> MeshBuilder<T> {
    pub fn with_triangulator(triangulator: T) -> Self {
        Self { triangulator }
    }

    /// Walls between `min_height` and `height` for the outer ring and every
    /// hole, plus a flat cap at `height`.
    ///
    /// Each ring of N stored points owns 2N vertices: N at the base followed
    /// by N at the top. Rings follow each other, outer first. Walls face
    /// away from the solid whatever the input winding; cap triangles face
    /// up and take the roof colour.
    pub fn build_part(
        &self,
        footprint: &MultiPolygon,
        body: &PartData,
        roof: &RoofData,
    ) -> Result<Mesh, MeshError> {
        let outer = footprint.outer.open_points();
        if outer.len() < 3 {
            return Err(MeshError::DegenerateFootprint(outer.len()));
        }
        let holes: Vec<&Polygon> = footprint
            .holes
            .iter()
            .filter(|hole| hole.open_points().len() >= 3)
            .collect();
        let hole_points: Vec<&[Point2]> = holes.iter().map(|hole| hole.open_points()).collect();

        let triangles = self.triangulator.triangulate(outer, &hole_points)?;

        let stored: usize = footprint.outer.len() + holes.iter().map(|h| h.len()).sum::<usize>();
        let mut mesh = Mesh::with_capacity(stored * 2, stored * 6 + triangles.len() * 3);
        let wall = body.surface.color;

        let mut ring_tops = Vec::with_capacity(holes.len() + 1);
        ring_tops.push(add_walls(
            &mut mesh,
            &footprint.outer,
            body.min_height,
            body.height,
            wall,
            footprint.outer.is_clockwise(),
        ));
        for hole in &holes {
            // Hole walls face into the hole, so a CCW hole is flipped
            ring_tops.push(add_walls(
                &mut mesh,
                hole,
                body.min_height,
                body.height,
                wall,
                !hole.is_clockwise(),
            ));
        }

        // Triangulator index -> (planar point, top vertex)
        let mut lookup: Vec<(Point2, u32)> = Vec::with_capacity(outer.len());
        for (ring, &top) in std::iter::once(outer)
            .chain(hole_points.iter().copied())
            .zip(&ring_tops)
        {
            lookup.extend(ring.iter().enumerate().map(|(i, p)| (*p, top + i as u32)));
        }

        for [a, b, c] in triangles {
            let (Some(&(pa, ia)), Some(&(pb, ib)), Some(&(pc, ic))) =
                (lookup.get(a), lookup.get(b), lookup.get(c))
            else {
                return Err(MeshError::Triangulation(format!(
                    "index out of range in triangle [{}, {}, {}]",
                    a, b, c
                )));
            };
            let cross = (pb.x - pa.x) * (pc.y - pa.y) - (pb.y - pa.y) * (pc.x - pa.x);
            if cross < 0.0 {
                mesh.push_triangle(ia, ic, ib);
            } else {
                mesh.push_triangle(ia, ib, ic);
            }
            for idx in [ia, ib, ic] {
                mesh.colors[idx as usize] = roof.surface.color;
            }
        }

        mesh.compute_vertex_normals();
        Ok(mesh)
    }

    /// Two crossed vertical triangles sized from the tree's circumference and
    /// height.
    pub fn build_natural(&self, anchor: Point2, data: &NaturalData, color: Color) -> Mesh {
        let r = data.circumference * 0.5;
        let h = data.height;
        let (x, z) = (anchor.x, -anchor.y);

        let mut mesh = Mesh::with_capacity(6, 6);
        for position in [
            Vector3::new(x - r, 1.0, z),
            Vector3::new(x, h, z),
            Vector3::new(x + r, 1.0, z),
            Vector3::new(x, 1.0, z - r),
            Vector3::new(x, h, z),
            Vector3::new(x, 1.0, z + r),
        ] {
            mesh.push_vertex(position, color);
        }
        mesh.push_triangle(0, 1, 2);
        mesh.push_triangle(3, 4, 5);
        mesh.compute_vertex_normals();
        mesh
    }
}

// Base and top copies of `ring` plus one quad per edge. Returns the index of
// the first top vertex.
fn add_walls(
    mesh: &mut Mesh,
    ring: &Polygon,
    base_y: f64,
    top_y: f64,
    color: Color,
    flip: bool,
) -> u32 {
    let n = ring.len();
    let base = mesh.vertex_count() as u32;
    for p in &ring.points {
        mesh.push_vertex(Vector3::new(p.x, base_y, -p.y), color);
    }
    let top = mesh.vertex_count() as u32;
    for p in &ring.points {
        mesh.push_vertex(Vector3::new(p.x, top_y, -p.y), color);
    }

    // A closed ring already repeats its first point
    let edges = if ring.is_closed() { n - 1 } else { n };
    for i in 0..edges {
        let j = (i + 1) % n;
        let (bi, bj) = (base + i as u32, base + j as u32);
        let (ti, tj) = (top + i as u32, top + j as u32);
        if flip {
            mesh.push_triangle(ti, bj, bi);
            mesh.push_triangle(ti, tj, bj);
        } else {
            mesh.push_triangle(ti, bi, bj);
            mesh.push_triangle(ti, bj, tj);
        }
    }
    top
}
