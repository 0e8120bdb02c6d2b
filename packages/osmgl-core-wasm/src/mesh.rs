use nalgebra::Vector3;

use crate::colors::Color;
use crate::models::BufferGeometry;

/// Indexed triangle mesh with per-vertex normals and colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vector3<f64>>,
    /// Empty until [`Mesh::compute_vertex_normals`] runs, then one per vertex.
    pub normals: Vec<Vector3<f64>>,
    pub colors: Vec<Color>,
    /// Triangle list, three indices per face.
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn with_capacity(vertices: usize, indices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            normals: Vec::new(),
            colors: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(indices),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn push_vertex(&mut self, position: Vector3<f64>, color: Color) -> u32 {
        self.vertices.push(position);
        self.colors.push(color);
        (self.vertices.len() - 1) as u32
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }

    /// Smooth normals: unit face normals summed per vertex, then normalized.
    /// A vertex no triangle references points up.
    pub fn compute_vertex_normals(&mut self) {
        let mut sums = vec![Vector3::zeros(); self.vertices.len()];
        for [a, b, c] in self.triangles() {
            let (p0, p1, p2) = (self.vertices[a], self.vertices[b], self.vertices[c]);
            let face = (p1 - p0).cross(&(p2 - p0));
            let Some(unit) = face.try_normalize(f64::EPSILON) else {
                continue;
            };
            sums[a] += unit;
            sums[b] += unit;
            sums[c] += unit;
        }
        self.normals = sums
            .into_iter()
            .map(|n| n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::y))
            .collect();
    }

    pub fn to_buffer_geometry(&self) -> BufferGeometry {
        let vertices = self
            .vertices
            .iter()
            .flat_map(|v| [v.x as f32, v.y as f32, v.z as f32])
            .collect();
        let normals = (!self.normals.is_empty()).then(|| {
            self.normals
                .iter()
                .flat_map(|n| [n.x as f32, n.y as f32, n.z as f32])
                .collect()
        });
        let colors = self.colors.iter().flat_map(|c| [c.r, c.g, c.b]).collect();

        BufferGeometry {
            vertices,
            normals,
            colors: Some(colors),
            indices: Some(self.indices.clone()),
            has_data: !self.indices.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        let mut mesh = Mesh::default();
        for (x, z) in [(0.0, 0.0), (1.0, 0.0), (1.0, -1.0), (0.0, -1.0)] {
            mesh.push_vertex(Vector3::new(x, 0.0, z), Color::BLUE);
        }
        mesh.push_triangle(0, 1, 2);
        mesh.push_triangle(0, 2, 3);
        mesh
    }

    #[test]
    fn flat_quad_normals_point_up() {
        let mut mesh = quad();
        mesh.compute_vertex_normals();
        assert_eq!(mesh.normals.len(), 4);
        for n in &mesh.normals {
            assert!((n - Vector3::y()).norm() < 1e-9);
        }
    }

    #[test]
    fn shared_vertex_gets_averaged_normal() {
        let mut mesh = Mesh::default();
        let a = mesh.push_vertex(Vector3::new(0.0, 0.0, 0.0), Color::BLUE);
        let b = mesh.push_vertex(Vector3::new(1.0, 0.0, 0.0), Color::BLUE);
        let c = mesh.push_vertex(Vector3::new(0.0, 0.0, -1.0), Color::BLUE);
        let d = mesh.push_vertex(Vector3::new(0.0, 1.0, 0.0), Color::BLUE);
        mesh.push_triangle(a, b, c);
        mesh.push_triangle(d, a, b);
        mesh.compute_vertex_normals();

        let expected = (Vector3::y() + Vector3::z()).normalize();
        assert!((mesh.normals[0] - expected).norm() < 1e-9);
        assert!((mesh.normals[3] - Vector3::z()).norm() < 1e-9);
        for n in &mesh.normals {
            assert!((n.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unreferenced_vertex_points_up() {
        let mut mesh = quad();
        mesh.push_vertex(Vector3::new(5.0, 5.0, 5.0), Color::GREEN);
        mesh.compute_vertex_normals();
        assert_eq!(mesh.normals[4], Vector3::y());
    }

    #[test]
    fn buffer_geometry_is_flat() {
        let mut mesh = quad();
        mesh.compute_vertex_normals();
        let geometry = mesh.to_buffer_geometry();
        assert_eq!(geometry.vertices.len(), 12);
        assert_eq!(geometry.normals.as_ref().map(Vec::len), Some(12));
        assert_eq!(geometry.colors.as_ref().map(Vec::len), Some(12));
        assert_eq!(geometry.indices.as_deref(), Some(&[0, 1, 2, 0, 2, 3][..]));
        assert!(geometry.has_data);
    }
}
