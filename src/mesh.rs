//! In-memory triangle mesh backing the geodesic metric.
//!
//! Only the surface structure the metric needs lives here: face barycenters,
//! the edge-sharing face-adjacency graph, and a nearest-face query. File
//! import/export and rendering belong to external collaborators; a mesh is
//! constructed from vertex and face arrays already in memory.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// A triangle face: three vertex indices.
pub type Face = [usize; 3];

/// Triangle mesh with precomputed barycenters and face adjacency.
#[derive(Clone, Debug)]
pub struct TriMesh {
    vertices: Vec<[f64; 3]>,
    faces: Vec<Face>,
    barycenters: Vec<[f64; 3]>,
    /// `adjacency[f]` lists the faces sharing an edge with `f`.
    adjacency: Vec<Vec<usize>>,
    avg_edge_length: f64,
}

impl TriMesh {
    /// Build a mesh, validating face indices and precomputing barycenters,
    /// the average edge length, and edge-sharing face adjacency.
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<Face>) -> Result<Self> {
        if vertices.is_empty() {
            return Err(Error::InvalidMesh("no vertices"));
        }
        if faces.is_empty() {
            return Err(Error::InvalidMesh("no faces"));
        }
        for face in &faces {
            if face.iter().any(|&v| v >= vertices.len()) {
                return Err(Error::InvalidMesh("face references a missing vertex"));
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(Error::InvalidMesh("degenerate face"));
            }
        }

        let barycenters: Vec<[f64; 3]> = faces
            .iter()
            .map(|f| {
                let mut b = [0.0; 3];
                for &v in f {
                    for i in 0..3 {
                        b[i] += vertices[v][i];
                    }
                }
                for c in &mut b {
                    *c /= 3.0;
                }
                b
            })
            .collect();

        // Faces sharing an (unordered) edge are neighbors.
        let mut edge_faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        let mut edge_total = 0.0;
        let mut edge_count = 0usize;
        for (fi, face) in faces.iter().enumerate() {
            for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
                let key = (a.min(b), a.max(b));
                let entry = edge_faces.entry(key).or_default();
                if entry.is_empty() {
                    edge_total += euclidean3(&vertices[a], &vertices[b]);
                    edge_count += 1;
                }
                entry.push(fi);
            }
        }

        let mut adjacency = vec![Vec::new(); faces.len()];
        for shared in edge_faces.values() {
            for (i, &fa) in shared.iter().enumerate() {
                for &fb in &shared[i + 1..] {
                    adjacency[fa].push(fb);
                    adjacency[fb].push(fa);
                }
            }
        }
        for n in &mut adjacency {
            n.sort_unstable();
            n.dedup();
        }

        Ok(Self {
            vertices,
            faces,
            barycenters,
            adjacency,
            avg_edge_length: edge_total / edge_count as f64,
        })
    }

    /// Number of faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// The mesh vertices.
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// The triangle faces.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Barycenter of a face.
    pub fn barycenter(&self, face: usize) -> &[f64; 3] {
        &self.barycenters[face]
    }

    /// Faces sharing an edge with `face`.
    pub fn neighbors(&self, face: usize) -> &[usize] {
        &self.adjacency[face]
    }

    /// Mean edge length over the mesh.
    pub fn avg_edge_length(&self) -> f64 {
        self.avg_edge_length
    }

    /// The face whose barycenter is nearest to `point` (straight-line
    /// distance), lowest index on ties.
    pub fn nearest_face(&self, point: &[f64; 3]) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (fi, b) in self.barycenters.iter().enumerate() {
            let d = euclidean3(point, b);
            if d < best_dist {
                best_dist = d;
                best = fi;
            }
        }
        best
    }
}

fn euclidean3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
