//! Geodesic distance over a triangle mesh.
//!
//! Distances are measured between mesh faces: a query point is snapped to the
//! face with the nearest barycenter, and face-to-face distances come from a
//! per-source-face table over the edge-sharing adjacency graph. Tables are
//! computed lazily — one single-source pass per distinct source face — and
//! cached, since the sources seen during a filtering pass are dominated by
//! the current centroids. Off-mesh queries (cell midpoints, bounding-box
//! corners) are measured through their nearest face the same way.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};

use ordered_float::OrderedFloat;

use super::Metric;
use crate::error::{Error, Result};
use crate::mesh::TriMesh;

/// Floor applied before taking logarithms in the heat backend.
const HEAT_FLOOR: f64 = 1e-300;

#[derive(Clone, Copy, Debug)]
enum Solver {
    /// Single-source shortest paths over barycenter hops.
    Dijkstra,
    /// Explicit heat diffusion followed by Varadhan distance recovery.
    Heat { steps: usize },
}

/// Geodesic metric over a [`TriMesh`], Dijkstra- or heat-kernel-backed.
///
/// [`Metric::setup`] must run before the metric is used for a fit: it maps
/// the dataset onto the mesh and binds the metric to that one dataset.
/// Setting up against a different dataset afterwards is an error.
#[derive(Debug)]
pub struct GeodesicMetric {
    mesh: TriMesh,
    solver: Solver,
    /// Face-adjacency graph with barycenter-distance edge weights.
    graph: Vec<Vec<(usize, f64)>>,
    /// The dataset this metric was set up against.
    bound: Option<Vec<[f64; 3]>>,
    /// Exact-coordinate memo of point-to-face snapping.
    snaps: Mutex<HashMap<[u64; 3], usize>>,
    /// Per-source-face distance tables.
    tables: Mutex<HashMap<usize, Arc<Vec<f64>>>>,
}

impl GeodesicMetric {
    /// Shortest-path-backed geodesic metric.
    pub fn dijkstra(mesh: TriMesh) -> Self {
        Self::with_solver(mesh, Solver::Dijkstra)
    }

    /// Heat-kernel-backed geodesic metric. The diffusion runs long enough to
    /// cross the whole face graph.
    pub fn heat(mesh: TriMesh) -> Self {
        let steps = mesh.num_faces().max(16);
        Self::with_solver(mesh, Solver::Heat { steps })
    }

    /// Heat-kernel-backed metric with an explicit diffusion step count.
    pub fn heat_with_steps(mesh: TriMesh, steps: usize) -> Self {
        Self::with_solver(mesh, Solver::Heat { steps: steps.max(1) })
    }

    fn with_solver(mesh: TriMesh, solver: Solver) -> Self {
        let graph = (0..mesh.num_faces())
            .map(|f| {
                mesh.neighbors(f)
                    .iter()
                    .map(|&n| (n, barycenter_hop(&mesh, f, n)))
                    .collect()
            })
            .collect();
        Self {
            mesh,
            solver,
            graph,
            bound: None,
            snaps: Mutex::new(HashMap::new()),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// The mesh this metric measures over.
    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    /// The face a coordinate vector snaps to.
    pub fn face_of(&self, point: &[f64; 3]) -> usize {
        self.snap(point)
    }

    fn snap(&self, point: &[f64; 3]) -> usize {
        let key = [point[0].to_bits(), point[1].to_bits(), point[2].to_bits()];
        if let Some(&face) = self.snaps.lock().expect("snap cache poisoned").get(&key) {
            return face;
        }
        let face = self.mesh.nearest_face(point);
        self.snaps
            .lock()
            .expect("snap cache poisoned")
            .insert(key, face);
        face
    }

    fn table(&self, source: usize) -> Arc<Vec<f64>> {
        if let Some(table) = self
            .tables
            .lock()
            .expect("table cache poisoned")
            .get(&source)
        {
            return Arc::clone(table);
        }

        // Computed outside the lock; a concurrent duplicate is wasted work,
        // not a correctness problem, and the first insert wins.
        let table = Arc::new(match self.solver {
            Solver::Dijkstra => self.dijkstra_from(source),
            Solver::Heat { steps } => self.heat_from(source, steps),
        });
        Arc::clone(
            self.tables
                .lock()
                .expect("table cache poisoned")
                .entry(source)
                .or_insert(table),
        )
    }

    fn dijkstra_from(&self, source: usize) -> Vec<f64> {
        let n = self.mesh.num_faces();
        let mut dist = vec![f64::INFINITY; n];
        let mut heap = BinaryHeap::new();
        dist[source] = 0.0;
        heap.push(Reverse((OrderedFloat(0.0), source)));

        while let Some(Reverse((OrderedFloat(d), face))) = heap.pop() {
            if d > dist[face] {
                continue;
            }
            for &(neighbor, weight) in &self.graph[face] {
                let next = d + weight;
                if next < dist[neighbor] {
                    dist[neighbor] = next;
                    heap.push(Reverse((OrderedFloat(next), neighbor)));
                }
            }
        }
        dist
    }

    /// Diffuse a unit impulse from `source` with explicit Euler steps, then
    /// recover distances via Varadhan's formula `d = sqrt(-4t ln u)`,
    /// normalized so the source sits at distance zero.
    fn heat_from(&self, source: usize, steps: usize) -> Vec<f64> {
        let n = self.mesh.num_faces();
        if n == 1 {
            return vec![0.0];
        }

        // Conductance = inverse hop length; dt bounded by the stiffest row.
        let conductance: Vec<Vec<(usize, f64)>> = self
            .graph
            .iter()
            .map(|edges| {
                edges
                    .iter()
                    .map(|&(nb, w)| (nb, 1.0 / w.max(f64::EPSILON)))
                    .collect()
            })
            .collect();
        let stiffest = conductance
            .iter()
            .map(|edges| edges.iter().map(|&(_, c)| c).sum::<f64>())
            .fold(0.0f64, f64::max);
        if stiffest == 0.0 {
            // No edges at all: every face is its own component.
            let mut dist = vec![f64::INFINITY; n];
            dist[source] = 0.0;
            return dist;
        }
        let dt = 0.9 / stiffest;

        let mut u = vec![0.0f64; n];
        u[source] = 1.0;
        let mut next = vec![0.0f64; n];
        for _ in 0..steps {
            for f in 0..n {
                let mut flux = 0.0;
                for &(nb, c) in &conductance[f] {
                    flux += c * (u[nb] - u[f]);
                }
                next[f] = u[f] + dt * flux;
            }
            std::mem::swap(&mut u, &mut next);
        }

        let t = steps as f64 * dt;
        let peak = u[source].max(HEAT_FLOOR);
        u.iter()
            .map(|&ui| {
                let ratio = ui.max(HEAT_FLOOR) / peak;
                (-4.0 * t * ratio.ln()).max(0.0).sqrt()
            })
            .collect()
    }
}

impl Metric<3> for GeodesicMetric {
    fn distance(&self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let fa = self.snap(a);
        let fb = self.snap(b);
        if fa == fb {
            return 0.0;
        }
        self.table(fa)[fb]
    }

    fn setup(&mut self, data: &[[f64; 3]]) -> Result<()> {
        if let Some(bound) = &self.bound {
            if bound.as_slice() == data {
                return Ok(());
            }
            return Err(Error::MetricNotReady(
                "geodesic metric is bound to a different dataset",
            ));
        }
        for point in data {
            self.snap(point);
        }
        self.bound = Some(data.to_vec());
        Ok(())
    }
}

fn barycenter_hop(mesh: &TriMesh, a: usize, b: usize) -> f64 {
    let pa = mesh.barycenter(a);
    let pb = mesh.barycenter(b);
    pa.iter()
        .zip(pb.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
