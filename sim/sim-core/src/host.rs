//! Seams to the host fluid solver.
//!
//! The particle engine never owns the fluid mesh. It asks a [`HostMesh`]
//! for cells, immersed-boundary indicators and wall geometry, and a
//! [`ContactDetector`] for the contacts of the current step.
//!
//! [`UniformGridMesh`] and [`BoundingSphereDetector`] are small
//! self-contained implementations for tests and demonstrations.

use std::collections::BTreeMap;

use nalgebra::{Point3, Unit, Vector3};
use sim_types::{ContactPair, ParticleId, Result, SimError};

use crate::population::Population;

/// Index of a fluid cell.
pub type CellId = usize;

/// Read access to the host solver's mesh and fields.
pub trait HostMesh {
    /// Cell containing `point`.
    fn find_cell(&self, point: &Point3<f64>) -> Option<CellId>;

    /// Cells whose extent lies within `radius` of `point`.
    fn cells_near(&self, point: &Point3<f64>, radius: f64) -> Vec<CellId>;

    /// Cell center.
    fn cell_center(&self, cell: CellId) -> Point3<f64>;

    /// Immersed-boundary indicator in `[0, 1]`; 1 is fully solid.
    fn boundary_indicator(&self, cell: CellId) -> f64;

    /// Distance from the cell center to the nearest wall.
    fn wall_distance(&self, cell: CellId) -> f64;

    /// Unit normal of the nearest wall, pointing from the wall into the fluid.
    fn wall_normal(&self, cell: CellId) -> Vector3<f64>;

    /// A named uniform field value, such as the fluid density.
    fn uniform_scalar(&self, name: &str) -> Option<f64>;
}

/// The narrow phase of the host.
pub trait ContactDetector {
    /// Contacts of the local particles for the current step.
    fn detect(&self, population: &Population) -> Vec<(ParticleId, ContactPair)>;
}

/// A planar wall: solid on the side opposite to its normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    /// A point on the wall.
    pub point: Point3<f64>,
    /// Unit normal pointing into the fluid.
    pub normal: Unit<Vector3<f64>>,
}

impl Wall {
    /// Signed distance, positive on the fluid side.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        (point - self.point).dot(&self.normal)
    }
}

/// Axis-aligned box of uniform cells with planar walls.
#[derive(Debug, Clone)]
pub struct UniformGridMesh {
    min: Point3<f64>,
    max: Point3<f64>,
    divisions: [usize; 3],
    spacing: Vector3<f64>,
    walls: Vec<Wall>,
    scalars: BTreeMap<String, f64>,
}

impl UniformGridMesh {
    /// Create a grid spanning `[min, max]` with the given cell counts.
    pub fn new(min: Point3<f64>, max: Point3<f64>, divisions: [usize; 3]) -> Result<Self> {
        let extent = max - min;
        if extent.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(SimError::invalid_config("grid extent must be positive"));
        }
        if divisions.iter().any(|&n| n == 0) {
            return Err(SimError::invalid_config("grid needs at least one cell per axis"));
        }
        let spacing = Vector3::new(
            extent.x / divisions[0] as f64,
            extent.y / divisions[1] as f64,
            extent.z / divisions[2] as f64,
        );
        Ok(Self {
            min,
            max,
            divisions,
            spacing,
            walls: Vec::new(),
            scalars: BTreeMap::new(),
        })
    }

    /// Add a planar wall. The normal must point into the fluid.
    pub fn with_wall(mut self, point: Point3<f64>, normal: Vector3<f64>) -> Result<Self> {
        let normal = Unit::try_new(normal, 1e-12)
            .ok_or_else(|| SimError::invalid_config("wall normal has zero length"))?;
        self.walls.push(Wall { point, normal });
        Ok(self)
    }

    /// Add a named uniform scalar.
    #[must_use]
    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.scalars.insert(name.into(), value);
        self
    }

    /// Number of cells.
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.divisions.iter().product()
    }

    /// Configured walls.
    #[must_use]
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    fn cell_index(&self, i: usize, j: usize, k: usize) -> CellId {
        i + self.divisions[0] * (j + self.divisions[1] * k)
    }

    fn cell_ijk(&self, cell: CellId) -> [usize; 3] {
        let nx = self.divisions[0];
        let ny = self.divisions[1];
        [cell % nx, (cell / nx) % ny, cell / (nx * ny)]
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn axis_index(&self, axis: usize, coordinate: f64) -> usize {
        let t = ((coordinate - self.min[axis]) / self.spacing[axis]).floor();
        (t.max(0.0) as usize).min(self.divisions[axis] - 1)
    }

    fn nearest_wall(&self, point: &Point3<f64>) -> Option<&Wall> {
        self.walls.iter().min_by(|a, b| {
            a.signed_distance(point)
                .abs()
                .total_cmp(&b.signed_distance(point).abs())
        })
    }
}

impl HostMesh for UniformGridMesh {
    fn find_cell(&self, point: &Point3<f64>) -> Option<CellId> {
        let inside = (0..3).all(|a| point[a] >= self.min[a] && point[a] <= self.max[a]);
        if !inside {
            return None;
        }
        let [i, j, k] = [0, 1, 2].map(|a| self.axis_index(a, point[a]));
        Some(self.cell_index(i, j, k))
    }

    fn cells_near(&self, point: &Point3<f64>, radius: f64) -> Vec<CellId> {
        let lo = [0, 1, 2].map(|a| self.axis_index(a, point[a] - radius));
        let hi = [0, 1, 2].map(|a| self.axis_index(a, point[a] + radius));
        let half = self.spacing * 0.5;
        let mut cells = Vec::new();
        for k in lo[2]..=hi[2] {
            for j in lo[1]..=hi[1] {
                for i in lo[0]..=hi[0] {
                    let cell = self.cell_index(i, j, k);
                    let offset = self.cell_center(cell) - point;
                    let gap = Vector3::new(
                        (offset.x.abs() - half.x).max(0.0),
                        (offset.y.abs() - half.y).max(0.0),
                        (offset.z.abs() - half.z).max(0.0),
                    );
                    if gap.norm() <= radius {
                        cells.push(cell);
                    }
                }
            }
        }
        cells
    }

    fn cell_center(&self, cell: CellId) -> Point3<f64> {
        let [i, j, k] = self.cell_ijk(cell);
        self.min
            + Vector3::new(
                (i as f64 + 0.5) * self.spacing.x,
                (j as f64 + 0.5) * self.spacing.y,
                (k as f64 + 0.5) * self.spacing.z,
            )
    }

    fn boundary_indicator(&self, cell: CellId) -> f64 {
        let center = self.cell_center(cell);
        self.walls
            .iter()
            .map(|wall| {
                // Cell thickness measured along the wall normal
                let thickness = self.spacing.abs().dot(&wall.normal.abs());
                (0.5 - wall.signed_distance(&center) / thickness).clamp(0.0, 1.0)
            })
            .fold(0.0, f64::max)
    }

    fn wall_distance(&self, cell: CellId) -> f64 {
        let center = self.cell_center(cell);
        self.nearest_wall(&center)
            .map_or(f64::INFINITY, |wall| wall.signed_distance(&center))
    }

    fn wall_normal(&self, cell: CellId) -> Vector3<f64> {
        let center = self.cell_center(cell);
        self.nearest_wall(&center)
            .map_or_else(Vector3::zeros, |wall| wall.normal.into_inner())
    }

    fn uniform_scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }
}

/// Reports contacts between particles whose equivalent spheres overlap.
///
/// The touching faces are the faces whose centers lie closest to the
/// partner's center of gravity.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingSphereDetector {
    /// Extra gap still counted as contact.
    pub margin: f64,
}

impl BoundingSphereDetector {
    /// Create a detector with a contact margin.
    #[must_use]
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }
}

fn closest_face(centers: &[Point3<f64>], target: &Point3<f64>) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - target)
                .norm_squared()
                .total_cmp(&(*b - target).norm_squared())
        })
        .map_or(0, |(i, _)| i)
}

impl ContactDetector for BoundingSphereDetector {
    fn detect(&self, population: &Population) -> Vec<(ParticleId, ContactPair)> {
        let particles: Vec<_> = population.iter().collect();
        let mut contacts = Vec::new();
        for (n, a) in particles.iter().enumerate() {
            for b in &particles[n + 1..] {
                let reach = a.equivalent_radius() + b.equivalent_radius() + self.margin;
                if (a.state.cg - b.state.cg).norm() > reach {
                    continue;
                }
                let face_a = closest_face(a.surface.face_centers(), &b.state.cg);
                let face_b = closest_face(b.surface.face_centers(), &a.state.cg);
                contacts.push((
                    a.id,
                    ContactPair::Particle {
                        own_face: face_a,
                        partner: b.handle,
                        partner_id: b.id,
                        partner_face: face_b,
                    },
                ));
                contacts.push((
                    b.id,
                    ContactPair::Particle {
                        own_face: face_b,
                        partner: a.handle,
                        partner_id: a.id,
                        partner_face: face_a,
                    },
                ));
            }
        }
        contacts
    }
}
