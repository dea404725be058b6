//! Walls near a particle.

use nalgebra::Vector3;
use sim_core::{CellId, HostMesh};
use sim_types::Particle;

/// A wall cell close enough to a particle to count as contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallContact {
    /// The solid cell.
    pub cell: CellId,
    /// Unit wall normal pointing into the fluid.
    pub normal: Vector3<f64>,
    /// Gap between the particle surface and the wall plane; negative when
    /// the surface already crosses it.
    pub gap: f64,
}

/// Wall cells within `contact_distance` of the particle surface.
///
/// A cell counts as wall when its immersed-boundary indicator is nonzero
/// and at least `solid_threshold`. The wall plane passes through the
/// cell's nearest wall point. Results are ordered by gap, then cell.
#[must_use]
pub fn wall_contacts(
    particle: &Particle,
    host: &dyn HostMesh,
    contact_distance: f64,
    solid_threshold: f64,
) -> Vec<WallContact> {
    let cg = particle.state.cg;
    let reach = particle.surface.bounding_radius(&cg) + contact_distance;

    let mut contacts: Vec<WallContact> = host
        .cells_near(&cg, reach)
        .into_iter()
        .filter_map(|cell| {
            let indicator = host.boundary_indicator(cell);
            if indicator <= 0.0 || indicator < solid_threshold {
                return None;
            }
            let normal = host.wall_normal(cell).try_normalize(1e-12)?;
            let wall_point = host.cell_center(cell) - host.wall_distance(cell) * normal;
            // How far the body reaches from its center toward the wall
            let support = particle
                .surface
                .points()
                .iter()
                .map(|p| (cg - p).dot(&normal))
                .fold(0.0, f64::max);
            let gap = (cg - wall_point).dot(&normal) - support;
            (gap <= contact_distance).then_some(WallContact { cell, normal, gap })
        })
        .collect();

    contacts.sort_by(|a, b| a.gap.total_cmp(&b.gap).then(a.cell.cmp(&b.cell)));
    contacts
}
