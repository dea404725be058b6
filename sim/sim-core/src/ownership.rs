//! Rank ownership of particles.
//!
//! A particle is owned by every rank whose region overlaps its bounding
//! sphere grown by a search radius. Exactly one owner is the master: the
//! rank whose region contains the center of gravity. Other owners hold
//! slave copies.
//!
//! After each step [`OwnershipSync::synchronize`] recomputes owners for
//! every authoritative copy, then the master ships the full particle to
//! every other owner. Ranks that are no longer owners drop their copies.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use sim_types::{Particle, ParticleId, ParticleRole, Result, SimError};
use tracing::{debug, trace};

use crate::comm::{decode, encode, Communicator};
use crate::population::Population;

/// Background-grid ownership query.
pub trait RankQuery {
    /// Ranks whose region lies within `radius` of `point`.
    fn ranks_near(&self, point: &Point3<f64>, radius: f64) -> BTreeSet<usize>;

    /// Rank whose region contains `point`.
    fn rank_containing(&self, point: &Point3<f64>) -> Option<usize>;
}

/// One axis-aligned region per rank.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundGrid {
    regions: Vec<(Point3<f64>, Point3<f64>)>,
}

impl BackgroundGrid {
    /// Regions indexed by rank.
    #[must_use]
    pub fn new(regions: Vec<(Point3<f64>, Point3<f64>)>) -> Self {
        Self { regions }
    }

    /// The whole domain on rank 0.
    #[must_use]
    pub fn single(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self::new(vec![(min, max)])
    }

    /// Split `[min, max]` into `ranks` equal slabs along `axis`.
    pub fn slabs(min: Point3<f64>, max: Point3<f64>, axis: usize, ranks: usize) -> Result<Self> {
        if axis > 2 || ranks == 0 {
            return Err(SimError::invalid_config(format!(
                "cannot split axis {axis} into {ranks} slabs"
            )));
        }
        let width = (max[axis] - min[axis]) / ranks as f64;
        let regions = (0..ranks)
            .map(|r| {
                let mut lo = min;
                let mut hi = max;
                lo[axis] = min[axis] + width * r as f64;
                hi[axis] = if r + 1 == ranks {
                    max[axis]
                } else {
                    min[axis] + width * (r + 1) as f64
                };
                (lo, hi)
            })
            .collect();
        Ok(Self::new(regions))
    }

    /// Number of regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether there are no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn distance_to_box(point: &Point3<f64>, lo: &Point3<f64>, hi: &Point3<f64>) -> f64 {
    let mut squared = 0.0;
    for a in 0..3 {
        let gap = (lo[a] - point[a]).max(point[a] - hi[a]).max(0.0);
        squared += gap * gap;
    }
    squared.sqrt()
}

impl RankQuery for BackgroundGrid {
    fn ranks_near(&self, point: &Point3<f64>, radius: f64) -> BTreeSet<usize> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, (lo, hi))| distance_to_box(point, lo, hi) <= radius)
            .map(|(rank, _)| rank)
            .collect()
    }

    fn rank_containing(&self, point: &Point3<f64>) -> Option<usize> {
        self.regions
            .iter()
            .position(|(lo, hi)| distance_to_box(point, lo, hi) == 0.0)
    }
}

/// Owner set and master rank of one particle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    /// Ranks that need to know about the particle.
    pub owners: BTreeSet<usize>,
    /// Rank holding the authoritative copy.
    pub master: usize,
}

impl Ownership {
    /// Role of the copy held on `rank`.
    #[must_use]
    pub fn role_on(&self, rank: usize) -> ParticleRole {
        if self.owners.len() <= 1 {
            ParticleRole::Free
        } else if rank == self.master {
            ParticleRole::Master
        } else {
            ParticleRole::Slave
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Announcement {
    id: ParticleId,
    sender: usize,
    ownership: Ownership,
}

/// What one synchronization did on the local rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Copies shipped to other owners.
    pub sent: usize,
    /// Copies received from masters.
    pub received: usize,
    /// Local copies dropped because the rank stopped owning them.
    pub dropped: usize,
}

/// Owner bookkeeping and master-to-owner synchronization.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipSync {
    search_radius: f64,
}

impl OwnershipSync {
    /// Create with the extra radius added to each particle's bounding radius.
    #[must_use]
    pub fn new(search_radius: f64) -> Self {
        Self { search_radius }
    }

    /// Owners and master of a particle as seen from `fallback` rank.
    ///
    /// A particle outside every region stays with `fallback`.
    #[must_use]
    pub fn ownership(
        &self,
        particle: &Particle,
        query: &dyn RankQuery,
        fallback: usize,
    ) -> Ownership {
        let cg = particle.state.cg;
        let radius = particle.surface.bounding_radius(&cg) + self.search_radius;
        let mut owners = query.ranks_near(&cg, radius);
        let master = query
            .rank_containing(&cg)
            .filter(|rank| owners.contains(rank))
            .or_else(|| owners.first().copied())
            .unwrap_or(fallback);
        owners.insert(master);
        Ownership { owners, master }
    }

    /// Recompute ownership and bring every owner's copy in line with its master.
    ///
    /// Every rank must call this with the same sequence of prior steps.
    pub fn synchronize(
        &self,
        population: &mut Population,
        comm: &dyn Communicator,
        query: &dyn RankQuery,
    ) -> Result<SyncReport> {
        let me = comm.rank();
        let mut report = SyncReport::default();

        let local: Vec<Announcement> = population
            .iter()
            .filter(|p| p.role.is_authoritative())
            .map(|p| Announcement {
                id: p.id,
                sender: me,
                ownership: self.ownership(p, query, me),
            })
            .collect();

        let announcements: Vec<Announcement> = if comm.size() == 1 {
            local
        } else {
            let mut all = Vec::new();
            for payload in comm.all_gather(encode(&local)?)? {
                let part: Vec<Announcement> = decode(&payload)?;
                all.extend(part);
            }
            all.sort_by_key(|a| a.id);
            all
        };

        let mut keep: BTreeMap<ParticleId, bool> = BTreeMap::new();
        for announcement in &announcements {
            let Announcement {
                id,
                sender,
                ownership,
            } = announcement;
            let owned_here = ownership.owners.contains(&me);
            keep.insert(*id, owned_here);

            if *sender == me {
                let particle = population
                    .by_id_mut(*id)
                    .ok_or_else(|| SimError::UnknownParticle(id.to_string()))?;
                particle.owners.clone_from(&ownership.owners);
                particle.master = ownership.master;
                for &dest in &ownership.owners {
                    if dest != me {
                        let mut copy = particle.clone();
                        copy.role = ownership.role_on(dest);
                        comm.send(dest, encode(&copy)?)?;
                        report.sent += 1;
                    }
                }
                particle.role = ownership.role_on(me);
            } else if owned_here {
                let mut copy: Particle = decode(&comm.recv(*sender)?)?;
                copy.role = ownership.role_on(me);
                if copy.id != *id {
                    return Err(SimError::communication(format!(
                        "expected {id} from rank {sender}, got {}",
                        copy.id
                    )));
                }
                population.upsert(copy);
                report.received += 1;
                trace!(particle = %id, from = sender, "copy received");
            }
        }

        for id in population.ids() {
            if !keep.get(&id).copied().unwrap_or(false) {
                population.remove_id(id);
                report.dropped += 1;
            }
        }

        if report.sent + report.received + report.dropped > 0 {
            debug!(
                rank = me,
                sent = report.sent,
                received = report.received,
                dropped = report.dropped,
                "ownership synchronized"
            );
        }
        Ok(report)
    }
}
