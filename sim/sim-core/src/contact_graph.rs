//! Contact partners and contact clusters.
//!
//! The narrow phase reports which particles touch. This module turns those
//! pairs into an undirected graph and groups it into clusters: connected
//! components that move as one rigid body for the current step.
//!
//! # Algorithm
//!
//! Clusters come from a union-find (disjoint-set) pass over the edges:
//!
//! 1. Each particle starts in its own set
//! 2. Every contact edge unions the sets of its two particles
//! 3. Sets with at least two members become clusters
//!
//! Clusters are ordered by their smallest member and members are sorted,
//! so every rank that sees the same edges numbers clusters identically.
//!
//! # Example
//!
//! ```
//! use sim_core::ContactGraph;
//! use sim_types::ParticleId;
//!
//! let id = ParticleId::new;
//! let graph = ContactGraph::from_edges([(id(0), id(1)), (id(1), id(2)), (id(7), id(5))]);
//!
//! assert_eq!(graph.num_clusters(), 2);
//! assert_eq!(graph.clusters()[0].members, vec![id(0), id(1), id(2)]);
//! assert_eq!(graph.recursive_partners(id(2)).len(), 3);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sim_types::{ParticleId, Result};

use crate::comm::{decode, encode, Communicator};
use crate::population::Population;

/// A set of particles in mutual (possibly indirect) contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Members, sorted ascending.
    pub members: Vec<ParticleId>,
}

impl Cluster {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the cluster has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the particle is a member.
    #[must_use]
    pub fn contains(&self, id: ParticleId) -> bool {
        self.members.binary_search(&id).is_ok()
    }
}

/// Undirected contact graph of one step.
#[derive(Debug, Clone, Default)]
pub struct ContactGraph {
    adjacency: BTreeMap<ParticleId, BTreeSet<ParticleId>>,
    clusters: Vec<Cluster>,
    membership: BTreeMap<ParticleId, usize>,
}

impl ContactGraph {
    /// Build the graph from contact edges. Self-contacts are ignored.
    #[must_use]
    pub fn from_edges(edges: impl IntoIterator<Item = (ParticleId, ParticleId)>) -> Self {
        let mut adjacency: BTreeMap<ParticleId, BTreeSet<ParticleId>> = BTreeMap::new();
        for (a, b) in edges {
            if a == b {
                continue;
            }
            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        }

        let nodes: Vec<ParticleId> = adjacency.keys().copied().collect();
        let position: BTreeMap<ParticleId, usize> =
            nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut sets = DisjointSets::new(nodes.len());
        for (node, neighbours) in &adjacency {
            for neighbour in neighbours {
                if let (Some(&i), Some(&j)) = (position.get(node), position.get(neighbour)) {
                    sets.merge(i, j);
                }
            }
        }

        // Nodes are visited in ascending order, so clusters come out ordered
        // by their smallest member and members are already sorted.
        let mut root_to_cluster: BTreeMap<usize, usize> = BTreeMap::new();
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut membership = BTreeMap::new();
        for (i, &id) in nodes.iter().enumerate() {
            let root = sets.root(i);
            let index = *root_to_cluster.entry(root).or_insert_with(|| {
                clusters.push(Cluster {
                    members: Vec::new(),
                });
                clusters.len() - 1
            });
            clusters[index].members.push(id);
            membership.insert(id, index);
        }

        Self {
            adjacency,
            clusters,
            membership,
        }
    }

    /// Edges reported by the authoritative copies held on this rank.
    ///
    /// Deposited particles are fixed to their wall and never join a
    /// cluster, so contacts touching one are left out.
    #[must_use]
    pub fn local_edges(population: &Population) -> Vec<(ParticleId, ParticleId)> {
        let deposited = |id: ParticleId| population.by_id(id).is_some_and(|p| p.flags.deposited);
        population
            .iter()
            .filter(|p| p.role.is_authoritative() && !p.flags.deposited)
            .flat_map(|p| {
                p.partner_ids()
                    .into_iter()
                    .filter(|&partner| !deposited(partner))
                    .map(move |partner| (p.id, partner))
            })
            .collect()
    }

    /// Build the graph of every rank's contacts.
    pub fn gather(population: &Population, comm: &dyn Communicator) -> Result<Self> {
        let local = Self::local_edges(population);
        if comm.size() == 1 {
            return Ok(Self::from_edges(local));
        }
        let gathered = comm.all_gather(encode(&local)?)?;
        let mut edges = Vec::new();
        for payload in &gathered {
            let part: Vec<(ParticleId, ParticleId)> = decode(payload)?;
            edges.extend(part);
        }
        Ok(Self::from_edges(edges))
    }

    /// Direct partners of a particle, ascending.
    #[must_use]
    pub fn partners(&self, id: ParticleId) -> Vec<ParticleId> {
        self.adjacency
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Transitive closure of the partner relation, including `id` itself.
    ///
    /// Walks the graph with an explicit stack; a particle is expanded only
    /// the first time it enters the visited set, so cycles terminate.
    #[must_use]
    pub fn recursive_partners(&self, id: ParticleId) -> BTreeSet<ParticleId> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !visited.insert(next) {
                continue;
            }
            if let Some(neighbours) = self.adjacency.get(&next) {
                stack.extend(neighbours.iter().copied().filter(|n| !visited.contains(n)));
            }
        }
        visited
    }

    /// Direct partners that `is_assigned` does not yet claim.
    #[must_use]
    pub fn unassigned_partners(
        &self,
        id: ParticleId,
        is_assigned: impl Fn(ParticleId) -> bool,
    ) -> Vec<ParticleId> {
        self.partners(id)
            .into_iter()
            .filter(|&partner| !is_assigned(partner))
            .collect()
    }

    /// All clusters, ordered by smallest member.
    #[must_use]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Number of clusters.
    #[must_use]
    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Index of the cluster containing the particle.
    #[must_use]
    pub fn cluster_of(&self, id: ParticleId) -> Option<usize> {
        self.membership.get(&id).copied()
    }

    /// Whether the particle touches anything.
    #[must_use]
    pub fn is_in_contact(&self, id: ParticleId) -> bool {
        self.membership.contains_key(&id)
    }
}

/// Disjoint sets over dense node positions `0..n`.
///
/// Lookups halve the path as they walk; merges hang the smaller tree
/// under the larger one.
struct DisjointSets {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSets {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn root(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            let grandparent = self.parent[self.parent[node]];
            self.parent[node] = grandparent;
            node = grandparent;
        }
        node
    }

    fn merge(&mut self, a: usize, b: usize) {
        let (mut big, mut small) = (self.root(a), self.root(b));
        if big == small {
            return;
        }
        if self.size[big] < self.size[small] {
            std::mem::swap(&mut big, &mut small);
        }
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}
