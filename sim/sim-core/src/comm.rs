//! Inter-rank communication.
//!
//! Every cross-rank exchange goes through a [`Communicator`]: blocking
//! point-to-point transfers of byte payloads, plus collectives built on
//! them. Collectives are rooted at the lowest rank of the participating
//! group and reduce in rank order, so every participant ends up with
//! bit-identical results.
//!
//! Two implementations are provided:
//!
//! - [`SingleRank`] - a serial run; every collective is local
//! - [`LocalGroup`] - ranks living in one process, connected by channels,
//!   one thread per rank
//!
//! # Ordering
//!
//! Point-to-point messages between two ranks arrive in the order they were
//! sent. Callers that run collectives over overlapping groups must visit
//! the groups in the same order on every rank (ascending particle id in
//! this crate).

use std::collections::BTreeSet;
use std::sync::mpsc::{channel, Receiver, Sender};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sim_types::{Result, SimError};
use tracing::trace;

/// Serialize a value into a payload.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SimError::communication(format!("encode: {e}")))
}

/// Deserialize a payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| SimError::communication(format!("decode: {e}")))
}

/// Blocking message passing between ranks.
pub trait Communicator {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Send a payload to `dest`.
    fn send(&self, dest: usize, payload: Vec<u8>) -> Result<()>;

    /// Receive the next payload from `source`, blocking until it arrives.
    fn recv(&self, source: usize) -> Result<Vec<u8>>;

    /// Every rank.
    fn world(&self) -> BTreeSet<usize> {
        (0..self.size()).collect()
    }

    /// Broadcast from `root` to every other member of `group`.
    ///
    /// The root supplies the payload; every member returns it.
    fn broadcast_within(
        &self,
        root: usize,
        group: &BTreeSet<usize>,
        payload: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let me = self.rank();
        check_member(me, root, group)?;
        if me == root {
            let payload = payload
                .ok_or_else(|| SimError::communication("broadcast root has no payload"))?;
            for &dest in group {
                if dest != me {
                    self.send(dest, payload.clone())?;
                }
            }
            Ok(payload)
        } else {
            self.recv(root)
        }
    }

    /// Broadcast from `root` to every rank.
    fn broadcast(&self, root: usize, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
        self.broadcast_within(root, &self.world(), payload)
    }

    /// Collect one payload per member of `group` on its lowest rank.
    ///
    /// The lowest rank receives the payloads in rank order; other members
    /// receive `None`.
    fn gather_within(
        &self,
        group: &BTreeSet<usize>,
        payload: Vec<u8>,
    ) -> Result<Option<Vec<Vec<u8>>>> {
        let me = self.rank();
        let root = lowest(group)?;
        check_member(me, root, group)?;
        if me != root {
            self.send(root, payload)?;
            return Ok(None);
        }
        let mut collected = Vec::with_capacity(group.len());
        for &source in group {
            if source == me {
                collected.push(payload.clone());
            } else {
                collected.push(self.recv(source)?);
            }
        }
        Ok(Some(collected))
    }

    /// Every rank receives every rank's payload, in rank order.
    fn all_gather(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        let world = self.world();
        let root = lowest(&world)?;
        let gathered = self.gather_within(&world, payload)?;
        let packed = gathered.map(|parts| encode(&parts)).transpose()?;
        decode(&self.broadcast_within(root, &world, packed)?)
    }

    /// Element-wise sum over the members of `group`, in place.
    fn all_reduce_sum_within(&self, group: &BTreeSet<usize>, values: &mut [f64]) -> Result<()> {
        if group.len() <= 1 {
            return check_member(self.rank(), self.rank(), group);
        }
        let root = lowest(group)?;
        let gathered = self.gather_within(group, encode(&*values)?)?;
        let reduced = match gathered {
            Some(parts) => {
                let mut sum = vec![0.0; values.len()];
                for part in &parts {
                    let part: Vec<f64> = decode(part)?;
                    if part.len() != sum.len() {
                        return Err(SimError::communication(format!(
                            "reduction length mismatch: {} vs {}",
                            part.len(),
                            sum.len()
                        )));
                    }
                    for (s, v) in sum.iter_mut().zip(part) {
                        *s += v;
                    }
                }
                Some(encode(&sum)?)
            }
            None => None,
        };
        let sum: Vec<f64> = decode(&self.broadcast_within(root, group, reduced)?)?;
        if sum.len() != values.len() {
            return Err(SimError::communication("reduced vector has the wrong length"));
        }
        values.copy_from_slice(&sum);
        Ok(())
    }

    /// Element-wise sum over every rank, in place.
    fn all_reduce_sum(&self, values: &mut [f64]) -> Result<()> {
        self.all_reduce_sum_within(&self.world(), values)
    }

    /// Block until every rank arrives.
    fn barrier(&self) -> Result<()> {
        self.all_reduce_sum(&mut [])
    }
}

fn lowest(group: &BTreeSet<usize>) -> Result<usize> {
    group
        .first()
        .copied()
        .ok_or_else(|| SimError::communication("collective over an empty group"))
}

fn check_member(me: usize, root: usize, group: &BTreeSet<usize>) -> Result<()> {
    if !group.contains(&me) {
        return Err(SimError::communication(format!(
            "rank {me} is not a member of the group {group:?}"
        )));
    }
    if !group.contains(&root) {
        return Err(SimError::communication(format!(
            "root {root} is not a member of the group {group:?}"
        )));
    }
    Ok(())
}

/// Make a value computed on `root` known to every rank in `owners`.
///
/// The root passes `Some(value)`; the other owners pass `None`. The call
/// returns on every owner once that owner holds the value.
pub fn distribute_value<T, C>(
    comm: &C,
    root: usize,
    owners: &BTreeSet<usize>,
    value: Option<T>,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    C: Communicator + ?Sized,
{
    let me = comm.rank();
    if owners.len() <= 1 {
        check_member(me, root, owners)?;
        return value.ok_or_else(|| SimError::communication("single owner has no value"));
    }
    if me == root {
        let value =
            value.ok_or_else(|| SimError::communication("distributing rank has no value"))?;
        comm.broadcast_within(root, owners, Some(encode(&value)?))?;
        trace!(root, owners = owners.len(), "value distributed");
        Ok(value)
    } else {
        decode(&comm.broadcast_within(root, owners, None)?)
    }
}

/// The communicator of a serial run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRank;

impl Communicator for SingleRank {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, dest: usize, _payload: Vec<u8>) -> Result<()> {
        Err(SimError::communication(format!(
            "serial run cannot send to rank {dest}"
        )))
    }

    fn recv(&self, source: usize) -> Result<Vec<u8>> {
        Err(SimError::communication(format!(
            "serial run cannot receive from rank {source}"
        )))
    }
}

/// One rank of a group of in-process ranks connected by channels.
///
/// Create all ranks with [`LocalGroup::create`] and move each into its own
/// thread.
#[derive(Debug)]
pub struct LocalGroup {
    rank: usize,
    senders: Vec<Sender<Vec<u8>>>,
    receivers: Vec<Receiver<Vec<u8>>>,
}

impl LocalGroup {
    /// Create `size` connected ranks, indexed by rank.
    #[must_use]
    pub fn create(size: usize) -> Vec<Self> {
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Receiver<Vec<u8>>>> = (0..size).map(|_| Vec::new()).collect();
        // Channel (source, dest) is created source-major so that `senders[s]`
        // ends up indexed by destination and `receivers[d]` by source.
        for source in 0..size {
            for dest_receivers in receivers.iter_mut() {
                let (tx, rx) = channel();
                senders[source].push(tx);
                dest_receivers.push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| Self {
                rank,
                senders,
                receivers,
            })
            .collect()
    }
}

impl Communicator for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, dest: usize, payload: Vec<u8>) -> Result<()> {
        let sender = self
            .senders
            .get(dest)
            .ok_or_else(|| SimError::communication(format!("no rank {dest}")))?;
        sender
            .send(payload)
            .map_err(|_| SimError::communication(format!("rank {dest} has hung up")))
    }

    fn recv(&self, source: usize) -> Result<Vec<u8>> {
        let receiver = self
            .receivers
            .get(source)
            .ok_or_else(|| SimError::communication(format!("no rank {source}")))?;
        receiver
            .recv()
            .map_err(|_| SimError::communication(format!("rank {source} has hung up")))
    }
}
