//! Cross-rank collectives.
//!
//! The orchestrator only needs two collectives before allocating particle
//! storage: a global sum of local counts and a gather of every rank's
//! count. [`LocalComm`] is the single-rank case; [`ChannelComm`] connects
//! in-process ranks over `crossbeam-channel`.

use std::error::Error;
use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Errors raised by a collective.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// A peer rank hung up before the collective completed.
    Disconnected {
        /// Rank that observed the failure.
        rank: usize,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected { rank } => write!(f, "rank {rank}: peer disconnected"),
        }
    }
}

impl Error for CommError {}

/// Collectives over the ranks taking part in a run.
///
/// Every rank must issue the same collectives in the same order.
pub trait Communicator: Send {
    /// This rank's index in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Every rank's `value`, indexed by rank.
    fn all_gather(&mut self, value: u64) -> Result<Vec<u64>, CommError>;

    /// Sum of `value` over all ranks.
    fn all_reduce_sum(&mut self, value: u64) -> Result<u64, CommError> {
        Ok(self.all_gather(value)?.iter().sum())
    }
}

/// The single-rank communicator.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalComm;

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather(&mut self, value: u64) -> Result<Vec<u64>, CommError> {
        Ok(vec![value])
    }
}

#[derive(Clone, Copy, Debug)]
struct Message {
    seq: u64,
    from: usize,
    value: u64,
}

/// An in-process rank connected to its peers by channels.
///
/// Messages carry a sequence number so a rank that runs ahead into the
/// next collective cannot be confused with the current one.
pub struct ChannelComm {
    rank: usize,
    peers: Vec<Sender<Message>>,
    inbox: Receiver<Message>,
    pending: Vec<Message>,
    seq: u64,
}

impl ChannelComm {
    /// Create `size` connected ranks; hand one to each thread.
    pub fn group(size: usize) -> Vec<ChannelComm> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelComm {
                rank,
                peers: senders.clone(),
                inbox,
                pending: Vec::new(),
                seq: 0,
            })
            .collect()
    }

    fn take_pending(&mut self, seq: u64, slots: &mut [Option<u64>]) -> usize {
        let mut filled = 0;
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].seq == seq {
                let m = self.pending.swap_remove(i);
                if slots[m.from].replace(m.value).is_none() {
                    filled += 1;
                }
            } else {
                i += 1;
            }
        }
        filled
    }
}

impl fmt::Debug for ChannelComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelComm")
            .field("rank", &self.rank)
            .field("size", &self.peers.len())
            .field("seq", &self.seq)
            .finish()
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn all_gather(&mut self, value: u64) -> Result<Vec<u64>, CommError> {
        let seq = self.seq;
        self.seq += 1;
        let disconnected = CommError::Disconnected { rank: self.rank };
        let msg = Message {
            seq,
            from: self.rank,
            value,
        };
        for peer in &self.peers {
            peer.send(msg).map_err(|_| disconnected.clone())?;
        }
        let size = self.peers.len();
        let mut slots = vec![None; size];
        let mut filled = self.take_pending(seq, &mut slots);
        while filled < size {
            let m = self.inbox.recv().map_err(|_| disconnected.clone())?;
            if m.seq != seq {
                self.pending.push(m);
                continue;
            }
            if slots[m.from].replace(m.value).is_none() {
                filled += 1;
            }
        }
        Ok(slots.into_iter().map(|v| v.unwrap_or(0)).collect())
    }
}
