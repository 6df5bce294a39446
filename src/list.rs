//! Partition list implementation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace};

use crate::config::{IterationMode, PartitionListConfig};
use crate::partition::{PartitionId, SharedPartition};
use crate::{ListError, Result};

/// A linked list of partitions in insertion order, oldest first.
///
/// Nodes are kept in an arena of slots addressed by index. Every public
/// operation takes the single list lock for its whole duration, so readers
/// never observe a half-relinked list.
pub struct PartitionList {
    nodes: RwLock<Nodes>,
    num_partitions: AtomicUsize,
    counters: Counters,
    config: PartitionListConfig,
}

impl PartitionList {
    /// Creates a new empty partition list with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PartitionListConfig::default())
    }

    /// Creates a new empty partition list. The configuration is assumed valid;
    /// use [`PartitionListBuilder`](crate::PartitionListBuilder) to validate it.
    pub(crate) fn with_config(config: PartitionListConfig) -> Self {
        Self {
            nodes: RwLock::new(Nodes::with_capacity(config.initial_capacity)),
            num_partitions: AtomicUsize::new(0),
            counters: Counters::default(),
            config,
        }
    }

    /// Returns the configuration the list was built with.
    pub fn config(&self) -> &PartitionListConfig {
        &self.config
    }

    /// Appends a partition at the tail of the list.
    pub fn insert(&self, partition: SharedPartition) {
        let min_timestamp = partition.min_timestamp();

        let size = {
            let mut nodes = self.nodes.write();
            nodes.push_back(partition);
            self.num_partitions.store(nodes.len, Ordering::SeqCst);
            nodes.len
        };
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);

        debug!(
            "Inserted partition starting at {} into '{}', {} partitions",
            min_timestamp, self.config.name, size
        );
    }

    /// Removes a partition from the list.
    ///
    /// The partition is looked up by identity and handed back without being
    /// cleaned; releasing it is up to the caller.
    pub fn remove(&self, target: &SharedPartition) -> Result<SharedPartition> {
        let timestamp = target.min_timestamp();

        let (removed, size) = {
            let mut nodes = self.nodes.write();
            let removed = nodes.unlink(PartitionId::of(target));
            self.num_partitions.store(nodes.len, Ordering::SeqCst);
            (removed, nodes.len)
        };

        match removed {
            Some(partition) => {
                self.counters.removals.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Removed partition starting at {} from '{}', {} partitions",
                    timestamp, self.config.name, size
                );
                Ok(partition)
            }
            None => Err(self.miss(timestamp)),
        }
    }

    /// Swaps an old partition with a new one, keeping its position.
    ///
    /// Returns the old partition. When `old` is not in the list, `new` is
    /// dropped rather than inserted.
    pub fn swap(&self, old: &SharedPartition, new: SharedPartition) -> Result<SharedPartition> {
        let timestamp = old.min_timestamp();
        let new_timestamp = new.min_timestamp();

        let replaced = self.nodes.write().replace(PartitionId::of(old), new);

        match replaced {
            Some(partition) => {
                self.counters.swaps.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Swapped partition starting at {} for one starting at {} in '{}'",
                    timestamp, new_timestamp, self.config.name
                );
                Ok(partition)
            }
            None => Err(self.miss(timestamp)),
        }
    }

    /// Gets the head partition.
    pub fn head(&self) -> Option<SharedPartition> {
        let nodes = self.nodes.read();
        nodes.head.and_then(|slot| nodes.partition_at(slot))
    }

    /// Gets the tail partition.
    pub fn tail(&self) -> Option<SharedPartition> {
        let nodes = self.nodes.read();
        nodes.tail.and_then(|slot| nodes.partition_at(slot))
    }

    /// Returns true if this exact partition instance is in the list.
    pub fn contains(&self, partition: &SharedPartition) -> bool {
        self.nodes.read().find(PartitionId::of(partition)).is_some()
    }

    /// Returns the number of partitions.
    pub fn size(&self) -> usize {
        self.num_partitions.load(Ordering::SeqCst)
    }

    /// Returns true if the list holds no partitions.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Creates an iterator over the partitions.
    ///
    /// Its view of concurrent mutations depends on the configured
    /// [`IterationMode`].
    pub fn iter(&self) -> PartitionIterator<'_> {
        let state = match self.config.iteration_mode {
            IterationMode::PerStep => IterState::Live {
                list: self,
                position: Position::Start,
            },
            IterationMode::Snapshot => IterState::Snapshot(self.snapshot().into_iter()),
        };
        PartitionIterator { state }
    }

    /// Copies all partitions in list order under a single lock acquisition.
    pub fn snapshot(&self) -> Vec<SharedPartition> {
        self.nodes.read().partitions()
    }

    /// Empties the list and returns every partition in list order.
    ///
    /// Used at shutdown; the partitions are not cleaned.
    pub fn drain(&self) -> Vec<SharedPartition> {
        let drained = {
            let mut nodes = self.nodes.write();
            let drained = nodes.take_all();
            self.num_partitions.store(0, Ordering::SeqCst);
            drained
        };
        self.counters
            .removals
            .fetch_add(drained.len() as u64, Ordering::Relaxed);

        debug!(
            "Drained {} partitions from '{}'",
            drained.len(),
            self.config.name
        );
        drained
    }

    /// Returns slot usage and cumulative operation counters.
    pub fn stats(&self) -> PartitionListStats {
        let (partitions, allocated_slots, free_slots) = {
            let nodes = self.nodes.read();
            (nodes.len, nodes.slots.len(), nodes.free.len())
        };

        PartitionListStats {
            partitions,
            allocated_slots,
            free_slots,
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            removals: self.counters.removals.load(Ordering::Relaxed),
            swaps: self.counters.swaps.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    fn miss(&self, timestamp: i64) -> ListError {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Partition starting at {} not found in '{}'",
            timestamp, self.config.name
        );
        ListError::PartitionNotFound { timestamp }
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        let nodes = self.nodes.read();
        nodes.check_invariants();
        assert_eq!(self.size(), nodes.len);
    }
}

impl Default for PartitionList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PartitionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionList")
            .field("name", &self.config.name)
            .field("size", &self.size())
            .finish()
    }
}

impl<'a> IntoIterator for &'a PartitionList {
    type Item = SharedPartition;
    type IntoIter = PartitionIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Point-in-time usage figures of a partition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionListStats {
    /// Partitions currently linked.
    pub partitions: usize,
    /// Node slots allocated in the arena.
    pub allocated_slots: usize,
    /// Allocated slots waiting to be reused.
    pub free_slots: usize,
    /// Partitions inserted since creation.
    pub inserts: u64,
    /// Partitions removed or drained since creation.
    pub removals: u64,
    /// Successful swaps since creation.
    pub swaps: u64,
    /// Removals and swaps that did not find their target.
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    inserts: AtomicU64,
    removals: AtomicU64,
    swaps: AtomicU64,
    misses: AtomicU64,
}

/// A node in the partition list.
struct PartitionNode {
    partition: SharedPartition,
    next: Option<usize>,
    /// Insertion sequence. Strictly increasing from head to tail.
    seq: u64,
}

/// Position of a node as remembered by an iterator.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    slot: usize,
    seq: u64,
}

/// Arena-backed singly-linked list. All access goes through the list lock.
#[derive(Default)]
struct Nodes {
    slots: Vec<Option<PartitionNode>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    next_seq: u64,
}

impl Nodes {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    fn push_back(&mut self, partition: SharedPartition) {
        let node = PartitionNode {
            partition,
            next: None,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        match self.tail.and_then(|tail| self.slots[tail].as_mut()) {
            Some(tail_node) => tail_node.next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    /// Finds the slot holding `id` along with its predecessor.
    fn find(&self, id: PartitionId) -> Option<(Option<usize>, usize)> {
        let mut prev = None;
        let mut current = self.head;

        while let Some(slot) = current {
            let node = self.slots[slot].as_ref()?;
            if PartitionId::of(&node.partition) == id {
                return Some((prev, slot));
            }
            prev = Some(slot);
            current = node.next;
        }

        None
    }

    fn unlink(&mut self, id: PartitionId) -> Option<SharedPartition> {
        let (prev, slot) = self.find(id)?;
        let node = self.slots[slot].take()?;

        match prev.and_then(|prev| self.slots[prev].as_mut()) {
            Some(prev_node) => prev_node.next = node.next,
            None => self.head = node.next,
        }
        if self.tail == Some(slot) {
            self.tail = prev;
        }

        self.free.push(slot);
        self.len -= 1;
        Some(node.partition)
    }

    fn replace(
        &mut self,
        id: PartitionId,
        partition: SharedPartition,
    ) -> Option<SharedPartition> {
        let (_, slot) = self.find(id)?;
        let node = self.slots[slot].as_mut()?;
        Some(std::mem::replace(&mut node.partition, partition))
    }

    fn partition_at(&self, slot: usize) -> Option<SharedPartition> {
        self.slots[slot].as_ref().map(|node| node.partition.clone())
    }

    fn entry(&self, slot: usize) -> Option<(Cursor, SharedPartition)> {
        let node = self.slots.get(slot)?.as_ref()?;
        let cursor = Cursor {
            slot,
            seq: node.seq,
        };
        Some((cursor, node.partition.clone()))
    }

    fn first(&self) -> Option<(Cursor, SharedPartition)> {
        self.entry(self.head?)
    }

    /// Returns the node following the one at `cursor`.
    ///
    /// If that node has been unlinked since, its slot is vacant or holds a
    /// younger node; resume at the first live node inserted after it.
    fn advance(&self, cursor: Cursor) -> Option<(Cursor, SharedPartition)> {
        match self.slots.get(cursor.slot).and_then(Option::as_ref) {
            Some(node) if node.seq == cursor.seq => self.entry(node.next?),
            _ => {
                trace!(
                    "Iterator node at slot {} was unlinked, resuming after sequence {}",
                    cursor.slot, cursor.seq
                );
                self.first_after(cursor.seq)
            }
        }
    }

    fn first_after(&self, seq: u64) -> Option<(Cursor, SharedPartition)> {
        let mut current = self.head;
        while let Some(slot) = current {
            let node = self.slots[slot].as_ref()?;
            if node.seq > seq {
                return self.entry(slot);
            }
            current = node.next;
        }
        None
    }

    fn partitions(&self) -> Vec<SharedPartition> {
        let mut partitions = Vec::with_capacity(self.len);
        let mut current = self.head;
        while let Some(node) = current.and_then(|slot| self.slots[slot].as_ref()) {
            partitions.push(node.partition.clone());
            current = node.next;
        }
        partitions
    }

    /// Unlinks everything. The sequence counter keeps running so live
    /// iterators resume correctly against later inserts.
    fn take_all(&mut self) -> Vec<SharedPartition> {
        let partitions = self.partitions();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
        partitions
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        assert_eq!(self.len == 0, self.head.is_none());
        assert_eq!(self.head.is_none(), self.tail.is_none());
        if self.len == 1 {
            assert_eq!(self.head, self.tail);
        }

        let mut steps = 0;
        let mut last = None;
        let mut last_seq = None;
        let mut current = self.head;
        while let Some(slot) = current {
            let node = self.slots[slot].as_ref().expect("linked slot is vacant");
            if let Some(prev_seq) = last_seq {
                assert!(node.seq > prev_seq, "sequence must increase along the list");
            }
            steps += 1;
            assert!(steps <= self.len, "list is longer than its count");
            last_seq = Some(node.seq);
            last = Some(slot);
            current = node.next;
        }

        assert_eq!(steps, self.len);
        assert_eq!(last, self.tail);
        assert_eq!(self.slots.len(), self.len + self.free.len());
        for &slot in &self.free {
            assert!(self.slots[slot].is_none(), "free slot {} is occupied", slot);
        }
    }
}

/// Iterator over partitions in the list.
///
/// Single pass and forward only; create a new one to scan again.
pub struct PartitionIterator<'a> {
    state: IterState<'a>,
}

enum IterState<'a> {
    Live {
        list: &'a PartitionList,
        position: Position,
    },
    Snapshot(std::vec::IntoIter<SharedPartition>),
}

#[derive(Debug, Clone, Copy)]
enum Position {
    Start,
    At(Cursor),
    Done,
}

impl Iterator for PartitionIterator<'_> {
    type Item = SharedPartition;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            IterState::Snapshot(partitions) => partitions.next(),
            IterState::Live { list, position } => {
                let step = {
                    let nodes = list.nodes.read();
                    match *position {
                        Position::Start => nodes.first(),
                        Position::At(cursor) => nodes.advance(cursor),
                        Position::Done => return None,
                    }
                };

                match step {
                    Some((cursor, partition)) => {
                        *position = Position::At(cursor);
                        Some(partition)
                    }
                    None => {
                        *position = Position::Done;
                        None
                    }
                }
            }
        }
    }
}

impl FusedIterator for PartitionIterator<'_> {}
