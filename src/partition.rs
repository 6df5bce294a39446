//! Partition capability consumed by the partition list.

use crate::{DataPoint, Result};
use std::fmt;
use std::sync::Arc;

/// A partition is a chunk of time-series data with a timestamp range.
///
/// The list never looks inside a partition. It only stores shared references
/// and compares them by identity; timestamps are reported for diagnostics and
/// used by the engine to decide insertion order.
pub trait Partition: Send + Sync {
    /// Inserts points into the partition.
    /// Returns the points older than the partition's min timestamp.
    fn insert_points(&self, points: &[DataPoint]) -> Result<Vec<DataPoint>>;

    /// Selects data points within `[start, end)`.
    fn select_points(&self, start: i64, end: i64) -> Result<Vec<DataPoint>>;

    /// Returns the minimum timestamp in the partition.
    fn min_timestamp(&self) -> i64;

    /// Returns the maximum timestamp in the partition.
    fn max_timestamp(&self) -> i64;

    /// Returns the number of data points in the partition.
    fn size(&self) -> usize;

    /// Returns true if the partition is writable.
    fn active(&self) -> bool;

    /// Returns true if the partition has expired and should be retired.
    fn expired(&self) -> bool;

    /// Persists buffered data. Partitions without a backing store do nothing.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Releases resources managed by this partition.
    fn clean(&self) -> Result<()>;
}

/// Type alias for a shared partition reference.
pub type SharedPartition = Arc<dyn Partition>;

impl fmt::Debug for dyn Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("min_timestamp", &self.min_timestamp())
            .field("max_timestamp", &self.max_timestamp())
            .finish()
    }
}

/// Identity of a partition instance.
///
/// Derived from the address of the shared allocation, so two partitions with
/// equal timestamps still have distinct ids. An id is only meaningful while
/// some `SharedPartition` keeps the allocation alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionId(usize);

impl PartitionId {
    /// Returns the identity of the given partition reference.
    pub fn of(partition: &SharedPartition) -> Self {
        Self(Arc::as_ptr(partition) as *const () as usize)
    }
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionId({:#x})", self.0)
    }
}
