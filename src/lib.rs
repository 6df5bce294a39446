//! tsink-list - the partition list of the tsink time-series storage engine
//!
//! The list keeps the engine's in-memory partitions in insertion order and lets
//! the write path append, the retirement and compaction paths remove or swap,
//! and queries iterate, all at the same time.
//!
//! ```
//! use std::sync::Arc;
//! use tsink_list::{DataPoint, Partition, PartitionList, Result, SharedPartition};
//!
//! struct Empty(i64);
//!
//! impl Partition for Empty {
//!     fn insert_points(&self, _points: &[DataPoint]) -> Result<Vec<DataPoint>> { Ok(Vec::new()) }
//!     fn select_points(&self, _start: i64, _end: i64) -> Result<Vec<DataPoint>> { Ok(Vec::new()) }
//!     fn min_timestamp(&self) -> i64 { self.0 }
//!     fn max_timestamp(&self) -> i64 { self.0 }
//!     fn size(&self) -> usize { 0 }
//!     fn active(&self) -> bool { true }
//!     fn expired(&self) -> bool { false }
//!     fn clean(&self) -> Result<()> { Ok(()) }
//! }
//!
//! let list = PartitionList::new();
//! let old: SharedPartition = Arc::new(Empty(1));
//! list.insert(old.clone());
//! list.insert(Arc::new(Empty(2)));
//!
//! list.swap(&old, Arc::new(Empty(1)))?;
//! assert_eq!(list.size(), 2);
//! assert!(list.remove(&old).is_err());
//! # Ok::<(), tsink_list::ListError>(())
//! ```

pub mod config;
pub mod error;
pub mod list;
pub mod partition;

pub use config::{IterationMode, MAX_INITIAL_CAPACITY, PartitionListBuilder, PartitionListConfig};
pub use error::{ListError, Result};
pub use list::{PartitionIterator, PartitionList, PartitionListStats};
pub use partition::{Partition, PartitionId, SharedPartition};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a data point, the smallest unit of time series data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// The actual value.
    pub value: f64,
    /// Unix timestamp.
    pub timestamp: i64,
}

impl DataPoint {
    /// Creates a new DataPoint.
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataPoint(ts: {}, val: {})", self.timestamp, self.value)
    }
}
