//! Configuration for partition lists.

use serde::{Deserialize, Serialize};

use crate::list::PartitionList;
use crate::{ListError, Result};

/// Largest number of node slots a list may reserve up front.
pub const MAX_INITIAL_CAPACITY: usize = 65_536;

const DEFAULT_NAME: &str = "partitions";
const DEFAULT_INITIAL_CAPACITY: usize = 8;

/// How an iterator observes a list that is mutated while it is being walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationMode {
    /// The list lock is taken once per step. Writers are never held up by a
    /// long scan; the iterator sees later inserts and skips nodes removed
    /// ahead of it.
    #[default]
    PerStep,
    /// The partition references are copied under one lock acquisition when
    /// the iterator is created.
    Snapshot,
}

/// Settings of a partition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionListConfig {
    /// Name attached to log events.
    pub name: String,
    /// Number of node slots reserved up front.
    pub initial_capacity: usize,
    /// Iteration consistency.
    pub iteration_mode: IterationMode,
}

impl Default for PartitionListConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            iteration_mode: IterationMode::default(),
        }
    }
}

impl PartitionListConfig {
    /// Checks the settings.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ListError::InvalidConfiguration(
                "list name must not be empty".to_string(),
            ));
        }

        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(ListError::InvalidConfiguration(format!(
                "initial capacity {} exceeds maximum {}",
                self.initial_capacity, MAX_INITIAL_CAPACITY
            )));
        }

        Ok(())
    }
}

/// Builder for creating a partition list.
#[derive(Debug, Clone, Default)]
pub struct PartitionListBuilder {
    config: PartitionListConfig,
}

impl PartitionListBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one read from a file.
    pub fn from_config(config: PartitionListConfig) -> Self {
        Self { config }
    }

    /// Sets the name attached to log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the number of node slots reserved up front.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Sets the iteration consistency.
    pub fn with_iteration_mode(mut self, mode: IterationMode) -> Self {
        self.config.iteration_mode = mode;
        self
    }

    /// Builds the PartitionList instance.
    pub fn build(self) -> Result<PartitionList> {
        self.config.validate()?;
        Ok(PartitionList::with_config(self.config))
    }
}
