use serde::{Deserialize, Serialize};

use crate::storage::btree::node::MIN_ORDER;
use crate::types::{Error, Result};

/// Configuration knobs for a [`Tree`](super::Tree).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Maximum children per internal node when creating a tree. Existing
    /// trees keep the order found in storage.
    pub order: usize,
    /// Number of row cache slots; 0 disables the cache
    pub cache_capacity: usize,
    /// Root node of an existing tree
    pub root: Option<u32>,
    /// Requests serviced per round trip with a state machine
    pub batch_window: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            order: 16,
            cache_capacity: 8191,
            root: None,
            batch_window: 256,
        }
    }
}

impl TreeOptions {
    /// Parses options from TOML; missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text).map_err(|err| Error::Config(err.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes the options to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| Error::Config(err.to_string()))
    }

    /// Rejects values the tree cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.order < MIN_ORDER {
            return Err(Error::Config(format!(
                "order must be at least {MIN_ORDER}, got {}",
                self.order
            )));
        }
        if self.batch_window == 0 {
            return Err(Error::Config("batch_window must be positive".into()));
        }
        Ok(())
    }

    /// Sets the order used when creating a tree.
    pub fn order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Sets the number of row cache slots.
    pub fn cache_capacity(mut self, slots: usize) -> Self {
        self.cache_capacity = slots;
        self
    }

    /// Opens the tree rooted at `root` instead of creating one.
    pub fn root(mut self, root: u32) -> Self {
        self.root = Some(root);
        self
    }
}
