//! Build-time configuration and persisted header flags.

/// Header flag: the index carries a key-id table.
pub(crate) const FLAG_KEY_IDS: u32 = 1 << 0;
/// Header flag: edges may carry multi-byte labels.
pub(crate) const FLAG_PATH_COMPRESSION: u32 = 1 << 1;
pub(crate) const FLAG_MASK: u32 = FLAG_KEY_IDS | FLAG_PATH_COMPRESSION;

/// Hard cap on distinct keys: ids are `u32`.
pub const MAX_NUM_KEYS: usize = u32::MAX as usize;

/// Configuration for [`Builder`](crate::Builder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Assign every key a dense id equal to its lexicographic rank.
    pub enable_key_ids: bool,
    /// Collapse single-child chains into multi-byte edge labels.
    pub path_compression: bool,
    /// Maximum number of distinct keys.
    pub max_keys: usize,
    /// Maximum total bytes across distinct keys.
    pub max_total_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_key_ids: true,
            path_compression: true,
            max_keys: MAX_NUM_KEYS,
            max_total_bytes: u32::MAX as usize,
        }
    }
}

impl Config {
    pub fn with_key_ids(mut self, enable: bool) -> Self {
        self.enable_key_ids = enable;
        self
    }

    pub fn with_path_compression(mut self, enable: bool) -> Self {
        self.path_compression = enable;
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    pub fn with_max_total_bytes(mut self, max_total_bytes: usize) -> Self {
        self.max_total_bytes = max_total_bytes;
        self
    }
}
