pub const DEFAULT_MAX_DEPTH: usize = 128;
pub const DEFAULT_MAX_ELEMENTS: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Resource bounds enforced while decoding a single top-level value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Deepest allowed nesting of aggregates; a top-level aggregate sits at
    /// depth 0.
    pub max_depth: usize,
    /// Largest element (or entry) count accepted for one aggregate.
    pub max_elements: usize,
    /// Largest declared length accepted for bulk strings, bulk errors and
    /// verbatim strings.
    pub max_bulk_len: usize,
    /// Most bytes buffered while waiting for a value to complete.
    pub max_frame_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_elements: DEFAULT_MAX_ELEMENTS,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
