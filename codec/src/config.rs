//! Configuration for encoding and decoding values.

use crate::wire::ByteOrder;

/// Default bound on the number of distinct tables encoded or decoded in one call.
pub const DEFAULT_MAX_REFS: usize = 256;

/// Default bound on table nesting.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// How nested tables are walked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Traversal {
    /// Direct recursion. Call-stack use grows with nesting depth.
    #[default]
    Recursive,

    /// An explicit work stack on the heap. Produces the same bytes as [Traversal::Recursive].
    Iterative,
}

/// Configuration for the value codec.
#[derive(Clone, Debug)]
pub struct Config {
    /// Byte order of multi-byte numbers, lengths and table references.
    pub byte_order: ByteOrder,

    /// The maximum number of distinct tables in one encode or decode call.
    ///
    /// Every table written (or read) in full occupies one slot so that later occurrences can be
    /// emitted (or resolved) as back-references.
    pub max_refs: usize,

    /// The maximum number of tables that may enclose a table being written or read.
    pub max_depth: usize,

    /// Whether back-references whose offset exceeds one byte may use a multi-byte offset.
    ///
    /// When disabled, such references fail with [crate::Error::RefOffsetOverflow] and every
    /// emitted reference uses the single-byte layout.
    pub wide_refs: bool,

    /// How nested tables are walked.
    pub traversal: Traversal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            max_refs: DEFAULT_MAX_REFS,
            max_depth: DEFAULT_MAX_DEPTH,
            wide_refs: true,
            traversal: Traversal::Recursive,
        }
    }
}
