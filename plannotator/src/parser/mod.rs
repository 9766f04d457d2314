mod lines;
mod structural;

pub use lines::LineIndex;
pub use structural::parse_blocks;

use crate::Plan;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the plan markdown into its block sequence.
    /// Parsing never fails; unknown constructs become paragraphs.
    pub fn parse(&self) -> Plan {
        let blocks = structural::parse_blocks(&self.source);
        tracing::debug!(blocks = blocks.len(), file_id = self.file_id, "parsed plan");
        Plan {
            blocks,
            source_id: self.file_id,
        }
    }
}
