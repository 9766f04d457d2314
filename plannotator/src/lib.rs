pub mod annotation;
pub mod block;
pub mod document;
pub mod parser;
pub mod resolver;
pub mod review;
pub mod share;

use crate::block::Block;

/// A parsed plan document.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Blocks in document order.
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Plan {
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }
}
