//! # Quill Markdown Chunker
//!
//! Splits markdown documents into retrieval-sized passages.
//!
//! ## Pipeline
//!
//! ```text
//! Markdown text
//!     │
//!     ├──> Line scanner (fence-aware)
//!     │      └─> Heading-delimited sections
//!     │
//!     └──> Paragraph refinement (soft/hard caps)
//!            └─> Chunks { heading, text }
//! ```
//!
//! Level-2 through level-6 headings open a new section; level-1 headings are
//! treated as the document title and never split. Fenced code blocks are
//! copied through as one inseparable unit, no matter how long they are.

mod chunker;
mod title;

pub use chunker::{chunk_markdown, Chunk, Chunker, ChunkerConfig};
pub use title::derive_title;
