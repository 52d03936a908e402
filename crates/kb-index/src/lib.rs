//! # Quill KB Index
//!
//! Per-directory persistent embedding index for the editor's knowledge base.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> Markdown lister (recursive, capped)
//!     │      └─> Candidate files
//!     │
//!     ├──> Mtime comparison against stored FileRecords
//!     │      └─> Stale set + deleted set
//!     │
//!     └──> Chunk + embed stale files
//!            └─> DirectoryIndex (memory cache + JSON sidecar)
//! ```
//!
//! The store owns one index per directory, guarded by a per-directory mutex
//! so overlapping build/search calls serialize instead of racing on the
//! sidecar file. The sidecar lives inside the indexed directory itself and
//! is rewritten wholesale after every update batch.

mod error;
mod index;
mod store;

pub use error::{KbIndexError, Result};
pub use index::{
    list_markdown_files, sidecar_path, DirectoryIndex, FileRecord, IndexedChunk,
    DEFAULT_MAX_FILES, INDEX_FILE_NAME, INDEX_SCHEMA_VERSION,
};
pub use store::{EnsureOptions, IndexStats, KbStore};
