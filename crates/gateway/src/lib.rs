//! # Quill Gateway
//!
//! The command boundary the editor shell calls into. Nothing in this crate
//! panics or returns an error across the boundary: build failures come back
//! as `{ok: false, error}` envelopes and search failures as empty lists,
//! so a broken knowledge base can never take the editor down with it.

mod articles;
mod gateway;

pub use articles::ArticleMeta;
pub use gateway::{
    BuildIndexResponse, KbGateway, LocalContext, RetrievalMode, RetrieveOptions,
};
