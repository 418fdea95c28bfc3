//! File-backed document store.
//!
//! One JSON file holds the whole portal state. The store loads it into memory,
//! hands out the live document to handlers and writes it back on request.

mod document;
mod json_file;

pub use document::Document;
pub use json_file::{DocumentStore, InitOutcome, StoreError};
