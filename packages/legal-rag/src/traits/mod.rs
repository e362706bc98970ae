//! Core trait abstractions for the legal-rag library.
//!
//! These traits define the interfaces that applications implement
//! to provide embeddings, generation and vector storage.

pub mod ai;
pub mod store;
