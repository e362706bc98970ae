//! Reference provider implementations.
//!
//! Enable with the `openai` feature.

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAIProvider;
