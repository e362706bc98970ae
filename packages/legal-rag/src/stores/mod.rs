//! Document store adapters and vector backend implementations.

pub mod adapter;
pub mod local;

#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use adapter::{BackendRegistry, IndexAdapter};
pub use local::{LocalEntry, LocalStore};

#[cfg(feature = "pinecone")]
pub use pinecone::PineconeBackend;
