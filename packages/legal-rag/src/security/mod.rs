//! Credential handling for hosted providers and backends.

pub mod credentials;

pub use credentials::{SecretString, ServiceCredentials};
