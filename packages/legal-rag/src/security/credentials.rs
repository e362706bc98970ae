//! Credential handling with secure memory.
//!
//! Uses the `secrecy` crate so API keys never show up in logs, `Debug`
//! output or error messages.

use secrecy::{ExposeSecret, SecretBox};
use std::fmt;

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    /// Create a new secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value for use in a request header.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the secret is empty (unset environment variables often are).
    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// API key plus endpoint for a hosted service.
#[derive(Clone)]
pub struct ServiceCredentials {
    /// API key (secret)
    pub api_key: SecretString,

    /// Base URL of the service
    pub base_url: String,
}

impl ServiceCredentials {
    /// Create credentials for a service endpoint.
    pub fn new(api_key: impl Into<SecretString>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_not_in_debug_or_display() {
        let secret = SecretString::new("sk-super-secret-key");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "sk-super-secret-key");
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let creds = ServiceCredentials::new("pc-secret", "https://api.pinecone.io/");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("pc-secret"));
        assert!(debug.contains("https://api.pinecone.io"));
    }

    #[test]
    fn test_url_joining() {
        let creds = ServiceCredentials::new("k", "https://api.openai.com/v1/");
        assert_eq!(creds.url("/embeddings"), "https://api.openai.com/v1/embeddings");
        assert_eq!(creds.url("chat/completions"), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_blank_secret_is_empty() {
        assert!(SecretString::new("  ").is_empty());
        assert!(!SecretString::new("sk").is_empty());
    }
}
