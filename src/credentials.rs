//! API key lookup.
//!
//! Secure storage belongs to the host; the agent only asks for a token by
//! name at the start of every dispatch cycle.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Token name under which the API key is stored.
pub const API_KEY_TOKEN: &str = "WakatimeApiKey";

/// Host-provided credential lookup.
pub trait CredentialStore: Send + Sync {
    /// The stored token, or `None` when absent.
    fn get_token(&self, name: &str) -> Option<String>;
}

pub type SharedCredentials = Arc<dyn CredentialStore>;

/// Reads tokens from environment variables.
///
/// `WakatimeApiKey` maps to `WAKATIME_API_KEY`; other names are upper-cased
/// as-is.
#[derive(Debug, Default, Clone)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn variable_for(name: &str) -> String {
        if name == API_KEY_TOKEN {
            "WAKATIME_API_KEY".to_string()
        } else {
            name.to_uppercase()
        }
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get_token(&self, name: &str) -> Option<String> {
        std::env::var(Self::variable_for(name))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// In-memory tokens, e.g. from a command-line flag.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(name: impl Into<String>, token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(name, token);
        store
    }

    pub fn set_token(&self, name: impl Into<String>, token: impl Into<String>) {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert(name.into(), token.into());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_token(&self, name: &str) -> Option<String> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        tokens.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryCredentialStore::with_token(API_KEY_TOKEN, "waka_abc");
        assert_eq!(store.get_token(API_KEY_TOKEN).as_deref(), Some("waka_abc"));
        assert_eq!(store.get_token("Other"), None);

        store.set_token(API_KEY_TOKEN, "waka_def");
        assert_eq!(store.get_token(API_KEY_TOKEN).as_deref(), Some("waka_def"));
    }

    #[test]
    fn test_env_variable_names() {
        assert_eq!(EnvCredentialStore::variable_for(API_KEY_TOKEN), "WAKATIME_API_KEY");
        assert_eq!(EnvCredentialStore::variable_for("proxy_token"), "PROXY_TOKEN");
    }
}
