//! Node-level engine configuration.
//!
//! Loading this from disk or environment is the enclosing process's job;
//! the engine only consumes the resolved values.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for one directory node's password engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Root directory for credential and account-state files.
    pub credential_root: PathBuf,

    /// Hash algorithms computed for records without their own allow-list,
    /// as `HASHLIST` tokens.
    pub default_hash_list: Vec<String>,

    /// Whether LAN Manager hashes may be generated at all.
    ///
    /// Off by default; when off, LM is suppressed regardless of any
    /// per-record allow-list.
    pub lan_manager_enabled: bool,

    /// Minimum backoff applied by the failure throttle, in seconds.
    pub min_failure_delay_secs: u64,

    /// How long a resolved realm name may be reused before re-resolving,
    /// in seconds.
    pub realm_cache_ttl_secs: u64,

    /// Node-global default policy text, merged under record policy.
    pub global_policy: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            credential_root: PathBuf::from("/var/db/dirnode/credentials"),
            default_hash_list: vec![
                "SMB-NT".to_string(),
                "SALTED-SHA1".to_string(),
                "SECURE".to_string(),
                "CRAM-MD5".to_string(),
            ],
            lan_manager_enabled: false,
            min_failure_delay_secs: 2,
            realm_cache_ttl_secs: 300,
            global_policy: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_lan_manager() {
        let config = NodeConfig::default();
        assert!(!config.lan_manager_enabled);
        assert!(config.default_hash_list.contains(&"SMB-NT".to_string()));
        assert!(!config
            .default_hash_list
            .contains(&"SMB-LAN-MANAGER".to_string()));
    }

    #[test]
    fn round_trips_through_serde() {
        let config = NodeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.min_failure_delay_secs, config.min_failure_delay_secs);
        assert_eq!(back.credential_root, config.credential_root);
    }
}
