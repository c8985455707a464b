use anyhow::{bail, Result};
use std::collections::HashMap;

/// Bidirectional access-key table built from `role:key` configuration
/// entries.
///
/// Both directions are plain maps filled in the same pass, so resolving a
/// key to its role (authorization) and a role back to its key (cookie
/// re-issue) are both O(1).
#[derive(Debug, Clone, Default)]
pub struct AccessKeyTable {
    key_to_role: HashMap<String, String>,
    role_to_key: HashMap<String, String>,
}

impl AccessKeyTable {
    /// Parse a list of `role:key` entries.
    ///
    /// The role is everything before the first colon, the key everything
    /// after it; both must be non-empty. Duplicate roles or keys are
    /// last-writer-wins.
    pub fn parse(entries: &[String]) -> Result<Self> {
        let mut key_to_role = HashMap::with_capacity(entries.len());
        let mut role_to_key = HashMap::with_capacity(entries.len());

        for entry in entries {
            let Some((role, key)) = entry.split_once(':') else {
                bail!("badly formed access key entry {entry:?}: expected 'role:key'");
            };
            if role.is_empty() || key.is_empty() {
                bail!("badly formed access key entry {entry:?}: role and key must be non-empty");
            }

            key_to_role.insert(key.to_string(), role.to_string());
            role_to_key.insert(role.to_string(), key.to_string());
        }

        Ok(Self {
            key_to_role,
            role_to_key,
        })
    }

    /// Resolve an access key to its configured role.
    pub fn role_for_key(&self, key: &str) -> Option<&str> {
        self.key_to_role.get(key).map(String::as_str)
    }

    /// Resolve a role back to its configured access key.
    pub fn key_for_role(&self, role: &str) -> Option<&str> {
        self.role_to_key.get(role).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_role.is_empty()
    }
}
