//! The account data model.
//!
//! An account is one Git identity: a name, a Git user, a hosting provider,
//! and the SSH key / host alias that routes traffic for it. Validation here
//! covers everything the store refuses to persist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// Git hosting providers with a well-known SSH host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Bitbucket,
    Custom,
}

impl Provider {
    /// Canonical SSH host for the provider. `Custom` has none and needs a
    /// caller-supplied host.
    pub fn canonical_host(&self) -> Option<&'static str> {
        match self {
            Provider::Github => Some("github.com"),
            Provider::Gitlab => Some("gitlab.com"),
            Provider::Bitbucket => Some("bitbucket.org"),
            Provider::Custom => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Bitbucket => "bitbucket",
            Provider::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Provider::Github),
            "gitlab" => Ok(Provider::Gitlab),
            "bitbucket" => Ok(Provider::Bitbucket),
            "custom" => Ok(Provider::Custom),
            _ => Err(format!(
                "unknown provider '{}' (expected github, gitlab, bitbucket, or custom)",
                s
            )),
        }
    }
}

/// SSH key types mgit will generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
    Rsa,
}

impl KeyType {
    /// Filename component, e.g. the "ed25519" in `id_ed25519_work`
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Rsa => "rsa",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            "rsa" => Ok(KeyType::Rsa),
            _ => Err(format!("unknown key type '{}' (expected ed25519 or rsa)", s)),
        }
    }
}

/// Whether an identity change targets the machine or a single repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

/// A single Git account profile as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub git_username: String,
    pub git_email: String,
    pub provider: Provider,
    /// SSH `Host` nickname, derived as `<host>-<name>`
    pub host_alias: String,
    /// Absolute path to the private key
    pub ssh_key_path: String,
    pub signing_key: Option<String>,
    /// Required iff provider is custom
    pub custom_host: Option<String>,
    pub is_default: bool,
}

/// Explicit partial update for an account.
///
/// Only identity fields are patchable. The name is the primary key,
/// provider/host_alias/ssh_key_path are bound to on-disk artifacts, and the
/// default flag has its own operation.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub git_username: Option<String>,
    pub git_email: Option<String>,
    pub signing_key: Option<String>,
}

/// Validate a profile name: alphanumerics, hyphens, underscores.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("account name cannot be empty".into()));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Validation(format!(
            "invalid account name '{}': only alphanumerics, hyphens (-), and underscores (_) are allowed",
            name
        )));
    }

    Ok(())
}

/// Basic email well-formedness: one '@', non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || Error::Validation(format!("invalid email address: {}", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;

    if local.is_empty() || domain.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    if domain.contains('@') {
        return Err(invalid());
    }

    // Domain needs at least one dot with a non-empty label on each side
    match domain.rsplit_once('.') {
        Some((head, tld)) if !head.is_empty() && tld.len() >= 2 => Ok(()),
        _ => Err(invalid()),
    }
}
