//! The persistent account store.
//!
//! Accounts live in a single versioned JSON document at `~/.mgit/config.json`:
//! `{"version": "1.0", "accounts": {name -> record}}`. The whole document is
//! rewritten (atomically, via temp file + rename) after every mutation.
//! There is deliberately no file locking: concurrent invocations race and
//! the later writer wins.
//!
//! A malformed document does not abort the tool — it is reported as a
//! warning and the store starts empty in memory. The next mutation rewrites
//! the file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::account::{
    Account, AccountUpdate, Provider, validate_email, validate_name,
};
use crate::errors::{Error, Result};
use crate::ui::Ui;

const STORE_VERSION: &str = "1.0";

/// On-disk shape of the store
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: String,
    accounts: BTreeMap<String, Account>,
}

/// Attributes for a new account record
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub git_username: String,
    pub git_email: String,
    pub provider: Provider,
    pub host_alias: String,
    pub ssh_key_path: String,
    pub signing_key: Option<String>,
    pub custom_host: Option<String>,
    pub is_default: bool,
}

/// CRUD over named account records, keyed by name (iteration is name order)
pub struct AccountStore {
    path: PathBuf,
    accounts: BTreeMap<String, Account>,
}

impl AccountStore {
    /// Load the store from disk.
    ///
    /// A missing file is an empty store. A file that fails to parse is
    /// reported through `ui` and also yields an empty store — the previous
    /// contents are lost on the next save.
    pub fn load(path: &Path, ui: &Ui) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                accounts: BTreeMap::new(),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read store file {:?}", path), e))?;

        let accounts = match serde_json::from_str::<StoreDocument>(&content) {
            Ok(doc) => doc.accounts,
            Err(e) => {
                ui.warn(format!(
                    "Account store {:?} is corrupt ({}); starting with an empty store",
                    path, e
                ));
                BTreeMap::new()
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            accounts,
        })
    }

    /// Validate, insert, and persist a new account.
    ///
    /// The first account in an empty store always becomes the default,
    /// regardless of what the caller asked for. Adding a new default clears
    /// the flag on every existing record.
    pub fn add(&mut self, new: NewAccount) -> Result<Account> {
        validate_name(&new.name)?;
        validate_email(&new.git_email)?;

        if self.accounts.contains_key(&new.name) {
            return Err(Error::Duplicate(new.name));
        }

        let is_default = new.is_default || self.accounts.is_empty();
        if is_default {
            for acct in self.accounts.values_mut() {
                acct.is_default = false;
            }
        }

        let account = Account {
            name: new.name.clone(),
            git_username: new.git_username,
            git_email: new.git_email,
            provider: new.provider,
            host_alias: new.host_alias,
            ssh_key_path: new.ssh_key_path,
            signing_key: new.signing_key,
            custom_host: new.custom_host,
            is_default,
        };
        self.accounts.insert(new.name, account.clone());
        self.save()?;
        Ok(account)
    }

    /// Delete a record. Does not elect a new default.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        if self.accounts.remove(name).is_none() {
            return Err(Error::NotFound(format!("account '{}' not found", name)));
        }
        self.save()
    }

    pub fn get(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    /// The flagged default, else the first record in name order, else none.
    pub fn get_default(&self) -> Option<&Account> {
        self.accounts
            .values()
            .find(|a| a.is_default)
            .or_else(|| self.accounts.values().next())
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.accounts.contains_key(name) {
            return Err(Error::NotFound(format!("account '{}' not found", name)));
        }
        for acct in self.accounts.values_mut() {
            acct.is_default = acct.name == name;
        }
        self.save()
    }

    /// Merge the supplied fields into an existing record.
    pub fn update(&mut self, name: &str, update: AccountUpdate) -> Result<Account> {
        let Some(account) = self.accounts.get_mut(name) else {
            return Err(Error::NotFound(format!("account '{}' not found", name)));
        };

        if let Some(email) = &update.git_email {
            validate_email(email)?;
        }

        if let Some(username) = update.git_username {
            account.git_username = username;
        }
        if let Some(email) = update.git_email {
            account.git_email = email;
        }
        if let Some(signing_key) = update.signing_key {
            account.signing_key = Some(signing_key);
        }

        let updated = account.clone();
        self.save()?;
        Ok(updated)
    }

    /// All accounts in name order
    pub fn list(&self) -> Vec<&Account> {
        self.accounts.values().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Rewrite the whole document: serialize, write to a temp file, rename.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("failed to create store directory {:?}", parent), e)
            })?;
        }

        let doc = StoreDocument {
            version: STORE_VERSION.to_string(),
            accounts: self.accounts.clone(),
        };
        let content = serde_json::to_string_pretty(&doc)
            .map_err(|e| Error::Parse(format!("failed to serialize store: {}", e)))?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)
            .map_err(|e| Error::io(format!("failed to write {:?}", temp_path), e))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| Error::io(format!("failed to rename into {:?}", self.path), e))
    }
}
