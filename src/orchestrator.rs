//! Profile lifecycle workflows.
//!
//! The orchestrator is the only layer callers drive directly. It sequences
//! the account store, the SSH config engine, and the Git binder into
//! add/remove/switch/clone/workspace flows. Steps run strictly in order
//! and there is no compensating rollback: if a later step fails, earlier
//! side effects stay on disk. That risk is documented, not papered over.

use std::path::{Path, PathBuf};

use crate::account::{
    Account, KeyType, Provider, Scope, validate_email, validate_name,
};
use crate::errors::{Error, Result};
use crate::exec::CommandRunner;
use crate::gitcfg::GitIdentityBinder;
use crate::paths::Paths;
use crate::ssh::SshConfigEngine;
use crate::store::{AccountStore, NewAccount};
use crate::ui::Ui;

/// Everything needed to provision a new profile
#[derive(Debug, Clone)]
pub struct AddProfileRequest {
    pub name: String,
    pub git_username: String,
    pub git_email: String,
    pub provider: Provider,
    pub custom_host: Option<String>,
    pub key_type: KeyType,
    pub passphrase: String,
    pub signing_key: Option<String>,
    pub is_default: bool,
    pub workspace_dir: Option<PathBuf>,
}

pub struct ProfileOrchestrator<'a> {
    paths: &'a Paths,
    runner: &'a dyn CommandRunner,
    ui: &'a Ui,
}

impl<'a> ProfileOrchestrator<'a> {
    pub fn new(paths: &'a Paths, runner: &'a dyn CommandRunner, ui: &'a Ui) -> Self {
        Self { paths, runner, ui }
    }

    fn load_store(&self) -> Result<AccountStore> {
        AccountStore::load(&self.paths.store_file, self.ui)
    }

    fn ssh(&self) -> SshConfigEngine<'a> {
        SshConfigEngine::new(self.paths, self.runner, self.ui)
    }

    fn binder(&self) -> GitIdentityBinder<'a> {
        GitIdentityBinder::new(self.runner, self.ui)
    }

    /// Provision a profile: key -> SSH config block -> store record ->
    /// agent registration -> optional workspace binding.
    pub fn add_profile(&self, req: AddProfileRequest) -> Result<Account> {
        // Reject bad input before any key material lands on disk
        validate_name(&req.name)?;
        validate_email(&req.git_email)?;

        let mut store = self.load_store()?;
        if store.get(&req.name).is_some() {
            return Err(Error::Duplicate(req.name));
        }

        let ssh = self.ssh();

        let (private_key, _public_key) =
            ssh.generate_key(&req.name, &req.git_email, req.key_type, &req.passphrase)?;

        let host_alias =
            ssh.add_config_entry(&req.name, req.provider, req.custom_host.as_deref())?;

        let account = store.add(NewAccount {
            name: req.name.clone(),
            git_username: req.git_username,
            git_email: req.git_email,
            provider: req.provider,
            host_alias,
            ssh_key_path: private_key.to_string_lossy().into_owned(),
            signing_key: req.signing_key,
            custom_host: req.custom_host,
            is_default: req.is_default,
        })?;
        self.ui
            .ok(format!("Account '{}' added successfully", account.name));

        ssh.add_key_to_agent(&req.name);

        if let Some(workspace) = &req.workspace_dir {
            self.binder().conditional_include(workspace, &account)?;
        }

        Ok(account)
    }

    /// Tear down a profile. The caller is responsible for having confirmed
    /// with the user. Partial failure does not restore earlier deletions.
    pub fn remove_profile(&self, name: &str, delete_keys: bool) -> Result<()> {
        let mut store = self.load_store()?;
        let account = store
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("account '{}' not found", name)))?;

        let ssh = self.ssh();
        ssh.remove_config_entry(&account.host_alias)?;

        if delete_keys {
            ssh.remove_keys(name)?;
        }

        store.remove(name)?;
        self.ui.ok(format!("Account '{}' removed", name));
        Ok(())
    }

    /// Apply a profile's identity.
    ///
    /// Global scope also promotes the account to the store default; local
    /// scope only rewrites the target repository and never touches the
    /// default flag.
    pub fn switch_profile(
        &self,
        name: &str,
        scope: Scope,
        repo_path: Option<&Path>,
    ) -> Result<Account> {
        let mut store = self.load_store()?;
        let account = store
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("account '{}' not found", name)))?;

        match scope {
            Scope::Global => {
                self.binder().apply_global(&account)?;
                store.set_default(name)?;
                self.ui.ok(format!("Default account set to '{}'", name));
            }
            Scope::Local => {
                self.binder().apply_local(&account, repo_path)?;
            }
        }

        Ok(account)
    }

    /// All accounts, name order.
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.load_store()?.list().into_iter().cloned().collect())
    }

    pub fn default_account(&self) -> Result<Option<Account>> {
        Ok(self.load_store()?.get_default().cloned())
    }

    pub fn get_account(&self, name: &str) -> Result<Account> {
        self.load_store()?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("account '{}' not found", name)))
    }

    /// Clone a repository through the profile's SSH alias.
    pub fn clone_repo(&self, name: &str, url: &str, destination: Option<&str>) -> Result<PathBuf> {
        let account = self.get_account(name)?;
        self.binder().clone_with_account(&account, url, destination)
    }

    /// Bind a workspace directory to the profile via conditional include.
    pub fn setup_workspace(&self, name: &str, directory: &Path) -> Result<PathBuf> {
        let account = self.get_account(name)?;
        self.binder().conditional_include(directory, &account)
    }

    /// Probe SSH authentication for the profile's alias.
    pub fn test_connection(&self, name: &str) -> Result<bool> {
        let account = self.get_account(name)?;
        self.ssh().test_connection(&account.host_alias)
    }

    /// Public key contents for the profile, if a key exists.
    pub fn public_key(&self, name: &str) -> Result<Option<String>> {
        self.ssh().public_key(name)
    }

    /// Effective Git identity plus the active mgit profile.
    pub fn show_current(&self, repo_path: Option<&Path>) -> Result<()> {
        self.binder().show_current_config(repo_path)?;

        if let Some(default) = self.default_account()? {
            self.ui.newline();
            self.ui
                .println(format!("{} {}", self.ui.bold("Active mgit profile:"), default.name));
        }
        Ok(())
    }
}
