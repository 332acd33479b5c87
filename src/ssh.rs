//! SSH key and client-config management.
//!
//! Each account owns one keypair (`~/.ssh/id_<type>_<name>`) and one
//! marker-delimited block in `~/.ssh/config`:
//!
//! ```text
//! # mgit-managed: <alias>
//! Host <alias>
//!     HostName <host>
//!     User git
//!     IdentityFile <key_path>
//!     IdentitiesOnly yes
//! # end-mgit: <alias>
//! ```
//!
//! The engine never touches anything outside its own marker pairs. Blocks
//! are replaced in place when re-added and the whole file is rewritten with
//! owner-only permissions.

use std::path::PathBuf;

use crate::account::{KeyType, Provider};
use crate::errors::{Error, Result};
use crate::exec::{CommandRunner, run_checked};
use crate::paths::Paths;
use crate::ui::Ui;

/// Key types probed when locating an existing key, in priority order.
/// ecdsa keys are recognized even though mgit no longer generates them.
const KEY_TYPE_PRIORITY: [&str; 3] = ["ed25519", "rsa", "ecdsa"];

/// One managed key found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedKey {
    pub account: String,
    pub key_type: String,
    pub path: PathBuf,
    pub public_key_path: PathBuf,
}

/// Manages SSH keys and the managed blocks of the SSH client config
pub struct SshConfigEngine<'a> {
    paths: &'a Paths,
    runner: &'a dyn CommandRunner,
    ui: &'a Ui,
}

fn begin_marker(alias: &str) -> String {
    format!("# mgit-managed: {}", alias)
}

fn end_marker(alias: &str) -> String {
    format!("# end-mgit: {}", alias)
}

/// Resolve the real SSH host for a provider. `custom` requires a host.
pub fn host_for(provider: Provider, custom_host: Option<&str>) -> Result<String> {
    match provider.canonical_host() {
        Some(host) => Ok(host.to_string()),
        None => custom_host
            .map(str::to_string)
            .ok_or_else(|| Error::Validation("custom_host is required when provider is 'custom'".into())),
    }
}

/// Derive the SSH `Host` nickname: `<host>-<account_name>`
pub fn derive_host_alias(
    provider: Provider,
    custom_host: Option<&str>,
    account_name: &str,
) -> Result<String> {
    Ok(format!("{}-{}", host_for(provider, custom_host)?, account_name))
}

impl<'a> SshConfigEngine<'a> {
    pub fn new(paths: &'a Paths, runner: &'a dyn CommandRunner, ui: &'a Ui) -> Self {
        Self { paths, runner, ui }
    }

    // -------------------------------------------------------------------------
    // Keys
    // -------------------------------------------------------------------------

    /// Generate a keypair for the account, returning (private, public) paths.
    ///
    /// Idempotent by file presence: an existing private key short-circuits
    /// without touching disk or running ssh-keygen.
    pub fn generate_key(
        &self,
        account_name: &str,
        email: &str,
        key_type: KeyType,
        passphrase: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        let private = self.paths.private_key(key_type.as_str(), account_name);
        let public = self.paths.public_key(key_type.as_str(), account_name);

        if private.exists() {
            self.ui.warn(format!(
                "SSH key already exists for account '{}', skipping generation",
                account_name
            ));
            return Ok((private, public));
        }

        let key_file = private.to_string_lossy().into_owned();
        let mut args: Vec<&str> = vec![
            "-t",
            key_type.as_str(),
            "-C",
            email,
            "-f",
            key_file.as_str(),
            "-N",
            passphrase,
        ];
        // ed25519 has a fixed size; rsa needs an explicit one
        if key_type == KeyType::Rsa {
            args.extend(["-b", "4096"]);
        }

        run_checked(self.runner, "ssh-keygen", &args, None)?;
        self.ui.ok(format!("SSH key generated: {}", private.display()));
        Ok((private, public))
    }

    /// Locate the private key for an account, trying types in priority order.
    pub fn find_key(&self, account_name: &str) -> Option<PathBuf> {
        KEY_TYPE_PRIORITY
            .iter()
            .map(|t| self.paths.private_key(t, account_name))
            .find(|p| p.exists())
    }

    /// Delete every key file (private and public) owned by the account.
    /// Missing files are skipped silently.
    pub fn remove_keys(&self, account_name: &str) -> Result<()> {
        for key_type in KEY_TYPE_PRIORITY {
            for path in [
                self.paths.private_key(key_type, account_name),
                self.paths.public_key(key_type, account_name),
            ] {
                if path.exists() {
                    std::fs::remove_file(&path)
                        .map_err(|e| Error::io(format!("failed to delete {:?}", path), e))?;
                    self.ui.ok(format!("Deleted: {}", path.display()));
                }
            }
        }
        Ok(())
    }

    /// Trimmed contents of the account's public key, if any exists.
    pub fn public_key(&self, account_name: &str) -> Result<Option<String>> {
        for key_type in KEY_TYPE_PRIORITY {
            let path = self.paths.public_key(key_type, account_name);
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::io(format!("failed to read {:?}", path), e))?;
                return Ok(Some(content.trim().to_string()));
            }
        }
        Ok(None)
    }

    /// Register the account's private key with the running ssh-agent.
    /// Failure is reported through the sink, never fatal.
    pub fn add_key_to_agent(&self, account_name: &str) {
        let Some(key) = self.find_key(account_name) else {
            self.ui
                .warn(format!("No SSH key found for account '{}'", account_name));
            return;
        };

        let key_arg = key.to_string_lossy().into_owned();
        match self.runner.run("ssh-add", &[key_arg.as_str()], None) {
            Ok(out) if out.success() => {
                self.ui.ok(format!("Key added to ssh-agent: {}", key.display()));
            }
            Ok(out) => {
                self.ui.warn(format!(
                    "ssh-add failed (exit {}): {}",
                    out.exit_code,
                    out.stderr.trim()
                ));
            }
            Err(e) => self.ui.warn(format!("Could not reach ssh-agent: {}", e)),
        }
    }

    /// Enumerate keys in the SSH directory matching `id_<type>_<account>`.
    /// Filenames that do not decode into three parts are skipped.
    pub fn list_keys(&self) -> Result<Vec<ManagedKey>> {
        let mut keys = Vec::new();
        if !self.paths.ssh_dir.exists() {
            return Ok(keys);
        }

        let entries = std::fs::read_dir(&self.paths.ssh_dir)
            .map_err(|e| Error::io(format!("failed to read {:?}", self.paths.ssh_dir), e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with("id_") || name.ends_with(".pub") || !path.is_file() {
                continue;
            }

            let mut parts = name.splitn(3, '_');
            let (Some("id"), Some(key_type), Some(account)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };

            keys.push(ManagedKey {
                account: account.to_string(),
                key_type: key_type.to_string(),
                public_key_path: path.with_file_name(format!("{}.pub", name)),
                path,
            });
        }

        keys.sort_by(|a, b| a.account.cmp(&b.account).then(a.key_type.cmp(&b.key_type)));
        Ok(keys)
    }

    // -------------------------------------------------------------------------
    // Config blocks
    // -------------------------------------------------------------------------

    /// Add (or replace in place) the managed config block for the account.
    /// Returns the host alias written to the config.
    ///
    /// The key must already exist on disk — `generate_key` comes first.
    pub fn add_config_entry(
        &self,
        account_name: &str,
        provider: Provider,
        custom_host: Option<&str>,
    ) -> Result<String> {
        let host = host_for(provider, custom_host)?;
        let alias = format!("{}-{}", host, account_name);

        let key_path = self.find_key(account_name).ok_or_else(|| {
            Error::NotFound(format!(
                "no SSH key found for account '{}'; generate one first",
                account_name
            ))
        })?;

        let block = render_block(&alias, &host, &key_path.to_string_lossy());
        let existing = self.read_config()?;

        let (updated, replaced) = edit_blocks(&existing, &alias, Some(&block))?;
        let content = if replaced {
            updated
        } else if existing.trim().is_empty() {
            format!("{}\n", block)
        } else {
            format!("{}\n\n{}\n", existing.trim_end_matches('\n'), block)
        };

        self.write_config(&content)?;
        self.ui
            .ok(format!("SSH config entry added for host alias: {}", alias));
        Ok(alias)
    }

    /// Remove the managed block for the alias. A missing block is a warning,
    /// not an error.
    pub fn remove_config_entry(&self, host_alias: &str) -> Result<()> {
        let existing = self.read_config()?;
        if !existing.contains(&begin_marker(host_alias)) {
            self.ui
                .warn(format!("No SSH config entry found for '{}'", host_alias));
            return Ok(());
        }

        let (updated, _) = edit_blocks(&existing, host_alias, None)?;
        self.write_config(&updated)?;
        self.ui
            .ok(format!("SSH config entry removed for: {}", host_alias));
        Ok(())
    }

    /// Probe SSH authentication against the alias.
    ///
    /// Hosting providers answer an auth-only probe with a non-zero exit, so
    /// success is exit 0 OR an authentication-success phrase in the output.
    pub fn test_connection(&self, host_alias: &str) -> Result<bool> {
        let target = format!("git@{}", host_alias);
        let out = self.runner.run("ssh", &["-T", target.as_str()], None)?;

        Ok(out.success()
            || out
                .combined()
                .to_lowercase()
                .contains("successfully authenticated"))
    }

    fn read_config(&self) -> Result<String> {
        if !self.paths.ssh_config.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&self.paths.ssh_config)
            .map_err(|e| Error::io(format!("failed to read {:?}", self.paths.ssh_config), e))
    }

    /// Rewrite the whole config with owner-only permissions.
    fn write_config(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.paths.ssh_config.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("failed to create {:?}", parent), e))?;
        }
        std::fs::write(&self.paths.ssh_config, content)
            .map_err(|e| Error::io(format!("failed to write {:?}", self.paths.ssh_config), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.paths.ssh_config,
                std::fs::Permissions::from_mode(0o600),
            )
            .map_err(|e| {
                Error::io(
                    format!("failed to set permissions on {:?}", self.paths.ssh_config),
                    e,
                )
            })?;
        }

        Ok(())
    }
}

fn render_block(alias: &str, hostname: &str, identity_file: &str) -> String {
    [
        begin_marker(alias),
        format!("Host {}", alias),
        format!("    HostName {}", hostname),
        "    User git".to_string(),
        format!("    IdentityFile {}", identity_file),
        "    IdentitiesOnly yes".to_string(),
        end_marker(alias),
    ]
    .join("\n")
}

#[derive(Debug, PartialEq, Eq)]
enum ScanState {
    Outside,
    Inside,
}

/// Two-state line scanner over the config text.
///
/// Lines between the alias's begin/end markers (inclusive) are dropped.
/// With `replacement`, the new block is emitted at the position of the end
/// marker, keeping the block where it was. Returns the edited text and
/// whether the block was found. An unterminated block is a parse error.
fn edit_blocks(contents: &str, alias: &str, replacement: Option<&str>) -> Result<(String, bool)> {
    let begin = begin_marker(alias);
    let end = end_marker(alias);

    let mut state = ScanState::Outside;
    let mut found = false;
    let mut result: Vec<&str> = Vec::new();

    for line in contents.split('\n') {
        match state {
            ScanState::Outside => {
                if line.trim() == begin {
                    state = ScanState::Inside;
                    found = true;
                } else {
                    result.push(line);
                }
            }
            ScanState::Inside => {
                if line.trim() == end {
                    state = ScanState::Outside;
                    if let Some(block) = replacement {
                        result.push(block);
                    }
                }
            }
        }
    }

    if state == ScanState::Inside {
        return Err(Error::Parse(format!(
            "unterminated managed block for '{}' in SSH config",
            alias
        )));
    }

    Ok((result.join("\n"), found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeRunner, setup_test_paths, test_ui};
    use tempfile::TempDir;

    fn touch_key(paths: &Paths, key_type: &str, account: &str) {
        std::fs::create_dir_all(&paths.ssh_dir).unwrap();
        std::fs::write(paths.private_key(key_type, account), "PRIVATE").unwrap();
        std::fs::write(paths.public_key(key_type, account), "ssh-ed25519 AAAA test\n").unwrap();
    }

    #[test]
    fn test_host_alias_derivation() {
        assert_eq!(
            derive_host_alias(Provider::Github, None, "alice").unwrap(),
            "github.com-alice"
        );
        assert_eq!(
            derive_host_alias(Provider::Custom, Some("git.example.com"), "work").unwrap(),
            "git.example.com-work"
        );
        assert!(matches!(
            derive_host_alias(Provider::Custom, None, "work"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_generate_key_skips_existing() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "ed25519", "work");

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        let (private, public) = engine
            .generate_key("work", "w@example.com", KeyType::Ed25519, "")
            .unwrap();

        assert!(private.ends_with("id_ed25519_work"));
        assert!(public.ends_with("id_ed25519_work.pub"));
        assert!(runner.calls_for("ssh-keygen").is_empty());
    }

    #[test]
    fn test_generate_rsa_key_invocation() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        std::fs::create_dir_all(&paths.ssh_dir).unwrap();
        let ui = test_ui();
        let runner = FakeRunner::new();

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        engine
            .generate_key("work", "w@example.com", KeyType::Rsa, "secret")
            .unwrap();

        let calls = runner.calls_for("ssh-keygen");
        assert_eq!(calls.len(), 1);
        let args = &calls[0];
        assert_eq!(args[0], "-t");
        assert_eq!(args[1], "rsa");
        assert!(args.contains(&"-b".to_string()));
        assert!(args.contains(&"4096".to_string()));
        assert!(args.contains(&"secret".to_string()));
    }

    #[test]
    fn test_add_config_entry_requires_key() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        let err = engine
            .add_config_entry("nokey", Provider::Github, None)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!paths.ssh_config.exists());
    }

    #[test]
    fn test_add_config_entry_appends_block() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "ed25519", "alice");

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        let alias = engine
            .add_config_entry("alice", Provider::Github, None)
            .unwrap();
        assert_eq!(alias, "github.com-alice");

        let config = std::fs::read_to_string(&paths.ssh_config).unwrap();
        assert!(config.contains("# mgit-managed: github.com-alice"));
        assert!(config.contains("Host github.com-alice"));
        assert!(config.contains("HostName github.com"));
        assert!(config.contains("IdentitiesOnly yes"));
        assert!(config.contains("# end-mgit: github.com-alice"));
    }

    #[test]
    fn test_add_config_entry_replaces_in_place() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "rsa", "alice");
        touch_key(&paths, "ed25519", "bob");

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        engine.add_config_entry("alice", Provider::Github, None).unwrap();
        engine.add_config_entry("bob", Provider::Github, None).unwrap();

        // Re-adding alice with a different (higher-priority) key replaces
        // her block without moving it or duplicating markers
        touch_key(&paths, "ed25519", "alice");
        engine.add_config_entry("alice", Provider::Github, None).unwrap();

        let config = std::fs::read_to_string(&paths.ssh_config).unwrap();
        let alice_markers = config
            .lines()
            .filter(|l| l.trim() == "# mgit-managed: github.com-alice")
            .count();
        assert_eq!(alice_markers, 1);
        assert!(config.contains("id_ed25519_alice"));
        assert!(!config.contains("id_rsa_alice"));

        // alice's block still precedes bob's
        let alice_pos = config.find("# mgit-managed: github.com-alice").unwrap();
        let bob_pos = config.find("# mgit-managed: github.com-bob").unwrap();
        assert!(alice_pos < bob_pos);
    }

    #[test]
    fn test_remove_config_entry_leaves_others_intact() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "ed25519", "alice");
        touch_key(&paths, "ed25519", "bob");

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        engine.add_config_entry("alice", Provider::Github, None).unwrap();
        engine.add_config_entry("bob", Provider::Github, None).unwrap();

        let before = std::fs::read_to_string(&paths.ssh_config).unwrap();
        let bob_block: Vec<&str> = before
            .lines()
            .skip_while(|l| l.trim() != "# mgit-managed: github.com-bob")
            .take_while(|l| l.trim() != "# end-mgit: github.com-bob")
            .collect();

        engine.remove_config_entry("github.com-alice").unwrap();

        let after = std::fs::read_to_string(&paths.ssh_config).unwrap();
        assert!(!after.contains("github.com-alice"));
        for line in bob_block {
            assert!(after.contains(line));
        }
    }

    #[test]
    fn test_remove_missing_entry_is_noop() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        assert!(engine.remove_config_entry("github.com-ghost").is_ok());
    }

    #[test]
    fn test_unterminated_block_is_parse_error() {
        let contents = "# mgit-managed: github.com-x\nHost github.com-x\n";
        let err = edit_blocks(contents, "github.com-x", None).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_scanner_ignores_foreign_content() {
        let contents = "Host other\n    HostName other.com\n";
        let (out, found) = edit_blocks(contents, "github.com-x", None).unwrap();
        assert_eq!(out, contents);
        assert!(!found);
    }

    #[cfg(unix)]
    #[test]
    fn test_config_permissions_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "ed25519", "alice");

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        engine.add_config_entry("alice", Provider::Github, None).unwrap();

        let mode = std::fs::metadata(&paths.ssh_config).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_public_key_priority_order() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        std::fs::create_dir_all(&paths.ssh_dir).unwrap();
        std::fs::write(paths.public_key("rsa", "work"), "ssh-rsa BBBB\n").unwrap();
        std::fs::write(paths.public_key("ed25519", "work"), "ssh-ed25519 AAAA\n").unwrap();

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        assert_eq!(
            engine.public_key("work").unwrap().as_deref(),
            Some("ssh-ed25519 AAAA")
        );
        assert_eq!(engine.public_key("absent").unwrap(), None);
    }

    #[test]
    fn test_list_keys_decodes_filenames() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "ed25519", "alice");
        touch_key(&paths, "rsa", "work-acct");
        // Not a managed key name
        std::fs::write(paths.ssh_dir.join("id_ed25519"), "x").unwrap();
        std::fs::write(paths.ssh_dir.join("known_hosts"), "x").unwrap();

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        let keys = engine.list_keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].account, "alice");
        assert_eq!(keys[0].key_type, "ed25519");
        assert_eq!(keys[1].account, "work-acct");
        assert!(keys[1].public_key_path.ends_with("id_rsa_work-acct.pub"));
    }

    #[test]
    fn test_connection_probe_semantics() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();

        // Non-zero exit but the provider's success banner
        let runner = FakeRunner::new();
        runner.on("ssh", |_| crate::exec::Output {
            exit_code: 1,
            stdout: String::new(),
            stderr: "Hi alice! You've successfully authenticated, but ...".to_string(),
        });
        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        assert!(engine.test_connection("github.com-alice").unwrap());

        // Non-zero exit, no banner
        let runner = FakeRunner::new();
        runner.on("ssh", |_| crate::exec::Output {
            exit_code: 255,
            stdout: String::new(),
            stderr: "Permission denied (publickey).".to_string(),
        });
        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        assert!(!engine.test_connection("github.com-alice").unwrap());

        // Clean exit
        let runner = FakeRunner::new();
        runner.on("ssh", |_| crate::exec::Output::default());
        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        assert!(engine.test_connection("git.example.com-work").unwrap());
    }

    #[test]
    fn test_remove_keys_deletes_all_types() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        touch_key(&paths, "ed25519", "work");
        touch_key(&paths, "rsa", "work");
        touch_key(&paths, "ed25519", "other");

        let engine = SshConfigEngine::new(&paths, &runner, &ui);
        engine.remove_keys("work").unwrap();

        assert!(!paths.private_key("ed25519", "work").exists());
        assert!(!paths.public_key("rsa", "work").exists());
        assert!(paths.private_key("ed25519", "other").exists());
    }
}
