//! Applies account identities to Git configuration.
//!
//! Global and per-repository `user.*` settings, directory-scoped
//! conditional includes, clone-URL rewriting to the account's SSH alias,
//! and the clone-then-bind flow. Everything shells out to `git` through
//! the [`CommandRunner`] seam; the provider→host mapping is the only thing
//! borrowed from the SSH layer.

use std::path::{Path, PathBuf};

use crate::account::Account;
use crate::errors::{Error, Result};
use crate::exec::{CommandRunner, run_checked};
use crate::ssh::host_for;
use crate::ui::Ui;

pub struct GitIdentityBinder<'a> {
    runner: &'a dyn CommandRunner,
    ui: &'a Ui,
}

impl<'a> GitIdentityBinder<'a> {
    pub fn new(runner: &'a dyn CommandRunner, ui: &'a Ui) -> Self {
        Self { runner, ui }
    }

    /// Apply the account's identity to the global Git config.
    pub fn apply_global(&self, account: &Account) -> Result<()> {
        self.git_config(None, "user.name", &account.git_username)?;
        self.git_config(None, "user.email", &account.git_email)?;

        if let Some(signing_key) = &account.signing_key {
            self.git_config(None, "user.signingkey", signing_key)?;
            self.git_config(None, "commit.gpgsign", "true")?;
        }

        self.ui.ok(format!(
            "Global Git config set to: {} <{}>",
            account.git_username, account.git_email
        ));
        Ok(())
    }

    /// Apply the account's identity to one repository's config.
    pub fn apply_local(&self, account: &Account, repo_path: Option<&Path>) -> Result<()> {
        let cwd = self.resolve_cwd(repo_path)?;
        if !self.is_git_repo(&cwd) {
            return Err(Error::RepositoryState(cwd));
        }

        self.git_config(Some(&cwd), "user.name", &account.git_username)?;
        self.git_config(Some(&cwd), "user.email", &account.git_email)?;

        if let Some(signing_key) = &account.signing_key {
            self.git_config(Some(&cwd), "user.signingkey", signing_key)?;
            self.git_config(Some(&cwd), "commit.gpgsign", "true")?;
        }

        self.ui.ok(format!(
            "Local Git config for '{}' set to: {} <{}>",
            cwd.display(),
            account.git_username,
            account.git_email
        ));
        Ok(())
    }

    /// Bind every repository under `directory` to the account.
    ///
    /// Writes `<directory>/.gitconfig` with the identity and an SSH command
    /// pinned to the account's key, then registers a global
    /// `includeIf.gitdir:<directory>/` rule pointing at it. Git requires
    /// the trailing separator on the pattern. Returns the fragment path.
    pub fn conditional_include(&self, directory: &Path, account: &Account) -> Result<PathBuf> {
        std::fs::create_dir_all(directory)
            .map_err(|e| Error::io(format!("failed to create {:?}", directory), e))?;
        let dir = std::fs::canonicalize(directory)
            .map_err(|e| Error::io(format!("failed to resolve {:?}", directory), e))?;

        let mut content = format!(
            "[user]\n    name = {}\n    email = {}\n",
            account.git_username, account.git_email
        );
        if let Some(signing_key) = &account.signing_key {
            content.push_str(&format!("    signingkey = {}\n", signing_key));
            content.push_str("[commit]\n    gpgsign = true\n");
        }
        content.push_str(&format!(
            "[core]\n    sshCommand = ssh -i {} -o IdentitiesOnly=yes\n",
            account.ssh_key_path
        ));

        let fragment = dir.join(".gitconfig");
        std::fs::write(&fragment, content)
            .map_err(|e| Error::io(format!("failed to write {:?}", fragment), e))?;
        self.ui
            .ok(format!("Created directory gitconfig: {}", fragment.display()));

        let mut pattern = dir.to_string_lossy().into_owned();
        if !pattern.ends_with('/') {
            pattern.push('/');
        }
        self.git_config(
            None,
            &format!("includeIf.gitdir:{}.path", pattern),
            &fragment.to_string_lossy(),
        )?;

        self.ui.ok(format!(
            "Conditional include added: repos under '{}' use {} <{}>",
            dir.display(),
            account.git_username,
            account.git_email
        ));
        Ok(fragment)
    }

    /// Register a global URL rewrite so remotes pointing at the provider's
    /// real host transparently route through the account's alias.
    /// An unresolvable host is reported, not raised.
    pub fn url_rewrite(&self, account: &Account) -> Result<()> {
        let host = match host_for(account.provider, account.custom_host.as_deref()) {
            Ok(host) => host,
            Err(e) => {
                self.ui
                    .err(format!("Cannot determine host for URL rewrite: {}", e));
                return Ok(());
            }
        };

        self.git_config(
            None,
            &format!("url.git@{}:.insteadOf", account.host_alias),
            &format!("git@{}:", host),
        )?;
        self.ui.ok(format!(
            "URL rewrite: git@{}: -> git@{}:",
            host, account.host_alias
        ));
        Ok(())
    }

    /// Clone through the account's alias and bind the local identity.
    ///
    /// Only the literal `git@<host>:` prefix is rewritten; the local config
    /// is applied only when the clone itself succeeded. Returns the cloned
    /// directory.
    pub fn clone_with_account(
        &self,
        account: &Account,
        url: &str,
        destination: Option<&str>,
    ) -> Result<PathBuf> {
        let host = host_for(account.provider, account.custom_host.as_deref())?;
        let rewritten = rewrite_clone_url(url, &host, &account.host_alias);

        self.ui.info(format!(
            "Cloning with account '{}': {}",
            account.name, rewritten
        ));

        let mut args = vec!["clone", rewritten.as_str()];
        if let Some(dest) = destination {
            args.push(dest);
        }
        run_checked(self.runner, "git", &args, None)?;

        let repo_dir = match destination {
            Some(dest) => PathBuf::from(dest),
            None => PathBuf::from(derive_clone_dir(&rewritten)),
        };

        self.apply_local(account, Some(&repo_dir))?;
        Ok(repo_dir)
    }

    /// Print the effective global identity, and the local one when inside
    /// a repository. Read-only.
    pub fn show_current_config(&self, repo_path: Option<&Path>) -> Result<()> {
        let cwd = self.resolve_cwd(repo_path)?;

        self.ui.newline();
        self.ui.section("Global Git Config");
        for key in ["user.name", "user.email"] {
            let value = self
                .read_config(None, key)
                .unwrap_or_else(|| "(not set)".to_string());
            self.ui.println(format!("  {}: {}", key, value));
        }

        if self.is_git_repo(&cwd) {
            self.ui.newline();
            self.ui
                .section(format!("Local Git Config ({})", cwd.display()));
            for key in ["user.name", "user.email"] {
                let value = self
                    .read_config(Some(&cwd), key)
                    .unwrap_or_else(|| "(not set)".to_string());
                self.ui.println(format!("  {}: {}", key, value));
            }
        } else {
            self.ui.newline();
            self.ui.println(
                self.ui
                    .dim(format!("('{}' is not a Git repository)", cwd.display())),
            );
        }

        Ok(())
    }

    /// Whether the path is inside a Git working tree. Any failure to ask
    /// counts as "no".
    pub fn is_git_repo(&self, path: &Path) -> bool {
        self.runner
            .run("git", &["rev-parse", "--is-inside-work-tree"], Some(path))
            .map(|out| out.success())
            .unwrap_or(false)
    }

    fn resolve_cwd(&self, repo_path: Option<&Path>) -> Result<PathBuf> {
        match repo_path {
            Some(p) => Ok(p.to_path_buf()),
            None => std::env::current_dir()
                .map_err(|e| Error::io("failed to determine current directory".to_string(), e)),
        }
    }

    fn git_config(&self, cwd: Option<&Path>, key: &str, value: &str) -> Result<()> {
        let scope = if cwd.is_some() { "--local" } else { "--global" };
        run_checked(self.runner, "git", &["config", scope, key, value], cwd)?;
        Ok(())
    }

    fn read_config(&self, cwd: Option<&Path>, key: &str) -> Option<String> {
        let scope = if cwd.is_some() { "--local" } else { "--global" };
        self.runner
            .run("git", &["config", scope, key], cwd)
            .ok()
            .filter(|out| out.success())
            .map(|out| out.stdout.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Rewrite the literal `git@<host>:` prefix to `git@<alias>:`.
pub fn rewrite_clone_url(url: &str, host: &str, alias: &str) -> String {
    url.replacen(
        &format!("git@{}:", host),
        &format!("git@{}:", alias),
        1,
    )
}

/// Local directory a clone lands in: the URL's trailing path segment with
/// any `.git` suffix stripped.
pub fn derive_clone_dir(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or(url);
    segment.strip_suffix(".git").unwrap_or(segment).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Provider;
    use crate::exec::Output;
    use crate::test_utils::{FakeRunner, test_ui};
    use tempfile::TempDir;

    fn account(signing_key: Option<&str>) -> Account {
        Account {
            name: "work".to_string(),
            git_username: "jdoe".to_string(),
            git_email: "jdoe@corp.com".to_string(),
            provider: Provider::Github,
            host_alias: "github.com-work".to_string(),
            ssh_key_path: "/home/j/.ssh/id_ed25519_work".to_string(),
            signing_key: signing_key.map(str::to_string),
            custom_host: None,
            is_default: false,
        }
    }

    #[test]
    fn test_apply_global_sets_identity() {
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        binder.apply_global(&account(None)).unwrap();

        let calls = runner.calls_for("git");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec!["config", "--global", "user.name", "jdoe"]);
        assert_eq!(
            calls[1],
            vec!["config", "--global", "user.email", "jdoe@corp.com"]
        );
    }

    #[test]
    fn test_apply_global_with_signing_key() {
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        binder.apply_global(&account(Some("ABCD1234"))).unwrap();

        let calls = runner.calls_for("git");
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[2],
            vec!["config", "--global", "user.signingkey", "ABCD1234"]
        );
        assert_eq!(calls[3], vec!["config", "--global", "commit.gpgsign", "true"]);
    }

    #[test]
    fn test_apply_local_outside_repo_fails() {
        let temp = TempDir::new().unwrap();
        let ui = test_ui();
        let runner = FakeRunner::new();
        runner.on("git", |_| Output {
            exit_code: 128,
            stdout: String::new(),
            stderr: "fatal: not a git repository".to_string(),
        });
        let binder = GitIdentityBinder::new(&runner, &ui);

        let err = binder
            .apply_local(&account(None), Some(temp.path()))
            .unwrap_err();
        assert!(matches!(err, Error::RepositoryState(_)));
        // Only the rev-parse probe ran; no config was written
        assert_eq!(runner.calls_for("git").len(), 1);
    }

    #[test]
    fn test_apply_local_inside_repo() {
        let temp = TempDir::new().unwrap();
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        binder.apply_local(&account(None), Some(temp.path())).unwrap();

        let calls = runner.all_calls();
        assert_eq!(calls[0].args, vec!["rev-parse", "--is-inside-work-tree"]);
        assert_eq!(calls[1].args, vec!["config", "--local", "user.name", "jdoe"]);
        assert_eq!(calls[1].cwd.as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_conditional_include_fragment() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("work");
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        let fragment = binder
            .conditional_include(&workspace, &account(Some("ABCD1234")))
            .unwrap();

        let content = std::fs::read_to_string(&fragment).unwrap();
        assert!(content.contains("[user]"));
        assert!(content.contains("name = jdoe"));
        assert!(content.contains("email = jdoe@corp.com"));
        assert!(content.contains("signingkey = ABCD1234"));
        assert!(content.contains("gpgsign = true"));
        assert!(content.contains("sshCommand = ssh -i /home/j/.ssh/id_ed25519_work -o IdentitiesOnly=yes"));

        // The includeIf pattern carries the trailing separator Git requires
        let calls = runner.calls_for("git");
        assert_eq!(calls.len(), 1);
        assert!(calls[0][2].starts_with("includeIf.gitdir:"));
        assert!(calls[0][2].ends_with("/.path"));
    }

    #[test]
    fn test_url_rewrite_rule() {
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        binder.url_rewrite(&account(None)).unwrap();

        let calls = runner.calls_for("git");
        assert_eq!(
            calls[0],
            vec![
                "config",
                "--global",
                "url.git@github.com-work:.insteadOf",
                "git@github.com:"
            ]
        );
    }

    #[test]
    fn test_url_rewrite_unresolvable_host_is_reported_not_raised() {
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        let mut acct = account(None);
        acct.provider = Provider::Custom;
        acct.custom_host = None;

        assert!(binder.url_rewrite(&acct).is_ok());
        assert!(runner.calls_for("git").is_empty());
    }

    #[test]
    fn test_rewrite_clone_url() {
        assert_eq!(
            rewrite_clone_url(
                "git@github.com:acme/widgets.git",
                "github.com",
                "github.com-work"
            ),
            "git@github.com-work:acme/widgets.git"
        );
        // Untouched when the host does not match
        assert_eq!(
            rewrite_clone_url("git@gitlab.com:a/b.git", "github.com", "github.com-work"),
            "git@gitlab.com:a/b.git"
        );
    }

    #[test]
    fn test_derive_clone_dir() {
        assert_eq!(derive_clone_dir("git@github.com-work:acme/widgets.git"), "widgets");
        assert_eq!(derive_clone_dir("git@github.com:acme/widgets"), "widgets");
    }

    #[test]
    fn test_clone_failure_skips_local_config() {
        let ui = test_ui();
        let runner = FakeRunner::new();
        runner.on("git", |args| {
            if args[0] == "clone" {
                Output {
                    exit_code: 128,
                    stdout: String::new(),
                    stderr: "fatal: repository not found".to_string(),
                }
            } else {
                Output::default()
            }
        });
        let binder = GitIdentityBinder::new(&runner, &ui);

        let err = binder
            .clone_with_account(&account(None), "git@github.com:acme/widgets.git", None)
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
        assert_eq!(runner.calls_for("git").len(), 1);
    }

    #[test]
    fn test_clone_rewrites_url_and_binds_destination() {
        let ui = test_ui();
        let runner = FakeRunner::new();
        let binder = GitIdentityBinder::new(&runner, &ui);

        let dir = binder
            .clone_with_account(
                &account(None),
                "git@github.com:acme/widgets.git",
                Some("wid"),
            )
            .unwrap();

        assert_eq!(dir, PathBuf::from("wid"));
        let calls = runner.calls_for("git");
        assert_eq!(
            calls[0],
            vec!["clone", "git@github.com-work:acme/widgets.git", "wid"]
        );
        // Clone succeeded, so the local identity was applied inside it
        assert!(calls.iter().any(|c| c.first().map(String::as_str) == Some("config")));
    }
}
