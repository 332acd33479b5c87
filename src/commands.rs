//! CLI command handlers.
//!
//! One function per subcommand. This layer owns everything the core must
//! not: argument massaging, provider lookups, confirmation prompts, and
//! table rendering. Each handler builds a [`ProfileOrchestrator`] over the
//! injected runner and sink and translates core errors into user-facing
//! failures (message + non-zero exit, via `anyhow`).

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::account::{KeyType, Provider, Scope};
use crate::exec::CommandRunner;
use crate::orchestrator::{AddProfileRequest, ProfileOrchestrator};
use crate::paths::Paths;
use crate::remote::{ProviderUser, fetch_user, noreply_email};
use crate::ui::Ui;

/// Flags accepted by `mgit add`
#[derive(Debug, Clone)]
pub struct AddOptions {
    pub username: String,
    pub provider: Provider,
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_default: bool,
    pub workspace: Option<PathBuf>,
    pub custom_host: Option<String>,
    pub key_type: KeyType,
    pub passphrase: String,
    pub signing_key: Option<String>,
}

/// Add a new Git account profile
pub fn add(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui, opts: AddOptions) -> Result<()> {
    paths.ensure_dirs()?;

    let profile_name = opts.name.clone().unwrap_or_else(|| opts.username.clone());

    let (git_username, git_email) = if opts.provider == Provider::Custom {
        if opts.custom_host.is_none() {
            bail!("Custom host required: use --custom-host");
        }
        let email = opts
            .email
            .clone()
            .context("Email required for custom provider: use --email/-e")?;
        (opts.username.clone(), email)
    } else if let Some(email) = opts.email.clone() {
        // Explicit email skips the provider lookup
        (opts.username.clone(), email)
    } else {
        let user = lookup_user(ui, opts.provider, &opts.username)?;
        let git_username = user.name.clone().unwrap_or_else(|| opts.username.clone());
        let git_email = match user.email.clone() {
            Some(email) => email,
            None => {
                let noreply = noreply_email(opts.provider, &opts.username, user.id)
                    .context("Email not public: supply one with --email/-e")?;
                ui.warn(format!("Email not public. Using: {}", noreply));
                noreply
            }
        };
        ui.println(format!("  {} {}", ui.dim("Name:"), git_username));
        ui.println(format!("  {} {}", ui.dim("Email:"), git_email));
        (git_username, git_email)
    };

    let orch = ProfileOrchestrator::new(paths, runner, ui);
    let account = orch.add_profile(AddProfileRequest {
        name: profile_name,
        git_username,
        git_email,
        provider: opts.provider,
        custom_host: opts.custom_host,
        key_type: opts.key_type,
        passphrase: opts.passphrase,
        signing_key: opts.signing_key,
        is_default: opts.is_default,
        workspace_dir: opts.workspace,
    })?;

    if let Some(public_key) = orch.public_key(&account.name)? {
        ui.newline();
        ui.println(ui.bold("Public SSH key (add this to your Git provider):"));
        ui.newline();
        ui.println(&public_key);
        ui.newline();
    }

    ui.println("To switch to it:");
    ui.println(format!("  mgit use {}", account.name));
    Ok(())
}

/// Remove a profile, its SSH config block, and (by default) its keys
pub fn remove(
    paths: &Paths,
    runner: &dyn CommandRunner,
    ui: &Ui,
    name: &str,
    keep_keys: bool,
    yes: bool,
) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    // Lookup first so an unknown name fails before the prompt
    let account = orch.get_account(name)?;

    if !yes {
        let confirmed = inquire::Confirm::new(&format!(
            "Remove profile '{}' ({} <{}>)?",
            account.name, account.git_username, account.git_email
        ))
        .with_default(false)
        .with_help_message("Deletes the SSH config entry and, unless --keep-keys, the key files")
        .prompt()
        .context("Confirmation cancelled")?;

        if !confirmed {
            ui.warn("Removal cancelled.");
            return Ok(());
        }
    }

    orch.remove_profile(name, !keep_keys)?;
    Ok(())
}

/// Switch the global or repository-local identity to a profile
pub fn switch(
    paths: &Paths,
    runner: &dyn CommandRunner,
    ui: &Ui,
    name: &str,
    local: bool,
    repo_path: Option<&Path>,
) -> Result<()> {
    let scope = if local { Scope::Local } else { Scope::Global };
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    orch.switch_profile(name, scope, repo_path)?;
    Ok(())
}

/// List all configured profiles
pub fn list(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    let accounts = orch.list_accounts()?;

    if accounts.is_empty() {
        ui.warn("No Git profiles configured.");
        ui.newline();
        ui.println("Create one with:");
        ui.println(format!("  {} add <username>", ui.bold("mgit")));
        return Ok(());
    }

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("Name"),
        ui.header_cell("Username"),
        ui.header_cell("Email"),
        ui.header_cell("Provider"),
        ui.header_cell("Host Alias"),
        ui.header_cell("Default"),
    ]);

    for account in &accounts {
        let default_cell = if account.is_default {
            ui.colored_cell(ui.icon_ok(), AnsiColor::Green)
        } else {
            ui.cell("")
        };
        table.add_row(vec![
            ui.cell(&account.name),
            ui.cell(&account.git_username),
            ui.cell(&account.git_email),
            ui.cell(account.provider.to_string()),
            ui.cell(&account.host_alias),
            default_cell,
        ]);
    }

    ui.section("Registered Git Profiles");
    ui.println(table.to_string());
    Ok(())
}

/// Show the effective Git identity and the active profile
pub fn current(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    orch.show_current(None)?;
    Ok(())
}

/// Clone a repository through a profile's SSH alias
pub fn clone(
    paths: &Paths,
    runner: &dyn CommandRunner,
    ui: &Ui,
    name: &str,
    url: &str,
    destination: Option<&str>,
) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    let repo_dir = orch.clone_repo(name, url, destination)?;
    ui.ok(format!("Cloned into {}", repo_dir.display()));
    Ok(())
}

/// Probe SSH authentication for a profile
pub fn test(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui, name: &str) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    let account = orch.get_account(name)?;

    if orch.test_connection(name)? {
        ui.ok(format!(
            "SSH connection test passed for {}",
            account.host_alias
        ));
        Ok(())
    } else {
        bail!("SSH connection test failed for {}", account.host_alias);
    }
}

/// Bind a workspace directory to a profile
pub fn workspace(
    paths: &Paths,
    runner: &dyn CommandRunner,
    ui: &Ui,
    name: &str,
    directory: &Path,
) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    orch.setup_workspace(name, directory)?;
    Ok(())
}

/// Print the public key for a profile
pub fn show_key(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui, name: &str) -> Result<()> {
    let orch = ProfileOrchestrator::new(paths, runner, ui);
    match orch.public_key(name)? {
        Some(public_key) => {
            ui.newline();
            ui.println(ui.bold(format!("Public key for '{}':", name)));
            ui.newline();
            ui.println(public_key);
            ui.newline();
            Ok(())
        }
        None => bail!("No SSH key found for '{}'", name),
    }
}

/// Fetch and display a provider user without creating a profile
pub fn info(ui: &Ui, username: &str, provider: Provider) -> Result<()> {
    let user = lookup_user(ui, provider, username)?;

    ui.newline();
    ui.section(format!("User Info ({})", provider));
    ui.println(format!("  {} {}", ui.dim("Login:"), user.login));
    if let Some(name) = &user.name {
        ui.println(format!("  {} {}", ui.dim("Name:"), name));
    }
    if user.id != 0 {
        ui.println(format!("  {} {}", ui.dim("ID:"), user.id));
    }
    match &user.email {
        Some(email) => ui.println(format!("  {} {}", ui.dim("Email:"), email)),
        None => {
            ui.println(format!(
                "  {} {}",
                ui.dim("Email:"),
                ui.colored("(not public)", AnsiColor::Yellow)
            ));
            if let Some(noreply) = noreply_email(provider, username, user.id) {
                ui.println(format!("  {} {}", ui.dim("No-reply:"), noreply));
            }
        }
    }
    if let Some(bio) = &user.bio {
        ui.println(format!("  {} {}", ui.dim("Bio:"), bio));
    }
    if let Some(url) = &user.html_url {
        ui.println(format!("  {} {}", ui.dim("URL:"), url));
    }
    ui.newline();
    Ok(())
}

/// Run diagnostics
pub fn doctor(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui) -> Result<()> {
    crate::doctor::run_doctor(paths, runner, ui);
    Ok(())
}

/// Provider lookup with a spinner for the network round-trip
fn lookup_user(ui: &Ui, provider: Provider, username: &str) -> Result<ProviderUser> {
    let spinner = ui.spinner(format!("Fetching user details from {}...", provider));
    match fetch_user(provider, username) {
        Ok(user) => {
            ui.spinner_finish_ok(&spinner, format!("Found {} user '{}'", provider, user.login));
            Ok(user)
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Lookup failed: {}", e));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::Output;
    use crate::test_utils::{FakeRunner, setup_test_paths, test_ui};
    use tempfile::TempDir;

    fn runner_with_keygen() -> FakeRunner {
        let runner = FakeRunner::new();
        runner.on("ssh-keygen", |args| {
            let path = args
                .iter()
                .position(|a| a == "-f")
                .map(|i| args[i + 1].clone())
                .expect("ssh-keygen called without -f");
            std::fs::write(&path, "PRIVATE").unwrap();
            std::fs::write(format!("{}.pub", path), "ssh-ed25519 AAAA generated\n").unwrap();
            Output::default()
        });
        runner
    }

    fn add_options(username: &str) -> AddOptions {
        AddOptions {
            username: username.to_string(),
            provider: Provider::Github,
            name: None,
            email: Some(format!("{}@example.com", username)),
            is_default: false,
            workspace: None,
            custom_host: None,
            key_type: KeyType::Ed25519,
            passphrase: String::new(),
            signing_key: None,
        }
    }

    #[test]
    fn test_list_empty() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        assert!(list(&paths, &runner, &ui).is_ok());
    }

    #[test]
    fn test_add_and_list() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = runner_with_keygen();

        add(&paths, &runner, &ui, add_options("work")).unwrap();
        assert!(list(&paths, &runner, &ui).is_ok());

        // Explicit email means no network lookup happened; the key and the
        // config block did
        assert!(paths.private_key("ed25519", "work").exists());
        assert!(
            std::fs::read_to_string(&paths.ssh_config)
                .unwrap()
                .contains("github.com-work")
        );
    }

    #[test]
    fn test_add_custom_requires_host_and_email() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = runner_with_keygen();

        let mut opts = add_options("corp");
        opts.provider = Provider::Custom;
        opts.custom_host = None;
        assert!(add(&paths, &runner, &ui, opts).is_err());

        let mut opts = add_options("corp");
        opts.provider = Provider::Custom;
        opts.custom_host = Some("git.example.com".to_string());
        opts.email = None;
        assert!(add(&paths, &runner, &ui, opts).is_err());

        let mut opts = add_options("corp");
        opts.provider = Provider::Custom;
        opts.custom_host = Some("git.example.com".to_string());
        add(&paths, &runner, &ui, opts).unwrap();
    }

    #[test]
    fn test_remove_unknown_fails_before_prompt() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        assert!(remove(&paths, &runner, &ui, "ghost", false, true).is_err());
    }

    #[test]
    fn test_remove_with_yes() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = runner_with_keygen();

        add(&paths, &runner, &ui, add_options("work")).unwrap();
        remove(&paths, &runner, &ui, "work", false, true).unwrap();

        assert!(!paths.private_key("ed25519", "work").exists());
        assert!(
            !std::fs::read_to_string(&paths.ssh_config)
                .unwrap()
                .contains("github.com-work")
        );
    }

    #[test]
    fn test_switch_unknown_profile() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        assert!(switch(&paths, &runner, &ui, "ghost", false, None).is_err());
    }

    #[test]
    fn test_show_key_missing() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = FakeRunner::new();
        assert!(show_key(&paths, &runner, &ui, "ghost").is_err());
    }

    #[test]
    fn test_failed_connection_exits_nonzero() {
        let temp = TempDir::new().unwrap();
        let paths = setup_test_paths(&temp);
        let ui = test_ui();
        let runner = runner_with_keygen();
        runner.on("ssh", |_| Output {
            exit_code: 255,
            stdout: String::new(),
            stderr: "Permission denied (publickey).".to_string(),
        });

        add(&paths, &runner, &ui, add_options("work")).unwrap();
        assert!(test(&paths, &runner, &ui, "work").is_err());
    }
}
