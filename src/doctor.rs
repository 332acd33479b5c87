//! Diagnostics for the mgit setup.
//!
//! `mgit doctor` walks the places where the account store and the SSH
//! config can drift apart — the add/remove workflows have no rollback, so
//! a half-finished run leaves an account without its SSH block or keys, or
//! an orphaned block without its account. Each check reports pass/warn/fail
//! per finding.

use anstyle::AnsiColor;

use crate::exec::CommandRunner;
use crate::paths::Paths;
use crate::ssh::{SshConfigEngine, derive_host_alias};
use crate::store::AccountStore;
use crate::ui::Ui;

/// Run all diagnostics.
pub fn run_doctor(paths: &Paths, runner: &dyn CommandRunner, ui: &Ui) {
    ui.section("mgit Doctor");
    ui.newline();

    // 1. Directories
    check_step(ui, "Directories", || {
        let mut ok = true;
        if paths.config_dir.exists() {
            ui.println(format!(
                "  {} Config directory exists: {}",
                ui.icon_ok(),
                paths.config_dir.display()
            ));
        } else {
            ui.println(format!(
                "  {} Config directory missing: {} (fresh install?)",
                ui.icon_warn(),
                paths.config_dir.display()
            ));
        }

        if paths.ssh_dir.exists() {
            ui.println(format!(
                "  {} SSH directory exists: {}",
                ui.icon_ok(),
                paths.ssh_dir.display()
            ));
        } else {
            ui.println(format!(
                "  {} SSH directory missing: {}",
                ui.icon_err(),
                paths.ssh_dir.display()
            ));
            ok = false;
        }
        ok
    });

    // 2. Account store parses
    check_step(ui, "Account Store", || {
        if !paths.store_file.exists() {
            ui.println(format!(
                "  {} No store file yet (run 'mgit add' to create one)",
                ui.icon_info()
            ));
            return true;
        }

        match std::fs::read_to_string(&paths.store_file) {
            Ok(content) => match serde_json::from_str::<serde_json::Value>(&content) {
                Ok(_) => {
                    ui.println(format!("  {} Store file parses", ui.icon_ok()));
                    true
                }
                Err(e) => {
                    ui.println(format!(
                        "  {} Store file corrupt: {} (mgit will start empty and overwrite it)",
                        ui.icon_err(),
                        e
                    ));
                    false
                }
            },
            Err(e) => {
                ui.println(format!("  {} Store file unreadable: {}", ui.icon_err(), e));
                false
            }
        }
    });

    let store = match AccountStore::load(&paths.store_file, ui) {
        Ok(store) => store,
        Err(e) => {
            ui.err(format!("Cannot load account store: {}", e));
            return;
        }
    };
    let ssh_config = std::fs::read_to_string(&paths.ssh_config).unwrap_or_default();

    // 3. Default invariant
    check_step(ui, "Default Account", || {
        if store.is_empty() {
            ui.println(format!("  {} No accounts configured", ui.icon_info()));
            return true;
        }

        let defaults: Vec<_> = store
            .list()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.name.clone())
            .collect();
        match defaults.len() {
            1 => {
                ui.println(format!("  {} Default account: {}", ui.icon_ok(), defaults[0]));
                true
            }
            0 => {
                ui.println(format!(
                    "  {} No account is flagged default (the first in name order is used)",
                    ui.icon_warn()
                ));
                true
            }
            _ => {
                ui.println(format!(
                    "  {} Multiple default accounts: {}",
                    ui.icon_err(),
                    defaults.join(", ")
                ));
                false
            }
        }
    });

    // 4. Per-account pairing
    check_step(ui, "Accounts", || {
        if store.is_empty() {
            ui.println(format!("  {} Nothing to check", ui.icon_info()));
            return true;
        }

        let mut all_ok = true;
        for account in store.list() {
            let mut findings = Vec::new();

            if !std::path::Path::new(&account.ssh_key_path).exists() {
                findings.push(format!("key missing at {}", account.ssh_key_path));
            }
            if !ssh_config.contains(&format!("# mgit-managed: {}", account.host_alias)) {
                findings.push("no SSH config block".to_string());
            }
            match derive_host_alias(account.provider, account.custom_host.as_deref(), &account.name)
            {
                Ok(expected) if expected != account.host_alias => {
                    findings.push(format!(
                        "stored alias '{}' differs from derived '{}'",
                        account.host_alias, expected
                    ));
                }
                Err(e) => findings.push(format!("alias underivable: {}", e)),
                Ok(_) => {}
            }

            if findings.is_empty() {
                ui.println(format!("    {} {}", ui.icon_ok(), account.name));
            } else {
                ui.println(format!(
                    "    {} {} ({})",
                    ui.icon_err(),
                    account.name,
                    findings.join("; ")
                ));
                all_ok = false;
            }
        }
        all_ok
    });

    // 5. Orphaned managed blocks
    check_step(ui, "SSH Config Blocks", || {
        let known: Vec<&str> = store.list().iter().map(|a| a.host_alias.as_str()).collect();
        let mut orphans = Vec::new();
        for line in ssh_config.lines() {
            if let Some(alias) = line.trim().strip_prefix("# mgit-managed: ")
                && !known.contains(&alias)
            {
                orphans.push(alias.to_string());
            }
        }

        if orphans.is_empty() {
            ui.println(format!("  {} No orphaned managed blocks", ui.icon_ok()));
            true
        } else {
            for alias in &orphans {
                ui.println(format!(
                    "  {} Managed block '{}' has no matching account",
                    ui.icon_warn(),
                    alias
                ));
            }
            // Orphans are clutter, not breakage
            true
        }
    });

    // 6. Keys on disk vs accounts
    check_step(ui, "Managed Keys", || {
        let engine = SshConfigEngine::new(paths, runner, ui);
        let keys = match engine.list_keys() {
            Ok(keys) => keys,
            Err(e) => {
                ui.println(format!("  {} Cannot list keys: {}", ui.icon_err(), e));
                return false;
            }
        };

        if keys.is_empty() {
            ui.println(format!("  {} No managed keys found", ui.icon_info()));
            return true;
        }

        for key in &keys {
            if store.get(&key.account).is_some() {
                ui.println(format!(
                    "  {} {} ({}) -> {}",
                    ui.icon_ok(),
                    key.account,
                    key.key_type,
                    key.path.display()
                ));
            } else {
                ui.println(format!(
                    "  {} {} ({}) has no matching account",
                    ui.icon_warn(),
                    key.account,
                    key.key_type
                ));
            }
        }
        true
    });

    // 7. Required binaries
    check_step(ui, "External Tools", || {
        let probes: [(&str, &[&str]); 3] =
            [("git", &["--version"]), ("ssh", &["-V"]), ("ssh-keygen", &[])];
        let mut all_ok = true;
        for (program, args) in probes {
            // Only spawnability matters here; usage-and-exit is fine
            match runner.run(program, args, None) {
                Ok(_) => ui.println(format!("  {} {} found", ui.icon_ok(), program)),
                Err(_) => {
                    ui.println(format!("  {} {} not found on PATH", ui.icon_err(), program));
                    all_ok = false;
                }
            }
        }
        all_ok
    });
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F)
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    if !check_fn() {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
}
