use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::PathBuf;

/// All computed paths used by mgit
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.mgit
    pub config_dir: PathBuf,
    /// ~/.mgit/config.json
    pub store_file: PathBuf,
    /// ~/.ssh
    pub ssh_dir: PathBuf,
    /// ~/.ssh/config
    pub ssh_config: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        let home = base_dirs.home_dir();

        let config_dir = home.join(".mgit");
        let store_file = config_dir.join("config.json");
        let ssh_dir = home.join(".ssh");
        let ssh_config = ssh_dir.join("config");

        Ok(Self {
            config_dir,
            store_file,
            ssh_dir,
            ssh_config,
        })
    }

    /// Private key path for an account: ~/.ssh/id_<type>_<name>
    pub fn private_key(&self, key_type: &str, account_name: &str) -> PathBuf {
        self.ssh_dir.join(format!("id_{}_{}", key_type, account_name))
    }

    /// Public key path for an account: ~/.ssh/id_<type>_<name>.pub
    pub fn public_key(&self, key_type: &str, account_name: &str) -> PathBuf {
        self.ssh_dir
            .join(format!("id_{}_{}.pub", key_type, account_name))
    }

    /// Ensure the mgit config directory and ~/.ssh exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir).with_context(|| {
            format!("Failed to create config directory: {:?}", self.config_dir)
        })?;
        std::fs::create_dir_all(&self.ssh_dir)
            .with_context(|| format!("Failed to create SSH directory: {:?}", self.ssh_dir))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_paths_layout() {
        let temp = tempfile::TempDir::new().unwrap();
        unsafe { std::env::set_var("HOME", temp.path()) };

        let paths = Paths::new().unwrap();
        assert!(paths.store_file.ends_with(".mgit/config.json"));
        assert!(paths.ssh_config.ends_with(".ssh/config"));
    }

    #[test]
    fn test_key_paths() {
        let paths = Paths {
            config_dir: "/home/u/.mgit".into(),
            store_file: "/home/u/.mgit/config.json".into(),
            ssh_dir: "/home/u/.ssh".into(),
            ssh_config: "/home/u/.ssh/config".into(),
        };

        assert_eq!(
            paths.private_key("ed25519", "work"),
            PathBuf::from("/home/u/.ssh/id_ed25519_work")
        );
        assert_eq!(
            paths.public_key("rsa", "work"),
            PathBuf::from("/home/u/.ssh/id_rsa_work.pub")
        );
    }
}
