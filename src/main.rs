use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use mgit::{
    account::{KeyType, Provider},
    commands,
    exec::SystemRunner,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "mgit")]
#[command(about = "Multi-Git Manager - manage multiple Git accounts on a single machine")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new Git account profile
    Add {
        /// Provider username (also the default profile name)
        username: String,

        /// Git hosting provider: github, gitlab, bitbucket, custom
        #[arg(short, long, default_value = "github")]
        provider: Provider,

        /// Profile name (default: username)
        #[arg(short, long)]
        name: Option<String>,

        /// Override email (auto-fetched from the provider if omitted)
        #[arg(short, long)]
        email: Option<String>,

        /// Set as the default profile
        #[arg(short = 'd', long = "default")]
        is_default: bool,

        /// Workspace directory for automatic identity switching
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Hostname (required when --provider custom)
        #[arg(long)]
        custom_host: Option<String>,

        /// SSH key type: ed25519, rsa
        #[arg(short, long, default_value = "ed25519")]
        key_type: KeyType,

        /// SSH key passphrase
        #[arg(long, default_value = "")]
        passphrase: String,

        /// GPG signing key ID
        #[arg(long)]
        signing_key: Option<String>,
    },

    /// Remove a Git account profile
    #[command(visible_alias = "rm")]
    Remove {
        /// Name of the profile to remove
        name: String,

        /// Keep the SSH key files on disk
        #[arg(short, long)]
        keep_keys: bool,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Switch to a different Git account profile
    #[command(visible_alias = "use")]
    Switch {
        /// Name of the profile to switch to
        name: String,

        /// Apply to the current repository only
        #[arg(short, long)]
        local: bool,

        /// Repository path (for local scope)
        #[arg(short, long)]
        repo_path: Option<PathBuf>,
    },

    /// List all configured profiles
    #[command(visible_alias = "ls")]
    List,

    /// Show the current Git configuration and active profile
    Current,

    /// Clone a repository using a specific profile
    Clone {
        /// Profile to clone with
        name: String,

        /// Repository URL
        url: String,

        /// Destination directory
        destination: Option<String>,
    },

    /// Test SSH connectivity for a profile
    Test {
        /// Profile to test
        name: String,
    },

    /// Bind a workspace directory to a profile
    Workspace {
        /// Profile to bind
        name: String,

        /// Directory whose repositories should use the profile
        directory: PathBuf,
    },

    /// Display the public SSH key for a profile
    #[command(name = "show-key", visible_alias = "key")]
    ShowKey {
        /// Profile whose key to show
        name: String,
    },

    /// Fetch and display user info from a provider (without adding)
    Info {
        /// Provider username
        username: String,

        /// Git hosting provider
        #[arg(short, long, default_value = "github")]
        provider: Provider,
    },

    /// Run diagnostics on the mgit setup
    Doctor,

    /// Generate shell completion script
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::new()?;
    let ui = Ui::new(cli.color, cli.no_color);
    let runner = SystemRunner;

    match cli.command {
        Commands::Add {
            username,
            provider,
            name,
            email,
            is_default,
            workspace,
            custom_host,
            key_type,
            passphrase,
            signing_key,
        } => commands::add(
            &paths,
            &runner,
            &ui,
            commands::AddOptions {
                username,
                provider,
                name,
                email,
                is_default,
                workspace,
                custom_host,
                key_type,
                passphrase,
                signing_key,
            },
        ),
        Commands::Remove { name, keep_keys, yes } => {
            commands::remove(&paths, &runner, &ui, &name, keep_keys, yes)
        }
        Commands::Switch {
            name,
            local,
            repo_path,
        } => commands::switch(&paths, &runner, &ui, &name, local, repo_path.as_deref()),
        Commands::List => commands::list(&paths, &runner, &ui),
        Commands::Current => commands::current(&paths, &runner, &ui),
        Commands::Clone {
            name,
            url,
            destination,
        } => commands::clone(&paths, &runner, &ui, &name, &url, destination.as_deref()),
        Commands::Test { name } => commands::test(&paths, &runner, &ui, &name),
        Commands::Workspace { name, directory } => {
            commands::workspace(&paths, &runner, &ui, &name, &directory)
        }
        Commands::ShowKey { name } => commands::show_key(&paths, &runner, &ui, &name),
        Commands::Info { username, provider } => commands::info(&ui, &username, provider),
        Commands::Doctor => commands::doctor(&paths, &runner, &ui),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mgit", &mut std::io::stdout());
            Ok(())
        }
    }
}
