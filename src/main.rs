use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use xprofile::commands::{self, CreateOptions, Session};
use xprofile::config::{self, ProfileStore};

#[derive(Parser, Debug)]
#[command(
    name = "xprofile",
    version,
    about = "A tool to manage and automatically apply xrandr configurations."
)]
struct Cli {
    /// Output more verbosely.
    #[arg(long, global = true)]
    verbose: bool,
    /// Config file to read profiles from (default: $XPROFILE_CONFIG or ~/.xprofilerc).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// X display to run xrandr against, overriding the profile and DEFAULT section.
    #[arg(long, global = true)]
    display: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all available xrandr profiles.
    List,
    /// Get information about the current state.
    Current {
        /// Print the parsed screen as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Automatically select a known profile based on the current state.
    Auto {
        /// Don't activate the profile.
        #[arg(long)]
        dry_run: bool,
    },
    /// Activate a known profile (auto-detected when no name is given).
    Activate {
        /// Don't activate the profile.
        #[arg(long)]
        dry_run: bool,
        /// The profile to select.
        profile: Option<String>,
    },
    /// Create a new profile based on the current state.
    Create {
        /// Don't write configuration to disk.
        #[arg(long)]
        dry_run: bool,
        /// The description for the new profile.
        #[arg(long)]
        description: Option<String>,
        /// Command to run after the profile has been activated.
        #[arg(long)]
        exec_post: Option<String>,
        /// The name for the new profile.
        profile: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::INFO } else { Level::WARN })
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = config::resolve_config_path(cli.config.as_deref())?;
    let mut store = ProfileStore::open(&path)?;

    let backend = store.settings()?.backend();
    let session = Session::new(&backend, cli.display);

    match cli.command {
        Command::List => {
            for name in store.names() {
                println!("{name}");
            }
        }
        Command::Current { json } => {
            let current = commands::current(&session, &store)?;
            if json {
                let s = serde_json::to_string_pretty(&current.screen)
                    .context("serialize screen")?;
                println!("{s}");
            } else {
                println!("{}", current.fingerprint);
                println!("{}", current.args.join(" "));
            }
            match current.profile {
                Some(name) => println!("Profile: {name}"),
                None => bail!("No known profile found for EDID: {}", current.fingerprint),
            }
        }
        Command::Auto { dry_run } => {
            commands::activate(&session, &store, None, dry_run)?;
        }
        Command::Activate { dry_run, profile } => {
            commands::activate(&session, &store, profile.as_deref(), dry_run)?;
        }
        Command::Create {
            dry_run,
            description,
            exec_post,
            profile,
        } => {
            let options = CreateOptions {
                description,
                exec_post,
                dry_run,
            };
            let created = commands::create(&session, &mut store, &profile, &options)?;
            if dry_run {
                print!("{}", created.to_ini_string()?);
            } else {
                println!("Profile created in {}", store.path().display());
            }
        }
    }

    Ok(())
}
