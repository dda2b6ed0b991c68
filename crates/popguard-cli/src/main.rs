use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use popguard_core::config::{AuthorityMode, Config, ConfigPaths};

mod authority;
mod commands;
mod logging;
mod script;

#[derive(Parser, Debug)]
#[command(
    name = "popguard",
    version,
    about = "Popup blocking and decision routing for embedded web views"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Feed a JSON-lines engine event script through a decision session
    Replay {
        /// Overrides `authority.mode` from the config
        #[arg(long)]
        mode: Option<AuthorityMode>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        no_store: bool,
        script: PathBuf,
    },
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        timeline: bool,
    },
    Config {
        #[arg(long)]
        print: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = ConfigPaths::resolve()?;

    if let Commands::Init { path, force } = cli.command {
        logging::init(&Config::default_config().logging);
        return init_config(path.or(cli.config), &paths, force);
    }

    let config = commands::config::load_or_default(cli.config.as_ref(), &paths)?;
    logging::init(&config.logging);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Replay {
            mode,
            json,
            no_store,
            script,
        } => commands::replay::execute(commands::replay::ReplayInputs {
            config,
            paths,
            script,
            mode,
            json,
            store: !no_store,
        }),
        Commands::Report {
            input,
            json,
            timeline,
        } => commands::report::execute(&input, json, timeline),
        Commands::Config { print } => {
            if print {
                commands::config::print_effective(&config)
            } else {
                Ok(())
            }
        }
    }
}

fn init_config(path: Option<PathBuf>, paths: &ConfigPaths, force: bool) -> Result<()> {
    let config_path = path.unwrap_or_else(|| paths.config_path.clone());
    if config_path.exists() && !force {
        return Err(anyhow::anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }
    let config = Config::default_config();
    config.save(&config_path)?;
    println!("Config written to {}", config_path.display());
    Ok(())
}
