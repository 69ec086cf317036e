//! Binary entrypoint for the mushcore CLI.
//!
//! Commands:
//! - `start [--bind <addr>]` - run the world and accept line-based TCP clients
//! - `init` - write a starter `mushcore.toml`
//! - `hash-password` - interactively hash a password with the configured Argon2 parameters
//!
//! See the library crate docs for module-level details: `mushcore::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::sync::Arc;

use mushcore::config::Config;
use mushcore::validation::validate_password;
use mushcore::world::World;

#[derive(Parser)]
#[command(name = "mushcore")]
#[command(about = "Live-state core for a multiplayer text world")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "mushcore.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the world server
    Start {
        /// Listen address, overrides `server.bind`
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Write a default configuration file
    Init,
    /// Hash a password for use in seeded character records
    HashPassword,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { bind } => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting mushcore v{}", env!("CARGO_PKG_VERSION"));

            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let world = Arc::new(World::new(config)?);
            info!(
                "World ready: start room '{}', {} commands",
                world.start_room().title(),
                world.commands().commands().len()
            );
            mushcore::server::run(world, &bind).await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::HashPassword => {
            let config = Config::load(&cli.config).await.ok();
            init_logging(&config, cli.verbose);
            use password_hash::{PasswordHasher, SaltString};
            let hasher = config.unwrap_or_default().security.hasher()?;
            // Prompt twice without echo
            let pass1 = rpassword::prompt_password("Password: ")?;
            if let Err(e) = validate_password(&pass1) {
                println!("Error: {e}.");
                return Ok(());
            }
            let pass2 = rpassword::prompt_password("Confirm password: ")?;
            if pass1 != pass2 {
                println!("Error: passwords do not match.");
                return Ok(());
            }
            let salt = SaltString::generate(&mut rand::thread_rng());
            match hasher.hash_password(pass1.as_bytes(), &salt) {
                Ok(h) => println!("{h}"),
                Err(e) => println!("Hash error: {e}"),
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    match log_file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            let security_path = config.as_ref().and_then(|cfg| cfg.logging.security_file.clone());
            // Mirror to the console only when attached to a terminal
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}
