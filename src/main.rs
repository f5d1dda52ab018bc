use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dexcache::{
    arguments,
    chain::ss58,
    config,
    logger::{self, LogTag},
    metadata, paths, settings,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dexcache")]
#[command(about = "Inspect and manage the dexcache settings and metadata stores")]
struct Cli {
    /// Configuration file (defaults to config.toml in the data directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Persistent metadata cache
    #[command(subcommand)]
    Metadata(MetadataCommands),

    /// Convert an address to SS58 form
    Ss58 {
        /// SS58 or 0x-prefixed EVM address
        address: String,

        /// Network prefix for the output
        #[arg(long, default_value = "0")]
        prefix: u16,
    },

    /// Print resolved file locations
    Paths,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print every setting
    Show,

    /// Print one setting
    Get { key: String },

    /// Change one setting; the value is parsed as JSON, falling back to a string
    Set { key: String, value: String },

    /// Restore defaults
    Reset,
}

#[derive(Subcommand)]
enum MetadataCommands {
    /// Entry count, size and age
    Stats,

    /// List cached code hashes, oldest first
    List,

    /// Write the cached blob for a code hash to a file
    Get { code_hash: String, output: PathBuf },

    /// Cache the contents of a file under a code hash
    Put { code_hash: String, input: PathBuf },

    /// Trim to the configured maximum
    Prune,

    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() {
    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    logger::init();

    let cli = Cli::parse_from(arguments::command_args());
    let result = run(cli).await;
    logger::flush();

    if let Err(e) = result {
        logger::error(LogTag::System, &format!("{:#}", e));
        logger::flush();
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.config {
        Some(path) => config::load_config_from_path(path),
        None => config::load_config(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Commands::Settings(command) => run_settings(command),
        Commands::Metadata(command) => run_metadata(command).await,
        Commands::Ss58 { address, prefix } => {
            let account = if ss58::is_evm_address(&address) {
                ss58::fallback_account(&ss58::parse_evm_address(&address)?)
            } else {
                ss58::decode(&address)?.1
            };
            println!("{}", ss58::encode(&account, prefix)?);
            Ok(())
        }
        Commands::Paths => {
            let (db_file, settings_dir) = config::with_config(|cfg| {
                (cfg.cache.metadata_db_file.clone(), cfg.settings.storage_dir.clone())
            });
            println!("base:     {}", paths::get_base_directory().display());
            println!("config:   {}", paths::get_config_path().display());
            println!("metadata: {}", paths::get_metadata_db_path(&db_file).display());
            println!("settings: {}", paths::get_settings_directory(&settings_dir).display());
            Ok(())
        }
    }
}

fn run_settings(command: SettingsCommands) -> Result<()> {
    let store = settings::global();

    match command {
        SettingsCommands::Show => {
            println!("{}", serde_json::to_string_pretty(store.snapshot().as_ref())?);
        }
        SettingsCommands::Get { key } => {
            println!("{}", store.get_by_name(&key)?);
        }
        SettingsCommands::Set { key, value } => {
            let parsed = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            if store.set_by_name(&key, parsed)? {
                logger::info(LogTag::Settings, &format!("Updated '{}'", key));
            } else {
                logger::info(LogTag::Settings, &format!("'{}' unchanged", key));
            }
        }
        SettingsCommands::Reset => {
            store.reset();
        }
    }

    Ok(())
}

async fn run_metadata(command: MetadataCommands) -> Result<()> {
    let cache = metadata::open_from_config();
    metadata::init_global(cache.clone());

    match command {
        MetadataCommands::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats().await)?);
        }
        MetadataCommands::List => {
            for code_hash in cache.keys().await {
                println!("{}", code_hash);
            }
        }
        MetadataCommands::Get { code_hash, output } => {
            let Some(bytes) = metadata::get_cached_metadata(&code_hash).await else {
                bail!("No cached metadata for {}", code_hash);
            };
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{} bytes written to {}", bytes.len(), output.display());
        }
        MetadataCommands::Put { code_hash, input } => {
            let bytes = std::fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
            metadata::set_cached_metadata(&code_hash, bytes).await;
            // The background prune would not outlive this process
            cache.prune().await;
        }
        MetadataCommands::Prune => {
            println!("{} entries removed", cache.prune().await);
        }
        MetadataCommands::Clear => {
            println!("{} entries removed", cache.clear().await);
        }
    }

    Ok(())
}
