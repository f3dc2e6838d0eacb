//! webgl-host - Static file server for WebGL builds

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use webgl_host_core::check::run_checks;
use webgl_host_core::colored_logger::init_logger;
use webgl_host_core::config::{Config, Overrides};
use webgl_host_web::CacheMode;

#[derive(Parser)]
#[command(name = "webgl-host")]
#[command(about = "Serve WebGL builds with tuned caching, compression and uploads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ./webgl-host.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Named profile from the configuration file
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// Listen port (overrides PORT and the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the WebGL build
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Cache policy: immutable, revalidate or no-store
        #[arg(long)]
        cache_mode: Option<CacheMode>,

        /// Preload the configured files into memory
        #[arg(long)]
        memory_cache: bool,

        /// Disable gzip/brotli response compression
        #[arg(long)]
        no_compression: bool,

        /// Enable the /admin upload endpoints
        #[arg(long)]
        enable_upload: bool,

        /// Directory uploads are written into
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },

    /// Check that the build directory is ready to serve
    Check,

    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logger(cli.verbose)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(profile) = &cli.profile {
        config = config.apply_profile(profile)?;
    }
    let config = config.apply_env()?;

    match cli.command {
        Commands::Serve {
            port,
            root,
            cache_mode,
            memory_cache,
            no_compression,
            enable_upload,
            upload_dir,
        } => {
            let overrides = Overrides {
                port,
                root,
                cache_mode,
                memory_cache: memory_cache.then_some(true),
                compression: no_compression.then_some(false),
                upload: enable_upload.then_some(true),
                upload_dir,
            };
            cmd_serve(config.apply_overrides(&overrides))?;
        }
        Commands::Check => {
            cmd_check(&config)?;
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn cmd_serve(config: Config) -> Result<()> {
    info!("starting webgl-host {}", env!("CARGO_PKG_VERSION"));
    if config.cache.enabled && config.cache.files.is_empty() {
        info!("memory cache enabled with no files configured");
    }

    webgl_host_web::serve(config.server_options()).await
}

fn cmd_check(config: &Config) -> Result<()> {
    println!("checking build...\n");

    let report = run_checks(&config.server_options());
    print!("{}", report);
    println!();

    if report.passed() {
        println!("all checks passed!");
        Ok(())
    } else {
        error!("required files are missing");
        Err(anyhow::anyhow!("check failed"))
    }
}
