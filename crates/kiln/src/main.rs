//! Kiln CLI - static-site asset pipeline with a live-reload dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Static-site asset pipeline with a live-reload dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, then serve with live reload and rebuild on change (default)
    Dev {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Build the site for deployment
    Build,

    /// Run a single task (clean, copy, styles, html, scripts, optimize-images, copy-images, webp, svg, sprite)
    Task {
        /// Task name
        name: String,

        /// Use development mode (affects template context)
        #[arg(long)]
        dev: bool,
    },

    /// Serve the built site without watching
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Publish the built site to the hosting branch
    Deploy {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = config::load_config(&cli.config)?;

    // Execute command
    match cli.command.unwrap_or(Commands::Dev {
        port: None,
        no_open: false,
    }) {
        Commands::Dev { port, no_open } => {
            commands::dev::run(&config, port, !no_open).await?;
        }
        Commands::Build => {
            commands::build::run(&config).await?;
        }
        Commands::Task { name, dev } => {
            commands::task::run(&config, &name, dev).await?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&config, port).await?;
        }
        Commands::Deploy { message } => {
            commands::deploy::run(&config, message).await?;
        }
    }

    Ok(())
}
