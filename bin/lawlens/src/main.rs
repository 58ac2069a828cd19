mod commands;

use clap::{Parser, Subcommand};
use lawlens_core::Paths;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lawlens")]
#[command(about = "Reading aid and session keep-alive for legal research pages", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (defaults to ~/.lawlens)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tab agent for one page until Ctrl-C or end of input
    Agent {
        /// Page the agent is attached to; keep-alive pings go here
        #[arg(short, long)]
        url: String,

        /// Settings domain (defaults to the URL's host)
        #[arg(short, long)]
        domain: Option<String>,

        /// Page title cited by saved quotations (defaults to the domain)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Show the current keep-alive owner
    Status,

    /// Inspect or reset per-domain settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Manage saved quotations
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Print the stored settings for a domain
    Show {
        #[arg(short, long)]
        domain: String,
    },
    /// Restore defaults for a domain
    Reset {
        #[arg(short, long)]
        domain: String,
    },
}

#[derive(Subcommand)]
enum NotesCommands {
    /// List notes, newest first
    List {
        /// Keep running and reprint whenever the notes change
        #[arg(short, long)]
        follow: bool,
    },
    /// Save a quotation
    Add {
        /// Quoted text
        text: String,

        /// Title of the page it came from
        #[arg(long)]
        title: Option<String>,

        /// Address of the page it came from
        #[arg(long)]
        url: Option<String>,
    },
    /// Delete all notes
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base(base),
        None => Paths::new(),
    };

    match cli.command {
        Commands::Agent { url, domain, title } => {
            commands::agent::run(&paths, url, domain, title).await?;
        }
        Commands::Status => {
            commands::status::run(&paths).await?;
        }
        Commands::Settings { command } => match command {
            SettingsCommands::Show { domain } => {
                commands::settings::show(&paths, &domain).await?;
            }
            SettingsCommands::Reset { domain } => {
                commands::settings::reset(&paths, &domain).await?;
            }
        },
        Commands::Notes { command } => match command {
            NotesCommands::List { follow } => {
                commands::notes::list(&paths, follow).await?;
            }
            NotesCommands::Add { text, title, url } => {
                commands::notes::add(&paths, &text, title, url).await?;
            }
            NotesCommands::Clear => {
                commands::notes::clear(&paths).await?;
            }
        },
    }

    Ok(())
}
