//! Brickscan CLI - identify LEGO parts from photos.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod commands;
mod exit_codes;
mod utils;

use commands::scan::ScanOptions;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  3   Nothing recognized in the image
  65  Unreadable response from the recognition service
  66  Cannot read input file, or history record not found
  69  Recognition service unavailable (network, server error)
  74  History storage or output file error
  78  Invalid API URL configuration";

#[derive(Parser)]
#[command(name = "brickscan")]
#[command(author, version, about = "Identify LEGO parts from photos with Brickognize", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// History database URL
    #[arg(
        long,
        global = true,
        env = "BRICKSCAN_DATABASE_URL",
        default_value = utils::DEFAULT_DATABASE_URL
    )]
    database: String,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize the part in a photo and record it in history
    Scan {
        /// Path to the captured image (JPEG)
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Recognize only, do not write a history record
        #[arg(long)]
        no_save: bool,

        /// Retry transient failures (network, 5xx) up to N times
        #[arg(long, value_name = "N", default_value_t = 0)]
        retries: u32,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Use a canned offline result instead of the real service (for testing)
        #[arg(long)]
        mock: bool,
    },

    /// Browse and manage scan history
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List recorded scans, newest first
    List {
        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Show at most N records
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Show one recorded scan
    Show {
        /// Record ID
        #[arg(value_name = "ID")]
        id: Uuid,

        /// Write the stored JPEG thumbnail to this path
        #[arg(long, value_name = "PATH")]
        thumbnail_out: Option<PathBuf>,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete recorded scans (unknown IDs are ignored)
    Delete {
        /// Record IDs
        #[arg(value_name = "ID", required = true)]
        ids: Vec<Uuid>,
    },

    /// Delete every recorded scan
    Clear,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,brickscan_core=debug,brickscan=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let database = cli.database.as_str();
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Scan {
            image,
            no_save,
            retries,
            json,
            mock,
        } => {
            let options = ScanOptions {
                no_save,
                retries,
                json,
                use_mock: mock,
            };
            commands::scan::execute(image, options, database, quiet).await
        }
        Commands::History { action } => match action {
            HistoryCommand::List { json, limit } => {
                commands::history::list(database, json, limit, quiet).await
            }
            HistoryCommand::Show {
                id,
                thumbnail_out,
                json,
            } => commands::history::show(database, id, thumbnail_out, json, quiet).await,
            HistoryCommand::Delete { ids } => commands::history::delete(database, ids, quiet).await,
            HistoryCommand::Clear => commands::history::clear(database, quiet).await,
        },
    };

    if let Err(err) = result {
        let exit = ExitCode::from_anyhow(&err);
        match (&exit.message, exit.is_fault) {
            (Some(message), true) => eprintln!("{} {}", "Error:".red().bold(), message),
            (Some(message), false) => eprintln!("{}", message.yellow()),
            (None, _) => {}
        }
        std::process::exit(exit.code);
    }
}
