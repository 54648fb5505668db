//! # Worksheet Store CLI (`wks`)
//!
//! ## Usage
//!
//! ```bash
//! wks --config ./config/wks.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wks init` | Create the SQLite database and run schema migrations |
//! | `wks import <file>` | Load raw worksheet documents (JSON array or JSON lines) |
//! | `wks serve` | Start the REST API |
//! | `wks list` | Fetch a page from the API and print it |
//! | `wks show <n>` | Fetch a page and render entry `n` |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use worksheet_store::client::{DetailView, ListState, ListView, PageQuery, WorksheetClient};
use worksheet_store::{config, ingest, migrate, server};

/// Worksheet Store CLI: serve and browse generated worksheets.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/wks.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "wks",
    about = "Worksheet Store: paginated, searchable worksheet API and terminal client",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wks.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Import raw worksheet documents from a file.
    ///
    /// Accepts a JSON array of objects or one JSON object per line.
    Import {
        /// Path to the input file.
        path: PathBuf,
    },

    /// Start the REST API on `[server].bind`.
    Serve,

    /// List worksheets from a running server.
    List {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Render one worksheet from a listed page.
    Show {
        /// 1-based position in the page.
        index: usize,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    /// Page number (1-based).
    #[arg(long)]
    page: Option<i64>,

    /// Page size.
    #[arg(long)]
    limit: Option<i64>,

    /// Case-insensitive substring to match against subject or content.
    #[arg(long)]
    search: Option<String>,
}

impl From<PageArgs> for PageQuery {
    fn from(args: PageArgs) -> Self {
        PageQuery {
            page: args.page,
            limit: args.limit,
            search: args.search,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init => {
            let cfg = config::load_config(&cli.config)?;
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { path } => {
            let cfg = config::load_config(&cli.config)?;
            ingest::run_import(&cfg, &path).await?;
        }
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::List { page } => {
            let cfg = config::load_client_config(&cli.config)?;
            let client = WorksheetClient::new(&cfg.client.base_url);
            let mut view = ListView::new();
            view.refresh(&client, &page.into()).await;
            print!("{}", view.render());
            if matches!(view.state(), ListState::Error(_)) {
                std::process::exit(1);
            }
        }
        Commands::Show { index, page } => {
            let cfg = config::load_client_config(&cli.config)?;
            let client = WorksheetClient::new(&cfg.client.base_url);
            let mut view = ListView::new();
            view.refresh(&client, &page.into()).await;

            if let ListState::Error(_) = view.state() {
                print!("{}", view.render());
                std::process::exit(1);
            }
            match index.checked_sub(1).and_then(|i| view.select(i)) {
                Some(record) => print!("{}", DetailView::new(record).render()),
                None => {
                    eprintln!("Error: no worksheet at position {}", index);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
