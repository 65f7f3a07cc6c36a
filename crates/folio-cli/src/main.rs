//! folio command line.
//!
//! Reads the persisted record cache of one workspace and prints what it finds.
//!
//! Usage:
//!   folio records
//!   folio --user u1 show block 3f2a...
//!   folio --config folio.ron export <page-id> > page.md
//!
//! Logs go to stderr; `RUST_LOG` overrides the default `info` filter.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use folio_store::{RecordCacheStore, RecordDb, StoreConfig, StoreContext, export_markdown};
use folio_types::{CacheKey, Pointer, Table, UserId};

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Inspect and export folio's persisted record cache")]
struct Args {
    /// RON config file (missing file means defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Whose view of the records to read
    #[arg(short, long, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cached record keys for the user
    Records,
    /// Print one record as JSON
    Show {
        /// block, page, space, or space_root
        table: String,
        id: String,
    },
    /// List the user's spaces and their pages
    Spaces,
    /// Render a page as Markdown
    Export { page_id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::default(),
    };

    let db_path = config.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let db = RecordDb::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    let cache = RecordCacheStore::with_db(db, config.workspace.clone());
    let loaded = cache.hydrate()?;
    tracing::info!(
        workspace = %config.workspace,
        path = %db_path.display(),
        loaded,
        "record cache loaded"
    );

    let ctx = StoreContext::new(cache.into());
    let user = UserId::new(args.user);

    match args.command {
        Command::Records => {
            for key in ctx.cache().keys_for_user(&user) {
                let version = CacheKey::parse(key.as_str())
                    .map(|(table, id, _)| ctx.cache().get_version(&user, &Pointer::new(table, id)))
                    .unwrap_or_default();
                println!("{key}\tv{version}");
            }
        }
        Command::Show { table, id } => {
            let Some(table) = Table::from_str(&table) else {
                bail!("unknown table {table:?}");
            };
            let pointer = Pointer::new(table, id);
            let Some(record) = ctx.cache().get_record(&user, &pointer) else {
                bail!("no cached record {pointer} for {user}");
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Spaces => {
            for space in ctx.space_root_store(&user).space_stores() {
                println!("{}\t{}", space.id(), space.name());
                for page in space.page_stores() {
                    println!("  {}\t{}", page.id(), page.plain_title());
                }
            }
        }
        Command::Export { page_id } => {
            let page = ctx.page_store(&user, &page_id);
            if !page.exists() {
                bail!("no cached page {page_id} for {user}");
            }
            print!("{}", export_markdown(&page));
        }
    }
    Ok(())
}
