//! ndb: command line driver for a notedb store.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memmap2::Mmap;
use tracing_subscriber::EnvFilter;

use notedb::storage::db::Db;
use notedb::{CommonKind, Config, FieldKind, Filter, Ndb, SortOrder, Stat, TextSearchConfig};

/// Largest result set the query command prints.
const QUERY_CAPACITY: usize = 10_000;

#[derive(Parser, Debug)]
#[command(name = "ndb")]
#[command(about = "Embedded nostr note store")]
struct Args {
    /// Skip signature validation on import
    #[arg(long, global = true)]
    skip_verification: bool,

    /// Database directory
    #[arg(short = 'd', long = "dir", default_value = ".", global = true)]
    dir: PathBuf,

    /// Ceiling for the mapped data file, in bytes
    #[arg(long, default_value_t = 1 << 40, global = true)]
    mapsize: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per sub-store and per kind record counts and sizes
    Stat,

    /// Full-text search
    Search {
        /// Order by creation time instead of relevance
        #[arg(long)]
        oldest_first: bool,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        query: String,
    },

    /// Filter query, newest first
    Query {
        /// Note kind, repeatable
        #[arg(short = 'k', long = "kind")]
        kinds: Vec<u64>,

        /// Author pubkey in hex, repeatable
        #[arg(short = 'a', long = "author")]
        authors: Vec<String>,

        /// Value of a `t` tag, repeatable
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,

        /// Only notes created at or after this time
        #[arg(short = 's', long)]
        since: Option<u64>,

        /// Only notes created before this time
        #[arg(short = 'u', long)]
        until: Option<u64>,

        /// Maximum number of results
        #[arg(short = 'l', long)]
        limit: Option<u64>,
    },

    /// Import line-delimited JSON notes from a file, or `-` for stdin
    Import { path: String },

    /// Dump the content index keys
    PrintSearchKeys,

    /// Dump the kind index keys
    PrintKindKeys,

    /// Dump the tag index keys
    PrintTagKeys,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::default()
        .with_mapsize(args.mapsize)
        .with_skip_verification(args.skip_verification);

    eprintln!("using db '{}'", args.dir.display());
    let ndb = Ndb::open(&args.dir, config)
        .with_context(|| format!("opening store at {}", args.dir.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Stat => print_stat(&mut out, &ndb.stat()?)?,
        Command::Search { oldest_first, limit, query } => {
            let mut search_config = TextSearchConfig::default();
            if oldest_first {
                search_config = search_config.with_order(SortOrder::Asc);
            }
            if let Some(limit) = limit {
                search_config = search_config.with_limit(limit);
            }

            let txn = ndb.begin_query();
            let start = Instant::now();
            let results = txn.text_search(&query, &search_config)?;
            eprintln!("{} results in {:.3} ms", results.len(), elapsed_ms(start));

            for (i, result) in results.iter().enumerate() {
                writeln!(
                    out,
                    "[{:02}] {:.4}\t{}\t{}\t{}",
                    i + 1,
                    result.score,
                    result.note.kind,
                    result.note.created_at,
                    result.note.content
                )?;
            }
        }
        Command::Query { kinds, authors, tags, since, until, limit } => {
            let mut builder = Filter::builder();
            if !kinds.is_empty() {
                builder.int_field(FieldKind::Kinds, &kinds)?;
            }
            if !authors.is_empty() {
                let authors: Vec<&str> = authors.iter().map(String::as_str).collect();
                builder.str_field(FieldKind::Authors, &authors)?;
            }
            if !tags.is_empty() {
                let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                builder.str_field(FieldKind::Tags('t'), &tags)?;
            }
            if let Some(since) = since {
                builder.int_field(FieldKind::Since, &[since])?;
            }
            if let Some(until) = until {
                builder.int_field(FieldKind::Until, &[until])?;
            }
            if let Some(limit) = limit {
                builder.int_field(FieldKind::Limit, &[limit])?;
            }
            let filter = builder.finish()?;

            let txn = ndb.begin_query();
            let start = Instant::now();
            let results = txn.query(&[filter], QUERY_CAPACITY)?;
            eprintln!("{} results in {:.3} ms", results.len(), elapsed_ms(start));

            for result in &results {
                writeln!(out, "{}\t{}\t{}", result.note.kind, result.note.created_at, result.note.content)?;
            }
        }
        Command::Import { path } => {
            let stats = if path == "-" {
                ndb.process_events_stream(io::stdin().lock())?
            } else {
                let file = File::open(&path).with_context(|| format!("opening {}", path))?;
                // SAFETY: the input file is only read, and only for the duration of the import
                let data = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping {}", path))?;
                ndb.process_events(&data)?
            };
            eprintln!("{}", stats);
        }
        Command::PrintSearchKeys => print_lines(&mut out, ndb.begin_query().search_keys()?)?,
        Command::PrintKindKeys => print_lines(&mut out, ndb.begin_query().kind_keys()?)?,
        Command::PrintTagKeys => print_lines(&mut out, ndb.begin_query().tag_keys()?)?,
    }

    Ok(())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn print_lines(out: &mut impl Write, lines: Vec<String>) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn print_stat(out: &mut impl Write, stat: &Stat) -> io::Result<()> {
    writeln!(out, "name\tcount\tkey_bytes\tvalue_bytes\ttotal_bytes")?;
    writeln!(out, "---\ndbs\n---")?;
    for db in Db::ALL {
        writeln!(out, "{}\t{}", db.name(), stat.db(db))?;
    }
    writeln!(out, "total\t{}", stat.total())?;

    writeln!(out, "-----\nkinds\n-----")?;
    for kind in CommonKind::ALL {
        let counts = stat.kind(kind);
        if counts.count > 0 {
            writeln!(out, "{}\t{}", kind.name(), counts)?;
        }
    }
    if stat.other_kinds.count > 0 {
        writeln!(out, "other\t{}", stat.other_kinds)?;
    }
    Ok(())
}
