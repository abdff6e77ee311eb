//! idxstore CLI
//!
//! Inspect, append to and re-index indexed record files.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use idxstore::{
    default_index_path, rebuild_index, IndexedReader, IndexedWriter, JsonLineCodec,
    MsgpackArrayCodec, MsgpackCodec, ReaderOptions, RecordCodec, Result, SliceSpec, StoreError,
    SyncStrategy, TextCodec, WriterOptions,
};

/// Records indexed between progress log lines during a rebuild
const PROGRESS_INTERVAL: u64 = 100_000;

/// idxstore
#[derive(Parser, Debug)]
#[command(name = "idxstore")]
#[command(about = "Random access to records in indexed data files")]
#[command(version)]
struct Args {
    /// Record format of the data file
    #[arg(short, long, value_enum, default_value = "jsonline")]
    format: Format,

    /// Index file (defaults to <data>.idx)
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Data file
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Jsonline,
    Msgpack,
    /// MessagePack values inside one array32 container
    MsgpackArray,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the number of records
    Len,

    /// Print one record (negative positions count from the end)
    Get {
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },

    /// Print the records selected by start:stop[:step]
    Slice {
        #[arg(allow_hyphen_values = true)]
        range: SliceSpec,
    },

    /// Print every record
    Cat,

    /// Print the byte offset of every record
    Offsets,

    /// Append records given as arguments (JSON for jsonline/msgpack)
    Append {
        /// Truncate the data file and start a fresh index
        #[arg(long)]
        create: bool,

        /// Sync data and index every N appends instead of only at close
        #[arg(long)]
        sync_every: Option<usize>,

        #[arg(required = true)]
        records: Vec<String>,
    },

    /// Rebuild the index from the data file
    Rebuild,
}

fn main() {
    // Initialize tracing/logging; stdout is reserved for records
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,idxstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let index_path = args
        .index
        .clone()
        .unwrap_or_else(|| default_index_path(&args.data));

    tracing::debug!("idxstore v{}", idxstore::VERSION);
    tracing::debug!("Data file: {}", args.data.display());
    tracing::debug!("Index file: {}", index_path.display());

    let result = match args.format {
        Format::Text => run(&args, &index_path, TextCodec::new(), parse_text, |line: &String| {
            line.clone()
        }),
        Format::Jsonline => run(
            &args,
            &index_path,
            JsonLineCodec::<Value>::new(),
            parse_json,
            Value::to_string,
        ),
        Format::Msgpack => run(
            &args,
            &index_path,
            MsgpackCodec::<Value>::new(),
            parse_json,
            Value::to_string,
        ),
        Format::MsgpackArray => run(
            &args,
            &index_path,
            MsgpackArrayCodec::<Value>::new(),
            parse_json,
            Value::to_string,
        ),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run<C, P, S>(args: &Args, index_path: &Path, codec: C, parse: P, show: S) -> Result<()>
where
    C: RecordCodec,
    P: Fn(&str) -> Result<C::Record>,
    S: Fn(&C::Record) -> String,
{
    match &args.command {
        Commands::Append {
            create,
            sync_every,
            records,
        } => {
            let records = records
                .iter()
                .map(|record| parse(record))
                .collect::<Result<Vec<_>>>()?;

            let sync_strategy = match *sync_every {
                None => SyncStrategy::OnClose,
                Some(1) => SyncStrategy::EveryAppend,
                Some(count) => SyncStrategy::EveryNAppends { count },
            };
            let options = WriterOptions::builder()
                .append(!create)
                .sync_strategy(sync_strategy)
                .build();

            let mut writer = IndexedWriter::open_with_index(&args.data, index_path, codec, options)?;
            let written = writer.extend(&records)?;
            let len = writer.len();
            writer.close()?;

            tracing::info!(written, len, "appended records");
            Ok(())
        }

        Commands::Rebuild => {
            let outcome = rebuild_index(&args.data, index_path, &codec, |count| {
                if count % PROGRESS_INTERVAL == 0 {
                    tracing::info!(count, "indexed records");
                }
            })?;
            println!("{}", outcome.count());
            Ok(())
        }

        command => {
            let mut reader = IndexedReader::open_with_index(
                &args.data,
                index_path,
                codec,
                ReaderOptions::default(),
            )?;
            match command {
                Commands::Len => println!("{}", reader.len()),
                Commands::Get { index } => println!("{}", show(&reader.get(*index)?)),
                Commands::Slice { range } => {
                    for record in reader.slice(*range)? {
                        println!("{}", show(&record?));
                    }
                }
                Commands::Cat => {
                    for record in reader.iter()? {
                        println!("{}", show(&record?));
                    }
                }
                Commands::Offsets => {
                    for offset in reader.offsets()? {
                        println!("{}", offset);
                    }
                }
                Commands::Append { .. } | Commands::Rebuild => {}
            }
            reader.close()
        }
    }
}

fn parse_text(record: &str) -> Result<String> {
    Ok(record.to_string())
}

fn parse_json(record: &str) -> Result<Value> {
    serde_json::from_str(record).map_err(|e| StoreError::Encode(format!("{:?}: {}", record, e)))
}
