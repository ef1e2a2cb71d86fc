use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use icsi_chat::{
    AnalysisReport, AppConfig, CacheEntry, CorpusStats, FileCache, OpenAiClient, OpenAiConfig,
    VectorIndex, build_chunks, cli, load_transcripts, parse_mrt_file, serve,
};

#[derive(Parser)]
#[command(name = "icsi-chat")]
#[command(author, version, about = "Chat with ICSI Meeting Corpus transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server
    Serve {
        /// Bind host (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Interactive chat against a running API server
    Chat {
        /// API base URL (overrides CLI_API_URL)
        #[arg(long)]
        api_url: Option<String>,
    },

    /// Parse and chunk one transcript without calling the hosted API
    Analyze {
        /// Input MRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Chunk size in tokens (overrides CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Chunk overlap in tokens (overrides CHUNK_OVERLAP)
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Also write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the index from a corpus directory
    Ingest {
        /// Directory of MRT files (overrides DATA_DIR)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;

    // The interactive client keeps stdout for the conversation
    let to_stdout = !matches!(args.command, Commands::Chat { .. });
    let _guard = setup_logging(args.verbose, &config.logs_dir, to_stdout);

    match args.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.api_host = host;
            }
            if let Some(port) = port {
                config.api_port = port;
            }
            config.validate()?;
            serve(config).await
        }
        Commands::Chat { api_url } => {
            let api_url = api_url.unwrap_or_else(|| config.cli_api_url.clone());
            cli::run(&api_url, Duration::from_secs(config.cli_api_timeout_secs)).await
        }
        Commands::Analyze {
            input,
            chunk_size,
            chunk_overlap,
            output,
        } => {
            if let Some(size) = chunk_size {
                config.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                config.chunk_overlap = overlap;
            }
            analyze_transcript(&config, &input, output.as_deref())
        }
        Commands::Ingest { data_dir } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            config.validate()?;
            ingest_corpus(&config).await
        }
    }
}

/// Console plus daily-rotated file logging; the guard flushes the file on drop
fn setup_logging(verbose: bool, logs_dir: &Path, to_stdout: bool) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match std::fs::create_dir_all(logs_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(logs_dir, "icsi-chat.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(e) => {
            eprintln!("Logs directory {:?} unavailable: {}", logs_dir, e);
            (None, None)
        }
    };
    let stdout_layer = to_stdout.then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    guard
}

fn analyze_transcript(config: &AppConfig, input: &Path, output: Option<&Path>) -> Result<()> {
    info!("Analyzing transcript from {:?}", input);
    let chunk_config = config.chunk_config()?;
    let transcript = parse_mrt_file(input, &config.parser_config())
        .context("Failed to parse input transcript")?;

    let chunks_iter = build_chunks(&transcript, &chunk_config)?;
    let total_tokens = chunks_iter.total_tokens();
    let chunks: Vec<_> = chunks_iter.collect();

    let report = AnalysisReport::new(&transcript, &chunks, &chunk_config, total_tokens);
    print!("{}", report.format());

    if let Some(path) = output {
        report.write_json(path)?;
        info!("Report written to {:?}", path);
    }

    Ok(())
}

async fn ingest_corpus(config: &AppConfig) -> Result<()> {
    let chunk_config = config.chunk_config()?;
    let files = load_transcripts(&config.data_dir, &config.parser_config())?;

    let stats = CorpusStats::from_files(&files);
    println!("Loaded {} transcripts", stats.transcripts);
    println!("Total utterances: {} (excluding digit tasks)", stats.utterances);
    println!("Unique speakers: {}", stats.speakers);
    println!("Meeting types: {:?}", stats.meeting_types);

    let client = OpenAiClient::new(OpenAiConfig::from_app_config(config)?);
    config.ensure_directories()?;

    // Full rebuild: the cache must describe exactly what the new index holds
    let mut index = VectorIndex::new();
    let mut cache = FileCache::open(&config.cache_path()).context("Failed to open file cache")?;
    cache.clear()?;

    println!(
        "Creating vector index (chunk size: {} tokens, overlap: {} tokens)...",
        chunk_config.size, chunk_config.overlap
    );
    for file in &files {
        let chunks: Vec<_> = build_chunks(&file.transcript, &chunk_config)?.collect();
        let count = index
            .add_chunks(&client, chunks)
            .await
            .with_context(|| format!("Failed to index {}", file.filename))?;
        cache.record(
            file.content_hash.clone(),
            CacheEntry::new(file.filename.clone(), file.transcript.meeting_id(), count),
        )?;
        info!("Indexed {} ({} chunks)", file.filename, count);
    }

    index.save(&config.storage_dir)?;
    println!(
        "Index persisted to {:?} ({} chunks)",
        config.storage_dir,
        index.len()
    );

    Ok(())
}
