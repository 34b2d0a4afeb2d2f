use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragdb_cli::{build_retriever, format_results, ingest};
use ragdb_core::config::{Config, Settings};
use ragdb_core::traits::GenerationClient;
use ragdb_core::Modality;
use ragdb_generate::OllamaClient;
use ragdb_retrieve::Retriever;

/// Local multimodal retrieval-augmented QA.
#[derive(Parser, Debug)]
#[command(name = "ragdb", author, about, long_about = None)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, embed and store every supported file under a directory.
    Ingest {
        data_dir: PathBuf,
        /// Only ingest the first N files.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Answer one question.
    Query {
        question: String,
        #[command(flatten)]
        opts: QueryOpts,
    },
    /// Ask questions until `exit`, `quit` or end of input.
    Interactive {
        #[command(flatten)]
        opts: QueryOpts,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct QueryOpts {
    /// Results per modality (defaults to retrieval.top_k).
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
    /// Modalities to search, in output order (default: all configured).
    #[arg(short, long)]
    modality: Vec<Modality>,
    /// Print retrieved context only.
    #[arg(long)]
    no_generate: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if quiet {
        EnvFilter::new("warn")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

fn answer(retriever: &mut Retriever, generator: Option<&OllamaClient>, question: &str, opts: &QueryOpts) -> Result<()> {
    let top_k = opts.top_k.unwrap_or(retriever.options().top_k);
    let modalities = if opts.modality.is_empty() { retriever.store().modalities() } else { opts.modality.clone() };
    let results = retriever.retrieve(question, top_k, &modalities);
    if results.is_empty() {
        println!("No relevant context found.");
        return Ok(());
    }
    print!("{}", format_results(&results));
    let Some(generator) = generator else { return Ok(()) };
    println!("\nAnswer:");
    let mut stdout = io::stdout().lock();
    for fragment in generator.generate_stream(question, &results) {
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn generator_for(settings: &Settings, opts: &QueryOpts) -> Result<Option<OllamaClient>> {
    if opts.no_generate { return Ok(None); }
    Ok(Some(OllamaClient::from_settings(&settings.generation)?))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let settings = Config::load()?.settings()?;

    match cli.command {
        Command::Ingest { data_dir, limit } => {
            let report = ingest(&settings, &data_dir, limit, !cli.quiet)?;
            println!("Ingested {} chunks from {}", report.total_added(), data_dir.display());
            for (modality, n) in &report.added { println!("  {modality}: {n}"); }
            if report.dropped_capacity > 0 { println!("  dropped at capacity: {}", report.dropped_capacity); }
            let skipped = report.skipped_no_embedding + report.skipped_no_collection + report.skipped_bad_dimension;
            if skipped > 0 { println!("  skipped: {skipped}"); }
        }
        Command::Query { question, opts } => {
            let mut retriever = build_retriever(&settings)?;
            let generator = generator_for(&settings, &opts)?;
            answer(&mut retriever, generator.as_ref(), &question, &opts)?;
        }
        Command::Interactive { opts } => {
            let mut retriever = build_retriever(&settings)?;
            let generator = generator_for(&settings, &opts)?;
            let stdin = io::stdin();
            loop {
                print!("\nquestion> ");
                io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 { break; }
                let question = line.trim();
                if question.is_empty() { continue; }
                if matches!(question.to_lowercase().as_str(), "exit" | "quit") { break; }
                answer(&mut retriever, generator.as_ref(), question, &opts)?;
            }
        }
    }
    Ok(())
}
