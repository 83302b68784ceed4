//! ragdesk CLI entry point

use clap::{Parser, Subcommand};
use ragdesk::{
    assistant::Assistant,
    config::Config,
    db::{PgSource, RelationalSource},
    embed::OllamaEmbedder,
    error::Result,
    ingest::PdfLoader,
    llm::OllamaCompleter,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ragdesk")]
#[command(version, about = "Ask questions over PDF documents and Postgres tables", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Postgres connection URL (overrides config)
    #[arg(long, global = true, env = "RAGDESK_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive question-answering session
    Chat {
        /// PDF document to ingest before the first question
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Tables to ingest before the first question (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,
    },

    /// List tables available in the connected database
    Tables,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "ragdesk=debug" } else { "ragdesk=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    if cli.database_url.is_some() {
        config.database.url = cli.database_url.clone();
    }
    Ok(config)
}

async fn build_assistant(config: Config) -> Result<Assistant> {
    let embedder = Arc::new(OllamaEmbedder::new(&config.embedding)?);
    let completer = Arc::new(OllamaCompleter::new(&config.model)?);
    let source = match &config.database.url {
        Some(url) => Some(Arc::new(PgSource::connect(url, &config.database).await?)
            as Arc<dyn RelationalSource>),
        None => None,
    };
    Assistant::new(config, embedder, completer, Arc::new(PdfLoader), source)
}

const HELP: &str = "\
Commands:
  /ingest <path.pdf>      ingest a PDF document
  /tables <t1,t2,...>     ingest database tables
  /insights <t1,t2,...>   sample the tables and summarize
  /clear                  drop the current index
  /help                   show this help
  /quit                   exit
Anything else is asked as a question.";

fn parse_names(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn run_chat(assistant: Assistant, pdf: Option<PathBuf>, tables: Vec<String>) -> Result<()> {
    if let Some(path) = pdf {
        match assistant.ingest_document(&path).await {
            Ok(report) => println!("Ingested {}: {}", path.display(), report),
            Err(err) => println!("Error during document ingestion: {}", err),
        }
    }
    if !tables.is_empty() {
        match assistant.ingest_tables(&tables).await {
            Ok(report) => println!("Ingested tables: {}", report),
            Err(err) => println!("Error during database ingestion: {}", err),
        }
    }

    println!("{}", HELP);
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix('/') {
            let (command, arg) = rest.split_once(' ').unwrap_or((rest, ""));
            match command {
                "quit" | "exit" => break,
                "help" => println!("{}", HELP),
                "clear" => {
                    assistant.clear().await;
                    println!("Cleared.");
                }
                "ingest" => match assistant.ingest_document(Path::new(arg)).await {
                    Ok(report) => println!("{}", report),
                    Err(err) => println!("Error during document ingestion: {}", err),
                },
                "tables" => match assistant.ingest_tables(&parse_names(arg)).await {
                    Ok(report) => println!("{}", report),
                    Err(err) => println!("Error during database ingestion: {}", err),
                },
                "insights" => match assistant.generate_insights(&parse_names(arg), "").await {
                    Ok(summary) => println!("{}", summary),
                    Err(err) => println!("Error generating insights: {}", err),
                },
                other => println!("Unknown command: /{}", other),
            }
            continue;
        }

        println!("{}", assistant.ask(line).await);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        error!("{}", err);
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Chat { pdf, tables } => {
            let assistant = build_assistant(config).await?;
            run_chat(assistant, pdf, tables).await
        }
        Commands::Tables => {
            let assistant = build_assistant(config).await?;
            for table in assistant.list_tables().await? {
                println!("{}", table);
            }
            Ok(())
        }
    }
}
