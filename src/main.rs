use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use lexrag_answer::answer::Answerer;
use lexrag_answer::llm::LlmClient;
use lexrag_core::{LexConfig, LexError, OutputFormat, DEFAULT_CONFIG_FILE};
use lexrag_retrieval::embedding::{EmbeddingClient, API_KEY_ENV};
use lexrag_retrieval::search::HybridSearch;
use lexrag_retrieval::store::StatuteIndex;

#[derive(Parser)]
#[command(
    name = "lexrag",
    version,
    about = "Question answering over statute corpora",
    long_about = "lexrag answers legal questions from a statute corpus.\n\n\
                   It embeds every section into a local index, retrieves the most relevant\n\
                   sections for a question (promoting any section the question names), and\n\
                   asks an LLM to answer from that context only.\n\n\
                   Examples:\n  \
                     lexrag index                         Build the index from data/bns.json\n  \
                     lexrag search 'section 303'          Show the retrieved context\n  \
                     lexrag ask 'What does section 69 say?'  Answer a question\n  \
                     lexrag doctor                        Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .lexrag.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable output (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Build the statute index from a JSON corpus
    #[command(long_about = "Build the statute index from a JSON corpus.\n\n\
        Renders one document per record, embeds every document and replaces the\n\
        index at index.path in a single transaction.\n\n\
        Examples:\n  lexrag index\n  lexrag index --corpus data/ipc.json")]
    Index {
        /// Corpus file (default: index.corpus from config)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Show the context retrieved for a query
    #[command(long_about = "Show the context retrieved for a query.\n\n\
        Runs vector search plus the exact-section fallback, drops near-empty\n\
        documents and prints the joined context. With --format json, prints the\n\
        ranked documents instead.\n\n\
        Examples:\n  lexrag search 'punishment for theft'\n  lexrag search 'section 318' --k 3 --format json")]
    Search {
        /// Search query
        query: String,

        /// Number of nearest neighbours (default: retrieval.k from config)
        #[arg(long)]
        k: Option<usize>,
    },
    /// Answer a question from the statute corpus
    #[command(long_about = "Answer a question from the statute corpus.\n\n\
        Retrieves context and asks the configured LLM to answer from it. When no\n\
        relevant context is found, prints a fixed message without calling the LLM.\n\
        Requires GROQ_API_KEY (or llm.api_key in .lexrag.toml).\n\n\
        Examples:\n  lexrag ask 'What does section 69 say?'")]
    Ask {
        /// Question to answer
        query: String,
    },
    /// Create a default .lexrag.toml configuration file
    #[command(long_about = "Create a default .lexrag.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .lexrag.toml already exists.")]
    Init,
    /// Check your lexrag setup and environment
    #[command(long_about = "Check your lexrag setup and environment.\n\n\
        Runs diagnostics for the config file, API keys, corpus file and index.\n\
        Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mlexrag\x1b[0m v{version} - answers grounded in the statute text\n");

        println!("Quick start:");
        println!("  \x1b[36mlexrag init\x1b[0m              Create a .lexrag.toml config file");
        println!("  \x1b[36mlexrag index\x1b[0m             Build the index from the corpus");
        println!("  \x1b[36mlexrag ask '...'\x1b[0m         Ask a question\n");

        println!("All commands:");
        println!("  \x1b[32mindex\x1b[0m    Build the statute index");
        println!("  \x1b[32msearch\x1b[0m   Show retrieved context for a query");
        println!("  \x1b[32mask\x1b[0m      Answer a question with the LLM");
        println!("  \x1b[32mdoctor\x1b[0m   Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m     Create default configuration\n");
    } else {
        println!("lexrag v{version} - answers grounded in the statute text\n");

        println!("Quick start:");
        println!("  lexrag init              Create a .lexrag.toml config file");
        println!("  lexrag index             Build the index from the corpus");
        println!("  lexrag ask '...'         Ask a question\n");

        println!("All commands:");
        println!("  index    Build the statute index");
        println!("  search   Show retrieved context for a query");
        println!("  ask      Answer a question with the LLM");
        println!("  doctor   Check your setup and environment");
        println!("  init     Create default configuration\n");
    }

    println!("Run 'lexrag <command> --help' for details.");
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Open the index for queries and refuse one built with another model.
fn open_search(config: &LexConfig) -> Result<HybridSearch<EmbeddingClient>> {
    let index = StatuteIndex::open_read_only(&config.index.path).map_err(|e| match e {
        e @ LexError::FileNotFound(_) => miette::miette!(
            help = "build the index first with `lexrag index`",
            "{e}"
        ),
        other => miette::Report::new(other),
    })?;
    let embedder = EmbeddingClient::with_config(&config.embedding)?;
    index.check_model(&config.embedding.model)?;
    Ok(HybridSearch::new(index, embedder).with_policy(config.retrieval.clone()))
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn run_doctor(
    config: &LexConfig,
    config_path: &Path,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    if config_path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{} found", config_path.display()),
        ));
    } else {
        checks.push(CheckResult::info(
            "config_file",
            format!("{} not found, using defaults", config_path.display()),
        ));
    }

    // 2. Generation service + API key
    let llm_env_var = &config.llm.api_key_env;
    checks.push(CheckResult::pass(
        "llm_provider",
        format!("{} (model: {})", config.llm.base_url, config.llm.model),
    ));
    if config.llm.api_key.is_some() || std::env::var(llm_env_var).is_ok() {
        checks.push(CheckResult::pass("llm_api_key", format!("{llm_env_var} set")));
    } else {
        checks.push(CheckResult::fail(
            "llm_api_key",
            format!("{llm_env_var} not set"),
            format!("export {llm_env_var}=... or set api_key in .lexrag.toml [llm]"),
        ));
    }

    // 3. Embedding service
    checks.push(CheckResult::pass(
        "embedding_provider",
        format!(
            "{} (model: {}, {} dims)",
            config.embedding.base_url, config.embedding.model, config.embedding.dimensions
        ),
    ));
    if config.embedding.api_key.is_some() || std::env::var(API_KEY_ENV).is_ok() {
        checks.push(CheckResult::pass(
            "embedding_api_key",
            format!("{API_KEY_ENV} set"),
        ));
    } else {
        checks.push(CheckResult::info(
            "embedding_api_key",
            format!("{API_KEY_ENV} not set (fine for local endpoints)"),
        ));
    }

    // 4. Corpus
    if config.index.corpus.exists() {
        match lexrag_retrieval::corpus::load_corpus(&config.index.corpus) {
            Ok(records) => checks.push(CheckResult::pass(
                "corpus",
                format!("{} ({} records)", config.index.corpus.display(), records.len()),
            )),
            Err(e) => checks.push(CheckResult::fail(
                "corpus",
                e.to_string(),
                "the corpus must be a JSON array of section records",
            )),
        }
    } else {
        checks.push(CheckResult::fail(
            "corpus",
            format!("{} not found", config.index.corpus.display()),
            "set index.corpus in .lexrag.toml or pass --corpus to 'lexrag index'",
        ));
    }

    // 5. Index
    match StatuteIndex::open_read_only(&config.index.path) {
        Ok(index) => {
            let stats = index.stats()?;
            let meta = index.metadata()?;
            let built = meta.built_at.as_deref().unwrap_or_default();
            checks.push(CheckResult::pass(
                "statute_index",
                format!("{} documents, built {built}", stats.total_documents),
            ));
            match index.check_model(&config.embedding.model) {
                Ok(()) => checks.push(CheckResult::pass(
                    "index_model",
                    meta.model.unwrap_or_else(|| "unrecorded".into()),
                )),
                Err(e) => checks.push(CheckResult::fail(
                    "index_model",
                    e.to_string(),
                    "run 'lexrag index' to rebuild",
                )),
            }
        }
        Err(LexError::FileNotFound(_)) => checks.push(CheckResult::info(
            "statute_index",
            format!(
                "{} not found (run 'lexrag index' to create)",
                config.index.path.display()
            ),
        )),
        Err(e) => checks.push(CheckResult::fail(
            "statute_index",
            e.to_string(),
            "run 'lexrag index' to rebuild",
        )),
    }

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Text => {
            let version = env!("CARGO_PKG_VERSION");
            println!("lexrag v{version} - Environment Check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# lexrag configuration

[llm]
# OpenAI-compatible chat completions endpoint
# base_url = "https://api.groq.com/openai"
# model = "llama3-70b-8192"
# api_key_env = "GROQ_API_KEY"
# temperature = 0.2
# timeout_secs = 120

[embedding]
# OpenAI-compatible embeddings endpoint
# base_url = "http://localhost:8080"
# model = "sentence-transformers/all-mpnet-base-v2"
# dimensions = 768
# timeout_secs = 60

[index]
# path = ".lexrag/index.db"
# corpus = "data/bns.json"
# label = "BNS Section"

[retrieval]
# k = 5
# min_chars = 30
# section_fallback = true
# dedupe = false
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir().into_diagnostic()?;
    let config = LexConfig::load(cli.config.as_deref(), &cwd)?;
    tracing::debug!(format = %cli.format, index = %config.index.path.display(), "configuration loaded");

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Index { ref corpus }) => {
            let corpus_path = corpus.as_deref().unwrap_or(&config.index.corpus);
            let records = lexrag_retrieval::corpus::load_corpus(corpus_path)?;
            let embedder = EmbeddingClient::with_config(&config.embedding)?;
            let mut index = StatuteIndex::open(&config.index.path)?;

            let pb = spinner("Embedding statute sections...");
            let result = lexrag_retrieval::indexer::build_index(
                &records,
                &embedder,
                &mut index,
                &config.index.label,
            )
            .await;
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }
            let stats = result?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
                }
                OutputFormat::Text => {
                    println!(
                        "Indexed {} documents from {} into {} ({} bytes)",
                        stats.total_documents,
                        corpus_path.display(),
                        config.index.path.display(),
                        stats.index_size_bytes,
                    );
                }
            }
        }
        Some(Command::Search { ref query, k }) => {
            let search = open_search(&config)?;
            let k = k.unwrap_or(config.retrieval.k);
            if k == 0 {
                miette::bail!("--k must be at least 1");
            }

            match cli.format {
                OutputFormat::Json => {
                    let documents = search.retrieve(query, k).await?;
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&documents).into_diagnostic()?
                    );
                }
                OutputFormat::Text => match search.search(query, k).await? {
                    Some(context) => println!("{context}"),
                    None => println!("No relevant context found."),
                },
            }
        }
        Some(Command::Ask { ref query }) => {
            let search = open_search(&config)?;
            let generator = LlmClient::new(&config.llm)?;
            let answerer = Answerer::new(search, generator);

            let pb = spinner("Consulting the statute...");
            let result = answerer.respond(query).await;
            if let Some(pb) = &pb {
                pb.finish_and_clear();
            }
            let answer = result?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&answer).into_diagnostic()?);
                }
                OutputFormat::Text => println!("{}", answer.text),
            }
        }
        Some(Command::Init) => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                miette::bail!("{DEFAULT_CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {DEFAULT_CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_FILE));
            run_doctor(&config, &config_path, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lexrag", &mut std::io::stdout());
        }
    }

    Ok(())
}
