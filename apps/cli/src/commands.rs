//! CLI command definitions, routing, and tracing setup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use redraft_core::{ArticleStore, EnhanceInput, EnhancementWorkflow, WorkflowProgress};
use redraft_scrape::{
    ContentExtractor, ContentSource, ListingExtractor, ListingProgress, RenderEngine,
};
use redraft_search::ReferenceFinder;
use redraft_shared::{
    AppConfig, EnhancementResult, OriginalArticle, init_config, load_config, validate_llm_key,
};
use redraft_synthesis::Synthesizer;
use tracing::{debug, info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Redraft — scrape web articles and rewrite them with reference grounding.
#[derive(Parser)]
#[command(
    name = "redraft",
    version,
    about = "Scrape web articles and produce reference-grounded enhanced rewrites.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Enhance an article with discovered references and LLM synthesis.
    Enhance {
        /// Article id to enhance (the latest stored article is used either way).
        #[arg(long)]
        id: Option<i64>,

        /// Read the article from a JSON file instead of the store.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Persist the enhanced article back to the store.
        #[arg(long)]
        save: bool,
    },

    /// Scrape articles from a blog listing page.
    Scrape {
        /// Listing page URL to scrape.
        url: String,

        /// Number of articles to scrape (1-50).
        #[arg(short, long, default_value = "5")]
        count: usize,

        /// Start from the oldest listing page instead of the newest.
        #[arg(long)]
        oldest: bool,

        /// Persist scraped articles to the store, skipping known URLs.
        #[arg(long)]
        save: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "redraft=info",
        1 => "redraft=debug",
        _ => "redraft=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enhance { id, file, save } => cmd_enhance(id, file.as_deref(), save).await,
        Command::Scrape {
            url,
            count,
            oldest,
            save,
        } => cmd_scrape(&url, count, oldest, save).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// enhance
// ---------------------------------------------------------------------------

async fn cmd_enhance(id: Option<i64>, file: Option<&Path>, save: bool) -> Result<()> {
    // Validate the LLM key before doing anything
    let config = load_config()?;
    validate_llm_key(&config)?;

    let article = match file {
        Some(path) => Some(read_article_file(path)?),
        None => None,
    };
    let input = EnhanceInput {
        article,
        article_id: id,
    };

    let engine = Arc::new(RenderEngine::new(&config.render));
    let content: Arc<dyn ContentSource> =
        Arc::new(ContentExtractor::new(engine.clone(), &config.render)?);
    let finder = ReferenceFinder::from_config(&config.search)?;
    let synthesizer = Synthesizer::from_config(&config.llm)?;
    let store = Arc::new(ArticleStore::new(&config.store)?);

    let workflow = EnhancementWorkflow::new(store.clone(), finder, content, synthesizer);

    info!(
        id = input.article_id,
        from_file = input.article.is_some(),
        "starting enhancement"
    );

    let reporter = CliProgress::new();
    let result = workflow.run(input, &reporter).await?;

    // Print summary
    println!();
    println!("  Article enhanced successfully!");
    println!("  Run:        {}", result.run_id);
    println!(
        "  Original:   #{} {}",
        result.original.id, result.original.title
    );
    println!("  Enhanced:   {}", result.enhanced.title);
    println!("  References: {}", result.references.len());
    for reference in &result.references {
        println!("    - {}", reference.url);
    }
    println!("  Time:       {:.2}s", result.duration.as_secs_f64());

    if save {
        let saved = store
            .create_enhanced(&result.enhanced, result.original.id)
            .await?;
        println!("  Saved:      article #{}", saved.id);
    }
    println!();

    engine.shutdown().await;

    Ok(())
}

/// Read and parse an article JSON file.
fn read_article_file(path: &Path) -> Result<OriginalArticle> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| eyre!("cannot read article file '{}': {e}", path.display()))?;
    serde_json::from_str(&content)
        .map_err(|e| eyre!("invalid article file '{}': {e}", path.display()))
}

// ---------------------------------------------------------------------------
// scrape
// ---------------------------------------------------------------------------

async fn cmd_scrape(url: &str, count: usize, oldest: bool, save: bool) -> Result<()> {
    if !(1..=50).contains(&count) {
        return Err(eyre!("count must be between 1 and 50 (got {count})"));
    }

    let listing_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let config = load_config()?;
    let engine = Arc::new(RenderEngine::new(&config.render));
    let extractor = ListingExtractor::new(engine.clone(), &config.render)?;

    info!(url, count, oldest, "scraping listing");

    let started = Instant::now();
    let reporter = CliProgress::new();
    let articles = extractor
        .scrape_listing(&listing_url, count, oldest, &reporter)
        .await?;
    reporter.finish();

    // Print summary
    println!();
    println!("  Scraped {} article(s)", articles.len());
    for article in &articles {
        println!("    - {}", article.title);
    }
    println!("  Time:    {:.2}s", started.elapsed().as_secs_f64());

    if save {
        let store = ArticleStore::new(&config.store)?;
        let known: HashSet<String> = store
            .list()
            .await?
            .into_iter()
            .filter_map(|article| article.source_url)
            .collect();

        let mut saved = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        for article in &articles {
            if known.contains(&article.source_url) {
                debug!(source_url = %article.source_url, "already stored, skipping");
                skipped += 1;
                continue;
            }
            match store.create_scraped(article).await {
                Ok(created) => {
                    debug!(id = created.id, title = %created.title, "article saved");
                    saved += 1;
                }
                Err(error) => {
                    warn!(source_url = %article.source_url, %error, "failed to save article");
                    failed += 1;
                }
            }
        }

        println!("  Saved:   {saved}");
        println!("  Skipped: {skipped} (already stored)");
        if failed > 0 {
            println!("  Failed:  {failed}");
        }
    }
    println!();

    engine.shutdown().await;

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl WorkflowProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn reference(&self, current: usize, total: usize, url: &str) {
        self.spinner
            .set_message(format!("Scraping reference [{current}/{total}] {url}"));
    }

    fn done(&self, _result: &EnhancementResult) {
        self.spinner.finish_and_clear();
    }
}

impl ListingProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn article(&self, current: usize, total: usize, url: &str) {
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {url}"));
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
