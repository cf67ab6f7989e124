use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use transllm::config::{Config, ProviderKind};
use transllm::project::{ProjectTranslator, TranslateOptions};
use transllm::transform::{MockTransformer, Transformer, build_transformer};

#[derive(Parser, Debug)]
#[command(
    name = "transllm",
    version,
    about = "Translate comments and strings of a code base while keeping the code intact"
)]
struct Cli {
    /// Project directory to translate
    project: PathBuf,

    /// Config file (JSON)
    #[arg(long, short)]
    config: Option<String>,

    /// Output directory (default: <project>_translated)
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long)]
    target_lang: Option<String>,

    #[arg(long)]
    source_lang: Option<String>,

    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,

    /// API key (default: provider environment variable)
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    model: Option<String>,

    /// Lines per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Concurrent backend requests
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Extra instructions appended to the config's
    #[arg(long)]
    user_rules: Option<String>,

    /// Keep CJK characters untouched and validate that they survive
    #[arg(long)]
    preserve_chinese: bool,

    /// Analyze and print the plan without translating
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn append_instructions(config: &mut Config, text: &str) {
    if !config.custom_instructions.trim().is_empty() {
        config.custom_instructions.push_str("\n\n");
    }
    config.custom_instructions.push_str(text);
}

/// CLI flags override the config file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(lang) = &cli.target_lang {
        config.target_language = lang.clone();
    }
    if let Some(lang) = &cli.source_lang {
        config.source_language = lang.clone();
    }
    if let Some(kind) = cli.provider {
        if kind != config.provider.kind {
            // Model and endpoint belong to the previous provider.
            config.provider.model_name = None;
            config.provider.base_url = None;
        }
        config.provider.kind = kind;
    }
    if let Some(key) = &cli.api_key {
        config.provider.api_key = Some(key.clone());
    }
    if let Some(model) = &cli.model {
        config.provider.model_name = Some(model.clone());
    }
    if let Some(size) = cli.chunk_size {
        config.chunk_size = size;
    }
    if let Some(n) = cli.max_concurrent {
        config.max_concurrent_requests = n;
    }
    if let Some(rules) = &cli.user_rules {
        append_instructions(config, rules);
    }
    if cli.preserve_chinese {
        append_instructions(config, "PRESERVE_CHINESE_CHARACTERS");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref().unwrap_or_default())?;
    apply_overrides(&mut config, &cli);
    config.validate().context("invalid configuration")?;

    let project = cli
        .project
        .canonicalize()
        .with_context(|| format!("project not found: {}", cli.project.display()))?;

    let transformer: Arc<dyn Transformer> = if cli.dry_run {
        Arc::new(MockTransformer::identity())
    } else {
        build_transformer(&config.provider)?
    };
    info!(
        "Translating {} ({} -> {}) with {} / {}",
        project.display(),
        config.source_language,
        config.target_language,
        config.provider.kind.as_str(),
        config.provider.model()
    );

    let options = TranslateOptions {
        output_dir: cli.output.clone(),
        dry_run: cli.dry_run,
        show_progress: true,
    };
    let outcome = ProjectTranslator::new(config, transformer)
        .translate(&project, &options)
        .await?;

    if !cli.dry_run {
        info!(
            "Done: {}/{} chunks translated, {} files with validation errors, output in {}",
            outcome.stats.succeeded,
            outcome.stats.attempted,
            outcome.invalid_files(),
            outcome.output_dir.display()
        );
    }
    Ok(())
}
