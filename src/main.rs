use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use docsage::cache::{Cache, DiskCache};
use docsage::config::{Config, EnhancementFeature};
use docsage::enhancement::EnhancementProcessor;
use docsage::providers::{create_provider, AiProvider, RetryPolicy};
use docsage::search::{PageSource, SearchService};

mod cli;

use cli::{CacheAction, Command};

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    init_logging(args.verbose || config.debug);

    let base = base_dir(&args.config);

    match args.command {
        Command::Index { docs_dir } => {
            if !config.search.enabled {
                bail!("search is disabled in {}", args.config.display());
            }
            let pages = collect_pages(&docs_dir)?;
            if pages.is_empty() {
                log::warn!("no markdown files under {}", docs_dir.display());
            }

            let mut service = SearchService::new(
                config.search.clone(),
                base.join(&config.search.index_path),
                build_provider(&config)?,
                build_cache(&config, &base)?,
            );
            let chunks = service.index_pages(pages)?;
            service.save()?;

            println!("{}", serde_json::to_string_pretty(&service.stats())?);
            log::info!("index written path={} chunks={chunks}", service.index_path().display());
        }

        Command::Search {
            query,
            limit,
            semantic_weight,
        } => {
            let service = open_search(&config, &base)?;
            let results = service.search(&query, limit, semantic_weight);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Command::Stats {} => {
            let service = open_search(&config, &base)?;
            println!("{}", serde_json::to_string_pretty(&service.stats())?);
        }

        Command::Enhance {
            file,
            apply,
            features,
        } => {
            let processor = EnhancementProcessor::new(
                build_provider(&config)?,
                build_cache(&config, &base)?,
                config.enhancement.clone(),
            )
            .with_retry(RetryPolicy::from_config(&config.provider));
            if !processor.should_enhance(&file) {
                log::warn!("{} is disabled or excluded by config", file.display());
            }

            let mut options = processor.options();
            if let Some(features) = features {
                let features: Vec<EnhancementFeature> =
                    features.into_iter().map(Into::into).collect();
                options.grammar = features.contains(&EnhancementFeature::Grammar);
                options.clarity = features.contains(&EnhancementFeature::Clarity);
                options.consistency = features.contains(&EnhancementFeature::Consistency);
            }

            let result = processor.enhance_file(&file, &options)?;
            println!("{}", result.summary());
            for change in &result.changes {
                println!("  {change}");
            }
            if !result.diff.is_empty() {
                println!("\n{}", result.diff);
            }

            if apply && result.enhanced != result.original {
                processor.apply(&file, &result)?;
                println!("Applied to {}", file.display());
            }
        }

        Command::Cache { action } => {
            let cache = DiskCache::from_config(&config.cache, &base)?;
            match action {
                CacheAction::Stats {} => {
                    println!("{}", serde_json::to_string_pretty(&cache.stats())?);
                }
                CacheAction::Clear {} => {
                    let removed = cache.clear()?;
                    println!("Removed {removed} cache entries");
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Relative paths in the config resolve against the config file's directory.
fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn AiProvider>> {
    let provider = create_provider(&config.provider)
        .with_context(|| format!("failed to create provider {:?}", config.provider.name))?;
    Ok(Arc::from(provider))
}

fn build_cache(config: &Config, base: &Path) -> anyhow::Result<Option<Arc<dyn Cache>>> {
    if !config.cache.enabled {
        return Ok(None);
    }
    let cache: Arc<dyn Cache> = Arc::new(DiskCache::from_config(&config.cache, base)?);
    Ok(Some(cache))
}

fn open_search(config: &Config, base: &Path) -> anyhow::Result<SearchService> {
    let service = SearchService::open(
        config.search.clone(),
        base.join(&config.search.index_path),
        build_provider(config)?,
        build_cache(config, base)?,
    )?;
    Ok(service)
}

/// Every `*.md` file under `docs_dir`, sorted by path.
fn collect_pages(docs_dir: &Path) -> anyhow::Result<Vec<PageSource>> {
    let mut files = Vec::new();
    walk_markdown(docs_dir, &mut files)
        .with_context(|| format!("failed to read {}", docs_dir.display()))?;
    files.sort();

    let mut pages = Vec::with_capacity(files.len());
    for file in files {
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let relative = file.strip_prefix(docs_dir).unwrap_or(&file);
        let title = page_title(&content).unwrap_or_else(|| {
            file.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        pages.push(PageSource::new(page_url(relative), title, content));
    }
    Ok(pages)
}

fn walk_markdown(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_markdown(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    Ok(())
}

/// Site URL of a page: `guide/setup.md` is `/guide/setup/`, `index.md` is `/`.
fn page_url(relative: &Path) -> String {
    let mut parts: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.last().is_some_and(|last| last == "index") {
        parts.pop();
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", parts.join("/"))
    }
}

fn page_title(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("# "))
        .map(|line| line[2..].trim().to_string())
}
