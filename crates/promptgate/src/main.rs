mod cli;
mod config;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::info;

use detection_log::DetectionSink;
use detector_pipeline::{
    PatternDetectorAdapter, Pipeline, PipelineConfig, SemanticDetectorAdapter,
};
use firewall_types::{Severity, ValidateRequest};
use pattern_detect::PatternProvider;
use policy_engine::{load_policy_from_str, PolicyProvider};
use result_cache::{CacheConfig, MemoryStore, ResultCache};
use semantic_detect::{
    Embedder, HashEmbedder, MemoryVectorIndex, ReferenceEntry, SemanticDetector,
};

use crate::cli::{Cli, Command};

/// Fallback policy used when no policy file is configured: allow by default,
/// block high-severity credentials, warn on PII.
const DEFAULT_POLICY_YAML: &str = r#"
policy_id: default
version: 1
enabled: true
semantic_threshold: 0.85
default_action: allow
rules:
  - name: block_credentials
    enabled: true
    match: { categories: [api_keys, private_keys, passwords], min_severity: high }
    action: block
  - name: warn_pii
    enabled: true
    match: { categories: [pii, contextual] }
    action: warn
  - name: block_semantic
    enabled: true
    match: { types: [semantic], min_severity: high }
    action: block
"#;

/// One reference entry in the semantic references file: the text is embedded
/// at startup.
#[derive(Debug, Deserialize)]
struct ReferenceSpec {
    id: String,
    label: String,
    category: String,
    severity: Severity,
    text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let mut cfg = config::load(&cli.config)?;

    if let Some(ref patterns) = cli.patterns {
        cfg.patterns_file = Some(patterns.clone());
    }
    if !cli.policy_files.is_empty() {
        cfg.policy_files = cli.policy_files.clone();
    }

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        config_file = %cli.config.display(),
        deadline_ms = cfg.limits.deadline_ms,
        "promptgate starting"
    );

    // 4. Load the pattern provider.
    let patterns = match &cfg.patterns_file {
        Some(path) => PatternProvider::from_file(path)
            .with_context(|| format!("failed to load pattern file {}", path.display()))?,
        None => PatternProvider::builtin().context("failed to compile built-in patterns")?,
    };
    let patterns = Arc::new(patterns);
    info!(
        patterns = patterns.snapshot().len(),
        "pattern provider ready"
    );

    // 5. Load the policy provider.
    let policies = if cfg.policy_files.is_empty() {
        let default_policy =
            load_policy_from_str(DEFAULT_POLICY_YAML).context("built-in policy is invalid")?;
        PolicyProvider::from_policies(vec![default_policy])
    } else {
        PolicyProvider::from_files(&cfg.policy_files)
    }
    .context("failed to load policies")?;
    let policies = Arc::new(policies);
    info!(policies = ?policies.policy_ids(), "policy provider ready");

    // 6. Start the detection sink.
    let (sink, _sink_handle) = DetectionSink::start(&cfg.logging.detection_log_path)
        .await
        .context("failed to start detection sink")?;

    // 7. Build the pipeline.
    let mut pipeline = Pipeline::new(Arc::clone(&policies))
        .with_detector(Arc::new(PatternDetectorAdapter::new(Arc::clone(&patterns))))
        .with_sink(sink.clone())
        .with_config(PipelineConfig {
            deadline: Duration::from_millis(cfg.limits.deadline_ms),
            max_prompt_bytes: cfg.limits.max_prompt_bytes,
            max_batch_size: cfg.limits.max_batch_size,
        });

    let mut reference_count = 0usize;
    if cfg.semantic.enabled {
        let embedder = Arc::new(HashEmbedder::new(cfg.semantic.dimension));
        let index = load_reference_index(
            cfg.semantic.references_file.as_ref(),
            embedder.as_ref(),
        )
        .await?;
        reference_count = index.len();
        let detector = SemanticDetector::new(embedder, Arc::new(index))
            .with_max_embed_chars(cfg.semantic.max_embed_chars)
            .with_top_k(cfg.semantic.top_k);
        pipeline = pipeline.with_detector(Arc::new(SemanticDetectorAdapter::new(Arc::new(
            detector,
        ))));
        info!(references = reference_count, "semantic detector enabled");
    }

    if cfg.cache.enabled {
        let cache = ResultCache::new(
            CacheConfig {
                l1_capacity: cfg.cache.l1_size,
                l1_ttl: Duration::from_secs(cfg.cache.ttl_l1_secs),
                l2_ttl: Duration::from_secs(cfg.cache.ttl_l2_secs),
            },
            Arc::new(MemoryStore::new()),
        );
        pipeline = pipeline.with_cache(Arc::new(cache));
    }

    // 8. Run the requested command.
    match cli.command {
        Command::Validate {
            prompt,
            policy,
            user,
        } => {
            let text = match prompt {
                Some(text) => text,
                None => read_stdin()?,
            };
            let mut req = ValidateRequest::new(text);
            req.policy_id = policy;
            req.user_id = user;

            let result = pipeline.validate(&req).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Batch { file } => {
            let requests = read_batch_file(&file)?;
            let results = pipeline
                .validate_batch(&requests)
                .await
                .map_err(|e| anyhow::anyhow!("batch rejected: {e}"))?;
            for result in &results {
                println!("{}", serde_json::to_string(result)?);
            }
        }

        Command::Check => {
            let snapshot = patterns.snapshot();
            let summary = serde_json::json!({
                "patterns": snapshot.len(),
                "pattern_categories": snapshot.categories(),
                "contextual_triggers": snapshot.contextual.len(),
                "policies": policies.policy_ids(),
                "semantic_enabled": cfg.semantic.enabled,
                "semantic_references": reference_count,
                "cache_enabled": cfg.cache.enabled,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    // Drop the pipeline's sink handle so the writer drains and exits.
    drop(pipeline);
    drop(sink);
    let _ = _sink_handle.await;

    Ok(())
}

/// Read the whole of stdin as the prompt text.
fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read prompt from stdin")?;
    Ok(text.trim_end_matches('\n').to_string())
}

/// Parse a JSONL file of [`ValidateRequest`] values.
fn read_batch_file(path: &PathBuf) -> Result<Vec<ValidateRequest>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))?;

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid request on line {}", idx + 1))
        })
        .collect()
}

/// Build the vector index from the configured references file, embedding
/// each reference text.
async fn load_reference_index(
    path: Option<&PathBuf>,
    embedder: &HashEmbedder,
) -> Result<MemoryVectorIndex> {
    let mut index = MemoryVectorIndex::new();
    let Some(path) = path else {
        return Ok(index);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read references file {}", path.display()))?;
    let specs: Vec<ReferenceSpec> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse references file {}", path.display()))?;

    for spec in specs {
        let vector = embedder
            .embed(&spec.text)
            .await
            .map_err(|e| anyhow::anyhow!("failed to embed reference '{}': {e}", spec.id))?;
        index.insert(ReferenceEntry {
            id: spec.id,
            label: spec.label,
            category: spec.category,
            severity: spec.severity,
            vector,
        });
    }

    Ok(index)
}
