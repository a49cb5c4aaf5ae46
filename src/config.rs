use crate::cli::Args;
use crate::error::ValidationResult;
use crate::services::matching::types::{TopN, WeightMap, DEFAULT_TOP_N, DEFAULT_WEIGHT};
use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CONFIG_PATH_ENV: &str = "TWIN_MATCH_CONFIG_PATH";
const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    default_weight: Option<f64>,
    #[serde(default)]
    top_n: Option<i64>,
    #[serde(default)]
    output_dir: Option<String>,
    #[serde(default)]
    parallel: Option<bool>,
    #[serde(default)]
    preview_rows: Option<usize>,
}

/// Run configuration. Layers, lowest first: defaults, config file,
/// `TWIN_MATCH_*` environment, command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Explicit per-metric weights; `None` means every metric gets `default_weight`.
    pub weights: Option<BTreeMap<String, f64>>,
    pub default_weight: f64,
    pub top_n: i64,
    pub output_dir: PathBuf,
    pub parallel: bool,
    pub preview_rows: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: None,
            default_weight: DEFAULT_WEIGHT,
            top_n: DEFAULT_TOP_N,
            output_dir: PathBuf::from("."),
            parallel: false,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl MatchConfig {
    pub fn load(args: &Args) -> Result<Self> {
        dotenv().ok();

        let mut config = Self::default();
        if let Some(file) = load_config_file(args.config.as_deref())? {
            config.apply_file(file);
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args)?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(weights) = file.weights {
            self.weights = Some(weights);
        }
        if let Some(weight) = file.default_weight {
            self.default_weight = weight;
        }
        if let Some(top_n) = file.top_n {
            self.top_n = top_n;
        }
        if let Some(dir) = file
            .output_dir
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(parallel) = file.parallel {
            self.parallel = parallel;
        }
        if let Some(rows) = file.preview_rows {
            self.preview_rows = rows;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(raw) = get("TWIN_MATCH_TOP_N") {
            self.top_n = raw.parse().context("invalid TWIN_MATCH_TOP_N")?;
        }
        if let Some(raw) = get("TWIN_MATCH_DEFAULT_WEIGHT") {
            self.default_weight = raw.parse().context("invalid TWIN_MATCH_DEFAULT_WEIGHT")?;
        }
        if let Some(raw) = get("TWIN_MATCH_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = get("TWIN_MATCH_PARALLEL") {
            self.parallel = parse_bool(&raw).context("invalid TWIN_MATCH_PARALLEL")?;
        }
        if let Some(raw) = get("TWIN_MATCH_PREVIEW_ROWS") {
            self.preview_rows = raw.parse().context("invalid TWIN_MATCH_PREVIEW_ROWS")?;
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &Args) -> Result<()> {
        if let Some(path) = &args.weights {
            self.weights = Some(read_weights_file(path)?);
        }
        if !args.weight.is_empty() {
            let weights = self.weights.get_or_insert_with(BTreeMap::new);
            for (metric, weight) in &args.weight {
                weights.insert(metric.clone(), *weight);
            }
        }
        if let Some(weight) = args.default_weight {
            self.default_weight = weight;
        }
        if let Some(top_n) = args.top_n {
            self.top_n = top_n;
        }
        if let Some(dir) = &args.output_dir {
            self.output_dir = dir.clone();
        }
        if args.parallel {
            self.parallel = true;
        }
        if let Some(rows) = args.preview_rows {
            self.preview_rows = rows;
        }
        Ok(())
    }

    pub fn top_n(&self) -> ValidationResult<TopN> {
        TopN::new(self.top_n)
    }

    pub fn weight_map(&self, metrics: &[String]) -> ValidationResult<WeightMap> {
        match &self.weights {
            Some(weights) => WeightMap::new(weights.clone()),
            None => WeightMap::uniform(metrics, self.default_weight),
        }
    }
}

/// An explicit `--config` must load; a path from the environment that cannot
/// be read is logged and skipped.
fn load_config_file(explicit: Option<&Path>) -> Result<Option<ConfigFile>> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        return Ok(Some(file));
    }

    let Some(path) = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
    else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read run config; using defaults"
            );
            return Ok(None);
        }
    };
    match serde_json::from_str(&contents) {
        Ok(file) => Ok(Some(file)),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse run config; using defaults"
            );
            Ok(None)
        }
    }
}

fn read_weights_file(path: &Path) -> Result<BTreeMap<String, f64>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).context("failed to parse weights JSON (expected {\"metric\": weight})")
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
