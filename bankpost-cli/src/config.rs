use anyhow::{Context, Result};
use bankpost_core::{ConfigurationError, ExpectedMonth, SourceType};
use bankpost_ledger::{DEFAULT_THRESHOLD, NameResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::{ensure_bankpost_home, resolve_under};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub ledger: LedgerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Processing month as `MMM'YY`, e.g. `Aug'25`.
    pub expected_month: String,
    pub similarity_threshold: f64,
    pub inbox_dir: PathBuf,
    pub customer_db_dir: PathBuf,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    /// Source tags processed by `bankpost run`, in order.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    pub base_url: String,
    pub company_id: String,
    pub timeout_secs: u64,
    /// Journal id per source tag.
    #[serde(default)]
    pub journals: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineSection {
                expected_month: ExpectedMonth::from_date(chrono::Local::now().date_naive()).to_string(),
                similarity_threshold: DEFAULT_THRESHOLD,
                inbox_dir: PathBuf::from("inbox"),
                customer_db_dir: PathBuf::from("customers"),
                output_dir: PathBuf::from("outbox"),
                state_dir: PathBuf::from("state"),
                sources: SourceType::ALL.iter().map(|s| s.tag().to_string()).collect(),
            },
            ledger: LedgerSection {
                base_url: "https://api.businesscentral.dynamics.com/v2.0/production/api/v2.0".to_string(),
                company_id: String::new(),
                timeout_secs: 30,
                journals: BTreeMap::new(),
            },
        }
    }
}

/// Checked, typed view of the config with directories made absolute.
#[derive(Debug, Clone)]
pub struct Settings {
    pub month: ExpectedMonth,
    pub resolver: NameResolver,
    pub sources: Vec<SourceType>,
    pub inbox_dir: PathBuf,
    pub customer_db_dir: PathBuf,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub journals: BTreeMap<SourceType, String>,
}

impl Config {
    /// Fail fast on anything that would otherwise surface mid-run.
    pub fn validate(&self, home: &Path) -> Result<Settings, ConfigurationError> {
        let p = &self.pipeline;
        let month: ExpectedMonth = p.expected_month.parse()?;
        let resolver = NameResolver::new(p.similarity_threshold)?;

        let mut sources = Vec::new();
        for tag in &p.sources {
            let source: SourceType = tag.parse()?;
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            return Err(ConfigurationError::Invalid("pipeline.sources is empty".to_string()));
        }

        let mut journals = BTreeMap::new();
        for (tag, id) in &self.ledger.journals {
            journals.insert(tag.parse::<SourceType>()?, id.trim().to_string());
        }

        Ok(Settings {
            month,
            resolver,
            sources,
            inbox_dir: resolve_under(home, &p.inbox_dir),
            customer_db_dir: resolve_under(home, &p.customer_db_dir),
            output_dir: resolve_under(home, &p.output_dir),
            state_dir: resolve_under(home, &p.state_dir),
            journals,
        })
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(ensure_bankpost_home()?.join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config(path: &Path, cfg: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> PathBuf {
        PathBuf::from("/srv/bankpost")
    }

    #[test]
    fn test_default_config_validates() {
        let settings = Config::default().validate(&home()).unwrap();
        assert_eq!(settings.sources, SourceType::ALL.to_vec());
        assert_eq!(settings.inbox_dir, home().join("inbox"));
        assert_eq!(settings.resolver.threshold(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_bad_values_fail_fast() {
        let mut cfg = Config::default();
        cfg.pipeline.expected_month = "August 2025".to_string();
        assert!(matches!(cfg.validate(&home()), Err(ConfigurationError::ExpectedMonth(_))));

        let mut cfg = Config::default();
        cfg.pipeline.similarity_threshold = 0.0;
        assert!(matches!(cfg.validate(&home()), Err(ConfigurationError::Threshold(_))));

        let mut cfg = Config::default();
        cfg.pipeline.sources = vec!["my_mbb".into(), "hsbc".into()];
        assert!(matches!(cfg.validate(&home()), Err(ConfigurationError::UnknownSource(_))));

        let mut cfg = Config::default();
        cfg.pipeline.sources.clear();
        assert!(matches!(cfg.validate(&home()), Err(ConfigurationError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.pipeline.expected_month = "Sep'25".to_string();
        cfg.pipeline.output_dir = PathBuf::from("/var/bankpost/out");
        cfg.ledger.journals.insert("my_pbb".into(), "J-PBB".into());
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path).unwrap();
        let settings = loaded.validate(dir.path()).unwrap();
        assert_eq!(settings.month.to_string(), "Sep'25");
        assert_eq!(settings.output_dir, PathBuf::from("/var/bankpost/out"));
        assert_eq!(settings.state_dir, dir.path().join("state"));
        assert_eq!(settings.journals.get(&SourceType::MyPbb).map(String::as_str), Some("J-PBB"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.ledger.timeout_secs, 30);
    }
}
