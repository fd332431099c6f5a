use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// Defaults read from the optional config file. Command line flags always
/// take precedence over anything set here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportDefaults {
    pub output: Option<OutputFormat>,
    pub show_namespace: bool,
    pub show_node: bool,
    pub tree: bool,
    sort: BTreeMap<String, SortTokens>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SortTokens {
    Joined(String),
    List(Vec<String>),
}

impl ReportDefaults {
    pub fn discover() -> Result<Self> {
        match discover_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut parsed = Self::parse(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        parsed.source = Some(path.to_path_buf());
        Ok(parsed)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Default sort tokens for a report, entries may themselves be comma separated.
    pub fn sort_for(&self, report: &str) -> Vec<String> {
        let Some(tokens) = self.sort.get(report) else {
            return Vec::new();
        };
        let entries = match tokens {
            SortTokens::Joined(value) => std::slice::from_ref(value),
            SortTokens::List(values) => values.as_slice(),
        };
        split_sort_tokens(entries)
    }
}

pub fn split_sort_tokens<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PODSCOPE_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("podscope.yaml"),
        PathBuf::from("podscope.yml"),
        PathBuf::from(".podscope.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/podscope/config.yaml"),
            PathBuf::from(&home).join(".config/podscope/config.yml"),
            PathBuf::from(&home).join(".podscope.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
