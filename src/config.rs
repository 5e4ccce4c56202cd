use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILENAME: &str = "docx-converter.toml";

/// How numbered paragraphs are shaped into list nodes on import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMode {
    /// One single-item list per numbered paragraph.
    #[default]
    Normalized,
    /// Consecutive paragraphs of one `numId` grouped into a nested multi-item list.
    Legacy,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ConverterConfig {
    #[serde(default)]
    pub import: ImportSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub styles: StylesSection,
    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ImportSection {
    #[serde(default)]
    pub list_mode: ListMode,

    /// Write a resolved `displayStyle` onto every run after import.
    #[serde(default)]
    pub decorate_runs: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExportSection {
    /// Flatten inline structured content into plain runs.
    #[serde(default)]
    pub final_doc: bool,

    #[serde(default = "default_true")]
    pub run_validators: bool,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            final_doc: false,
            run_validators: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StylesSection {
    /// Longest `basedOn` chain followed before resolution stops.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: usize,
}

impl Default for StylesSection {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheSection {
    /// Paragraph-context entries older than this many revisions are evicted.
    #[serde(default = "default_retention")]
    pub retention: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_chain_depth() -> usize {
    20
}

fn default_retention() -> u64 {
    4
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// Searches upward from the current directory, then from `workdir`, then from the
/// executable's directory.
pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<ConverterConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: ConverterConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Explicit path first, then the upward search; defaults when nothing is found.
pub fn resolve_config(explicit: Option<&Path>, workdir: &Path) -> anyhow::Result<ConverterConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match find_default_config(workdir, DEFAULT_CONFIG_FILENAME) {
        Some(path) => {
            log::debug!("using config {}", path.display());
            load_config(&path)
        }
        None => Ok(ConverterConfig::default()),
    }
}

const DEFAULT_CONFIG_TOML: &str = r#"[import]
# "normalized": one single-item list per numbered paragraph.
# "legacy": consecutive numbered paragraphs grouped into nested lists.
list_mode = "normalized"
# Resolve linked styles onto every run as a displayStyle attribute.
decorate_runs = false

[export]
# Flatten inline structured content into plain runs.
final_doc = false
run_validators = true

[styles]
max_chain_depth = 20

[cache]
# Paragraph-context entries are kept for this many document revisions.
retention = 4
"#;

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(DEFAULT_CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
