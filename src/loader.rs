/// Rule sources: where rule descriptors come from on reload.
///
/// A scope is either a lower-cased class name or `common`. `DirRuleSource`
/// maps a scope to `<dir>/<scope>.toml`, a file of `[[rule]]` tables:
///
///   [[rule]]
///   abnormalities = [4020, 4021]
///   type = "missingDuringCombat"
///   target = "self"
///   message = "No food buff active"
///
/// A missing file means "no rules for this scope", not an error. Each
/// `[[rule]]` table is decoded on its own: a table with a badly typed field is
/// logged and skipped, the other rules in the file still load. Only a file that
/// is not valid TOML fails as a whole.
///
/// Omitted `required_stacks`, `rewarn_timeout` and `time_remaining` fall back to
/// their defaults; an explicit `0` is kept as `0`, not replaced by the default.
///
/// Sample rule files are embedded at compile time from `data/rules/` and are
/// installed into an empty rules directory on first run.
use crate::{descriptor::RuleDescriptor, error::RuleError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const COMMON_SCOPE: &str = "common";

// ---------------------------------------------------------------------------
// Embedded sample rules
// ---------------------------------------------------------------------------

const COMMON:  &str = include_str!("../data/rules/common.toml");
const WARRIOR: &str = include_str!("../data/rules/warrior.toml");

static BUNDLED_RULES: &[(&str, &str)] = &[
    ("common",  COMMON),
    ("warrior", WARRIOR),
];

// ---------------------------------------------------------------------------
// RuleSource
// ---------------------------------------------------------------------------

pub trait RuleSource: Send {
    /// `Ok(None)` when the scope has no rules at all.
    fn load(&self, scope: &str) -> Result<Option<Vec<RuleDescriptor>>, RuleError>;
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<toml::Value>,
}

fn parse_rule_file(raw: &str, path: &Path) -> Result<Vec<RuleDescriptor>, RuleError> {
    let file = toml::from_str::<RuleFile>(raw)
        .map_err(|source| RuleError::ParseToml { path: path.to_path_buf(), source })?;

    let mut rules = Vec::with_capacity(file.rule.len());
    for (index, table) in file.rule.into_iter().enumerate() {
        let text = table.to_string();
        match RuleDescriptor::deserialize(table) {
            Ok(descriptor) => rules.push(descriptor),
            Err(e) => tracing::error!(
                "Skipping rule #{} in {:?}: {} — rule: {}",
                index + 1, path, e, text.trim_end()
            ),
        }
    }
    Ok(rules)
}

#[derive(Debug, Clone)]
pub struct DirRuleSource {
    dir: PathBuf,
}

impl DirRuleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, scope: &str) -> PathBuf {
        self.dir.join(format!("{}.toml", scope))
    }
}

impl RuleSource for DirRuleSource {
    fn load(&self, scope: &str) -> Result<Option<Vec<RuleDescriptor>>, RuleError> {
        let path = self.path_for(scope);
        if !path.exists() {
            tracing::debug!("No rule file for scope '{}' at {:?}", scope, path);
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| RuleError::ReadFile { path: path.clone(), source })?;
        parse_rule_file(&raw, &path).map(Some)
    }
}

/// Write the embedded sample rule files into `dir` unless it already holds any
/// `.toml` file. Returns how many files were written.
pub fn install_bundled(dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let has_rules = std::fs::read_dir(dir)?
        .flatten()
        .any(|e| e.path().extension().is_some_and(|ext| ext == "toml"));
    if has_rules {
        return Ok(0);
    }

    for (scope, raw) in BUNDLED_RULES {
        std::fs::write(dir.join(format!("{}.toml", scope)), raw)?;
    }
    tracing::info!("Installed {} sample rule files into {:?}", BUNDLED_RULES.len(), dir);
    Ok(BUNDLED_RULES.len())
}
