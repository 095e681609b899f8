//! Project-level settings: app.json root discovery and AppSourceCop prefixes

use anyhow::{Context, Result};
use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// The fields of AppSourceCop.json that name mandatory affixes
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSourceCopJson {
    #[serde(default)]
    mandatory_prefix: Option<String>,
    #[serde(default)]
    mandatory_affixes: Vec<String>,
}

/// Nearest ancestor directory of `path` containing an app.json
pub fn find_project_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|dir| dir.join("app.json").is_file())
        .map(Path::to_path_buf)
}

fn read_app_source_cop(project_root: &Path) -> Result<Option<AppSourceCopJson>> {
    let path = project_root.join("AppSourceCop.json");
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(parsed))
}

/// Prefixes from `mandatoryPrefix` and `mandatoryAffixes`; `None` when there are none
pub fn find_app_source_prefixes(project_root: &Path) -> Option<Vec<String>> {
    let cop = match read_app_source_cop(project_root) {
        Ok(cop) => cop?,
        Err(e) => {
            warn!("{:#}", e);
            return None;
        }
    };

    let mut prefixes: Vec<String> = Vec::new();
    for prefix in cop.mandatory_prefix.into_iter().chain(cop.mandatory_affixes) {
        let prefix = prefix.trim().to_string();
        if !prefix.is_empty() && !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
    }
    debug!("AppSourceCop prefixes of {}: {:?}", project_root.display(), prefixes);

    if prefixes.is_empty() {
        None
    } else {
        Some(prefixes)
    }
}

/// Pattern of procedure names that look like event publishers:
/// `On<Letter>...`, optionally behind one of the prefixes (with or without `_`)
pub fn event_name_pattern(prefixes: Option<&[String]>) -> Result<Regex> {
    let pattern = match prefixes {
        Some(prefixes) if !prefixes.is_empty() => {
            let escaped: Vec<String> = prefixes.iter().map(|p| regex::escape(p)).collect();
            format!("^({}|{}_)?On[A-Za-z].*$", escaped.join("|"), escaped.join("_|"))
        }
        _ => "^On[A-Za-z].*$".to_string(),
    };
    Regex::new(&pattern).context("Invalid event name pattern")
}
