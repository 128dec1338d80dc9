//! Phase classification and destination paths.
//!
//! Both are pure functions of the relative source path and the
//! configuration, so re-running a migration always lands in the same place.

use crate::config::{LayoutConfig, PhaseConfig};
use crate::naming::to_snake_case;
use crate::types::Phase;
use std::path::{Path, PathBuf};

/// Extension of generated files
pub const TARGET_EXTENSION: &str = "py";

/// Phase of a file from keywords in its lowercased relative path.
/// Core wins over GUI, GUI over API; anything else is `Other`.
pub fn classify_phase(relative: &str, phases: &PhaseConfig) -> Phase {
    let lower = relative.to_lowercase();
    let hits = |words: &[String]| words.iter().any(|w| !w.is_empty() && lower.contains(w.as_str()));

    if hits(&phases.core) {
        Phase::Core
    } else if hits(&phases.gui) {
        Phase::Gui
    } else if hits(&phases.api) {
        Phase::ApiIntegration
    } else {
        Phase::Other
    }
}

/// Path components of a relative source path, with `.`/`..` dropped
fn components(relative: &str) -> Vec<&str> {
    relative
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != "." && *c != "..")
        .collect()
}

/// Destination of a source file, relative to the output root.
///
/// The first mapping whose `from` prefix matches the file's directories
/// (case-insensitively, component by component) replaces that prefix.
/// Remaining directories and the file stem are snake_cased.
pub fn destination_for(relative: &str, layout: &LayoutConfig) -> PathBuf {
    let parts = components(relative);
    let Some((file, dirs)) = parts.split_last() else {
        return PathBuf::from(format!("_.{}", TARGET_EXTENSION));
    };

    let mut dest = PathBuf::new();
    let mut rest: &[&str] = dirs;
    for mapping in &layout.mappings {
        let prefix = components(&mapping.from);
        let matches = !prefix.is_empty()
            && prefix.len() <= dirs.len()
            && prefix
                .iter()
                .zip(dirs.iter())
                .all(|(p, d)| p.eq_ignore_ascii_case(d));
        if matches {
            dest.push(&mapping.to);
            rest = &dirs[prefix.len()..];
            break;
        }
    }

    for dir in rest {
        dest.push(to_snake_case(dir));
    }
    let stem = Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string());
    dest.push(format!("{}.{}", to_snake_case(&stem), TARGET_EXTENSION));
    dest
}

/// Forward-slash key of `path` under `root`, as stored in plans and status
pub fn relative_key(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
