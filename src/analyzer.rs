use crate::config::SourceConfig;
use crate::mappings::CmdletMapper;
use crate::syntax;
use crate::types::{Complexity, Effort};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

static COMMAND: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z]+-[A-Za-z][A-Za-z0-9]+\b").ok());
static VERB_NOUN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z]+-[A-Z][a-zA-Z0-9]+$").ok());
static FUNCTION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:function|filter)\s+(?:(?:global|script|local|private):)?([\w-]+)")
        .ok()
});

/// Markers of GUI toolkits or foreign-runtime interop; any one of them makes
/// a script high complexity
const INTEROP_MARKERS: &[&str] = &[
    "system.windows.forms",
    "presentationframework",
    "presentationcore",
    "windows.markup.xamlreader",
    "system.drawing",
    "add-type",
    "-comobject",
    "reflection.assembly]",
    "<window",
    "xaml",
    "wpf",
];

/// Bridge-requiring references above which a script is high complexity
const HIGH_BRIDGE_REFS: usize = 5;
/// ... and above which it is medium
const MEDIUM_BRIDGE_REFS: usize = 2;

const LARGE_SCRIPT_LINES: usize = 500;
const MEDIUM_SCRIPT_LINES: usize = 150;

/// Static inspection of one script; nothing is converted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    pub lines: usize,
    pub functions: Vec<String>,
    /// Builtin command name → number of references
    pub cmdlets: BTreeMap<String, usize>,
    pub complexity: Complexity,
    /// Bridge-requiring builtins referenced, sorted
    pub bridge_required: Vec<String>,
    pub estimated_effort: Effort,
}

impl ScriptAnalysis {
    /// Total references to bridge-requiring builtins
    pub fn bridge_references(&self) -> usize {
        self.bridge_required
            .iter()
            .filter_map(|name| self.cmdlets.get(name))
            .sum()
    }
}

/// Script analyzer backed by the builtin command table
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    cmdlets: CmdletMapper,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze a script file
    pub fn analyze_script(&self, path: &Path) -> Result<ScriptAnalysis> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        let analysis = self.analyze_source(&source);
        debug!(
            "{}: {} lines, {} complexity, {} bridge refs",
            path.display(),
            analysis.lines,
            analysis.complexity,
            analysis.bridge_references()
        );
        Ok(analysis)
    }

    /// Analyze script text
    pub fn analyze_source(&self, source: &str) -> ScriptAnalysis {
        let functions = defined_functions(source);
        let local: BTreeSet<String> = functions.iter().map(|f| f.to_ascii_lowercase()).collect();

        let mut cmdlets: BTreeMap<String, usize> = BTreeMap::new();
        if let Some(command) = COMMAND.as_ref() {
            let ranges = syntax::string_ranges(source);
            for m in command.find_iter(source) {
                if syntax::in_ranges(&ranges, m.start()) {
                    continue;
                }
                let prev = source[..m.start()].chars().last();
                if prev.is_some_and(|c| c == '-' || c == '$' || c == '.') {
                    continue;
                }
                let name = m.as_str();
                if local.contains(&name.to_ascii_lowercase()) {
                    continue;
                }
                let canonical = match self.cmdlets.map_cmdlet(name) {
                    Some(mapping) => mapping.source_name.clone(),
                    None if VERB_NOUN.as_ref().is_some_and(|re| re.is_match(name)) => {
                        name.to_string()
                    }
                    None => continue,
                };
                *cmdlets.entry(canonical).or_insert(0) += 1;
            }
        }

        let bridge_required: Vec<String> = cmdlets
            .keys()
            .filter(|name| self.cmdlets.requires_bridge(name))
            .cloned()
            .collect();
        let bridge_refs: usize = bridge_required
            .iter()
            .filter_map(|name| cmdlets.get(name))
            .sum();

        let lines = source.lines().count();
        let complexity = assess_complexity(bridge_refs, has_interop_markers(source));
        ScriptAnalysis {
            lines,
            functions,
            cmdlets,
            complexity,
            bridge_required,
            estimated_effort: estimate_effort(complexity, lines),
        }
    }
}

/// Complexity from bridge-requiring references and interop markers
pub fn assess_complexity(bridge_refs: usize, interop: bool) -> Complexity {
    if interop || bridge_refs > HIGH_BRIDGE_REFS {
        Complexity::High
    } else if bridge_refs > MEDIUM_BRIDGE_REFS {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}

/// Effort bucket from complexity and script size
pub fn estimate_effort(complexity: Complexity, lines: usize) -> Effort {
    if complexity == Complexity::High || lines > LARGE_SCRIPT_LINES {
        Effort::Large
    } else if complexity == Complexity::Medium || lines > MEDIUM_SCRIPT_LINES {
        Effort::Medium
    } else {
        Effort::Small
    }
}

fn has_interop_markers(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    INTEROP_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn defined_functions(source: &str) -> Vec<String> {
    FUNCTION
        .as_ref()
        .map(|re| {
            re.captures_iter(source)
                .map(|caps| caps[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Find script files under `root`, sorted, skipping excluded directories
pub fn discover_scripts(root: &Path, source: &SourceConfig) -> Result<Vec<PathBuf>> {
    info!("Discovering scripts under {:?}", root);

    let extensions: Vec<String> = source
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut scripts = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e.path(), &source.exclude))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase()));
        if matches {
            scripts.push(entry.into_path());
        }
    }

    scripts.sort();
    debug!("Found {} scripts", scripts.len());
    Ok(scripts)
}

fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| exclude.iter().any(|e| e == name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ============================================================================
    // COMPLEXITY TESTS
    // ============================================================================

    #[test]
    fn test_complexity_thresholds() {
        assert_eq!(assess_complexity(0, false), Complexity::Low);
        assert_eq!(assess_complexity(2, false), Complexity::Low);
        assert_eq!(assess_complexity(3, false), Complexity::Medium);
        assert_eq!(assess_complexity(5, false), Complexity::Medium);
        assert_eq!(assess_complexity(6, false), Complexity::High);
        assert_eq!(assess_complexity(0, true), Complexity::High);
    }

    #[test]
    fn test_effort_buckets() {
        assert_eq!(estimate_effort(Complexity::Low, 10), Effort::Small);
        assert_eq!(estimate_effort(Complexity::Low, 151), Effort::Medium);
        assert_eq!(estimate_effort(Complexity::Medium, 10), Effort::Medium);
        assert_eq!(estimate_effort(Complexity::Low, 501), Effort::Large);
        assert_eq!(estimate_effort(Complexity::High, 1), Effort::Large);
    }

    // ============================================================================
    // SOURCE ANALYSIS TESTS
    // ============================================================================

    #[test]
    fn test_counts_cmdlets_and_bridge_refs() {
        let analyzer = Analyzer::new();
        let source = "Get-Mailbox -Identity a\nget-mailbox -Identity b\nWrite-Host 'done'\nGet-Process\n";
        let analysis = analyzer.analyze_source(source);

        assert_eq!(analysis.lines, 4);
        assert_eq!(analysis.cmdlets.get("Get-Mailbox"), Some(&2));
        assert_eq!(analysis.cmdlets.get("Write-Host"), Some(&1));
        assert_eq!(analysis.bridge_required, vec!["Get-Mailbox", "Get-Process"]);
        assert_eq!(analysis.bridge_references(), 3);
        assert_eq!(analysis.complexity, Complexity::Medium);
        assert_eq!(analysis.estimated_effort, Effort::Medium);
    }

    #[test]
    fn test_many_bridge_refs_are_high() {
        let analyzer = Analyzer::new();
        let source = "Get-Mailbox\n".repeat(6);
        let analysis = analyzer.analyze_source(&source);
        assert_eq!(analysis.complexity, Complexity::High);
        assert_eq!(analysis.estimated_effort, Effort::Large);
    }

    #[test]
    fn test_gui_marker_is_high() {
        let analyzer = Analyzer::new();
        let analysis =
            analyzer.analyze_source("Add-Type -AssemblyName System.Windows.Forms\n$f = New-Object Form\n");
        assert_eq!(analysis.complexity, Complexity::High);
    }

    #[test]
    fn test_local_functions_are_not_cmdlets() {
        let analyzer = Analyzer::new();
        let source = "function Get-Report { Write-Output 1 }\nGet-Report\n";
        let analysis = analyzer.analyze_source(source);
        assert_eq!(analysis.functions, vec!["Get-Report"]);
        assert!(!analysis.cmdlets.contains_key("Get-Report"));
        assert!(analysis.cmdlets.contains_key("Write-Output"));
    }

    #[test]
    fn test_ignores_strings_comments_and_parameters() {
        let analyzer = Analyzer::new();
        let source = "# Get-Mailbox in a comment\n$s = 'Get-Process'\nWrite-Host -Object-Name x\n";
        let analysis = analyzer.analyze_source(source);
        assert!(analysis.bridge_required.is_empty());
        assert_eq!(analysis.complexity, Complexity::Low);
    }

    #[test]
    fn test_unknown_lowercase_words_ignored() {
        let analyzer = Analyzer::new();
        let analysis = analyzer.analyze_source("$total = $count-offset\n");
        assert!(analysis.cmdlets.is_empty());
    }

    // ============================================================================
    // DISCOVERY TESTS
    // ============================================================================

    #[test]
    fn test_discover_scripts_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("Core")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("Core/Auth.ps1"), "Write-Host 1").unwrap();
        fs::write(root.join("Tools.psm1"), "Write-Host 2").unwrap();
        fs::write(root.join("readme.md"), "#").unwrap();
        fs::write(root.join(".git/hook.ps1"), "x").unwrap();

        let scripts = discover_scripts(root, &SourceConfig::default()).unwrap();
        let names: Vec<String> = scripts
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["Core/Auth.ps1", "Tools.psm1"]);
    }

    #[test]
    fn test_analyze_script_missing_file() {
        let analyzer = Analyzer::new();
        let err = analyzer
            .analyze_script(Path::new("/nonexistent/x.ps1"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read script"));
    }
}
