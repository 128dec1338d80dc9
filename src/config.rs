use crate::types::ConversionLevel;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILENAME: &str = "psmigrate.toml";

/// Migration project configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Project metadata
    pub project: ProjectConfig,

    /// Source tree settings
    pub source: SourceConfig,

    /// Destination tree settings
    pub output: OutputConfig,

    /// Translation policy
    pub conversion: ConversionConfig,

    /// Phase classification keywords
    pub phases: PhaseConfig,

    /// Source-to-destination directory mapping
    pub layout: LayoutConfig,

    /// Plan and status store location
    pub state: StateConfig,

    /// Output syntax checking
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project description
    pub description: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "untitled".to_string(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the PowerShell tree (relative to the working directory)
    pub path: PathBuf,

    /// Recognized script extensions, without the dot
    pub extensions: Vec<String>,

    /// Directory names skipped during discovery
    pub exclude: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            extensions: vec!["ps1".to_string(), "psm1".to_string()],
            exclude: vec![
                ".git".to_string(),
                ".psmigrate".to_string(),
                "python-output".to_string(),
                "node_modules".to_string(),
                "bin".to_string(),
                "obj".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the generated Python tree
    pub path: PathBuf,

    /// Prepend a provenance header comment to every converted file
    pub header: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./python-output"),
            header: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// FULL, HYBRID or BRIDGE
    pub level: ConversionLevel,

    /// Identifier of the bridge object in generated code
    pub bridge_handle: String,

    /// Import statement that brings the bridge handle into scope
    pub bridge_import: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            level: ConversionLevel::Hybrid,
            bridge_handle: "bridge".to_string(),
            bridge_import: "from powershell_bridge import bridge".to_string(),
        }
    }
}

/// Lowercase substrings matched against a file's relative path.
/// Checked in the order core, gui, api; unmatched files land in "other".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub core: Vec<String>,
    pub gui: Vec<String>,
    pub api: Vec<String>,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            core: words(&["core", "common", "auth", "config", "logging", "util"]),
            gui: words(&["gui", "form", "window", "dialog", "wpf", "winforms"]),
            api: words(&[
                "graph",
                "exchange",
                "exo",
                "teams",
                "sharepoint",
                "entra",
                "azure",
                "m365",
                "api",
            ]),
        }
    }
}

/// One row of the directory mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMapping {
    /// Source directory prefix, matched case-insensitively per component
    pub from: String,

    /// Destination directory under the output root
    pub to: String,
}

impl DirectoryMapping {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Ordered table; the first matching prefix wins
    pub mappings: Vec<DirectoryMapping>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mappings: vec![
                DirectoryMapping::new("Core", "core"),
                DirectoryMapping::new("Modules/Auth", "core/auth"),
                DirectoryMapping::new("Modules", "modules"),
                DirectoryMapping::new("GUI", "gui"),
                DirectoryMapping::new("Reports", "reports"),
                DirectoryMapping::new("Scripts", "scripts"),
                DirectoryMapping::new("Tests", "tests"),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Directory holding the plan and status documents
    pub dir: PathBuf,

    pub plan_file: String,

    pub status_file: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".psmigrate"),
            plan_file: "migration_plan.json".to_string(),
            status_file: "migration_status.json".to_string(),
        }
    }
}

impl StateConfig {
    pub fn plan_path(&self) -> PathBuf {
        self.dir.join(&self.plan_file)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(&self.status_file)
    }
}

/// How converted output is checked for syntactic validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// In-process structural checker
    #[default]
    Builtin,
    /// `ast.parse` through an external interpreter
    Interpreter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub mode: ValidationMode,

    /// Interpreter executable used in interpreter mode
    pub interpreter: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Builtin,
            interpreter: "python3".to_string(),
        }
    }
}

impl MigrationConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Create a config for a source tree, naming the project after its directory
    pub fn for_source(source: &Path) -> Self {
        let mut config = Self::default();
        config.source.path = source.to_path_buf();
        let name = source
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()));
        if let Some(name) = name {
            config.project.name = name;
        }
        config
    }
}
