use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How aggressively bridge-requiring constructs are translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversionLevel {
    /// Rewrite everything natively, warn on bridge-requiring builtins
    Full,
    /// Route everything that cannot be reimplemented through the bridge
    Bridge,
    /// Native where pure, bridge where required
    #[default]
    Hybrid,
}

impl ConversionLevel {
    /// Whether a rule tagged with `rule_level` may run under this policy.
    ///
    /// FULL-tagged rules are pure rewrites and always run. HYBRID-tagged rules
    /// introduce bridge calls and run under HYBRID and BRIDGE. BRIDGE-tagged
    /// rules only run under BRIDGE.
    pub fn permits(&self, rule_level: ConversionLevel) -> bool {
        match rule_level {
            ConversionLevel::Full => true,
            ConversionLevel::Hybrid => {
                matches!(self, ConversionLevel::Hybrid | ConversionLevel::Bridge)
            }
            ConversionLevel::Bridge => matches!(self, ConversionLevel::Bridge),
        }
    }

    /// Whether bridge-requiring builtins become bridge invocations
    pub fn uses_bridge(&self) -> bool {
        !matches!(self, ConversionLevel::Full)
    }
}

impl std::fmt::Display for ConversionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionLevel::Full => write!(f, "FULL"),
            ConversionLevel::Bridge => write!(f, "BRIDGE"),
            ConversionLevel::Hybrid => write!(f, "HYBRID"),
        }
    }
}

impl std::str::FromStr for ConversionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ConversionLevel::Full),
            "bridge" => Ok(ConversionLevel::Bridge),
            "hybrid" => Ok(ConversionLevel::Hybrid),
            other => Err(format!("unknown conversion level: {}", other)),
        }
    }
}

/// Planning complexity of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// Rough effort bucket for human review of a converted script
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Small,
    Medium,
    Large,
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effort::Small => write!(f, "small"),
            Effort::Medium => write!(f, "medium"),
            Effort::Large => write!(f, "large"),
        }
    }
}

/// Migration phase, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "phase1_core")]
    Core,
    #[serde(rename = "phase2_api")]
    ApiIntegration,
    #[serde(rename = "phase3_gui")]
    Gui,
    #[serde(rename = "phase4_other")]
    Other,
}

impl Phase {
    pub fn all() -> Vec<Phase> {
        vec![Phase::Core, Phase::ApiIntegration, Phase::Gui, Phase::Other]
    }

    /// Stable identifier used in plan documents and on the command line
    pub fn key(&self) -> &'static str {
        match self {
            Phase::Core => "phase1_core",
            Phase::ApiIntegration => "phase2_api",
            Phase::Gui => "phase3_gui",
            Phase::Other => "phase4_other",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Core => write!(f, "Core"),
            Phase::ApiIntegration => write!(f, "API Integration"),
            Phase::Gui => write!(f, "GUI"),
            Phase::Other => write!(f, "Other"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "core" | "phase1" | "phase1_core" => Ok(Phase::Core),
            "2" | "api" | "phase2" | "phase2_api" => Ok(Phase::ApiIntegration),
            "3" | "gui" | "phase3" | "phase3_gui" => Ok(Phase::Gui),
            "4" | "other" | "phase4" | "phase4_other" => Ok(Phase::Other),
            other => Err(format!("unknown phase: {}", other)),
        }
    }
}

/// Persisted outcome of a migration attempt. Pending is implicit (no record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for MigrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationState::InProgress => write!(f, "In Progress"),
            MigrationState::Completed => write!(f, "Completed"),
            MigrationState::Failed => write!(f, "Failed"),
        }
    }
}

/// Per-file migration record, overwritten on every attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub file_path: String,
    pub original_line_count: usize,
    pub converted_line_count: usize,
    pub conversion_level: ConversionLevel,
    pub bridge_dependencies: Vec<String>,
    pub status: MigrationState,
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl MigrationStatus {
    pub fn is_completed(&self) -> bool {
        self.status == MigrationState::Completed
    }
}

/// Full-tree migration plan snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub total_files: usize,
    pub phases: BTreeMap<Phase, Vec<String>>,
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub estimated_effort: BTreeMap<String, Effort>,
    pub created_at: DateTime<Utc>,
}

impl MigrationPlan {
    pub fn new() -> Self {
        Self {
            total_files: 0,
            phases: Phase::all().into_iter().map(|p| (p, Vec::new())).collect(),
            dependencies: BTreeMap::new(),
            estimated_effort: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Files scheduled in a phase, in plan order
    pub fn files_in(&self, phase: Phase) -> &[String] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Phase a file was classified into
    pub fn phase_of(&self, file: &str) -> Option<Phase> {
        self.phases
            .iter()
            .find(|(_, files)| files.iter().any(|f| f == file))
            .map(|(phase, _)| *phase)
    }
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_permits_full_rules_everywhere() {
        for level in [ConversionLevel::Full, ConversionLevel::Hybrid, ConversionLevel::Bridge] {
            assert!(level.permits(ConversionLevel::Full));
        }
    }

    #[test]
    fn test_level_permits_hybrid_rules() {
        assert!(!ConversionLevel::Full.permits(ConversionLevel::Hybrid));
        assert!(ConversionLevel::Hybrid.permits(ConversionLevel::Hybrid));
        assert!(ConversionLevel::Bridge.permits(ConversionLevel::Hybrid));
    }

    #[test]
    fn test_level_permits_bridge_rules_only_under_bridge() {
        assert!(!ConversionLevel::Full.permits(ConversionLevel::Bridge));
        assert!(!ConversionLevel::Hybrid.permits(ConversionLevel::Bridge));
        assert!(ConversionLevel::Bridge.permits(ConversionLevel::Bridge));
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("full".parse::<ConversionLevel>(), Ok(ConversionLevel::Full));
        assert_eq!("HYBRID".parse::<ConversionLevel>(), Ok(ConversionLevel::Hybrid));
        assert!("turbo".parse::<ConversionLevel>().is_err());
    }

    #[test]
    fn test_level_serializes_uppercase() {
        let json = serde_json::to_string(&ConversionLevel::Bridge).unwrap();
        assert_eq!(json, "\"BRIDGE\"");
    }

    #[test]
    fn test_phase_order_and_keys() {
        let phases = Phase::all();
        assert_eq!(phases.len(), 4);
        assert!(phases.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Phase::Gui.key(), "phase3_gui");
    }

    #[test]
    fn test_phase_from_str_aliases() {
        assert_eq!("1".parse::<Phase>(), Ok(Phase::Core));
        assert_eq!("api".parse::<Phase>(), Ok(Phase::ApiIntegration));
        assert_eq!("phase3_gui".parse::<Phase>(), Ok(Phase::Gui));
        assert!("phase9".parse::<Phase>().is_err());
    }

    #[test]
    fn test_plan_serializes_phase_keys() {
        let mut plan = MigrationPlan::new();
        plan.phases
            .get_mut(&Phase::Core)
            .unwrap()
            .push("Core/Auth.ps1".to_string());
        plan.total_files = 1;

        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"phase1_core\""));

        let back: MigrationPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.files_in(Phase::Core), ["Core/Auth.ps1".to_string()]);
        assert_eq!(back.phase_of("Core/Auth.ps1"), Some(Phase::Core));
        assert!(back.files_in(Phase::Gui).is_empty());
    }

    #[test]
    fn test_status_state_snake_case() {
        let json = serde_json::to_string(&MigrationState::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
