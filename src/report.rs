/// Migration progress reports and rollback scripts
use crate::types::{MigrationPlan, MigrationState, MigrationStatus, Phase};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Completion of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub total: usize,
    pub completed: usize,
}

impl PhaseProgress {
    /// Completed share in `0.0..=1.0`; an empty phase counts as 0
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// How often a bridged builtin appears among completed files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeUsage {
    pub name: String,
    pub files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNote {
    pub file: String,
    pub note: String,
}

/// Migration report data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub project_name: String,
    pub timestamp: DateTime<Utc>,
    pub total_files: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub phases: Vec<PhaseProgress>,
    /// Most frequent first
    pub bridge_dependencies: Vec<BridgeUsage>,
    pub failures: Vec<FailureNote>,
}

impl MigrationReport {
    /// Aggregate the plan and status records. Files in neither count
    /// nowhere; files with a record but no plan entry still count.
    pub fn build(
        project_name: &str,
        plan: &MigrationPlan,
        records: &BTreeMap<String, MigrationStatus>,
    ) -> Self {
        let files: BTreeSet<&str> = plan
            .phases
            .values()
            .flatten()
            .map(String::as_str)
            .chain(records.keys().map(String::as_str))
            .collect();
        let state_of = |file: &str| records.get(file).map(|s| s.status);

        let mut completed = 0;
        let mut failed = 0;
        let mut pending = 0;
        for file in &files {
            match state_of(*file) {
                Some(MigrationState::Completed) => completed += 1,
                Some(MigrationState::Failed) => failed += 1,
                Some(MigrationState::InProgress) | None => pending += 1,
            }
        }

        let phases = Phase::all()
            .into_iter()
            .map(|phase| {
                let in_phase = plan.files_in(phase);
                PhaseProgress {
                    phase,
                    total: in_phase.len(),
                    completed: in_phase
                        .iter()
                        .filter(|f| state_of(f.as_str()) == Some(MigrationState::Completed))
                        .count(),
                }
            })
            .collect();

        let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for status in records.values().filter(|s| s.is_completed()) {
            for name in &status.bridge_dependencies {
                *frequency.entry(name.as_str()).or_insert(0) += 1;
            }
        }
        let mut bridge_dependencies: Vec<BridgeUsage> = frequency
            .into_iter()
            .map(|(name, files)| BridgeUsage {
                name: name.to_string(),
                files,
            })
            .collect();
        bridge_dependencies
            .sort_by(|a, b| b.files.cmp(&a.files).then_with(|| a.name.cmp(&b.name)));

        let failures = records
            .values()
            .filter(|s| s.status == MigrationState::Failed)
            .map(|s| FailureNote {
                file: s.file_path.clone(),
                note: s.notes.first().cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            project_name: project_name.to_string(),
            timestamp: Utc::now(),
            total_files: files.len(),
            completed,
            failed,
            pending,
            phases,
            bridge_dependencies,
            failures,
        }
    }

    /// Overall completed share in percent
    pub fn progress_percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total_files as f64
        }
    }

    /// Generate Markdown report
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Migration Report: {}\n\n", self.project_name));
        md.push_str(&format!(
            "**Generated:** {}\n\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Total Files:** {}\n", self.total_files));
        md.push_str(&format!("- **Completed:** {}\n", self.completed));
        md.push_str(&format!("- **Failed:** {}\n", self.failed));
        md.push_str(&format!("- **Pending:** {}\n", self.pending));
        md.push_str(&format!(
            "- **Progress:** {:.0}%\n\n",
            self.progress_percentage()
        ));

        md.push_str("## Phases\n\n");
        md.push_str("| Phase | Completed | Total | Ratio |\n");
        md.push_str("|-------|-----------|-------|-------|\n");
        for progress in &self.phases {
            md.push_str(&format!(
                "| {} | {} | {} | {:.0}% |\n",
                progress.phase,
                progress.completed,
                progress.total,
                progress.ratio() * 100.0
            ));
        }
        md.push('\n');

        if !self.bridge_dependencies.is_empty() {
            md.push_str("## Bridge Dependencies\n\n");
            md.push_str("| Builtin | Files |\n");
            md.push_str("|---------|-------|\n");
            for usage in &self.bridge_dependencies {
                md.push_str(&format!("| `{}` | {} |\n", usage.name, usage.files));
            }
            md.push('\n');
        }

        if !self.failures.is_empty() {
            md.push_str("## Failures\n\n");
            for failure in &self.failures {
                md.push_str(&format!("- `{}`: {}\n", failure.file, failure.note));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        md.push_str("*Generated by psmigrate*\n");
        md
    }

    /// Generate JSON report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Generate plain text report
    pub fn to_text(&self) -> String {
        let mut text = String::new();

        text.push_str(&format!("MIGRATION REPORT: {}\n", self.project_name));
        text.push_str(&format!(
            "Generated: {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        text.push_str(&"=".repeat(80));
        text.push_str("\n\n");

        text.push_str("SUMMARY\n");
        text.push_str(&"-".repeat(80));
        text.push('\n');
        text.push_str(&format!("Total Files: {}\n", self.total_files));
        text.push_str(&format!("Completed:   {}\n", self.completed));
        text.push_str(&format!("Failed:      {}\n", self.failed));
        text.push_str(&format!("Pending:     {}\n", self.pending));
        text.push_str(&format!("Progress:    {:.0}%\n\n", self.progress_percentage()));

        text.push_str("PHASES\n");
        text.push_str(&"-".repeat(80));
        text.push('\n');
        for progress in &self.phases {
            text.push_str(&format!(
                "{:18} {:4}/{:<4} {:5.0}%\n",
                format!("{}", progress.phase),
                progress.completed,
                progress.total,
                progress.ratio() * 100.0
            ));
        }
        text.push('\n');

        if !self.bridge_dependencies.is_empty() {
            text.push_str("BRIDGE DEPENDENCIES\n");
            text.push_str(&"-".repeat(80));
            text.push('\n');
            for usage in &self.bridge_dependencies {
                text.push_str(&format!("{:30} {:4} files\n", usage.name, usage.files));
            }
            text.push('\n');
        }

        if !self.failures.is_empty() {
            text.push_str("FAILURES\n");
            text.push_str(&"-".repeat(80));
            text.push('\n');
            for failure in &self.failures {
                text.push_str(&format!("{}\n  {}\n", failure.file, failure.note));
            }
            text.push('\n');
        }

        text
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Markdown => Ok(self.to_markdown()),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Save report to file
    pub fn save(&self, path: &Path, format: ReportFormat) -> Result<()> {
        let content = self.render(format)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
    Text,
}

// ============================================================================
// Rollback
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptFlavor {
    /// POSIX `sh`
    #[default]
    Shell,
    PowerShell,
}

impl ScriptFlavor {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ScriptFlavor::Shell => "rollback.sh",
            ScriptFlavor::PowerShell => "rollback.ps1",
        }
    }
}

/// Deletes converted outputs of completed files. Sources, and partial
/// outputs of failed attempts, are left alone.
#[derive(Debug, Clone)]
pub struct RollbackScript {
    pub flavor: ScriptFlavor,
    pub files: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl RollbackScript {
    pub fn new(flavor: ScriptFlavor, files: Vec<PathBuf>) -> Self {
        Self {
            flavor,
            files,
            created_at: Utc::now(),
        }
    }

    pub fn render(&self) -> String {
        let stamp = self.created_at.format("%Y-%m-%d %H:%M:%S UTC");
        let mut out = String::new();
        match self.flavor {
            ScriptFlavor::Shell => {
                out.push_str("#!/bin/sh\n");
                out.push_str(&format!("# Rollback generated by psmigrate on {}\n", stamp));
                out.push_str(&format!(
                    "# Removes {} converted files; source scripts are not touched.\n",
                    self.files.len()
                ));
                out.push_str("set -u\n\n");
                for file in &self.files {
                    out.push_str(&format!("rm -f -- {}\n", sh_quote(&file.to_string_lossy())));
                }
                out.push_str(&format!("\necho \"Rolled back {} files\"\n", self.files.len()));
            }
            ScriptFlavor::PowerShell => {
                out.push_str(&format!("# Rollback generated by psmigrate on {}\n", stamp));
                out.push_str(&format!(
                    "# Removes {} converted files; source scripts are not touched.\n\n",
                    self.files.len()
                ));
                for file in &self.files {
                    out.push_str(&format!(
                        "Remove-Item -LiteralPath {} -Force -ErrorAction SilentlyContinue\n",
                        ps_quote(&file.to_string_lossy())
                    ));
                }
                out.push_str(&format!(
                    "\nWrite-Host \"Rolled back {} files\"\n",
                    self.files.len()
                ));
            }
        }
        out
    }

    /// Write the script, executable on Unix
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write rollback script {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
                .with_context(|| format!("Failed to mark {} executable", path.display()))?;
        }
        Ok(())
    }
}

fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

fn ps_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
