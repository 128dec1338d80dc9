//! Resumable, phase-ordered migration of a script tree.
//!
//! The orchestrator owns one [`Converter`], one validator and the status
//! store. Per file the lifecycle is: no record (pending) → completed or
//! failed. A completed file is skipped unless forced; a failed one is
//! retried on the next run. Every attempt overwrites the file's record.

mod layout;
mod store;

pub use layout::{classify_phase, destination_for, relative_key, TARGET_EXTENSION};
pub use store::{load_plan, save_plan, StatusStore};

use crate::analyzer::{discover_scripts, Analyzer};
use crate::config::MigrationConfig;
use crate::converter::Converter;
use crate::report::{MigrationReport, RollbackScript, ScriptFlavor};
use crate::types::{MigrationPlan, MigrationState, MigrationStatus, Phase};
use crate::validate::{validator_for, SyntaxValidator};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one `migrate_file` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub success: bool,
    pub message: String,
}

impl FileOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Tally of a `migrate_phase` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub succeeded: usize,
    pub failed: usize,
    /// (relative path, outcome) in plan order
    pub outcomes: Vec<(String, FileOutcome)>,
}

impl PhaseSummary {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

pub struct MigrationOrchestrator {
    config: MigrationConfig,
    converter: Converter,
    analyzer: Analyzer,
    validator: Box<dyn SyntaxValidator + Send + Sync>,
    status: StatusStore,
    conversions: usize,
}

impl std::fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("source", &self.config.source.path)
            .field("output", &self.config.output.path)
            .field("validator", &self.validator.name())
            .field("records", &self.status.records().len())
            .finish()
    }
}

impl MigrationOrchestrator {
    /// Build from configuration, reading the status store once
    pub fn new(config: MigrationConfig) -> Result<Self> {
        let converter =
            Converter::from_config(&config).context("Failed to build the conversion pipeline")?;
        let validator = validator_for(&config.validation)?;
        let status = StatusStore::load(&config.state.status_path())?;
        info!(
            "Orchestrator ready: {} → {} ({} status records)",
            config.source.path.display(),
            config.output.path.display(),
            status.records().len()
        );
        Ok(Self {
            config,
            converter,
            analyzer: Analyzer::new(),
            validator,
            status,
            conversions: 0,
        })
    }

    /// Replace the validator, e.g. with a stricter or stub checker
    pub fn with_validator(mut self, validator: Box<dyn SyntaxValidator + Send + Sync>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Number of conversions run by this instance
    pub fn conversions(&self) -> usize {
        self.conversions
    }

    pub fn statuses(&self) -> &BTreeMap<String, MigrationStatus> {
        self.status.records()
    }

    fn source_root(&self) -> &Path {
        &self.config.source.path
    }

    /// Full source path and relative key for a path given relative to the
    /// source root (or already under it)
    fn resolve(&self, path: &Path) -> (PathBuf, String) {
        let root = self.source_root();
        let full = if path.is_absolute() || path.starts_with(root) {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let key = relative_key(&full, root);
        (full, key)
    }

    /// Destination of a source file under the output root
    pub fn destination_of(&self, relative: &str) -> PathBuf {
        self.config
            .output
            .path
            .join(destination_for(relative, &self.config.layout))
    }

    // ========================================================================
    // Planning
    // ========================================================================

    /// Classify and analyze every script, persisting a fresh plan
    pub fn analyze_project(&self) -> Result<MigrationPlan> {
        let root = self.source_root();
        let scripts = discover_scripts(root, &self.config.source)?;
        info!("Analyzing {} scripts", scripts.len());

        let mut plan = MigrationPlan::new();
        for script in &scripts {
            let key = relative_key(script, root);
            let analysis = self.analyzer.analyze_script(script)?;
            let phase = classify_phase(&key, &self.config.phases);
            debug!("{} → {}", key, phase);

            plan.phases.entry(phase).or_default().push(key.clone());
            plan.dependencies
                .insert(key.clone(), analysis.cmdlets.keys().cloned().collect());
            plan.estimated_effort.insert(key, analysis.estimated_effort);
        }
        plan.total_files = scripts.len();

        save_plan(&self.config.state.plan_path(), &plan)?;
        info!("Plan saved to {}", self.config.state.plan_path().display());
        Ok(plan)
    }

    /// The persisted plan, or a fresh one when none exists
    pub fn plan(&self) -> Result<MigrationPlan> {
        match load_plan(&self.config.state.plan_path())? {
            Some(plan) => Ok(plan),
            None => self.analyze_project(),
        }
    }

    // ========================================================================
    // Migration
    // ========================================================================

    /// Convert, write and validate one file, recording the outcome.
    ///
    /// Errors are returned only when no conversion happened (the source
    /// could not be read) or the status store could not be written.
    pub fn migrate_file(&mut self, path: &Path, force: bool) -> Result<FileOutcome> {
        let (source, key) = self.resolve(path);

        if !force && self.status.get(&key).is_some_and(MigrationStatus::is_completed) {
            debug!("Skipping {}: already completed", key);
            return Ok(FileOutcome::success(format!("Already migrated: {}", key)));
        }
        if !source.is_file() {
            bail!("Source file not found: {}", source.display());
        }
        let original = fs::read_to_string(&source)
            .with_context(|| format!("Failed to read {}", source.display()))?;

        let destination = self.destination_of(&key);
        info!("Migrating {} → {}", key, destination.display());
        self.conversions += 1;

        let mut status = MigrationStatus {
            file_path: key.clone(),
            original_line_count: original.lines().count(),
            converted_line_count: 0,
            conversion_level: self.converter.level(),
            bridge_dependencies: Vec::new(),
            status: MigrationState::InProgress,
            notes: Vec::new(),
            timestamp: Utc::now(),
        };

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.clone());
        let outcome = match self.converter.convert_code(&original, &name) {
            Ok(result) => {
                status.converted_line_count = result.line_count();
                status.bridge_dependencies = result.bridge_calls.clone();
                status.notes = result.warnings.clone();
                match self.write_and_validate(&destination, &result.translated_source) {
                    Ok(()) => {
                        status.status = MigrationState::Completed;
                        FileOutcome::success(format!(
                            "Migrated {} → {} ({} warnings)",
                            key,
                            destination.display(),
                            result.warnings.len()
                        ))
                    }
                    Err(e) => {
                        status.status = MigrationState::Failed;
                        status.notes.insert(0, e.clone());
                        FileOutcome::failure(format!("{}: {}", key, e))
                    }
                }
            }
            Err(e) => {
                status.status = MigrationState::Failed;
                status.notes = vec![format!("conversion failed: {}", e)];
                FileOutcome::failure(format!("{}: conversion failed: {}", key, e))
            }
        };

        if !outcome.success {
            warn!("{}", outcome.message);
        }
        status.timestamp = Utc::now();
        self.status.record(status)?;
        Ok(outcome)
    }

    /// Write output, then re-read and validate what landed on disk
    fn write_and_validate(&self, destination: &Path, text: &str) -> Result<(), String> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }
        fs::write(destination, text)
            .map_err(|e| format!("failed to write {}: {}", destination.display(), e))?;
        let written = fs::read_to_string(destination)
            .map_err(|e| format!("failed to re-read {}: {}", destination.display(), e))?;
        self.validator
            .validate(&written)
            .map_err(|e| format!("validation failed ({}): {}", self.validator.name(), e))
    }

    /// Migrate every file of a phase in plan order; one failure never stops
    /// the batch
    pub fn migrate_phase(&mut self, phase: Phase) -> Result<PhaseSummary> {
        let plan = self.plan()?;
        let files = plan.files_in(phase).to_vec();
        info!("Migrating phase {} ({} files)", phase, files.len());

        let mut summary = PhaseSummary {
            phase,
            succeeded: 0,
            failed: 0,
            outcomes: Vec::with_capacity(files.len()),
        };
        for file in files {
            let outcome = match self.migrate_file(Path::new(&file), false) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{}: {:#}", file, e);
                    FileOutcome::failure(format!("{}: {:#}", file, e))
                }
            };
            if outcome.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary.outcomes.push((file, outcome));
        }

        info!(
            "Phase {} done: {} succeeded, {} failed",
            phase, summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Progress over the plan and every persisted record
    pub fn create_migration_report(&self) -> Result<MigrationReport> {
        let plan = self.plan()?;
        Ok(MigrationReport::build(
            &self.config.project.name,
            &plan,
            self.status.records(),
        ))
    }

    /// Script deleting the destination of every completed file
    pub fn create_rollback_script(&self, flavor: ScriptFlavor) -> RollbackScript {
        let files: Vec<PathBuf> = self
            .status
            .records()
            .values()
            .filter(|s| s.is_completed())
            .map(|s| self.destination_of(&s.file_path))
            .collect();
        RollbackScript::new(flavor, files)
    }
}
