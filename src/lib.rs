// Library exports for the psmigrate conversion engine and orchestrator
pub mod analyzer;
pub mod config;
pub mod converter;
pub mod error;
pub mod mappings;
pub mod naming;
pub mod orchestrator;
pub mod passes;
pub mod report;
pub mod rules;
pub mod syntax;
pub mod types;
pub mod validate;

// Re-export key types for convenience
pub use analyzer::{Analyzer, ScriptAnalysis};
pub use config::MigrationConfig;
pub use converter::{ConversionResult, Converter};
pub use error::{ConversionError, ValidationError};
pub use orchestrator::{FileOutcome, MigrationOrchestrator, PhaseSummary};
pub use report::{MigrationReport, ReportFormat, RollbackScript, ScriptFlavor};
pub use types::{
    Complexity, ConversionLevel, Effort, MigrationPlan, MigrationState, MigrationStatus, Phase,
};
pub use validate::{BuiltinValidator, SyntaxValidator};
