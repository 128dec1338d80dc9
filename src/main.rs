use clap::{Parser, Subcommand};
use colored::Colorize;
use psmigrate::config::{MigrationConfig, CONFIG_FILENAME};
use psmigrate::converter::Converter;
use psmigrate::orchestrator::MigrationOrchestrator;
use psmigrate::report::{ReportFormat, ScriptFlavor};
use psmigrate::types::{ConversionLevel, MigrationState, Phase};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "psmigrate")]
#[command(version, about = "Migrate PowerShell script trees to Python", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file for a source tree
    Init {
        /// Source tree path
        #[arg(long, default_value = ".")]
        source: PathBuf,

        /// Output directory for converted files
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Analyze every script and write the migration plan
    Analyze,

    /// Convert a single file without touching migration state
    Convert {
        /// Script to convert
        file: PathBuf,

        /// Conversion level (full, bridge, hybrid)
        #[arg(long)]
        level: Option<ConversionLevel>,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Migrate one file, relative to the source root
    Migrate {
        path: PathBuf,

        /// Re-convert even if already completed
        #[arg(long)]
        force: bool,
    },

    /// Migrate every file of a phase (1-4, core, api, gui, other)
    MigratePhase { phase: Phase },

    /// Show per-file migration status
    Status,

    /// Generate a progress report
    Report {
        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormatArg,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a script that deletes every converted file
    Rollback {
        /// Script flavor
        #[arg(long, value_enum, default_value = "sh")]
        format: RollbackFormatArg,

        /// Script path (default: next to the migration state)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ReportFormatArg {
    /// Human-readable text output
    Text,
    /// Markdown output
    Markdown,
    /// JSON output
    Json,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Text => ReportFormat::Text,
            ReportFormatArg::Markdown => ReportFormat::Markdown,
            ReportFormatArg::Json => ReportFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum RollbackFormatArg {
    /// POSIX shell script
    Sh,
    /// PowerShell script
    Powershell,
}

impl From<RollbackFormatArg> for ScriptFlavor {
    fn from(arg: RollbackFormatArg) -> Self {
        match arg {
            RollbackFormatArg::Sh => ScriptFlavor::Shell,
            RollbackFormatArg::Powershell => ScriptFlavor::PowerShell,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter_layer = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::new("info")
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("psmigrate v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init {
            source,
            output,
            force,
        } => cmd_init(&cli.config, source, output, force),
        Commands::Analyze => cmd_analyze(&cli.config),
        Commands::Convert {
            file,
            level,
            output,
        } => cmd_convert(&cli.config, &file, level, output.as_deref()),
        Commands::Migrate { path, force } => cmd_migrate(&cli.config, &path, force),
        Commands::MigratePhase { phase } => cmd_migrate_phase(&cli.config, phase),
        Commands::Status => cmd_status(&cli.config),
        Commands::Report { format, output } => {
            cmd_report(&cli.config, format.into(), output.as_deref())
        }
        Commands::Rollback { format, output } => {
            cmd_rollback(&cli.config, format.into(), output)
        }
    }
}

fn load_orchestrator(config_path: &Path) -> anyhow::Result<MigrationOrchestrator> {
    let config = MigrationConfig::load_or_default(config_path)?;
    MigrationOrchestrator::new(config)
}

// ============================================================================
// Init / Analyze
// ============================================================================

fn cmd_init(
    config_path: &Path,
    source: PathBuf,
    output: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    println!("{}", "Initializing psmigrate project...".bright_cyan().bold());
    println!();

    let mut config = MigrationConfig::for_source(&source);
    if let Some(output) = output {
        config.output.path = output;
    }
    config.save(config_path)?;

    println!(
        "{} Created configuration: {}",
        "✓".bright_green(),
        config_path.display()
    );
    println!("{}: {}", "Project name".bold(), config.project.name.cyan());
    println!("{}: {}", "Source".bold(), config.source.path.display());
    println!("{}: {}", "Output".bold(), config.output.path.display());
    println!("{}: {}", "Level".bold(), config.conversion.level);
    println!();
    println!("Next: run {}", "psmigrate analyze".cyan());
    Ok(())
}

fn cmd_analyze(config_path: &Path) -> anyhow::Result<()> {
    let orchestrator = load_orchestrator(config_path)?;
    println!("{}", "Analyzing scripts...".bright_cyan().bold());

    let plan = orchestrator.analyze_project()?;

    println!();
    println!("{}", "Migration Plan".bright_yellow().bold());
    println!("{}", "=".repeat(50));
    for phase in Phase::all() {
        let files = plan.files_in(phase);
        println!(
            "  {:18} {} files",
            format!("{}", phase).cyan(),
            files.len()
        );
        for file in files {
            let effort = plan
                .estimated_effort
                .get(file)
                .map(|e| e.to_string())
                .unwrap_or_default();
            println!("    {} {}", file, format!("[{}]", effort).dimmed());
        }
    }
    println!("{}", "=".repeat(50));
    println!(
        "{} {} scripts planned; saved to {}",
        "✓".bright_green(),
        plan.total_files,
        orchestrator.config().state.plan_path().display()
    );
    Ok(())
}

// ============================================================================
// Conversion / Migration
// ============================================================================

fn cmd_convert(
    config_path: &Path,
    file: &Path,
    level: Option<ConversionLevel>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = MigrationConfig::load_or_default(config_path)?;
    if let Some(level) = level {
        config.conversion.level = level;
    }
    let converter = Converter::from_config(&config)?;
    let result = converter.convert_file(file)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &result.translated_source)?;
            eprintln!(
                "{} Wrote {} ({} lines, level {})",
                "✓".bright_green(),
                path.display(),
                result.line_count(),
                result.conversion_level
            );
        }
        None => print!("{}", result.translated_source),
    }

    if !result.bridge_calls.is_empty() {
        eprintln!(
            "{} bridged: {}",
            "ℹ".bright_blue(),
            result.bridge_calls.join(", ")
        );
    }
    for warning in &result.warnings {
        eprintln!("{} {}", "⚠".bright_yellow(), warning);
    }
    Ok(())
}

fn cmd_migrate(config_path: &Path, path: &Path, force: bool) -> anyhow::Result<()> {
    let mut orchestrator = load_orchestrator(config_path)?;
    let outcome = orchestrator.migrate_file(path, force)?;

    if outcome.success {
        println!("{} {}", "✓".bright_green(), outcome.message);
        Ok(())
    } else {
        println!("{} {}", "✗".bright_red(), outcome.message);
        anyhow::bail!("Migration of {} failed", path.display())
    }
}

fn cmd_migrate_phase(config_path: &Path, phase: Phase) -> anyhow::Result<()> {
    let mut orchestrator = load_orchestrator(config_path)?;
    println!(
        "{}",
        format!("Migrating phase: {}", phase).bright_cyan().bold()
    );
    println!();

    let summary = orchestrator.migrate_phase(phase)?;
    for (_, outcome) in &summary.outcomes {
        let icon = if outcome.success {
            "✓".bright_green()
        } else {
            "✗".bright_red()
        };
        println!("  {} {}", icon, outcome.message);
    }

    println!();
    println!(
        "{} succeeded, {} failed ({} attempted)",
        summary.succeeded.to_string().green(),
        summary.failed.to_string().red(),
        summary.attempted()
    );
    if summary.failed > 0 {
        anyhow::bail!("{} files failed in phase {}", summary.failed, phase);
    }
    Ok(())
}

// ============================================================================
// Status / Report / Rollback
// ============================================================================

fn cmd_status(config_path: &Path) -> anyhow::Result<()> {
    let orchestrator = load_orchestrator(config_path)?;
    let records = orchestrator.statuses();

    println!("{}", "Migration Status".bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());

    if records.is_empty() {
        println!("  No files migrated yet.");
        println!();
        println!("Run {} to start.", "psmigrate migrate-phase core".cyan());
        return Ok(());
    }

    for (file, status) in records {
        let icon = match status.status {
            MigrationState::Completed => "✓".bright_green(),
            MigrationState::Failed => "✗".bright_red(),
            MigrationState::InProgress => "⏳".bright_yellow(),
        };
        println!(
            "  {} {} [{}] {} → {} lines",
            icon,
            file,
            status.conversion_level,
            status.original_line_count,
            status.converted_line_count
        );
        if status.status == MigrationState::Failed {
            if let Some(note) = status.notes.first() {
                println!("      {}", note.dimmed());
            }
        }
    }

    let completed = records.values().filter(|s| s.is_completed()).count();
    println!("{}", "─".repeat(60).dimmed());
    println!("  {}/{} completed", completed, records.len());
    Ok(())
}

fn cmd_report(
    config_path: &Path,
    format: ReportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let orchestrator = load_orchestrator(config_path)?;
    let report = orchestrator.create_migration_report()?;

    match output {
        Some(path) => {
            report.save(path, format)?;
            println!(
                "{} Report saved to {}",
                "✓".bright_green(),
                path.display()
            );
        }
        None => print!("{}", report.render(format)?),
    }
    Ok(())
}

fn cmd_rollback(
    config_path: &Path,
    flavor: ScriptFlavor,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let orchestrator = load_orchestrator(config_path)?;
    let script = orchestrator.create_rollback_script(flavor);

    let path = output.unwrap_or_else(|| {
        orchestrator
            .config()
            .state
            .dir
            .join(flavor.default_file_name())
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    script.save(&path)?;

    println!(
        "{} Rollback script for {} files: {}",
        "✓".bright_green(),
        script.files.len(),
        path.display()
    );
    Ok(())
}
