//! Source-to-source conversion engine.
//!
//! A [`Converter`] owns the lookup tables, the lexical rule table and an
//! ordered list of passes. Converting a file parses it into a block tree,
//! runs every pass over one [`SourceUnit`], and collects what the passes
//! reported into a [`ConversionResult`].

use crate::config::MigrationConfig;
use crate::error::ConversionError;
use crate::mappings::Mappings;
use crate::passes::{
    CastPass, CmdletPass, ControlFlowPass, ConversionContext, ConversionOptions, ConversionPass,
    FunctionPass, ImportPass, LexicalPass, ParamBlockPass, PipelinePass, SourceUnit,
};
use crate::rules::RuleEngine;
use crate::syntax;
use crate::types::ConversionLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Output of converting one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub source_name: String,
    pub translated_source: String,
    pub imports: BTreeSet<String>,
    pub warnings: Vec<String>,
    /// Builtins routed through the bridge, in first-use order
    pub bridge_calls: Vec<String>,
    pub conversion_level: ConversionLevel,
}

impl ConversionResult {
    pub fn line_count(&self) -> usize {
        self.translated_source.lines().count()
    }
}

/// Ordered pass pipeline
pub struct Converter {
    options: ConversionOptions,
    mappings: Arc<Mappings>,
    passes: Vec<Box<dyn ConversionPass + Send + Sync>>,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("options", &self.options)
            .field("passes", &self.pass_names())
            .finish()
    }
}

impl Converter {
    /// Build the standard pipeline
    pub fn new(options: ConversionOptions) -> Result<Self, ConversionError> {
        let mappings = Arc::new(Mappings::new());
        let engine = Arc::new(RuleEngine::lexical(&options.bridge_handle)?);

        let converter = Self {
            passes: Vec::new(),
            mappings: Arc::clone(&mappings),
            options: options.clone(),
        }
        .add_pass(Box::new(FunctionPass::new(Arc::clone(&mappings))))
        .add_pass(Box::new(ParamBlockPass::new(Arc::clone(&mappings))))
        .add_pass(Box::new(ControlFlowPass::new()))
        .add_pass(Box::new(LexicalPass::new(engine)))
        .add_pass(Box::new(CmdletPass::new(
            Arc::clone(&mappings),
            &options.bridge_handle,
        )))
        .add_pass(Box::new(CastPass::new(Arc::clone(&mappings))))
        .add_pass(Box::new(PipelinePass::new()))
        .add_pass(Box::new(ImportPass::new()));
        Ok(converter)
    }

    /// Standard pipeline with default options at `level`
    pub fn with_level(level: ConversionLevel) -> Result<Self, ConversionError> {
        Self::new(ConversionOptions {
            level,
            ..ConversionOptions::default()
        })
    }

    pub fn from_config(config: &MigrationConfig) -> Result<Self, ConversionError> {
        Self::new(ConversionOptions::from(config))
    }

    /// Append a pass to the pipeline
    pub fn add_pass(mut self, pass: Box<dyn ConversionPass + Send + Sync>) -> Self {
        self.passes.push(pass);
        self
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn level(&self) -> ConversionLevel {
        self.options.level
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    /// Convert source text; `source_name` appears in the header and logs
    pub fn convert_code(
        &self,
        source: &str,
        source_name: &str,
    ) -> Result<ConversionResult, ConversionError> {
        info!("Converting {} at level {}", source_name, self.options.level);

        let mut unit = SourceUnit::parse(source)?;
        let mut ctx = ConversionContext::new(source_name, self.options.clone());

        for (idx, pass) in self.passes.iter().enumerate() {
            debug!(
                "Running pass {}/{}: {}",
                idx + 1,
                self.passes.len(),
                pass.name()
            );
            pass.apply(&mut unit, &mut ctx)?;
        }

        let translated_source = unit.into_text();
        flag_leftovers(&translated_source, &mut ctx);

        debug!(
            "{}: {} warnings, {} bridge calls",
            source_name,
            ctx.warnings.len(),
            ctx.bridge_calls.len()
        );
        Ok(ConversionResult {
            source_name: ctx.source_name,
            translated_source,
            imports: ctx.imports,
            warnings: ctx.warnings,
            bridge_calls: ctx.bridge_calls,
            conversion_level: self.options.level,
        })
    }

    pub fn convert_file(&self, path: &Path) -> Result<ConversionResult, ConversionError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConversionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.convert_code(&source, &name)
    }
}

/// Report source constructs that survived every pass
fn flag_leftovers(text: &str, ctx: &mut ConversionContext) {
    for (idx, line) in text.lines().enumerate() {
        let code = strip_literals(line);
        if code.contains("@{") {
            ctx.warnings.push(format!(
                "output line {}: unconverted hashtable literal",
                idx + 1
            ));
        }
        if code.contains("]::") {
            ctx.warnings.push(format!(
                "output line {}: unconverted .NET static member",
                idx + 1
            ));
        }
        if code.contains('$') {
            ctx.warnings.push(format!(
                "output line {}: leftover '$' outside a string",
                idx + 1
            ));
        }
    }
}

/// A line with its string literals and comment removed
fn strip_literals(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for (start, end) in syntax::string_ranges(line) {
        out.push_str(&line[last..start]);
        last = end;
    }
    out.push_str(&line[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn convert(source: &str, level: ConversionLevel) -> ConversionResult {
        Converter::with_level(level)
            .unwrap()
            .convert_code(source, "test.ps1")
            .unwrap()
    }

    // ============================================================================
    // END-TO-END SCENARIOS
    // ============================================================================

    #[test]
    fn test_function_with_typed_parameter() {
        let source = "function Get-User { param([string]$Name = \"x\") Write-Host $Name }";
        let result = convert(source, ConversionLevel::Full);
        assert!(result
            .translated_source
            .contains("def get_user(Name: str = \"x\"):"));
        assert!(result.translated_source.contains("    print(Name)"));
    }

    #[test]
    fn test_allman_function_and_if_else() {
        let source = "function Get-Thing\n{\n    param([string]$Name)\n    if ($Name -eq $null)\n    {\n        Write-Host 'none'\n    }\n    else\n    {\n        Write-Host $Name\n    }\n}\n";
        let result = convert(source, ConversionLevel::Full);
        let out = &result.translated_source;
        assert!(out.contains("def get_thing(Name: str):"), "{}", out);
        assert!(out.contains("    if Name == None:"), "{}", out);
        assert!(out.contains("    else:"), "{}", out);
        assert!(out.contains("        print(Name)"), "{}", out);
    }

    #[test]
    fn test_if_else_with_null_comparison() {
        let source = "if ($a -eq $null) { Write-Host 'a' } else { Write-Host 'b' }";
        let result = convert(source, ConversionLevel::Full);
        assert!(result.translated_source.contains("if a == None:"));
        assert!(result.translated_source.contains("else:"));
        assert!(result.translated_source.contains("    print('a')"));
    }

    #[test]
    fn test_hybrid_bridges_runtime_builtin() {
        let result = convert("$p = Get-Process\n", ConversionLevel::Hybrid);
        assert!(result
            .translated_source
            .contains("p = bridge.invoke(\"Get-Process\")"));
        assert_eq!(result.bridge_calls, vec!["Get-Process".to_string()]);
        assert!(result
            .imports
            .contains("from powershell_bridge import bridge"));
    }

    #[test]
    fn test_full_level_warns_on_runtime_builtin() {
        let result = convert("$p = Get-Process\n", ConversionLevel::Full);
        assert!(result.bridge_calls.is_empty());
        assert!(result.translated_source.contains("psutil"));
        assert!(result.warnings.iter().any(|w| w.contains("Get-Process")));
    }

    #[test]
    fn test_bridge_level_bridges_unmapped_command() {
        let result = convert("Invoke-Custom -Name x\n", ConversionLevel::Bridge);
        assert!(result
            .translated_source
            .contains("bridge.invoke(\"Invoke-Custom\", Name=x)"));
        assert!(result.bridge_calls.contains(&"Invoke-Custom".to_string()));
    }

    #[test]
    fn test_unmapped_command_warns_below_bridge_level() {
        let result = convert("Invoke-Custom -Name x\n", ConversionLevel::Hybrid);
        assert!(result.translated_source.contains("Invoke-Custom -Name x"));
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("unmapped command 'Invoke-Custom'")));
    }

    #[test]
    fn test_pipeline_filter_becomes_comprehension() {
        let result = convert(
            "$big = $files | Where-Object { $_.Size -gt 10 }\n",
            ConversionLevel::Full,
        );
        assert!(result
            .translated_source
            .contains("big = [item for item in files if item.Size > 10]"));
    }

    #[test]
    fn test_piped_builtin_keeps_its_input() {
        let result = convert("$text = $obj | ConvertTo-Json\n", ConversionLevel::Full);
        let out = &result.translated_source;
        assert!(out.contains("text = json.dumps(obj)"));
        assert!(!out.contains("| json.dumps()"));

        let result = convert(
            "$data | ConvertTo-Json | Out-File x.json\n",
            ConversionLevel::Full,
        );
        assert!(!result.translated_source.contains("json.dumps()"));
        assert!(result.warnings.iter().any(|w| w.contains("3 stages")));
    }

    #[test]
    fn test_interpolated_string() {
        let result = convert("$msg = \"Hello $name\"\n", ConversionLevel::Full);
        assert!(result.translated_source.contains("msg = f\"Hello {name}\""));
    }

    #[test]
    fn test_local_function_call() {
        let source = "function Get-User { param([string]$Name) Write-Host $Name }\nGet-User -Name \"bob\"\n";
        let result = convert(source, ConversionLevel::Hybrid);
        assert!(result.translated_source.contains("get_user(Name=\"bob\")"));
        assert!(result.warnings.iter().all(|w| !w.contains("unmapped")));
    }

    #[test]
    fn test_header_and_imports_prefix() {
        let result = convert("$x = Test-Path $p\n", ConversionLevel::Full);
        let text = &result.translated_source;
        assert!(text.starts_with("# Converted from test.ps1 by psmigrate (level: FULL)\n\nimport os\n\n"));
        assert!(text.contains("x = os.path.exists(p)"));
    }

    #[test]
    fn test_header_can_be_disabled() {
        let converter = Converter::new(ConversionOptions {
            header: false,
            ..ConversionOptions::default()
        })
        .unwrap();
        let result = converter.convert_code("$a = 1\n", "a.ps1").unwrap();
        assert_eq!(result.translated_source, "a = 1\n");
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let source = "foreach ($f in $files) {\n  if ($f.Name -like '*.log') { Remove-Item $f.FullName }\n}\n";
        let a = convert(source, ConversionLevel::Hybrid);
        let b = convert(source, ConversionLevel::Hybrid);
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn test_assignments_convert_identically(
            name in "[a-z][a-zA-Z]{0,8}",
            value in 0i64..10_000,
            word in "[a-z]{1,8}",
        ) {
            let source = format!(
                "${name} = {value}\nif (${name} -gt 1) {{ Write-Output \"{word} ${name}\" }}\n"
            );
            let converter = Converter::with_level(ConversionLevel::Hybrid).unwrap();
            let first = converter.convert_code(&source, "p.ps1").unwrap();
            let second = converter.convert_code(&source, "p.ps1").unwrap();
            prop_assert_eq!(first, second);
        }
    }

    // ============================================================================
    // ERRORS AND WARNINGS
    // ============================================================================

    #[test]
    fn test_parse_error_propagates() {
        let converter = Converter::with_level(ConversionLevel::Full).unwrap();
        let err = converter.convert_code("if ($a) {\n", "bad.ps1").unwrap_err();
        assert!(matches!(err, ConversionError::Parse { .. }));
    }

    #[test]
    fn test_tree_pass_after_render_is_rejected() {
        let converter = Converter::with_level(ConversionLevel::Full)
            .unwrap()
            .add_pass(Box::new(ControlFlowPass::new()));
        let err = converter.convert_code("$a = 1\n", "a.ps1").unwrap_err();
        assert!(matches!(err, ConversionError::PassOrder { ref pass } if pass == "control_flow"));
    }

    #[test]
    fn test_leftover_dotnet_static_is_flagged_at_full() {
        let result = convert("$v = [Environment]::MachineName\n", ConversionLevel::Full);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("unconverted .NET static member")));
    }

    #[test]
    fn test_convert_file_missing() {
        let converter = Converter::with_level(ConversionLevel::Full).unwrap();
        let err = converter
            .convert_file(Path::new("/nonexistent/script.ps1"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Io { .. }));
    }

    #[test]
    fn test_pass_order() {
        let converter = Converter::with_level(ConversionLevel::Hybrid).unwrap();
        assert_eq!(
            converter.pass_names(),
            vec![
                "functions",
                "params",
                "control_flow",
                "lexical",
                "cmdlets",
                "casts",
                "pipelines",
                "imports"
            ]
        );
    }
}
