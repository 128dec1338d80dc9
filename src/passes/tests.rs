//! Conversion pass tests.

#![cfg(test)]

use super::*;
use crate::error::ConversionError;
use crate::mappings::Mappings;
use crate::types::ConversionLevel;
use std::sync::Arc;

fn options(level: ConversionLevel) -> ConversionOptions {
    ConversionOptions {
        level,
        header: false,
        ..ConversionOptions::default()
    }
}

fn run_with(
    source: &str,
    passes: &[&dyn ConversionPass],
    options: ConversionOptions,
) -> (String, ConversionContext) {
    let mut unit = SourceUnit::parse(source).unwrap();
    let mut ctx = ConversionContext::new("test.ps1", options);
    for pass in passes {
        pass.apply(&mut unit, &mut ctx).unwrap();
    }
    (unit.into_text(), ctx)
}

fn run(
    source: &str,
    passes: &[&dyn ConversionPass],
    level: ConversionLevel,
) -> (String, ConversionContext) {
    run_with(source, passes, options(level))
}

fn mappings() -> Arc<Mappings> {
    Arc::new(Mappings::new())
}

fn has_warning(ctx: &ConversionContext, needle: &str) -> bool {
    ctx.warnings.iter().any(|w| w.contains(needle))
}

// ============================================================================
// SOURCE UNIT TESTS
// ============================================================================

#[test]
fn test_unit_renders_once() {
    let mut unit = SourceUnit::parse("$a = 1\n").unwrap();
    assert!(!unit.is_rendered());
    assert_eq!(unit.text_mut().as_str(), "$a = 1\n");
    assert!(unit.is_rendered());
}

#[test]
fn test_tree_access_after_render_fails() {
    let mut unit = SourceUnit::parse("$a = 1\n").unwrap();
    unit.text_mut();
    let err = unit.tree_mut("casts").unwrap_err();
    assert!(matches!(err, ConversionError::PassOrder { ref pass } if pass == "casts"));
}

#[test]
fn test_context_dedups_bridge_calls() {
    let mut ctx = ConversionContext::new("a.ps1", ConversionOptions::default());
    ctx.record_bridge_call("Get-Mailbox");
    ctx.record_bridge_call("Get-Team");
    ctx.record_bridge_call("Get-Mailbox");
    assert_eq!(ctx.bridge_calls, vec!["Get-Mailbox", "Get-Team"]);
    assert!(ctx.imports.contains("from powershell_bridge import bridge"));
}

#[test]
fn test_context_function_lookup() {
    let mut ctx = ConversionContext::new("a.ps1", ConversionOptions::default());
    ctx.define_function("Helper", "helper");
    assert_eq!(ctx.local_function("HELPER"), Some("helper"));
    assert!(ctx.declares_exactly("Helper"));
    assert!(!ctx.declares_exactly("helper"));
}

// ============================================================================
// FUNCTION PASS TESTS
// ============================================================================

#[test]
fn test_function_param_block() {
    let source = "function Get-UserReport {\n    [CmdletBinding()]\n    param(\n        [Parameter(Mandatory)][string]$Name,\n        [int]$Count = 5,\n        [switch]$Force\n    )\n    Write-Host $Name\n}\n";
    let pass = FunctionPass::new(mappings());
    let (text, ctx) = run(source, &[&pass], ConversionLevel::Hybrid);

    assert_eq!(
        text,
        "def get_user_report(Name: str, Count: int = 5, Force: bool = $false):\n    Write-Host $Name\n"
    );
    assert_eq!(ctx.local_function("get-userreport"), Some("get_user_report"));
}

#[test]
fn test_function_array_parameter_annotated() {
    let source = "function Set-Tags {\n    param([string[]]$Tags, [int[]]$Ids)\n    1\n}\n";
    let pass = FunctionPass::new(mappings());
    let (text, _) = run(source, &[&pass], ConversionLevel::Full);
    assert!(text.starts_with("def set_tags(Tags: list[str], Ids: list[int]):\n"), "{}", text);
}

#[test]
fn test_function_inline_params_fill_defaults() {
    let source = "function Set-It([string]$a = \"x\", $b) {\n    $b\n}\n";
    let pass = FunctionPass::new(mappings());
    let (text, _) = run(source, &[&pass], ConversionLevel::Hybrid);
    assert!(text.starts_with("def set_it(a: str = \"x\", b = $null):\n"));
}

#[test]
fn test_function_scope_prefix_dropped() {
    let pass = FunctionPass::new(mappings());
    let (text, ctx) = run("function global:Get-Thing {\n    1\n}\n", &[&pass], ConversionLevel::Full);
    assert!(text.starts_with("def get_thing():"));
    assert_eq!(ctx.local_function("Get-Thing"), Some("get_thing"));
}

#[test]
fn test_function_begin_process_flattened() {
    let source = "function Invoke-Step {\n    begin { $a = 1 }\n    process { $a }\n}\n";
    let pass = FunctionPass::new(mappings());
    let (text, ctx) = run(source, &[&pass], ConversionLevel::Full);
    assert_eq!(text, "def invoke_step():\n    $a = 1\n    $a\n");
    assert!(has_warning(&ctx, "flattened"));
}

#[test]
fn test_filter_is_flagged() {
    let pass = FunctionPass::new(mappings());
    let (text, ctx) = run("filter Only-Big {\n    $_\n}\n", &[&pass], ConversionLevel::Full);
    assert!(text.starts_with("def only_big():"));
    assert!(has_warning(&ctx, "plain function"));
}

#[test]
fn test_annotation_import_recorded() {
    let pass = FunctionPass::new(mappings());
    let (_, ctx) = run(
        "function Get-Age([datetime]$Since) {\n    $Since\n}\n",
        &[&pass],
        ConversionLevel::Full,
    );
    assert!(ctx.imports.contains("from datetime import datetime"));
}

#[test]
fn test_script_param_block_becomes_assignments() {
    let source = "[CmdletBinding()]\nparam([string]$Path = \".\", $Limit)\n$Path\n";
    let pass = ParamBlockPass::new(mappings());
    let (text, _) = run(source, &[&pass], ConversionLevel::Full);
    assert_eq!(text, "$Path: str = \".\"\n$Limit = $null\n$Path\n");
}

// ============================================================================
// CONTROL FLOW TESTS
// ============================================================================

#[test]
fn test_if_elseif_else_chain() {
    let source = "if ($a -gt 1) {\n    $b = 1\n} elseif ($a -eq 0) {\n    $b = 2\n} else {\n    $b = 3\n}\n";
    let (text, ctx) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert_eq!(
        text,
        "if $a -gt 1:\n    $b = 1\nelif $a -eq 0:\n    $b = 2\nelse:\n    $b = 3\n"
    );
    assert!(ctx.warnings.is_empty());
}

#[test]
fn test_foreach_loop() {
    let (text, _) = run(
        "foreach ($f in $files) {\n    Write-Host $f\n}\n",
        &[&ControlFlowPass::new()],
        ConversionLevel::Full,
    );
    assert_eq!(text, "for $f in $files:\n    Write-Host $f\n");
}

#[test]
fn test_counted_for_loops() {
    let pass = ControlFlowPass::new();
    let (text, _) = run("for ($i = 0; $i -lt 10; $i++) {\n    $i\n}\n", &[&pass], ConversionLevel::Full);
    assert_eq!(text, "for $i in range(0, 10):\n    $i\n");

    let (text, _) = run("for ($i = 1; $i -le $n; $i++) {\n    $i\n}\n", &[&pass], ConversionLevel::Full);
    assert!(text.starts_with("for $i in range(1, $n + 1):"));

    let (text, _) = run("for ($i = 10; $i -gt 0; $i--) {\n    $i\n}\n", &[&pass], ConversionLevel::Full);
    assert!(text.starts_with("for $i in range(10, 0, -1):"));
}

#[test]
fn test_general_for_becomes_while() {
    let (text, ctx) = run(
        "for ($i = 0; $i -lt 10; $i += 2) {\n    $i\n}\n",
        &[&ControlFlowPass::new()],
        ConversionLevel::Full,
    );
    assert_eq!(text, "$i = 0\nwhile $i -lt 10:\n    $i\n    $i += 2\n");
    assert!(has_warning(&ctx, "rewritten as while"));
}

#[test]
fn test_do_while_and_until() {
    let pass = ControlFlowPass::new();
    let (text, _) = run("do {\n    $n++\n} while ($n -lt 3)\n", &[&pass], ConversionLevel::Full);
    assert_eq!(
        text,
        "while $true:\n    $n++\n    if -not ($n -lt 3):\n        break\n"
    );

    let (text, _) = run("do {\n    $n++\n} until ($n -ge 3)\n", &[&pass], ConversionLevel::Full);
    assert!(text.contains("    if $n -ge 3:\n        break\n"));
}

#[test]
fn test_try_catch_finally() {
    let source = "try {\n    Remove-Item $p\n} catch [System.IO.IOException] {\n    Write-Host $_.Exception.Message\n} finally {\n    $done = $true\n}\n";
    let (text, _) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert_eq!(
        text,
        "try:\n    Remove-Item $p\nexcept OSError as err:\n    Write-Host str($err)\nfinally:\n    $done = $true\n"
    );
}

#[test]
fn test_catch_multiple_and_bare() {
    let pass = ControlFlowPass::new();
    let source = "try {\n    1\n} catch [System.IO.FileNotFoundException], [System.UnauthorizedAccessException] {\n    $_\n}\n";
    let (text, _) = run(source, &[&pass], ConversionLevel::Full);
    assert!(text.contains("except (FileNotFoundError, PermissionError) as err:\n    $err\n"));

    let (text, _) = run("try {\n    1\n} catch {\n    $PSItem\n}\n", &[&pass], ConversionLevel::Full);
    assert!(text.contains("except Exception as err:\n    $err\n"));
}

#[test]
fn test_unknown_block_flagged() {
    let (_, ctx) = run("begin {\n    $a\n}\n", &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert!(has_warning(&ctx, "unconverted block 'begin'"));
}

// ============================================================================
// SWITCH TESTS
// ============================================================================

#[test]
fn test_literal_switch_expands_to_chain() {
    let source = "switch ($color) {\n    'red' { $c = 1; break }\n    green { $c = 2 }\n    default { $c = 0 }\n}\n";
    let (text, ctx) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert_eq!(
        text,
        "if $color -eq 'red':\n    $c = 1\nelif $color -eq \"green\":\n    $c = 2\nelse:\n    $c = 0\n"
    );
    assert!(ctx.warnings.is_empty());
}

#[test]
fn test_switch_computed_subject_is_bound_once() {
    let source = "switch ($x.Length + 1) {\n    1 { $a }\n}\n";
    let (text, _) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert_eq!(
        text,
        "$switch_value = $x.Length + 1\nif $switch_value -eq 1:\n    $a\n"
    );
}

#[test]
fn test_switch_duplicate_labels_flagged() {
    let source = "switch ($v) {\n    'a' { 1 }\n    'A' { 2 }\n}\n";
    let (text, ctx) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert!(has_warning(&ctx, "duplicate label"));
    assert!(text.contains("switch ($v)"));
}

#[test]
fn test_switch_regex_flagged() {
    let source = "switch -Regex ($v) {\n    '^a' { 1 }\n}\n";
    let (_, ctx) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert!(has_warning(&ctx, "-regex matching"));
}

#[test]
fn test_switch_script_block_label_flagged() {
    let source = "switch ($v) {\n    { $_ -gt 1 } { 'big' }\n}\n";
    let (_, ctx) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert!(has_warning(&ctx, "non-literal label"));
}

#[test]
fn test_switch_nested_break_flagged() {
    let source = "switch ($v) {\n    'a' {\n        if ($x) { break }\n    }\n}\n";
    let (_, ctx) = run(source, &[&ControlFlowPass::new()], ConversionLevel::Full);
    assert!(has_warning(&ctx, "break inside a nested block"));
}

// ============================================================================
// CMDLET PASS TESTS
// ============================================================================

fn cmdlets() -> CmdletPass {
    CmdletPass::new(mappings(), "bridge")
}

#[test]
fn test_alias_at_statement_start() {
    let (text, ctx) = run("gci \"logs\"\n", &[&cmdlets()], ConversionLevel::Full);
    assert_eq!(text, "os.listdir(\"logs\")\n");
    assert!(ctx.imports.contains("import os"));
}

#[test]
fn test_alias_not_resolved_mid_statement() {
    let (text, ctx) = run("$x = gci\n", &[&cmdlets()], ConversionLevel::Full);
    assert_eq!(text, "$x = gci\n");
    assert!(ctx.warnings.is_empty());
}

#[test]
fn test_nested_invocation() {
    let (text, _) = run(
        "Write-Host (Join-Path \"a\" \"b\")\n",
        &[&cmdlets()],
        ConversionLevel::Full,
    );
    assert!(text.starts_with("print("));
    assert!(text.contains("os.path.join(\"a\", \"b\")"));
}

#[test]
fn test_bridge_builtin_at_hybrid() {
    let (text, ctx) = run(
        "Get-Mailbox -Identity \"bob\"\n",
        &[&cmdlets()],
        ConversionLevel::Hybrid,
    );
    assert_eq!(text, "bridge.invoke(\"Get-Mailbox\", Identity=\"bob\")\n");
    assert_eq!(ctx.bridge_calls, vec!["Get-Mailbox"]);
    assert!(ctx.imports.contains("from powershell_bridge import bridge"));
}

#[test]
fn test_bridge_builtin_at_full_is_approximated() {
    let (text, ctx) = run(
        "Get-Mailbox -Identity \"bob\"\n",
        &[&cmdlets()],
        ConversionLevel::Full,
    );
    assert_eq!(text, "exchange.get_mailbox(\"bob\")\n");
    assert!(ctx.bridge_calls.is_empty());
    assert!(ctx.imports.contains("from m365_compat import exchange"));
    assert!(has_warning(&ctx, "approximated natively"));
}

#[test]
fn test_command_names_in_strings_ignored() {
    let (text, ctx) = run(
        "Write-Host \"Get-Mailbox\"\n",
        &[&cmdlets()],
        ConversionLevel::Hybrid,
    );
    assert_eq!(text, "print(\"Get-Mailbox\")\n");
    assert!(ctx.bridge_calls.is_empty());
}

#[test]
fn test_local_functions_called_directly() {
    let source = "function Get-Data {\n    1\n}\n$d = Get-Data -Id 3\n";
    let functions = FunctionPass::new(mappings());
    let (text, ctx) = run(source, &[&functions, &cmdlets()], ConversionLevel::Bridge);
    assert!(text.contains("$d = get_data(Id=3)"));
    assert!(ctx.bridge_calls.is_empty());
}

#[test]
fn test_bare_local_function_requires_exact_case() {
    let source = "function Helper {\n    1\n}\nHelper 5\n$helper = 2\n";
    let functions = FunctionPass::new(mappings());
    let (text, _) = run(source, &[&functions, &cmdlets()], ConversionLevel::Full);
    assert!(text.contains("\nhelper(5)\n"));
    assert!(text.contains("$helper = 2"));
}

#[test]
fn test_unmapped_command_by_level() {
    let (text, ctx) = run("Invoke-Thing 1\n", &[&cmdlets()], ConversionLevel::Hybrid);
    assert_eq!(text, "Invoke-Thing 1\n");
    assert!(has_warning(&ctx, "unmapped command 'Invoke-Thing'"));

    let (text, ctx) = run("Invoke-Thing 1\n", &[&cmdlets()], ConversionLevel::Bridge);
    assert_eq!(text, "bridge.invoke(\"Invoke-Thing\", 1)\n");
    assert!(ctx.warnings.is_empty());
}

#[test]
fn test_bridge_level_routes_host_cmdlets_through_bridge() {
    let (text, ctx) = run("$procs = Get-Process\n", &[&cmdlets()], ConversionLevel::Bridge);
    assert_eq!(text, "$procs = bridge.invoke(\"Get-Process\")\n");
    assert!(!text.contains("psutil"));
    assert!(!ctx.imports.contains("import psutil"));
    assert_eq!(ctx.bridge_calls, vec!["Get-Process"]);
}

#[test]
fn test_dropped_named_arguments_warned() {
    let (text, ctx) = run(
        "$excel = New-Object -ComObject Excel.Application\n",
        &[&cmdlets()],
        ConversionLevel::Full,
    );
    assert_eq!(text, "$excel = ()\n");
    assert!(has_warning(&ctx, "arguments dropped: ComObject"));
}

#[test]
fn test_piped_input_bound_to_mapped_command() {
    let (text, ctx) = run("$json = obj | ConvertTo-Json\n", &[&cmdlets()], ConversionLevel::Full);
    assert_eq!(text, "$json = json.dumps(obj)\n");
    assert!(ctx.imports.contains("import json"));

    let (text, _) = run("obj | Write-Output\n", &[&cmdlets()], ConversionLevel::Full);
    assert_eq!(text, "print(obj)\n");
}

#[test]
fn test_piped_input_bound_through_bridge() {
    let (text, ctx) = run("items | Foo-Bar -Mode x\n", &[&cmdlets()], ConversionLevel::Bridge);
    assert_eq!(text, "bridge.invoke(\"Foo-Bar\", items, Mode=x)\n");
    assert_eq!(ctx.bridge_calls, vec!["Foo-Bar"]);
}

#[test]
fn test_unmapped_piped_stage_left_with_warning() {
    let (text, ctx) = run("items | Foo-Bar\n", &[&cmdlets()], ConversionLevel::Full);
    assert_eq!(text, "items | Foo-Bar\n");
    assert!(has_warning(&ctx, "'Foo-Bar' receives pipeline input"));
}

#[test]
fn test_long_pipeline_stages_left_for_pipeline_pass() {
    let source = "data | ConvertTo-Json | Out-File x.json\n";
    let (text, ctx) = run(
        source,
        &[&cmdlets(), &PipelinePass::new()],
        ConversionLevel::Full,
    );
    assert_eq!(text, source);
    assert!(!text.contains("json.dumps()"));
    assert!(has_warning(&ctx, "pipeline with 3 stages"));
}

// ============================================================================
// CAST PASS TESTS
// ============================================================================

#[test]
fn test_typed_assignment() {
    let pass = CastPass::new(mappings());
    let (text, _) = run("[int]count = \"5\"\n", &[&pass], ConversionLevel::Full);
    assert_eq!(text, "count: int = \"5\"\n");

    let (text, ctx) = run("[datetime]when = start\n", &[&pass], ConversionLevel::Full);
    assert_eq!(text, "when: datetime = start\n");
    assert!(ctx.imports.contains("from datetime import datetime"));
}

#[test]
fn test_inline_casts() {
    let pass = CastPass::new(mappings());
    let (text, _) = run("total = [int]value + 1\n", &[&pass], ConversionLevel::Full);
    assert_eq!(text, "total = int(value) + 1\n");

    let (text, _) = run("s = [string](a + b)\n", &[&pass], ConversionLevel::Full);
    assert_eq!(text, "s = str(a + b)\n");
}

#[test]
fn test_non_callable_cast_kept() {
    let pass = CastPass::new(mappings());
    let (text, _) = run("d = [datetime]raw\n", &[&pass], ConversionLevel::Full);
    assert_eq!(text, "d = [datetime]raw\n");
}

// ============================================================================
// PIPELINE PASS TESTS
// ============================================================================

fn pipe(source: &str) -> (String, ConversionContext) {
    run(source, &[&PipelinePass::new()], ConversionLevel::Full)
}

#[test]
fn test_select_first_and_expand() {
    assert_eq!(pipe("top = procs | Select-Object -First 5\n").0, "top = procs[:5]\n");
    assert_eq!(
        pipe("names = users | Select-Object -ExpandProperty Name\n").0,
        "names = [item.Name for item in users]\n"
    );
}

#[test]
fn test_sort_descending_by_property() {
    assert_eq!(
        pipe("s = users | Sort-Object Name -Descending\n").0,
        "s = sorted(users, key=lambda item: item.Name, reverse=True)\n"
    );
}

#[test]
fn test_measure_variants() {
    assert_eq!(pipe("n = files | Measure-Object\n").0, "n = len(files)\n");
    assert_eq!(
        pipe("t = files | Measure-Object -Property Length -Sum\n").0,
        "t = sum(item.Length for item in files)\n"
    );
}

#[test]
fn test_filter_simplified_syntax() {
    assert_eq!(
        pipe("up = svcs | Where-Object Running\n").0,
        "up = [item for item in svcs if item.Running]\n"
    );
}

#[test]
fn test_bitwise_or_untouched() {
    let (text, ctx) = pipe("mask = a | b\n");
    assert_eq!(text, "mask = a | b\n");
    assert!(ctx.warnings.is_empty());
}

#[test]
fn test_long_pipeline_flagged() {
    let (text, ctx) = pipe("x = a | Where-Object { item.ok } | Sort-Object\n");
    assert!(text.contains("Where-Object"));
    assert!(has_warning(&ctx, "3 stages"));
}

#[test]
fn test_unknown_stage_flagged() {
    let (_, ctx) = pipe("r = a | Tee-Object -FilePath log\n");
    assert!(has_warning(&ctx, "pipeline stage 'Tee-Object' left unconverted"));
}

// ============================================================================
// IMPORT PASS TESTS
// ============================================================================

#[test]
fn test_imports_inferred_from_usage() {
    let source = "x = os.getcwd()\nm = re.search(p, s)\n# json.dumps\n";
    let (text, ctx) = run(source, &[&ImportPass::new()], ConversionLevel::Full);
    assert!(text.starts_with("import os\nimport re\n\nx = os.getcwd()\n"));
    assert!(!ctx.imports.contains("import json"));
}

#[test]
fn test_custom_bridge_handle_import() {
    let opts = ConversionOptions {
        bridge_handle: "ps".to_string(),
        bridge_import: "from compat import ps".to_string(),
        ..options(ConversionLevel::Bridge)
    };
    let (text, ctx) = run_with("p = ps.invoke(\"Get-Process\")\n", &[&ImportPass::new()], opts);
    assert!(ctx.imports.contains("from compat import ps"));
    assert!(text.starts_with("from compat import ps\n\n"));
}

#[test]
fn test_header_names_source_and_level() {
    let opts = ConversionOptions {
        header: true,
        ..options(ConversionLevel::Full)
    };
    let (text, _) = run_with("a = 1\n", &[&ImportPass::new()], opts);
    assert_eq!(
        text,
        "# Converted from test.ps1 by psmigrate (level: FULL)\n\na = 1\n"
    );
}
