//! Builtin command → Python idiom table
//!
//! Each [`CmdletMapping`] carries a call template. Placeholders are written
//! `{Name|Alias|N}`: bind the first named parameter that was supplied,
//! otherwise the next positional argument, with `N` ordering positional
//! binding. `{args}` expands to every positional argument.

use crate::syntax;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdletMapping {
    pub source_name: String,
    pub target_idiom: String,
    pub required_import: Option<String>,
    /// The idiom only approximates behavior that lives in the original runtime
    pub requires_bridge: bool,
}

impl CmdletMapping {
    fn new(source: &str, idiom: &str, import: Option<&str>, requires_bridge: bool) -> Self {
        Self {
            source_name: source.to_string(),
            target_idiom: idiom.to_string(),
            required_import: import.map(str::to_string),
            requires_bridge,
        }
    }

    /// Expand the idiom template with parsed call arguments
    pub fn render(&self, args: &CmdletArgs) -> String {
        render_template(&self.target_idiom, args)
    }

    /// Named arguments the template has no placeholder for, in call order
    pub fn unbound_parameters(&self, args: &CmdletArgs) -> Vec<String> {
        let placeholders = placeholders(&self.target_idiom);
        args.named
            .iter()
            .map(|(name, _)| name)
            .filter(|name| {
                !placeholders
                    .iter()
                    .any(|p| p.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            })
            .cloned()
            .collect()
    }
}

/// Cmdlets consumed by the pipeline pass rather than substituted inline
const PIPELINE_STAGES: &[&str] = &[
    "where-object",
    "where",
    "?",
    "foreach-object",
    "%",
    "select-object",
    "select",
    "sort-object",
    "sort",
    "measure-object",
    "measure",
    "group-object",
    "out-null",
    "out-string",
    "format-table",
    "format-list",
    "tee-object",
];

/// Parameters that never take a value
const KNOWN_SWITCHES: &[&str] = &[
    "recurse",
    "force",
    "nonewline",
    "file",
    "directory",
    "raw",
    "append",
    "passthru",
    "whatif",
    "confirm",
    "notypeinformation",
    "compress",
    "asplaintext",
    "wait",
    "verbose",
    "debug",
    "all",
    "unique",
    "descending",
];

/// Static table of builtin commands, keyed case-insensitively
#[derive(Debug, Clone)]
pub struct CmdletMapper {
    mappings: HashMap<String, CmdletMapping>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Default for CmdletMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl CmdletMapper {
    /// Create a mapper with the default table
    pub fn new() -> Self {
        let mut mappings = HashMap::new();
        let mut add = |source: &str, idiom: &str, import: Option<&str>, bridge: bool| {
            mappings.insert(
                source.to_ascii_lowercase(),
                CmdletMapping::new(source, idiom, import, bridge),
            );
        };

        // Output streams
        add("Write-Host", "print({args})", None, false);
        add("Write-Output", "print({args})", None, false);
        add("Write-Verbose", "logging.debug({Message|0})", Some("import logging"), false);
        add("Write-Debug", "logging.debug({Message|0})", Some("import logging"), false);
        add("Write-Information", "logging.info({MessageData|0})", Some("import logging"), false);
        add("Write-Warning", "logging.warning({Message|0})", Some("import logging"), false);
        add("Write-Error", "logging.error({Message|0})", Some("import logging"), false);
        add("Read-Host", "input({Prompt|0})", None, false);
        add("Clear-Host", "os.system(\"cls\" if os.name == \"nt\" else \"clear\")", Some("import os"), false);

        // Filesystem
        add("Test-Path", "os.path.exists({Path|LiteralPath|0})", Some("import os"), false);
        add(
            "Get-Content",
            "Path({Path|LiteralPath|0}).read_text().splitlines()",
            Some("from pathlib import Path"),
            false,
        );
        add(
            "Set-Content",
            "Path({Path|LiteralPath|0}).write_text(str({Value|1}))",
            Some("from pathlib import Path"),
            false,
        );
        add(
            "Add-Content",
            "Path({Path|LiteralPath|0}).open(\"a\").write(str({Value|1}) + \"\\n\")",
            Some("from pathlib import Path"),
            false,
        );
        add("New-Item", "os.makedirs({Path|0}, exist_ok=True)", Some("import os"), false);
        add("Remove-Item", "os.remove({Path|LiteralPath|0})", Some("import os"), false);
        add("Copy-Item", "shutil.copy({Path|0}, {Destination|1})", Some("import shutil"), false);
        add("Move-Item", "shutil.move({Path|0}, {Destination|1})", Some("import shutil"), false);
        add("Join-Path", "os.path.join({Path|0}, {ChildPath|1})", Some("import os"), false);
        add("Split-Path", "os.path.dirname({Path|0})", Some("import os"), false);
        add("Get-ChildItem", "os.listdir({Path|LiteralPath|0})", Some("import os"), false);
        add("Get-Location", "os.getcwd()", Some("import os"), false);
        add("Set-Location", "os.chdir({Path|0})", Some("import os"), false);
        add("Import-Csv", "list(csv.DictReader(open({Path|0})))", Some("import csv"), false);

        // Data and time
        add("Get-Date", "datetime.now()", Some("from datetime import datetime"), false);
        add("Start-Sleep", "time.sleep({Seconds|0})", Some("import time"), false);
        add("ConvertTo-Json", "json.dumps({InputObject|0})", Some("import json"), false);
        add("ConvertFrom-Json", "json.loads({InputObject|0})", Some("import json"), false);
        add("Get-Random", "random.random()", Some("import random"), false);
        add("Get-Credential", "getpass.getpass({Message|0})", Some("import getpass"), false);

        // Web and processes
        add("Invoke-RestMethod", "requests.get({Uri|0}).json()", Some("import requests"), false);
        add("Invoke-WebRequest", "requests.get({Uri|0})", Some("import requests"), false);
        add("Start-Process", "subprocess.Popen([{FilePath|0}])", Some("import subprocess"), false);
        add("Import-Module", "# Import-Module {args}", None, false);

        // Host runtime: only approximated natively
        add("Get-Process", "list(psutil.process_iter())", Some("import psutil"), true);
        add("Stop-Process", "psutil.Process({Id|0}).kill()", Some("import psutil"), true);
        add("Get-Service", "psutil.win_service_get({Name|0})", Some("import psutil"), true);
        add("Get-CimInstance", "wmi.WMI().instances({ClassName|0})", Some("import wmi"), true);
        add("Get-WmiObject", "wmi.WMI().instances({Class|0})", Some("import wmi"), true);
        add("Get-ItemProperty", "winreg.QueryValue({Path|0}, {Name|1})", Some("import winreg"), true);
        add("Invoke-Expression", "exec({Command|0})", None, true);
        add("New-Object", "{TypeName|0}()", None, true);
        add("ConvertTo-SecureString", "{String|0}", None, true);
        add("Add-Type", "ctypes.CDLL({AssemblyName|Path|0})", Some("import ctypes"), true);

        // Microsoft 365 and directory services
        add("Connect-MgGraph", "graph.connect({Scopes|0})", Some("from m365_compat import graph"), true);
        add("Get-MgUser", "graph.get_users({UserId|Filter|0})", Some("from m365_compat import graph"), true);
        add("Get-MgGroup", "graph.get_groups({GroupId|Filter|0})", Some("from m365_compat import graph"), true);
        add(
            "Connect-ExchangeOnline",
            "exchange.connect({UserPrincipalName|0})",
            Some("from m365_compat import exchange"),
            true,
        );
        add("Get-Mailbox", "exchange.get_mailbox({Identity|0})", Some("from m365_compat import exchange"), true);
        add("Set-Mailbox", "exchange.set_mailbox({Identity|0})", Some("from m365_compat import exchange"), true);
        add("Get-Team", "teams.get_team({GroupId|DisplayName|0})", Some("from m365_compat import teams"), true);
        add("Get-ADUser", "directory.get_user({Identity|Filter|0})", Some("from m365_compat import directory"), true);

        let aliases = HashMap::from([
            ("echo", "Write-Output"),
            ("gci", "Get-ChildItem"),
            ("ls", "Get-ChildItem"),
            ("dir", "Get-ChildItem"),
            ("gc", "Get-Content"),
            ("cat", "Get-Content"),
            ("cd", "Set-Location"),
            ("sl", "Set-Location"),
            ("pwd", "Get-Location"),
            ("rm", "Remove-Item"),
            ("del", "Remove-Item"),
            ("cp", "Copy-Item"),
            ("mv", "Move-Item"),
            ("sleep", "Start-Sleep"),
            ("iex", "Invoke-Expression"),
            ("irm", "Invoke-RestMethod"),
            ("iwr", "Invoke-WebRequest"),
        ]);

        Self { mappings, aliases }
    }

    pub fn map_cmdlet(&self, name: &str) -> Option<&CmdletMapping> {
        self.mappings.get(&name.to_ascii_lowercase())
    }

    pub fn requires_bridge(&self, name: &str) -> bool {
        self.map_cmdlet(name).is_some_and(|m| m.requires_bridge)
    }

    /// Canonical cmdlet name for a builtin alias
    pub fn resolve_alias(&self, alias: &str) -> Option<&'static str> {
        self.aliases.get(alias.to_ascii_lowercase().as_str()).copied()
    }

    pub fn is_pipeline_stage(name: &str) -> bool {
        PIPELINE_STAGES.contains(&name.to_ascii_lowercase().as_str())
    }

    /// All bridge-requiring cmdlet names, sorted
    pub fn bridge_cmdlets(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .mappings
            .values()
            .filter(|m| m.requires_bridge)
            .map(|m| m.source_name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

// ============================================================================
// Call arguments
// ============================================================================

/// Arguments of a single command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdletArgs {
    pub positional: Vec<String>,
    /// Named parameters in call order; `None` marks a switch
    pub named: Vec<(String, Option<String>)>,
}

impl CmdletArgs {
    /// Parse the argument text following a command name
    pub fn parse(text: &str) -> Self {
        let words = syntax::split_words(text);
        let mut args = CmdletArgs::default();
        let mut i = 0;
        while i < words.len() {
            let word = words[i];
            match parameter_name(word) {
                Some(param) => {
                    if let Some((name, value)) = param.split_once(':') {
                        args.named
                            .push((name.to_string(), Some(quote_bare(value))));
                        i += 1;
                        continue;
                    }
                    let is_switch = KNOWN_SWITCHES.contains(&param.to_ascii_lowercase().as_str());
                    let value = words
                        .get(i + 1)
                        .filter(|next| !is_switch && parameter_name(next).is_none());
                    match value {
                        Some(value) => {
                            args.named.push((param.to_string(), Some(quote_bare(value))));
                            i += 2;
                        }
                        None => {
                            args.named.push((param.to_string(), None));
                            i += 1;
                        }
                    }
                }
                None => {
                    args.positional.push(quote_bare(word));
                    i += 1;
                }
            }
        }
        args
    }

    pub fn named_value(&self, name: &str) -> Option<String> {
        self.named
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone().unwrap_or_else(|| "True".to_string()))
    }

    /// Every argument as Python call arguments, original parameter names kept
    pub fn to_call_args(&self) -> Vec<String> {
        let mut out = self.positional.clone();
        for (name, value) in &self.named {
            out.push(format!(
                "{}={}",
                name,
                value.as_deref().unwrap_or("True")
            ));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// `-Name` → `Name`; anything else (including negative numbers) → `None`
fn parameter_name(word: &str) -> Option<&str> {
    let name = word.strip_prefix('-')?;
    name.starts_with(|c: char| c.is_ascii_alphabetic())
        .then_some(name)
}

/// Quote bare words that cannot stand as Python expressions (paths, globs)
fn quote_bare(word: &str) -> String {
    let is_fstring = word.starts_with("f\"") || word.starts_with("f'");
    let is_expression = word.starts_with(['"', '\'', '(', '[', '{', '-'])
        || word.starts_with(|c: char| c.is_ascii_digit());
    if is_fstring || is_expression {
        return word.to_string();
    }
    let needs_quotes = word.contains('\\')
        || word.contains('*')
        || (word.contains(':') && !word.contains("::"))
        || word.contains('-');
    if needs_quotes {
        format!("\"{}\"", word.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        word.to_string()
    }
}

struct Placeholder {
    start: usize,
    end: usize,
    names: Vec<String>,
    position: Option<usize>,
    all_positional: bool,
}

fn placeholders(template: &str) -> Vec<Placeholder> {
    let mut placeholders = Vec::new();
    let mut search = 0;
    while let Some(open) = template[search..].find('{').map(|i| search + i) {
        let Some(close) = template[open..].find('}').map(|i| open + i) else {
            break;
        };
        let spec = &template[open + 1..close];
        let mut names = Vec::new();
        let mut position = None;
        for alt in spec.split('|') {
            match alt.parse::<usize>() {
                Ok(n) => position = Some(n),
                Err(_) => names.push(alt.to_string()),
            }
        }
        placeholders.push(Placeholder {
            start: open,
            end: close + 1,
            all_positional: spec == "args",
            names,
            position,
        });
        search = close + 1;
    }
    placeholders
}

fn render_template(template: &str, args: &CmdletArgs) -> String {
    let placeholders = placeholders(template);

    // Bind by name first, then hand out positionals in index order
    let mut values: Vec<Option<String>> = placeholders
        .iter()
        .map(|p| {
            if p.all_positional {
                return Some(args.positional.join(", "));
            }
            p.names.iter().find_map(|n| args.named_value(n))
        })
        .collect();
    let mut unbound: Vec<usize> = (0..placeholders.len())
        .filter(|&i| values[i].is_none() && placeholders[i].position.is_some())
        .collect();
    unbound.sort_by_key(|&i| placeholders[i].position);
    let mut positional = args.positional.iter();
    for idx in unbound {
        values[idx] = positional.next().cloned();
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for (placeholder, value) in placeholders.iter().zip(values) {
        out.push_str(&template[last..placeholder.start]);
        out.push_str(value.as_deref().unwrap_or(""));
        last = placeholder.end;
    }
    out.push_str(&template[last..]);
    out
}
