//! Builtin command substitution.
//!
//! Commands are found by name anywhere in code (outside strings), their
//! arguments are read up to the end of the enclosing expression, and the
//! whole invocation is replaced. Nested invocations inside the arguments
//! are converted first.

use super::pipes::split_assignment;
use super::types::{visit_code, CodeKind, ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::mappings::{CmdletArgs, CmdletMapper, Mappings};
use crate::syntax;
use crate::types::ConversionLevel;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;

static WORD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[A-Za-z_]\w*(?:-[A-Za-z]\w*)?").ok());
static VERB_NOUN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z]+-[A-Z][a-zA-Z0-9]+$").ok());

/// A command invocation located in a piece of text
struct Invocation<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    /// Follows a top-level `|`, so its input arrives through the pipeline
    piped: bool,
}

pub struct CmdletPass {
    mappings: Arc<Mappings>,
    bridge_handle: String,
}

impl CmdletPass {
    pub fn new(mappings: Arc<Mappings>, bridge_handle: &str) -> Self {
        Self {
            mappings,
            bridge_handle: bridge_handle.to_string(),
        }
    }

    /// Rewrite every invocation in `text`; `statement_start` enables alias
    /// resolution for the first word
    fn convert_text(
        &self,
        text: &str,
        statement_start: bool,
        line: usize,
        ctx: &mut ConversionContext,
    ) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        let mut first = statement_start;

        while let Some(found) = self.next_invocation(rest, &out, first, ctx) {
            first = false;
            out.push_str(&rest[..found.start]);

            let name = self
                .mappings
                .cmdlets
                .resolve_alias(found.name)
                .filter(|_| !found.name.contains('-'))
                .unwrap_or(found.name);

            if CmdletMapper::is_pipeline_stage(name) || found.piped {
                if found.piped && !CmdletMapper::is_pipeline_stage(name) {
                    ctx.warn(
                        line,
                        format!("'{}' receives pipeline input; stage left unconverted", name),
                    );
                }
                out.push_str(&rest[found.start..found.end]);
                rest = &rest[found.end..];
                continue;
            }

            let after = &rest[found.end..];
            let arg_end = syntax::expression_end(after);
            let args_text = self.convert_text(&after[..arg_end], false, line, ctx);
            out.push_str(&self.invoke(name, &args_text, line, ctx));
            rest = &after[arg_end..];
        }
        out.push_str(rest);
        out
    }

    /// `source | Command args` with a substitutable command becomes the
    /// command called with `source` as its first positional argument
    fn bind_piped_input(
        &self,
        text: &str,
        line: usize,
        ctx: &mut ConversionContext,
    ) -> Option<String> {
        let (prefix, expr) = split_assignment(text);
        let stages = syntax::split_top_level(expr, b'|');
        let [source, stage] = stages.as_slice() else {
            return None;
        };
        let (source, stage) = (source.trim(), stage.trim_start());
        if source.is_empty() {
            return None;
        }

        let found = self.next_invocation(stage, "", false, ctx)?;
        if found.start != 0 || CmdletMapper::is_pipeline_stage(found.name) {
            return None;
        }
        let bindable = ctx.local_function(found.name).is_some()
            || self.mappings.cmdlets.map_cmdlet(found.name).is_some()
            || ctx.level() == ConversionLevel::Bridge;
        if !bindable {
            return None;
        }

        let after = &stage[found.end..];
        let arg_end = syntax::expression_end(after);
        let trailing = after[arg_end..].trim_end();
        if !trailing.is_empty() {
            return None;
        }
        let source = self.convert_text(source, prefix.is_empty(), line, ctx);
        let args_text = self.convert_text(&after[..arg_end], false, line, ctx);
        let mut args = CmdletArgs::parse(args_text.trim());
        args.positional.insert(0, source.trim().to_string());
        let call = self.invoke_with(found.name, &args, &args_text, line, ctx);
        Some(format!("{}{}", prefix, call))
    }

    /// Next command name in `rest`, skipping strings and member accesses
    fn next_invocation<'a>(
        &self,
        rest: &'a str,
        out: &str,
        statement_start: bool,
        ctx: &ConversionContext,
    ) -> Option<Invocation<'a>> {
        let word = WORD.as_ref()?;
        let ranges = syntax::string_ranges(rest);
        for m in word.find_iter(rest) {
            if syntax::in_ranges(&ranges, m.start()) {
                continue;
            }
            let before = &rest[..m.start()];
            if before.ends_with(['.', '$', '-']) || before.ends_with(|c: char| c.is_alphanumeric()) {
                continue;
            }
            let name = m.as_str();
            let tail = if before.trim().is_empty() {
                out.trim_end()
            } else {
                before.trim_end()
            };

            let is_command = if name.contains('-') {
                ctx.local_function(name).is_some()
                    || self.mappings.cmdlets.map_cmdlet(name).is_some()
                    || CmdletMapper::is_pipeline_stage(name)
                    || VERB_NOUN.as_ref().is_some_and(|re| re.is_match(name))
            } else {
                let next = rest[m.end()..].trim_start();
                let callable = !next.starts_with(['=', '.', '[', ':']);
                let local = ctx.declares_exactly(name) && is_command_position(tail);
                let alias = statement_start
                    && tail.is_empty()
                    && self.mappings.cmdlets.resolve_alias(name).is_some();
                callable && (local || alias)
            };
            if is_command {
                return Some(Invocation {
                    start: m.start(),
                    end: m.end(),
                    name,
                    piped: tail.ends_with('|') && !tail.ends_with("||"),
                });
            }
        }
        None
    }

    fn invoke(
        &self,
        name: &str,
        args_text: &str,
        line: usize,
        ctx: &mut ConversionContext,
    ) -> String {
        let args = CmdletArgs::parse(args_text.trim());
        self.invoke_with(name, &args, args_text, line, ctx)
    }

    fn invoke_with(
        &self,
        name: &str,
        args: &CmdletArgs,
        args_text: &str,
        line: usize,
        ctx: &mut ConversionContext,
    ) -> String {
        if let Some(local) = ctx.local_function(name) {
            return format!("{}({})", local, args.to_call_args().join(", "));
        }

        let level = ctx.level();
        match self.mappings.cmdlets.map_cmdlet(name) {
            Some(mapping) if mapping.requires_bridge && level.uses_bridge() => {
                self.bridge_call(&mapping.source_name, args, ctx)
            }
            Some(mapping) => {
                if let Some(import) = &mapping.required_import {
                    ctx.add_import(import.clone());
                }
                if mapping.requires_bridge {
                    ctx.warn(
                        line,
                        format!(
                            "'{}' approximated natively; behavior may differ",
                            mapping.source_name
                        ),
                    );
                }
                let dropped = mapping.unbound_parameters(args);
                if !dropped.is_empty() {
                    ctx.warn(
                        line,
                        format!(
                            "'{}' arguments dropped: {}",
                            mapping.source_name,
                            dropped.join(", ")
                        ),
                    );
                }
                mapping.render(args)
            }
            None if level == ConversionLevel::Bridge => self.bridge_call(name, args, ctx),
            None => {
                ctx.warn(line, format!("unmapped command '{}' left as is", name));
                format!("{}{}", name, args_text)
            }
        }
    }

    fn bridge_call(&self, name: &str, args: &CmdletArgs, ctx: &mut ConversionContext) -> String {
        ctx.record_bridge_call(name);
        let mut call_args = vec![format!("\"{}\"", name)];
        call_args.extend(args.to_call_args());
        format!("{}.invoke({})", self.bridge_handle, call_args.join(", "))
    }
}

impl ConversionPass for CmdletPass {
    fn name(&self) -> &str {
        "cmdlets"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let tree = unit.tree_mut(self.name())?;
        visit_code(tree, &mut |text, line, kind| {
            let bound = match kind {
                CodeKind::Statement if text.contains('|') => {
                    self.bind_piped_input(text, line, ctx)
                }
                _ => None,
            };
            *text = match bound {
                Some(bound) => bound,
                None => self.convert_text(text, true, line, ctx),
            };
        });
        Ok(())
    }
}

/// Whether a bare word after `tail` would be parsed as a command
fn is_command_position(tail: &str) -> bool {
    if tail.is_empty() || tail.ends_with('(') || tail == "return" || tail.ends_with(" return") {
        return true;
    }
    match tail.strip_suffix('=') {
        Some(head) => !head.ends_with(['=', '!', '<', '>']),
        None => false,
    }
}
