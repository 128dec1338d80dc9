//! Two-stage pipelines to comprehensions.
//!
//! By the time this pass runs the pipeline item is already `item` and the
//! source stage has been converted, so a stage only has to wrap its script
//! block or property list around the source expression.

use super::types::{visit_code, CodeKind, ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::mappings::CmdletArgs;
use crate::syntax;

/// Loop variable of generated comprehensions
const ITEM: &str = "item";

#[derive(Debug, Default)]
pub struct PipelinePass;

impl PipelinePass {
    pub fn new() -> Self {
        Self
    }

    fn rewrite(&self, text: &str, line: usize, ctx: &mut ConversionContext) -> Option<String> {
        let (prefix, expr) = split_assignment(text);
        let stages = syntax::split_top_level(expr, b'|');
        if stages.len() < 2 || stages.iter().any(|s| s.trim().is_empty()) {
            return None;
        }
        // `a | b` with no command-like stage is a bitwise or
        if !stages[1..].iter().all(|s| is_command_stage(s)) {
            return None;
        }
        if stages.len() > 2 {
            ctx.warn(
                line,
                format!("pipeline with {} stages left unconverted", stages.len()),
            );
            return None;
        }

        let source = stages[0].trim();
        let stage = stages[1].trim();
        let (name, args) = split_command(stage);
        let converted = match name.to_ascii_lowercase().as_str() {
            "where-object" | "where" | "?" => filter(source, args),
            "foreach-object" | "foreach" | "%" => map(source, args),
            "select-object" | "select" => select(source, args),
            "sort-object" | "sort" => sort(source, args),
            "measure-object" | "measure" => measure(source, args),
            "out-null" => Some(source.to_string()),
            "out-string" => Some(format!("str({})", source)),
            "format-table" | "format-list" | "out-host" | "out-default" => {
                Some(format!("print({})", source))
            }
            _ => None,
        };
        match converted {
            Some(expr) => Some(format!("{}{}", prefix, expr)),
            None => {
                ctx.warn(line, format!("pipeline stage '{}' left unconverted", name));
                None
            }
        }
    }
}

impl ConversionPass for PipelinePass {
    fn name(&self) -> &str {
        "pipelines"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let tree = unit.tree_mut(self.name())?;
        visit_code(tree, &mut |text, line, kind| {
            if kind != CodeKind::Statement || !text.contains('|') {
                return;
            }
            if let Some(rewritten) = self.rewrite(text, line, ctx) {
                *text = rewritten;
            }
        });
        Ok(())
    }
}

/// Split `x = expr` into (`x = `, `expr`); statements without a top-level
/// assignment return an empty prefix
pub(super) fn split_assignment(text: &str) -> (&str, &str) {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = syntax::skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'|' if depth == 0 => break,
            b'=' if depth == 0 => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                let comparison = matches!(prev, Some(b'=' | b'!' | b'<' | b'>'))
                    || next == Some(b'=');
                if !comparison {
                    let split = text[i + 1..].len() - text[i + 1..].trim_start().len() + i + 1;
                    return (&text[..split], &text[split..]);
                }
                if next == Some(b'=') {
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    ("", text)
}

fn split_command(stage: &str) -> (&str, &str) {
    let stage = stage.trim();
    match stage.find(|c: char| c.is_whitespace() || c == '{') {
        Some(idx) => (&stage[..idx], stage[idx..].trim()),
        None => (stage, ""),
    }
}

fn is_command_stage(stage: &str) -> bool {
    let (name, _) = split_command(stage);
    if matches!(name, "?" | "%") {
        return true;
    }
    let mut parts = name.splitn(2, '-');
    let verb = parts.next().unwrap_or("");
    let noun = parts.next().unwrap_or("");
    let word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
    let verb_noun = word(verb) && word(noun) && verb.starts_with(|c: char| c.is_ascii_alphabetic());
    verb_noun
        || matches!(
            name.to_ascii_lowercase().as_str(),
            "where" | "foreach" | "select" | "sort" | "measure"
        )
}

/// Body of a `{ ... }` script block argument
fn script_block(args: &str) -> Option<&str> {
    let args = args.trim();
    if !args.starts_with('{') {
        return None;
    }
    let close = syntax::find_matching(args, 0)?;
    if close != args.len() - 1 {
        return None;
    }
    Some(args[1..close].trim())
}

/// A single expression: no statement separators inside
fn single_expression(body: &str) -> Option<&str> {
    let parts = syntax::split_top_level(body, b';');
    (parts.len() == 1 && !body.contains('\n') && !body.is_empty()).then_some(body)
}

fn property_names(args: &CmdletArgs, named: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    if let Some(list) = args.named_value(named).filter(|v| v != "True") {
        chunks.push(list);
    }
    chunks.extend(args.positional.iter().cloned());

    chunks
        .iter()
        .flat_map(|chunk| chunk.split(','))
        .map(|name| name.trim().trim_matches(['"', '\'']))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn filter(source: &str, args: &str) -> Option<String> {
    let condition = match script_block(args) {
        Some(body) => single_expression(body)?.to_string(),
        // Simplified syntax: `Where-Object Status == "Running"`
        None if args.starts_with(|c: char| c.is_ascii_alphabetic()) => {
            format!("{}.{}", ITEM, args)
        }
        None => return None,
    };
    Some(format!(
        "[{item} for {item} in {} if {}]",
        source,
        condition,
        item = ITEM
    ))
}

fn map(source: &str, args: &str) -> Option<String> {
    let body = match script_block(args) {
        Some(body) => single_expression(body)?.to_string(),
        None => {
            let parsed = CmdletArgs::parse(args);
            let member = parsed
                .named_value("MemberName")
                .or_else(|| parsed.positional.first().cloned())?;
            format!("{}.{}", ITEM, member.trim_matches(['"', '\'']))
        }
    };
    Some(format!("[{} for {} in {}]", body, ITEM, source))
}

fn select(source: &str, args: &str) -> Option<String> {
    let parsed = CmdletArgs::parse(args);
    if let Some(first) = parsed.named_value("First") {
        return Some(format!("{}[:{}]", source, first));
    }
    if let Some(last) = parsed.named_value("Last") {
        return Some(format!("{}[-{}:]", source, last));
    }
    if let Some(expand) = parsed.named_value("ExpandProperty") {
        return Some(format!(
            "[{item}.{} for {item} in {}]",
            expand.trim_matches(['"', '\'']),
            source,
            item = ITEM
        ));
    }
    if parsed.named_value("Unique").is_some() && parsed.positional.is_empty() {
        return Some(format!("list(dict.fromkeys({}))", source));
    }
    let props = property_names(&parsed, "Property");
    match props.as_slice() {
        [] => None,
        [one] => Some(format!("[{item}.{} for {item} in {}]", one, source, item = ITEM)),
        many => {
            let fields: Vec<String> = many.iter().map(|p| format!("{}.{}", ITEM, p)).collect();
            Some(format!("[({}) for {} in {}]", fields.join(", "), ITEM, source))
        }
    }
}

fn sort(source: &str, args: &str) -> Option<String> {
    let parsed = CmdletArgs::parse(args);
    let reverse = if parsed.named_value("Descending").is_some() {
        ", reverse=True"
    } else {
        ""
    };
    let props = property_names(&parsed, "Property");
    let key = match props.as_slice() {
        [] => String::new(),
        [one] => format!(", key=lambda {item}: {item}.{}", one, item = ITEM),
        many => {
            let fields: Vec<String> = many.iter().map(|p| format!("{}.{}", ITEM, p)).collect();
            format!(", key=lambda {}: ({})", ITEM, fields.join(", "))
        }
    };
    Some(format!("sorted({}{}{})", source, key, reverse))
}

fn measure(source: &str, args: &str) -> Option<String> {
    let parsed = CmdletArgs::parse(args);
    let values = match parsed.named_value("Property") {
        Some(prop) => format!("{item}.{} for {item} in {}", prop, source, item = ITEM),
        None => source.to_string(),
    };
    for (switch, function) in [("Sum", "sum"), ("Maximum", "max"), ("Minimum", "min")] {
        if parsed.named_value(switch).is_some() {
            return Some(format!("{}({})", function, values));
        }
    }
    if parsed.named_value("Average").is_some() {
        return Some(format!("sum({v}) / len({})", source, v = values));
    }
    Some(format!("len({})", source))
}
