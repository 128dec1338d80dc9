//! Function definitions and parameter blocks.

use super::types::{ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::mappings::{Mappings, TypeMapper};
use crate::naming::to_snake_case;
use crate::syntax::{self, Block, Node};
use std::sync::Arc;

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Parameter {
    pub name: String,
    pub annotation: Option<&'static str>,
    pub default: Option<String>,
}

impl Parameter {
    /// `Name: T = default` with whichever parts are present
    fn render(&self) -> String {
        match (self.annotation, &self.default) {
            (Some(ty), Some(default)) => format!("{}: {} = {}", self.name, ty, default),
            (Some(ty), None) => format!("{}: {}", self.name, ty),
            (None, Some(default)) => format!("{} = {}", self.name, default),
            (None, None) => self.name.clone(),
        }
    }
}

/// Parse the inside of a `param( ... )` list.
///
/// Attribute groups (`[Parameter(Mandatory)]`, `[ValidateSet(...)]`) are
/// dropped; the last plain bracket group is the declared type. Switch
/// parameters default to `$false`.
pub(crate) fn parse_parameters(inner: &str, types: &TypeMapper) -> Vec<Parameter> {
    let mut params = Vec::new();
    for part in syntax::split_top_level(inner, b',') {
        let mut rest = syntax::strip_attributes(part.trim());
        let mut declared: Option<&str> = None;
        while rest.starts_with('[') {
            let Some(end) = syntax::find_matching(rest, 0) else {
                break;
            };
            declared = Some(&rest[1..end]);
            rest = syntax::strip_attributes(&rest[end + 1..]);
        }

        let Some(after_sigil) = rest.strip_prefix('$') else {
            continue;
        };
        let name_len = after_sigil
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(after_sigil.len());
        if name_len == 0 {
            continue;
        }
        let name = after_sigil[..name_len].to_string();
        let tail = after_sigil[name_len..].trim();
        let mut default = tail
            .strip_prefix('=')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let annotation = declared.map(|ty| types.map_type(ty));
        if declared.is_some_and(|ty| ty.trim().eq_ignore_ascii_case("switch")) && default.is_none() {
            default = Some("$false".to_string());
        }
        params.push(Parameter {
            name,
            annotation,
            default,
        });
    }
    params
}

/// Inner text of a `param( ... )` statement
fn param_list(text: &str) -> Option<&str> {
    let text = syntax::strip_attributes(text.trim());
    let open = text.find('(')?;
    let close = syntax::find_matching(text, open)?;
    Some(&text[open + 1..close])
}

/// Statement made of attribute groups only, such as `[CmdletBinding()]`
fn is_attribute_only(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('[') && syntax::strip_attributes(text).is_empty()
}

fn record_annotation_imports(params: &[Parameter], ctx: &mut ConversionContext) {
    for ty in params.iter().filter_map(|p| p.annotation) {
        if let Some(import) = TypeMapper::required_import(ty) {
            ctx.add_import(import);
        }
    }
}

// ============================================================================
// Function pass
// ============================================================================

/// Rewrites `function Name { param(...) ... }` as `def name(...)`.
///
/// Every function found is registered in the context so the cmdlet pass can
/// route calls to it instead of treating the name as an unknown builtin.
pub struct FunctionPass {
    mappings: Arc<Mappings>,
}

impl FunctionPass {
    pub fn new(mappings: Arc<Mappings>) -> Self {
        Self { mappings }
    }

    fn restructure_all(&self, nodes: &mut [Node], ctx: &mut ConversionContext) {
        for node in nodes.iter_mut() {
            if let Node::Block(block) = node {
                let keyword = block.keyword();
                if keyword == "function" || keyword == "filter" {
                    self.restructure(block, ctx);
                }
                self.restructure_all(&mut block.body, ctx);
            }
        }
    }

    fn restructure(&self, block: &mut Block, ctx: &mut ConversionContext) {
        let keyword = block.keyword();
        let rest = block.header.trim()[keyword.len()..].trim();
        let name_end = rest
            .find(|c: char| c == '(' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = strip_scope(&rest[..name_end]);
        let inline = rest[name_end..].trim_start();

        let mut params = Vec::new();
        if inline.starts_with('(') {
            if let Some(close) = syntax::find_matching(inline, 0) {
                params = parse_parameters(&inline[1..close], &self.mappings.types);
            }
        }

        let body = std::mem::take(&mut block.body);
        let (body, declared, flattened) = split_body(body);
        if let Some(inner) = declared {
            params.extend(parse_parameters(&inner, &self.mappings.types));
        }
        if flattened {
            ctx.warn(
                block.line,
                format!("begin/process/end blocks of '{}' flattened into one body", name),
            );
        }
        if keyword == "filter" {
            ctx.warn(
                block.line,
                format!("filter '{}' converted as a plain function", name),
            );
        }

        fill_required_defaults(&mut params);
        record_annotation_imports(&params, ctx);

        let python_name = to_snake_case(name);
        ctx.define_function(name, &python_name);

        let rendered: Vec<String> = params.iter().map(Parameter::render).collect();
        block.body = body;
        block.set_target_header(format!("def {}({})", python_name, rendered.join(", ")));
    }
}

impl ConversionPass for FunctionPass {
    fn name(&self) -> &str {
        "functions"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let tree = unit.tree_mut(self.name())?;
        self.restructure_all(tree, ctx);
        Ok(())
    }
}

fn strip_scope(name: &str) -> &str {
    match name.split_once(':') {
        Some((scope, rest))
            if ["global", "script", "local", "private"]
                .iter()
                .any(|s| scope.eq_ignore_ascii_case(s)) =>
        {
            rest
        }
        _ => name,
    }
}

/// Separate a function body into code, its parameter list, and whether
/// begin/process/end blocks were flattened
fn split_body(body: Vec<Node>) -> (Vec<Node>, Option<String>, bool) {
    let mut out = Vec::with_capacity(body.len());
    let mut declared = None;
    let mut flattened = false;
    let mut preamble = true;

    for node in body {
        match node {
            Node::Stmt(stmt) if preamble && is_attribute_only(&stmt.text) => {}
            Node::Stmt(stmt) if preamble && declared.is_none() && syntax::is_param_block(&stmt.text) => {
                declared = param_list(&stmt.text).map(str::to_string);
            }
            Node::Block(block)
                if matches!(block.keyword().as_str(), "begin" | "process" | "end")
                    && block.header.trim().len() == block.keyword().len() =>
            {
                preamble = false;
                flattened = true;
                out.extend(block.body);
            }
            Node::Comment(text) => out.push(Node::Comment(text)),
            other => {
                preamble = false;
                out.push(other);
            }
        }
    }
    (out, declared, flattened)
}

/// Parameters after the first defaulted one must carry a default too
fn fill_required_defaults(params: &mut [Parameter]) {
    let mut seen_default = false;
    for param in params.iter_mut() {
        if param.default.is_some() {
            seen_default = true;
        } else if seen_default {
            param.default = Some("$null".to_string());
        }
    }
}

// ============================================================================
// Parameter-block pass
// ============================================================================

/// Rewrites `param(...)` blocks left outside any function as plain
/// assignments, and drops stray attribute statements.
pub struct ParamBlockPass {
    mappings: Arc<Mappings>,
}

impl ParamBlockPass {
    pub fn new(mappings: Arc<Mappings>) -> Self {
        Self { mappings }
    }

    fn rewrite(&self, nodes: Vec<Node>, ctx: &mut ConversionContext) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                Node::Stmt(stmt) if is_attribute_only(&stmt.text) => {}
                Node::Stmt(stmt) if syntax::is_param_block(&stmt.text) => {
                    let params = param_list(&stmt.text)
                        .map(|inner| parse_parameters(inner, &self.mappings.types))
                        .unwrap_or_default();
                    record_annotation_imports(&params, ctx);
                    for param in params {
                        let default = param.default.unwrap_or_else(|| "$null".to_string());
                        let text = match param.annotation {
                            Some(ty) => format!("${}: {} = {}", param.name, ty, default),
                            None => format!("${} = {}", param.name, default),
                        };
                        out.push(Node::stmt(text, stmt.line));
                    }
                }
                Node::Block(mut block) => {
                    let body = std::mem::take(&mut block.body);
                    block.body = self.rewrite(body, ctx);
                    out.push(Node::Block(block));
                }
                other => out.push(other),
            }
        }
        out
    }
}

impl ConversionPass for ParamBlockPass {
    fn name(&self) -> &str {
        "params"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let tree = unit.tree_mut(self.name())?;
        let nodes = std::mem::take(tree);
        *tree = self.rewrite(nodes, ctx);
        Ok(())
    }
}
