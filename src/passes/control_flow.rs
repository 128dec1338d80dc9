//! Control-flow headers: conditionals, loops, exception handling and
//! literal `switch` statements.

use super::types::{visit_code, ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::syntax::{self, Block, BlockForm, Node};
use once_cell::sync::Lazy;
use regex_lite::{Captures, Regex};
use std::collections::HashSet;

static FOREACH: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)^\s*(\$[\w:]+)\s+in\s+(.+?)\s*$").ok());
static FOR_INIT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)^\s*\$(\w+)\s*=\s*(.+?)\s*$").ok());
static FOR_COND: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)^\s*\$(\w+)\s+-(lt|le|gt|ge)\s+(.+?)\s*$").ok());
static FOR_STEP: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*\$(\w+)\s*(\+\+|--|\+=\s*1|-=\s*1)\s*$").ok());
static ERROR_REF: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\$(?:_|PSItem)(\.Exception(\.Message)?)?\b").ok()
});
static NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").ok());
static BARE_WORD: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][\w.-]*$").ok());

/// Name bound by generated `except` clauses
const ERROR_VAR: &str = "err";

/// Variable holding a computed switch subject
const SWITCH_SUBJECT: &str = "$switch_value";

/// Rewrites control-flow block headers into target form.
///
/// Blocks it does not recognise stay braced and are reported; the renderer
/// drops their braces.
#[derive(Debug, Default)]
pub struct ControlFlowPass;

impl ControlFlowPass {
    pub fn new() -> Self {
        Self
    }

    fn rewrite(&self, nodes: Vec<Node>, ctx: &mut ConversionContext) -> Vec<Node> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut iter = nodes.into_iter().peekable();

        while let Some(node) = iter.next() {
            let Node::Block(mut block) = node else {
                out.push(node);
                continue;
            };

            if block.form == BlockForm::Indented {
                let body = std::mem::take(&mut block.body);
                block.body = self.rewrite(body, ctx);
                out.push(Node::Block(block));
                continue;
            }

            let keyword = block.keyword();
            if keyword == "switch" {
                out.extend(self.switch(block, ctx));
                continue;
            }

            let body = std::mem::take(&mut block.body);
            block.body = self.rewrite(body, ctx);

            match keyword.as_str() {
                "if" => self.conditional(&mut block, &keyword, "if", ctx),
                "elseif" => self.conditional(&mut block, &keyword, "elif", ctx),
                "while" => self.conditional(&mut block, &keyword, "while", ctx),
                "else" | "try" | "finally" => {
                    let header = keyword.clone();
                    block.set_target_header(header);
                }
                "catch" => {
                    let header = except_clause(&block.header);
                    rewrite_error_refs(&mut block.body);
                    block.set_target_header(header);
                }
                "foreach" => self.foreach(&mut block, ctx),
                "for" => {
                    out.extend(self.for_loop(block, ctx));
                    continue;
                }
                "do" => {
                    let condition = match iter.peek() {
                        Some(Node::Stmt(stmt)) => loop_condition(&stmt.text),
                        _ => None,
                    };
                    match condition {
                        Some((until, condition)) => {
                            iter.next();
                            do_loop(&mut block, until, condition);
                        }
                        None => ctx.warn(block.line, "do block without a while/until condition"),
                    }
                }
                _ => ctx.warn(
                    block.line,
                    format!("unconverted block '{}'", block.header.trim()),
                ),
            }
            out.push(Node::Block(block));
        }
        out
    }

    fn conditional(
        &self,
        block: &mut Block,
        keyword: &str,
        target: &str,
        ctx: &mut ConversionContext,
    ) {
        match paren_group(&block.header, keyword.len()) {
            Some(condition) => block.set_target_header(format!("{} {}", target, condition)),
            None => ctx.warn(
                block.line,
                format!("unrecognised condition in '{}'", block.header.trim()),
            ),
        }
    }

    fn foreach(&self, block: &mut Block, ctx: &mut ConversionContext) {
        let parts = paren_group(&block.header, "foreach".len()).and_then(|inner| {
            let re = FOREACH.as_ref()?;
            let caps = re.captures(&inner)?;
            Some((caps[1].to_string(), caps[2].to_string()))
        });
        match parts {
            Some((var, source)) => block.set_target_header(format!("for {} in {}", var, source)),
            None => ctx.warn(
                block.line,
                format!("unrecognised foreach header '{}'", block.header.trim()),
            ),
        }
    }

    /// C-style `for (init; cond; step)` loops
    fn for_loop(&self, mut block: Block, ctx: &mut ConversionContext) -> Vec<Node> {
        let Some(inner) = paren_group(&block.header, "for".len()) else {
            ctx.warn(block.line, "unrecognised for header");
            return vec![Node::Block(block)];
        };
        let parts: Vec<&str> = syntax::split_top_level(&inner, b';');
        let [init, cond, step] = parts.as_slice() else {
            ctx.warn(block.line, "unrecognised for header");
            return vec![Node::Block(block)];
        };

        if let Some(header) = counted_range(init, cond, step) {
            block.set_target_header(header);
            return vec![Node::Block(block)];
        }

        ctx.warn(
            block.line,
            "C-style for loop rewritten as while; a 'continue' in the body skips the step",
        );
        let mut out = Vec::new();
        if !init.trim().is_empty() {
            out.push(Node::stmt(init.trim(), block.line));
        }
        if !step.trim().is_empty() {
            block.body.push(Node::stmt(step.trim(), block.line));
        }
        let condition = if cond.trim().is_empty() {
            "$true"
        } else {
            cond.trim()
        };
        block.set_target_header(format!("while {}", condition));
        out.push(Node::Block(block));
        out
    }

    /// Literal switches become an if/elif/else chain; anything whose
    /// semantics would have to be guessed is flagged and left alone.
    fn switch(&self, block: Block, ctx: &mut ConversionContext) -> Vec<Node> {
        let plan = match plan_switch(&block) {
            Ok(plan) => plan,
            Err(reason) => {
                ctx.warn(block.line, format!("switch left unconverted: {}", reason));
                return vec![Node::Block(block)];
            }
        };

        let mut out = plan.leading;
        let subject = if is_simple_subject(&plan.subject) {
            plan.subject
        } else {
            out.push(Node::stmt(
                format!("{} = {}", SWITCH_SUBJECT, plan.subject),
                block.line,
            ));
            SWITCH_SUBJECT.to_string()
        };

        let has_cases = !plan.cases.is_empty();
        for (idx, case) in plan.cases.into_iter().enumerate() {
            let keyword = if idx == 0 { "if" } else { "elif" };
            out.push(Node::Block(Block {
                header: format!("{} {} -eq {}", keyword, subject, case.label),
                body: self.rewrite(case.body, ctx),
                line: case.line,
                form: BlockForm::Indented,
            }));
        }
        if let Some(default) = plan.default {
            let body = self.rewrite(default.body, ctx);
            if has_cases {
                out.push(Node::Block(Block {
                    header: "else".to_string(),
                    body,
                    line: default.line,
                    form: BlockForm::Indented,
                }));
            } else {
                out.extend(body);
            }
        }
        out
    }
}

impl ConversionPass for ControlFlowPass {
    fn name(&self) -> &str {
        "control_flow"
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

/// Inner text of the parenthesised group following the keyword
fn paren_group(header: &str, keyword_len: usize) -> Option<String> {
    let header = header.trim();
    let rest = header.get(keyword_len..)?.trim_start();
    if !rest.starts_with('(') {
        return None;
    }
    let close = syntax::find_matching(rest, 0)?;
    Some(rest[1..close].trim().to_string())
}

/// `while (c)` / `until (c)` trailing a `do` block; `true` marks `until`
fn loop_condition(text: &str) -> Option<(bool, String)> {
    let keyword = syntax::header_keyword(text);
    let until = match keyword.as_str() {
        "while" => false,
        "until" => true,
        _ => return None,
    };
    let condition = paren_group(text, keyword.len())?;
    let trailing = text.trim().rfind(')')? + 1 == text.trim().len();
    trailing.then_some((until, condition))
}

fn do_loop(block: &mut Block, until: bool, condition: String) {
    let header = if until {
        format!("if {}", condition)
    } else {
        format!("if -not ({})", condition)
    };
    block.body.push(Node::Block(Block {
        header,
        body: vec![Node::stmt("break", block.line)],
        line: block.line,
        form: BlockForm::Indented,
    }));
    block.set_target_header("while $true");
}

/// `for ($i = a; $i -lt b; $i++)` as a `range` loop
fn counted_range(init: &str, cond: &str, step: &str) -> Option<String> {
    let init = FOR_INIT.as_ref()?.captures(init)?;
    let cond = FOR_COND.as_ref()?.captures(cond)?;
    let (ascending, step_var) = step_direction(step)?;
    let var = &init[1];
    if &cond[1] != var || step_var != var {
        return None;
    }
    let start = init[2].trim();
    let bound = cond[3].trim();
    let range = match (cond[2].to_ascii_lowercase().as_str(), ascending) {
        ("lt", true) => format!("range({}, {})", start, bound),
        ("le", true) => format!("range({}, {} + 1)", start, bound),
        ("gt", false) => format!("range({}, {}, -1)", start, bound),
        ("ge", false) => format!("range({}, {} - 1, -1)", start, bound),
        _ => return None,
    };
    Some(format!("for ${} in {}", var, range))
}

/// Direction and variable of a `$i++` style step
fn step_direction(step: &str) -> Option<(bool, String)> {
    let caps = FOR_STEP.as_ref()?.captures(step)?;
    let ascending = caps[2].starts_with('+');
    Some((ascending, caps[1].to_string()))
}

/// Target exception class for a caught .NET exception type
fn exception_class(dotnet: &str) -> &'static str {
    let name = dotnet.trim().rsplit('.').next().unwrap_or("");
    match name.to_ascii_lowercase().as_str() {
        "ioexception" => "OSError",
        "filenotfoundexception" | "directorynotfoundexception" | "itemnotfoundexception" => {
            "FileNotFoundError"
        }
        "unauthorizedaccessexception" => "PermissionError",
        "argumentexception"
        | "argumentnullexception"
        | "argumentoutofrangeexception"
        | "formatexception" => "ValueError",
        "invalidoperationexception" => "RuntimeError",
        "notimplementedexception" | "notsupportedexception" => "NotImplementedError",
        "timeoutexception" => "TimeoutError",
        "keynotfoundexception" => "KeyError",
        "indexoutofrangeexception" => "IndexError",
        "webexception" | "httprequestexception" => "ConnectionError",
        _ => "Exception",
    }
}

fn except_clause(header: &str) -> String {
    let rest = header.trim()["catch".len()..].trim();
    let mut classes: Vec<&'static str> = Vec::new();
    for part in syntax::split_top_level(rest, b',') {
        let part = part.trim();
        let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) else {
            continue;
        };
        let class = exception_class(inner);
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    let clause = match classes.as_slice() {
        [] => "Exception".to_string(),
        [one] => one.to_string(),
        many => format!("({})", many.join(", ")),
    };
    format!("except {} as {}", clause, ERROR_VAR)
}

/// Inside a catch body `$_` is the error record
fn rewrite_error_refs(body: &mut [Node]) {
    let Some(re) = ERROR_REF.as_ref() else {
        return;
    };
    visit_code(body, &mut |text, _, _| {
        if !re.is_match(text) {
            return;
        }
        *text = re
            .replace_all(text, |caps: &Captures| {
                if caps.get(2).is_some() {
                    format!("str(${})", ERROR_VAR)
                } else {
                    format!("${}", ERROR_VAR)
                }
            })
            .into_owned();
    });
}

struct SwitchCase {
    label: String,
    body: Vec<Node>,
    line: usize,
}

struct SwitchPlan {
    subject: String,
    leading: Vec<Node>,
    cases: Vec<SwitchCase>,
    default: Option<SwitchCase>,
}

fn plan_switch(block: &Block) -> Result<SwitchPlan, String> {
    let rest = block.header.trim()["switch".len()..].trim_start();
    let open = rest
        .find('(')
        .ok_or_else(|| "no parenthesised subject".to_string())?;
    for option in rest[..open].split_whitespace() {
        let option = option.trim_start_matches('-').to_ascii_lowercase();
        if matches!(option.as_str(), "regex" | "wildcard" | "file") {
            return Err(format!("-{} matching", option));
        }
    }
    let close = syntax::find_matching(rest, open)
        .ok_or_else(|| "unbalanced subject".to_string())?;
    let subject = rest[open + 1..close].trim().to_string();

    let mut plan = SwitchPlan {
        subject,
        leading: Vec::new(),
        cases: Vec::new(),
        default: None,
    };
    let mut seen = HashSet::new();
    for node in &block.body {
        let case = match node {
            Node::Comment(_) => {
                plan.leading.push(node.clone());
                continue;
            }
            Node::Stmt(stmt) => return Err(format!("unexpected statement '{}'", stmt.text)),
            Node::Block(case) => case,
        };
        let label = case.header.trim();
        let body = strip_case_breaks(&case.body)?;

        if label.eq_ignore_ascii_case("default") {
            if plan.default.is_some() {
                return Err("more than one default".to_string());
            }
            plan.default = Some(SwitchCase {
                label: String::new(),
                body,
                line: case.line,
            });
            continue;
        }

        let literal = literal_label(label)
            .ok_or_else(|| format!("non-literal label '{}'", label))?;
        let key = literal.trim_matches(['"', '\'']).to_ascii_lowercase();
        if !seen.insert(key) {
            return Err(format!("duplicate label '{}'", label));
        }
        plan.cases.push(SwitchCase {
            label: literal,
            body,
            line: case.line,
        });
    }
    Ok(plan)
}

fn literal_label(label: &str) -> Option<String> {
    if label.starts_with('{') {
        return None;
    }
    if label.starts_with('\'') {
        return Some(label.to_string());
    }
    if label.starts_with('"') {
        return (!label.contains('$')).then(|| label.to_string());
    }
    let lower = label.to_ascii_lowercase();
    if matches!(lower.as_str(), "$true" | "$false" | "$null") {
        return Some(label.to_string());
    }
    if NUMBER.as_ref().is_some_and(|re| re.is_match(label)) {
        return Some(label.to_string());
    }
    if BARE_WORD.as_ref().is_some_and(|re| re.is_match(label)) {
        return Some(format!("\"{}\"", label));
    }
    None
}

fn is_exit(node: &Node) -> bool {
    node.as_stmt().is_some_and(|s| {
        let text = s.text.trim();
        text.eq_ignore_ascii_case("break") || text.eq_ignore_ascii_case("continue")
    })
}

/// Drop `break`/`continue` that end a case; ones buried in nested blocks
/// cannot be expressed in an if-chain
fn strip_case_breaks(body: &[Node]) -> Result<Vec<Node>, String> {
    if has_nested_exit(body, 0) {
        return Err("break inside a nested block of a case".to_string());
    }
    Ok(body.iter().filter(|n| !is_exit(n)).cloned().collect())
}

fn has_nested_exit(body: &[Node], depth: usize) -> bool {
    body.iter().any(|node| match node {
        Node::Stmt(_) => depth > 0 && is_exit(node),
        Node::Block(block) => {
            let is_loop = matches!(
                block.keyword().as_str(),
                "foreach" | "for" | "while" | "do" | "switch"
            );
            !is_loop && has_nested_exit(&block.body, depth + 1)
        }
        Node::Comment(_) => false,
    })
}

fn is_simple_subject(subject: &str) -> bool {
    let Some(rest) = subject.strip_prefix('$') else {
        return false;
    };
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':')
}
