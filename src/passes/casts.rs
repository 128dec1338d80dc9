//! Type casts and typed assignments.

use super::types::{visit_code, CodeKind, ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::mappings::{Mappings, TypeMapper};
use crate::syntax;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;

static TYPED_ASSIGNMENT: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?s)^\[([A-Za-z][\w.]*(?:\[\])?)\]\s*([A-Za-z_]\w*)\s*=([^=].*)$").ok()
});
static CAST: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\[([A-Za-z][\w.]*(?:\[\])?)\]\s*").ok());

/// Python types that double as conversion functions
const CALLABLE_TYPES: &[&str] = &["str", "int", "float", "bool", "list", "dict"];

pub struct CastPass {
    mappings: Arc<Mappings>,
}

impl CastPass {
    pub fn new(mappings: Arc<Mappings>) -> Self {
        Self { mappings }
    }

    /// `[T]x = v` at statement start → `x: T = v`
    fn typed_assignment(&self, text: &str, ctx: &mut ConversionContext) -> Option<String> {
        let caps = TYPED_ASSIGNMENT.as_ref()?.captures(text)?;
        let target = self.mappings.types.map_type(&caps[1]);
        if let Some(import) = TypeMapper::required_import(target) {
            ctx.add_import(import);
        }
        Some(format!("{}: {} = {}", &caps[2], target, caps[3].trim()))
    }

    /// `[int]x` → `int(x)` for types with a callable counterpart
    fn inline_casts(&self, text: &str) -> String {
        let Some(cast) = CAST.as_ref() else {
            return text.to_string();
        };
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        loop {
            let ranges = syntax::string_ranges(rest);
            let found = cast.captures_iter(rest).find_map(|caps| {
                let m = caps.get(0)?;
                if syntax::in_ranges(&ranges, m.start()) {
                    return None;
                }
                let before = rest[..m.start()].chars().last();
                if before.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == ']' || c == ')') {
                    return None;
                }
                let function = callable(self.mappings.types.map_type(&caps[1]))?;
                let operand_len = operand_len(&rest[m.end()..])?;
                Some((m.start(), m.end(), function, operand_len))
            });
            let Some((start, end, function, len)) = found else {
                break;
            };

            let operand = &rest[end..end + len];
            let inner = operand
                .strip_prefix('(')
                .and_then(|o| o.strip_suffix(')'))
                .filter(|_| syntax::find_matching(operand, 0) == Some(operand.len() - 1))
                .unwrap_or(operand);
            out.push_str(&rest[..start]);
            out.push_str(&format!("{}({})", function, inner.trim()));
            rest = &rest[end + len..];
        }
        out.push_str(rest);
        out
    }
}

impl ConversionPass for CastPass {
    fn name(&self) -> &str {
        "casts"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let tree = unit.tree_mut(self.name())?;
        visit_code(tree, &mut |text, _, kind| {
            if kind == CodeKind::Statement {
                if let Some(assignment) = self.typed_assignment(text, ctx) {
                    *text = assignment;
                }
            }
            if text.contains('[') {
                *text = self.inline_casts(text);
            }
        });
        Ok(())
    }
}

fn callable(target: &str) -> Option<&'static str> {
    let base = target.split('[').next().unwrap_or(target);
    CALLABLE_TYPES.iter().copied().find(|t| *t == base)
}

/// Length of the operand at the start of `text`: a bracketed group, a
/// string literal, or a dotted name with trailing calls and indexes
fn operand_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let first = *bytes.first()?;
    match first {
        b'(' => syntax::find_matching(text, 0).map(|i| i + 1),
        b'"' | b'\'' => Some(syntax::skip_string(bytes, 0)),
        b'f' if matches!(bytes.get(1), Some(b'"') | Some(b'\'')) => {
            Some(syntax::skip_string(bytes, 1))
        }
        b if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' => {
            let mut i = 1;
            while i < bytes.len() {
                match bytes[i] {
                    b if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' => i += 1,
                    b'(' | b'[' => i = syntax::find_matching(text, i)? + 1,
                    _ => break,
                }
            }
            Some(i)
        }
        _ => None,
    }
}
