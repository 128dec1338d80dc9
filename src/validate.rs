//! Syntax checking of converted output.
//!
//! The builtin checker is structural: it tokenizes strings, comments and
//! brackets, rebuilds logical lines and checks indentation and block
//! headers. It catches what the conversion passes typically leave behind
//! (stray sigils, unclosed brackets, braces instead of indentation) without
//! needing a Python installation. The interpreter checker runs `ast.parse`
//! and is authoritative.

use crate::config::{ValidationConfig, ValidationMode};
use crate::error::ValidationError;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// Checks that text parses as target code
pub trait SyntaxValidator {
    fn name(&self) -> &str;

    fn validate(&self, source: &str) -> Result<(), ValidationError>;
}

/// Validator selected by configuration
pub fn validator_for(config: &ValidationConfig) -> Result<Box<dyn SyntaxValidator + Send + Sync>> {
    match config.mode {
        ValidationMode::Builtin => Ok(Box::new(BuiltinValidator::new())),
        ValidationMode::Interpreter => {
            let validator = InterpreterValidator::locate(&config.interpreter)
                .with_context(|| format!("Interpreter '{}' is not usable", config.interpreter))?;
            Ok(Box::new(validator))
        }
    }
}

// ============================================================================
// Builtin checker
// ============================================================================

/// Statements that open an indented suite
const BLOCK_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "def", "class", "with",
];

/// Words that may legally sit next to another identifier
const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "case", "class", "continue", "def", "del",
    "elif", "else", "except", "False", "finally", "for", "from", "global", "if", "import", "in",
    "is", "lambda", "match", "None", "nonlocal", "not", "or", "pass", "raise", "return", "True",
    "try", "type", "while", "with", "yield",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinValidator;

impl BuiltinValidator {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxValidator for BuiltinValidator {
    fn name(&self) -> &str {
        "builtin"
    }

    fn validate(&self, source: &str) -> Result<(), ValidationError> {
        let lines = logical_lines(source)?;
        check_structure(&lines)
    }
}

/// One logical line with strings masked and comments removed
#[derive(Debug)]
struct LogicalLine {
    line: usize,
    indent: usize,
    code: String,
}

fn logical_lines(source: &str) -> Result<Vec<LogicalLine>, ValidationError> {
    let chars: Vec<char> = source.chars().collect();
    let mut lines = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut brackets: Vec<(char, usize)> = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        if current.is_none() {
            // Start of a physical line outside any open construct
            let mut indent = 0;
            while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
                indent += 1;
                i += 1;
            }
            match chars.get(i) {
                None => break,
                Some('\n') => {
                    line += 1;
                    i += 1;
                    continue;
                }
                Some('\r') => {
                    i += 1;
                    continue;
                }
                Some('#') => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                Some(_) => {
                    current = Some(LogicalLine {
                        line,
                        indent,
                        code: String::new(),
                    });
                }
            }
        }

        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '"' | '\'' => {
                let start_line = line;
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                i = if triple {
                    skip_triple(&chars, i, c, &mut line)
                        .ok_or_else(|| ValidationError::new(start_line, "unterminated triple-quoted string"))?
                } else {
                    skip_single(&chars, i, c, &mut line)
                        .ok_or_else(|| ValidationError::new(start_line, "unterminated string literal"))?
                };
                push_code(&mut current, "\"\"");
                continue;
            }
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                line += 1;
                i += 2;
                push_code(&mut current, " ");
                continue;
            }
            '(' | '[' | '{' => brackets.push((c, line)),
            ')' | ']' | '}' => match brackets.pop() {
                Some((open, _)) if closer(open) == c => {}
                Some((open, _)) => {
                    return Err(ValidationError::new(
                        line,
                        format!("closing '{}' does not match '{}'", c, open),
                    ))
                }
                None => return Err(ValidationError::new(line, format!("unmatched '{}'", c))),
            },
            '$' => return Err(ValidationError::new(line, "unexpected '$' outside a string")),
            '`' => return Err(ValidationError::new(line, "unexpected '`' outside a string")),
            '\r' => {
                i += 1;
                continue;
            }
            '\n' => {
                line += 1;
                i += 1;
                if brackets.is_empty() {
                    lines.extend(current.take());
                } else {
                    push_code(&mut current, " ");
                }
                continue;
            }
            _ => {}
        }
        let mut buf = [0u8; 4];
        push_code(&mut current, c.encode_utf8(&mut buf));
        i += 1;
    }

    if let Some((open, open_line)) = brackets.first() {
        return Err(ValidationError::new(
            *open_line,
            format!("'{}' was never closed", open),
        ));
    }
    lines.extend(current.take());
    Ok(lines)
}

fn push_code(current: &mut Option<LogicalLine>, text: &str) {
    if let Some(logical) = current.as_mut() {
        logical.code.push_str(text);
    }
}

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Index past a single-quoted string, or `None` if the line ends first
fn skip_single(chars: &[char], start: usize, quote: char, line: &mut usize) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if chars.get(i + 1) == Some(&'\n') {
                    *line += 1;
                }
                i += 2;
            }
            '\n' => return None,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_triple(chars: &[char], start: usize, quote: char, line: &mut usize) -> Option<usize> {
    let mut i = start + 3;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if chars.get(i + 1) == Some(&'\n') {
                    *line += 1;
                }
                i += 2;
            }
            '\n' => {
                *line += 1;
                i += 1;
            }
            c if c == quote && chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) => {
                return Some(i + 3)
            }
            _ => i += 1,
        }
    }
    None
}

fn check_structure(lines: &[LogicalLine]) -> Result<(), ValidationError> {
    let mut stack = vec![0usize];
    let mut expects_suite: Option<usize> = None;

    for logical in lines {
        let top = stack.last().copied().unwrap_or(0);
        if expects_suite.take().is_some() {
            if logical.indent <= top {
                return Err(ValidationError::new(logical.line, "expected an indented block"));
            }
            stack.push(logical.indent);
        } else if logical.indent > top {
            return Err(ValidationError::new(logical.line, "unexpected indent"));
        } else {
            while stack.last().is_some_and(|&level| logical.indent < level) {
                stack.pop();
            }
            if stack.last() != Some(&logical.indent) {
                return Err(ValidationError::new(
                    logical.line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }

        if check_header(logical)? {
            expects_suite = Some(logical.line);
        }
        check_tokens(logical)?;
    }

    match expects_suite {
        Some(line) => Err(ValidationError::new(line, "expected an indented block")),
        None => Ok(()),
    }
}

/// Whether the line opens a suite; compound headers without a colon fail
fn check_header(logical: &LogicalLine) -> Result<bool, ValidationError> {
    let code = logical.code.trim_end();
    let first: String = code
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if !BLOCK_KEYWORDS.contains(&first.as_str()) {
        return Ok(false);
    }
    if code.ends_with(':') {
        return Ok(true);
    }
    if has_top_level_colon(code) {
        // One-line suite such as `if x: y`
        return Ok(false);
    }
    Err(ValidationError::new(
        logical.line,
        format!("expected ':' after '{}' statement", first),
    ))
}

fn has_top_level_colon(code: &str) -> bool {
    let mut depth = 0i32;
    for c in code.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ':' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Operators of the source language that have no meaning after a `-`
const SOURCE_OPERATORS: &[&str] = &[
    "eq", "ne", "gt", "ge", "lt", "le", "ceq", "cne", "like", "notlike", "clike", "match",
    "notmatch", "cmatch", "imatch", "contains", "notcontains", "in", "notin", "is", "isnot",
    "as", "replace", "creplace", "ireplace", "split", "join", "f", "band", "bor", "bxor", "bnot",
    "not", "and", "or", "xor", "shl", "shr",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(String),
    Str,
    Open(char),
    Close(char),
    Punct(char),
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Word(w) | Token::Number(w) => w.clone(),
            Token::Str => "\"\"".to_string(),
            Token::Open(c) | Token::Close(c) | Token::Punct(c) => c.to_string(),
        }
    }

    /// Ends an operand, so another operand may not follow it
    fn ends_operand(&self) -> bool {
        match self {
            Token::Word(w) => !is_keyword(w),
            Token::Number(_) | Token::Str | Token::Close(_) => true,
            _ => false,
        }
    }

    fn starts_operand(&self) -> bool {
        match self {
            Token::Word(w) => !is_keyword(w),
            Token::Number(_) | Token::Str => true,
            _ => false,
        }
    }
}

/// Keywords other than the constant literals
fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word) && !matches!(word, "None" | "True" | "False")
}

/// Split masked code into tokens, each flagged with preceding whitespace
fn tokenize(code: &str) -> Vec<(Token, bool)> {
    let chars: Vec<char> = code.chars().collect();
    let mut tokens = Vec::new();
    let mut spaced = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            spaced = true;
            i += 1;
            continue;
        }
        let start = i;
        let token = if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            Token::Word(chars[start..i].iter().collect())
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            Token::Number(chars[start..i].iter().collect())
        } else if c == '"' {
            // Masked literal
            i += 2;
            Token::Str
        } else {
            i += 1;
            match c {
                '(' | '[' | '{' => Token::Open(c),
                ')' | ']' | '}' => Token::Close(c),
                _ => Token::Punct(c),
            }
        };
        tokens.push((token, spaced));
        spaced = false;
    }
    tokens
}

/// Token sequences that cannot occur in target code: juxtaposed operands,
/// brace blocks, and operators left over from the source language
fn check_tokens(logical: &LogicalLine) -> Result<(), ValidationError> {
    let tokens = tokenize(&logical.code);
    let error = |message: String| -> Result<(), ValidationError> {
        Err(ValidationError::new(logical.line, message))
    };

    match tokens.first() {
        Some((Token::Punct('&'), _)) => return error("unexpected '&' at statement start".into()),
        Some((Token::Punct('.'), _)) if !logical.code.trim_start().starts_with("...") => {
            return error("unexpected '.' at statement start".into())
        }
        _ => {}
    }

    let mut depth = 0usize;
    for (idx, (token, spaced)) in tokens.iter().enumerate() {
        let prev = idx.checked_sub(1).map(|p| &tokens[p]);
        match token {
            Token::Open(_) => depth += 1,
            Token::Close(_) => depth = depth.saturating_sub(1),
            _ => {}
        }

        match (prev, token) {
            (_, Token::Punct('?')) => return error("unexpected '?'".into()),
            (_, Token::Punct(';')) if depth > 0 => {
                return error("unexpected ';' inside brackets".into())
            }
            (_, Token::Punct('!')) => {
                if tokens.get(idx + 1).map(|(t, s)| (t, *s)) != Some((&Token::Punct('='), false)) {
                    return error("unexpected '!'".into());
                }
            }
            (Some((Token::Punct(':'), false)), Token::Punct(':')) => {
                let before = idx.checked_sub(2).map(|p| &tokens[p].0);
                if depth == 0 || matches!(before, Some(Token::Close(']'))) {
                    return error("invalid syntax near '::'".into());
                }
            }
            (Some((prev, _)), Token::Open('{')) if prev.ends_operand() => {
                return error(format!("unexpected '{{' after '{}'", prev.text()));
            }
            (Some((Token::Punct('-'), minus_spaced)), Token::Word(word))
                if !spaced && SOURCE_OPERATORS.contains(&word.to_ascii_lowercase().as_str()) =>
            {
                let leading = idx < 2 || *minus_spaced || matches!(tokens[idx - 2].0, Token::Open(_));
                if leading {
                    return error(format!("unexpected operator '-{}'", word));
                }
            }
            (Some((prev, _)), next) if *spaced && prev.ends_operand() && next.starts_operand() => {
                let concatenation = *prev == Token::Str && *next == Token::Str;
                if !concatenation {
                    return error(format!(
                        "invalid syntax near '{} {}'",
                        prev.text(),
                        next.text()
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// Interpreter checker
// ============================================================================

const PARSE_SCRIPT: &str = "import ast, sys\n\
try:\n    ast.parse(sys.stdin.read())\n\
except SyntaxError as e:\n    print(f\"{e.lineno or 0}:{e.msg}\")\n    sys.exit(1)\n";

/// Runs `ast.parse` in an external interpreter
#[derive(Debug, Clone)]
pub struct InterpreterValidator {
    interpreter: PathBuf,
}

impl InterpreterValidator {
    /// Find the interpreter on PATH
    pub fn locate(name: &str) -> Result<Self, ValidationError> {
        let interpreter = which::which(name).map_err(|e| {
            ValidationError::new(0, format!("interpreter '{}' not found: {}", name, e))
        })?;
        debug!("Using interpreter {:?} for validation", interpreter);
        Ok(Self { interpreter })
    }
}

impl SyntaxValidator for InterpreterValidator {
    fn name(&self) -> &str {
        "interpreter"
    }

    fn validate(&self, source: &str) -> Result<(), ValidationError> {
        let spawn_error = |e: std::io::Error| {
            ValidationError::new(
                0,
                format!("failed to run {}: {}", self.interpreter.display(), e),
            )
        };
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(PARSE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).map_err(spawn_error)?;
        }
        let output = child.wait_with_output().map_err(spawn_error)?;
        if output.status.success() {
            return Ok(());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = stdout.lines().next().unwrap_or("").trim();
        let located = report
            .split_once(':')
            .and_then(|(line, message)| Some((line.parse::<usize>().ok()?, message)));
        match located {
            Some((line, message)) => Err(ValidationError::new(line, message.trim())),
            None => Err(ValidationError::new(
                0,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Result<(), ValidationError> {
        BuiltinValidator::new().validate(source)
    }

    // ============================================================================
    // ACCEPTED INPUT
    // ============================================================================

    #[test]
    fn test_accepts_converted_function() {
        let source = "# Converted from a.ps1 by psmigrate (level: FULL)\n\nimport os\n\n\ndef get_user(Name: str = \"x\"):\n    if Name == None:\n        print(f\"missing {Name}\")\n    else:\n        return os.path.exists(Name)\n";
        assert!(check(source).is_ok());
    }

    #[test]
    fn test_accepts_multiline_brackets_and_triple_strings() {
        let source = "data = {\n    \"a\": 1,\n    \"b\": [1, 2],\n}\ntext = \"\"\"\nline $with dollar\n\"\"\"\nfor x in sorted(data, key=lambda k: k):\n    pass\n";
        assert!(check(source).is_ok());
    }

    #[test]
    fn test_accepts_keyword_neighbours() {
        assert!(check("ok = a is not None and b not in c\n").is_ok());
        assert!(check("if x: y = 1\n").is_ok());
    }

    // ============================================================================
    // REJECTED INPUT
    // ============================================================================

    #[test]
    fn test_rejects_leftover_sigil() {
        let err = check("x = $y\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("'$'"));
    }

    #[test]
    fn test_dollar_inside_string_is_fine() {
        assert!(check("x = 'cost: $5'\n").is_ok());
    }

    #[test]
    fn test_rejects_unclosed_bracket() {
        let err = check("x = (1,\n  2\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("never closed"));
    }

    #[test]
    fn test_rejects_unterminated_string() {
        let err = check("a = 1\nb = \"open\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_rejects_missing_suite() {
        let err = check("if x:\ny = 1\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("indented block"));

        assert!(check("def f():\n").is_err());
    }

    #[test]
    fn test_rejects_unexpected_indent() {
        let err = check("a = 1\n    b = 2\n").unwrap_err();
        assert_eq!(err.message, "unexpected indent");
    }

    #[test]
    fn test_rejects_bad_dedent() {
        let err = check("if a:\n    b = 1\n  c = 2\n").unwrap_err();
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn test_rejects_header_without_colon() {
        let err = check("if (a)\n    b\n").unwrap_err();
        assert!(err.message.contains("expected ':'"));
    }

    #[test]
    fn test_rejects_unconverted_command() {
        let err = check("Invoke-Thing foo\n").unwrap_err();
        assert!(err.message.contains("invalid syntax"));
    }

    #[test]
    fn test_rejects_leftover_source_constructs() {
        let cases = [
            ("x = [Math]::Round(y)\n", "'::'"),
            ("x = a ? 1 : 2\n", "'?'"),
            ("x = a ?? b\n", "'?'"),
            ("& run_tool arg\n", "'&'"),
            (". .\\Helpers.ps1\n", "'.'"),
            ("ok = value -is [str]\n", "'-is'"),
            ("ok = (-not done)\n", "'-not'"),
            ("hit = name -like \"a*\"\n", "'-like'"),
            ("trap { print(e) }\n", "'{'"),
            ("r = Invoke(ScriptBlock) { now() }\n", "'{'"),
            ("f = { param(x)\n  x + 1 }\n", "invalid syntax"),
            ("s = { a; b }\n", "';'"),
            ("ok = !done\n", "'!'"),
            ("print \"hi\"\n", "invalid syntax"),
        ];
        for (source, needle) in cases {
            let err = check(source).expect_err(source);
            assert!(
                err.message.contains(needle),
                "{:?}: {} lacks {}",
                source,
                err.message,
                needle
            );
        }
    }

    #[test]
    fn test_accepts_literals_and_slices() {
        assert!(check("d = {'a': 1, \"b\": [1, 2]}\n").is_ok());
        assert!(check("s = {a, b}\nt = {}\n").is_ok());
        assert!(check("tail = items[::2]\nhead = items[1::3]\n").is_ok());
        assert!(check("msg = f\"{a} {b!r}\"\nok = a != b\n").is_ok());
        assert!(check("words = \"a\" \"b\"\nn = x - y\ndelta = -offset\n").is_ok());
        assert!(check("def f():\n    ...\n").is_ok());
    }

    #[test]
    fn test_rejects_mismatched_closer() {
        assert!(check("x = (1]\n").is_err());
        assert!(check("x = 1)\n").is_err());
    }

    // ============================================================================
    // SELECTION
    // ============================================================================

    #[test]
    fn test_validator_for_builtin() {
        let validator = validator_for(&ValidationConfig::default()).unwrap();
        assert_eq!(validator.name(), "builtin");
    }

    #[test]
    fn test_validator_for_missing_interpreter() {
        let config = ValidationConfig {
            mode: ValidationMode::Interpreter,
            interpreter: "definitely-not-a-python-9".to_string(),
        };
        assert!(validator_for(&config).is_err());
    }

    #[test]
    fn test_interpreter_validator_when_available() {
        let Ok(validator) = InterpreterValidator::locate("python3") else {
            return;
        };
        assert!(validator.validate("x = 1\n").is_ok());
        let err = validator.validate("x = (\n").unwrap_err();
        assert!(err.line >= 1);
    }
}
