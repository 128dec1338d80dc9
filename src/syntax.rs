//! Block structure of PowerShell source.
//!
//! The parser splits source text into statements, comments and brace-delimited
//! blocks. Only braces that open a statement block (`if`, `function`, `try`,
//! switch cases, ...) become [`Block`] nodes; hashtable literals and script
//! block arguments stay inside their statement text so the lexical and
//! pipeline passes can rewrite them later.
//!
//! The scanning helpers at the bottom of this module work on both source and
//! partially converted text and are shared by every pass.

use crate::error::ConversionError;

/// Indentation unit of generated code
pub const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Stmt(Stmt),
    Comment(String),
    Block(Block),
}

impl Node {
    pub fn stmt(text: impl Into<String>, line: usize) -> Self {
        Node::Stmt(Stmt {
            text: text.into(),
            line,
        })
    }

    /// Statement text, if this is a statement
    pub fn as_stmt(&self) -> Option<&Stmt> {
        match self {
            Node::Stmt(stmt) => Some(stmt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub text: String,
    pub line: usize,
}

/// Whether a block still carries source braces or has been rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockForm {
    Braced,
    Indented,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub header: String,
    pub body: Vec<Node>,
    pub line: usize,
    pub form: BlockForm,
}

impl Block {
    /// Lowercased leading keyword of the header (`if`, `foreach`, `function`, ...)
    pub fn keyword(&self) -> String {
        header_keyword(&self.header)
    }

    /// Mark the block as converted with a new target-form header
    pub fn set_target_header(&mut self, header: impl Into<String>) {
        self.header = header.into();
        self.form = BlockForm::Indented;
    }
}

/// Lowercased leading word of a statement, hyphens included
pub fn header_keyword(header: &str) -> String {
    header
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Whether a statement, followed by `{`, opens a statement block
pub fn is_block_header(header: &str) -> bool {
    let header = header.trim();
    let keyword = header_keyword(header);
    let rest = header[keyword.len()..].trim_start();
    match keyword.as_str() {
        "function" | "filter" => !rest.is_empty(),
        "if" | "elseif" | "foreach" | "for" | "while" => rest.starts_with('('),
        "else" | "try" | "finally" | "do" | "begin" | "process" | "end" => rest.is_empty(),
        "catch" => rest.is_empty() || rest.starts_with('['),
        "switch" => !rest.is_empty(),
        _ => false,
    }
}

/// Parse source text into a block tree
pub fn parse(source: &str) -> Result<Vec<Node>, ConversionError> {
    Parser::new(source).run()
}

/// Render a block tree as indentation-structured text.
///
/// Indented blocks get a trailing colon and a `pass` body when empty.
/// Braced blocks that no pass converted are emitted with their braces
/// stripped; callers are expected to have flagged them.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(nodes, 0, &mut out);
    out
}

fn render_into(nodes: &[Node], depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    for node in nodes {
        match node {
            Node::Stmt(stmt) => {
                out.push_str(&indent);
                out.push_str(&stmt.text);
                out.push('\n');
            }
            Node::Comment(text) => {
                out.push_str(&indent);
                out.push_str(text);
                out.push('\n');
            }
            Node::Block(block) => {
                out.push_str(&indent);
                out.push_str(&block.header);
                if block.form == BlockForm::Indented {
                    out.push(':');
                }
                out.push('\n');
                render_into(&block.body, depth + 1, out);
                if !has_code(&block.body) {
                    out.push_str(&INDENT.repeat(depth + 1));
                    out.push_str("pass\n");
                }
            }
        }
    }
}

/// Whether a body contains anything besides comments
pub fn has_code(body: &[Node]) -> bool {
    body.iter().any(|n| !matches!(n, Node::Comment(_)))
}

/// Visit every block in the tree, depth first, parents before children
pub fn walk_blocks_mut(nodes: &mut [Node], f: &mut dyn FnMut(&mut Block)) {
    for node in nodes.iter_mut() {
        if let Node::Block(block) = node {
            f(block);
            walk_blocks_mut(&mut block.body, f);
        }
    }
}

struct Frame {
    header: String,
    line: usize,
    body: Vec<Node>,
    is_switch: bool,
}

impl Frame {
    fn root() -> Self {
        Self {
            header: String::new(),
            line: 0,
            body: Vec::new(),
            is_switch: false,
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    frames: Vec<Frame>,
    cur: String,
    cur_line: usize,
    trailing_comment: Option<String>,
    brackets: Vec<(u8, usize)>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            frames: vec![Frame::root()],
            cur: String::new(),
            cur_line: 1,
            trailing_comment: None,
            brackets: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<Node>, ConversionError> {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\r' => self.pos += 1,
                b'"' | b'\'' => self.take_string()?,
                b'@' if self.at_here_string() => self.take_here_string()?,
                b'<' if self.peek(1) == Some(b'#') => self.take_block_comment()?,
                b'#' => self.take_line_comment(),
                b'`' if matches!(self.peek(1), Some(b'\n') | Some(b'\r')) => {
                    // Line continuation
                    self.pos += 1;
                    if self.peek(0) == Some(b'\r') {
                        self.pos += 1;
                    }
                    self.pos += 1;
                    self.line += 1;
                    self.cur.push(' ');
                }
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                    if self.brackets.is_empty() {
                        self.flush();
                    } else {
                        self.cur.push('\n');
                    }
                }
                b';' if self.brackets.is_empty() => {
                    self.pos += 1;
                    self.flush();
                }
                b'(' | b'[' => self.open(b),
                b'{' => {
                    if !(self.brackets.is_empty() && self.enter_block()) {
                        self.open(b);
                    }
                }
                b')' | b']' | b'}' => self.close(b)?,
                _ => self.take_char(),
            }
        }
        self.finish()
    }

    fn append(&mut self, text: &str) {
        if self.cur.trim().is_empty() {
            self.cur.clear();
            self.cur_line = self.line;
        }
        self.cur.push_str(text);
    }

    fn take_char(&mut self) {
        let Some(ch) = self.src[self.pos..].chars().next() else {
            self.pos += 1;
            return;
        };
        self.pos += ch.len_utf8();
        if ch.is_whitespace() && self.cur.is_empty() {
            return;
        }
        let mut buf = [0u8; 4];
        self.append(ch.encode_utf8(&mut buf));
    }

    fn take_string(&mut self) -> Result<(), ConversionError> {
        let start = self.pos;
        let end = skip_ps_string(self.bytes, start)
            .ok_or_else(|| ConversionError::parse(self.line, "unterminated string literal"))?;
        let text = &self.src[start..end];
        self.append(text);
        self.line += text.matches('\n').count();
        self.pos = end;
        Ok(())
    }

    fn at_here_string(&self) -> bool {
        matches!(self.peek(1), Some(b'"') | Some(b'\''))
            && matches!(self.peek(2), Some(b'\n') | Some(b'\r'))
    }

    fn take_here_string(&mut self) -> Result<(), ConversionError> {
        let quote = self.bytes[self.pos + 1] as char;
        let terminator = format!("\n{}@", quote);
        let start = self.pos;
        let body_start = self.pos + 2;
        let end = self.src[body_start..]
            .find(&terminator)
            .map(|i| body_start + i + terminator.len())
            .ok_or_else(|| ConversionError::parse(self.line, "unterminated here-string"))?;
        let text = self.src[start..end].replace('\r', "");
        self.line += text.matches('\n').count();
        self.append(&text);
        self.pos = end;
        Ok(())
    }

    fn take_block_comment(&mut self) -> Result<(), ConversionError> {
        let start = self.pos + 2;
        let end = self.src[start..]
            .find("#>")
            .map(|i| start + i)
            .ok_or_else(|| ConversionError::parse(self.line, "unterminated block comment"))?;
        let body = &self.src[start..end];
        self.line += body.matches('\n').count();
        self.pos = end + 2;
        if !self.brackets.is_empty() {
            return Ok(());
        }
        self.flush();
        let frame = self.frames.last_mut().map(|f| &mut f.body);
        if let Some(body_nodes) = frame {
            for line in body.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                body_nodes.push(Node::Comment(format!("# {}", line)));
            }
        }
        Ok(())
    }

    fn take_line_comment(&mut self) {
        let start = self.pos;
        let end = self.src[start..]
            .find('\n')
            .map(|i| start + i)
            .unwrap_or(self.src.len());
        let text = self.src[start..end].trim_end().to_string();
        self.pos = end;
        if !self.brackets.is_empty() {
            return;
        }
        if self.cur.trim().is_empty() {
            if let Some(frame) = self.frames.last_mut() {
                frame.body.push(Node::Comment(text));
            }
        } else {
            self.trailing_comment = Some(text);
        }
    }

    fn open(&mut self, b: u8) {
        self.brackets.push((b, self.line));
        self.append(&(b as char).to_string());
        self.pos += 1;
    }

    fn close(&mut self, b: u8) -> Result<(), ConversionError> {
        match self.brackets.pop() {
            Some((open, _)) => {
                if closing_for(open) != b {
                    return Err(ConversionError::parse(
                        self.line,
                        format!("mismatched '{}' closing '{}'", b as char, open as char),
                    ));
                }
                self.cur.push(b as char);
                self.pos += 1;
                if b == b')' && self.brackets.is_empty() && is_param_block(&self.cur) {
                    self.flush();
                }
                Ok(())
            }
            None if b == b'}' => {
                self.pos += 1;
                self.close_frame()
            }
            None => Err(ConversionError::parse(
                self.line,
                format!("unbalanced '{}'", b as char),
            )),
        }
    }

    /// Push a block frame for the `{` at `pos` if it opens a statement
    /// block; the brace is consumed only when this returns true
    fn enter_block(&mut self) -> bool {
        let header = self.cur.trim().to_string();
        let in_switch = self.frames.last().is_some_and(|f| f.is_switch);
        if !header.is_empty() {
            if in_switch || is_block_header(&header) {
                self.push_frame();
                return true;
            }
            return false;
        }
        // Allman style: the header was flushed on the previous line
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        let Some(idx) = frame.body.iter().rposition(|n| !matches!(n, Node::Comment(_))) else {
            return false;
        };
        let reopen = match &frame.body[idx] {
            Node::Stmt(stmt) => in_switch || is_block_header(&stmt.text),
            _ => false,
        };
        if reopen {
            let trailing: Vec<Node> = frame.body.drain(idx + 1..).collect();
            if let Node::Stmt(stmt) = frame.body.remove(idx) {
                self.cur = stmt.text;
                self.cur_line = stmt.line;
            }
            self.push_frame_with(trailing);
            return true;
        }
        false
    }

    fn push_frame(&mut self) {
        self.push_frame_with(Vec::new());
    }

    fn push_frame_with(&mut self, body: Vec<Node>) {
        let header = self.cur.trim().to_string();
        let is_switch = header_keyword(&header) == "switch";
        self.frames.push(Frame {
            header,
            line: self.cur_line,
            body,
            is_switch,
        });
        self.cur.clear();
        self.trailing_comment = None;
        // Consume the opening brace
        self.pos += 1;
    }

    fn close_frame(&mut self) -> Result<(), ConversionError> {
        self.flush();
        if self.frames.len() < 2 {
            return Err(ConversionError::parse(self.line, "unbalanced '}'"));
        }
        let Some(frame) = self.frames.pop() else {
            return Err(ConversionError::parse(self.line, "unbalanced '}'"));
        };
        let block = Block {
            header: frame.header,
            body: frame.body,
            line: frame.line,
            form: BlockForm::Braced,
        };
        if let Some(parent) = self.frames.last_mut() {
            parent.body.push(Node::Block(block));
        }
        Ok(())
    }

    fn flush(&mut self) {
        let text = self.cur.trim();
        if let Some(frame) = self.frames.last_mut() {
            if !text.is_empty() {
                frame.body.push(Node::stmt(text, self.cur_line));
            }
            if let Some(comment) = self.trailing_comment.take() {
                frame.body.push(Node::Comment(comment));
            }
        }
        self.cur.clear();
    }

    fn finish(mut self) -> Result<Vec<Node>, ConversionError> {
        self.flush();
        if let Some((open, line)) = self.brackets.first() {
            return Err(ConversionError::parse(
                *line,
                format!("unclosed '{}'", *open as char),
            ));
        }
        if self.frames.len() > 1 {
            let frame = &self.frames[self.frames.len() - 1];
            return Err(ConversionError::parse(
                frame.line,
                format!("unterminated block '{}'", frame.header),
            ));
        }
        Ok(self.frames.pop().map(|f| f.body).unwrap_or_default())
    }
}

fn closing_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

/// `param(...)` statement, ignoring case and any leading attribute
pub fn is_param_block(text: &str) -> bool {
    let text = strip_attributes(text.trim());
    let lower = text.to_ascii_lowercase();
    lower.starts_with("param") && lower[5..].trim_start().starts_with('(')
}

/// Drop leading `[Attribute(...)]` groups such as `[CmdletBinding()]`
pub fn strip_attributes(text: &str) -> &str {
    let mut rest = text.trim_start();
    while rest.starts_with('[') {
        let Some(end) = find_matching(rest, 0) else {
            break;
        };
        let group = &rest[1..end];
        if !group.contains('(') {
            break;
        }
        rest = rest[end + 1..].trim_start();
    }
    rest
}

// ============================================================================
// Scanning helpers
// ============================================================================

/// Index just past the PowerShell string literal starting at `start`.
///
/// Handles doubled quotes, backtick escapes and `$( ... )` subexpressions
/// (which may contain nested strings) inside double-quoted strings.
pub fn skip_ps_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = *bytes.get(start)?;
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if quote == b'"' && b == b'`' {
            i += 2;
            continue;
        }
        if quote == b'"' && b == b'$' && bytes.get(i + 1) == Some(&b'(') {
            i = skip_ps_subexpression(bytes, i + 1)?;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

fn skip_ps_subexpression(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            b'"' | b'\'' => {
                i = skip_ps_string(bytes, i)?;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index just past a generic string literal (`'`, `"`, or triple-quoted).
/// Unterminated strings run to the end of the text.
pub fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    if triple {
        let mut i = start + 3;
        while i + 2 < bytes.len() {
            if bytes[i] == quote && bytes[i + 1] == quote && bytes[i + 2] == quote {
                return i + 3;
            }
            i += 1;
        }
        return bytes.len();
    }
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' | b'`' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Byte ranges covered by string literals
pub fn string_ranges(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let end = skip_string(bytes, i);
                ranges.push((i, end));
                i = end.max(i + 1);
            }
            b'#' => {
                // Comment runs to end of line
                let end = text[i..].find('\n').map(|e| i + e).unwrap_or(text.len());
                ranges.push((i, end));
                i = end.max(i + 1);
            }
            _ => i += 1,
        }
    }
    ranges
}

/// Whether `idx` falls inside one of `ranges`
pub fn in_ranges(ranges: &[(usize, usize)], idx: usize) -> bool {
    ranges.iter().any(|&(start, end)| idx >= start && idx < end)
}

/// Index of the delimiter closing the one at `open`, skipping strings
pub fn find_matching(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut stack = vec![closing_for(*bytes.get(open)?)];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b @ (b'(' | b'[' | b'{') => stack.push(closing_for(b)),
            b @ (b')' | b']' | b'}') => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// End of the expression starting at the beginning of `text`: the first
/// top-level `|`, `;` or newline, or an unmatched closing delimiter
pub fn expression_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            b'|' | b';' | b'\n' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Split on `sep` where it occurs outside strings and brackets
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b if b == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

/// Split on top-level whitespace, keeping strings and bracket groups whole
pub fn split_words(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() && depth == 0 {
            if let Some(s) = start.take() {
                words.push(&text[s..i]);
            }
            i += 1;
            continue;
        }
        if start.is_none() {
            start = Some(i);
        }
        match b {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    if let Some(s) = start {
        words.push(&text[s..]);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(nodes: &[Node], idx: usize) -> &Block {
        match &nodes[idx] {
            Node::Block(b) => b,
            other => panic!("expected block, got {:?}", other),
        }
    }

    // ============================================================================
    // PARSER TESTS
    // ============================================================================

    #[test]
    fn test_parse_statements_split_on_newline_and_semicolon() {
        let nodes = parse("$a = 1; $b = 2\n$c = 3\n").unwrap();
        let texts: Vec<&str> = nodes.iter().filter_map(|n| n.as_stmt()).map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["$a = 1", "$b = 2", "$c = 3"]);
    }

    #[test]
    fn test_parse_function_block_with_inline_param() {
        let nodes =
            parse("function Get-User { param([string]$Name = \"x\") Write-Host $Name }").unwrap();
        assert_eq!(nodes.len(), 1);
        let func = block(&nodes, 0);
        assert_eq!(func.header, "function Get-User");
        assert_eq!(func.keyword(), "function");
        let body: Vec<&str> = func.body.iter().filter_map(|n| n.as_stmt()).map(|s| s.text.as_str()).collect();
        assert_eq!(body, vec!["param([string]$Name = \"x\")", "Write-Host $Name"]);
    }

    #[test]
    fn test_parse_if_else_chain() {
        let nodes = parse("if ($a -eq $null) { Write-Host 'a' } else { Write-Host 'b' }").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(block(&nodes, 0).header, "if ($a -eq $null)");
        assert_eq!(block(&nodes, 1).header, "else");
    }

    #[test]
    fn test_parse_allman_braces() {
        let src = "if ($x)\n{\n    $y = 1\n}\nelse\n{\n    $y = 2\n}\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(block(&nodes, 0).header, "if ($x)");
        assert_eq!(block(&nodes, 1).header, "else");
        assert_eq!(block(&nodes, 1).body.len(), 1);
    }

    #[test]
    fn test_parse_allman_function_with_comment_before_brace() {
        let src = "function Get-Thing\n# setup\n{\n    param($x)\n    $x\n}\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 1);
        let func = block(&nodes, 0);
        assert_eq!(func.header, "function Get-Thing");
        assert!(matches!(func.body[0], Node::Comment(_)));
        assert_eq!(func.body.len(), 3);
    }

    #[test]
    fn test_parse_allman_brace_before_multibyte_char() {
        let nodes = parse("else\n{ä}").unwrap();
        let body = &block(&nodes, 0).body;
        assert_eq!(body[0].as_stmt().unwrap().text, "ä");
    }

    #[test]
    fn test_parse_hashtable_stays_in_statement() {
        let nodes = parse("$h = @{ Name = 'x'; Age = 3 }\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].as_stmt().unwrap().text, "$h = @{ Name = 'x'; Age = 3 }");
    }

    #[test]
    fn test_parse_scriptblock_argument_stays_in_statement() {
        let nodes = parse("$big = $files | Where-Object { $_.Length -gt 10 }\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].as_stmt().unwrap().text.contains("{ $_.Length -gt 10 }"));
    }

    #[test]
    fn test_parse_switch_cases_become_blocks() {
        let src = "switch ($x) {\n  \"a\" { $y = 1 }\n  default { $y = 0 }\n}\n";
        let nodes = parse(src).unwrap();
        let sw = block(&nodes, 0);
        assert_eq!(sw.keyword(), "switch");
        assert_eq!(sw.body.len(), 2);
        assert_eq!(block(&sw.body, 0).header, "\"a\"");
        assert_eq!(block(&sw.body, 1).header, "default");
    }

    #[test]
    fn test_parse_switch_scriptblock_label() {
        let src = "switch ($x) {\n  { $_ -gt 5 } { $y = 1 }\n}\n";
        let nodes = parse(src).unwrap();
        let sw = block(&nodes, 0);
        assert_eq!(block(&sw.body, 0).header, "{ $_ -gt 5 }");
    }

    #[test]
    fn test_parse_comments() {
        let src = "# leading\n$a = 1 # trailing\n<#\n block\n#>\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes[0], Node::Comment("# leading".to_string()));
        assert_eq!(nodes[1].as_stmt().unwrap().text, "$a = 1");
        assert_eq!(nodes[2], Node::Comment("# trailing".to_string()));
        assert_eq!(nodes[3], Node::Comment("# block".to_string()));
    }

    #[test]
    fn test_parse_line_continuation() {
        let nodes = parse("Get-Thing -A 1 `\n  -B 2\n").unwrap();
        assert_eq!(nodes.len(), 1);
        let text = &nodes[0].as_stmt().unwrap().text;
        assert!(text.contains("-A 1"));
        assert!(text.contains("-B 2"));
    }

    #[test]
    fn test_parse_string_with_braces_and_subexpression() {
        let nodes = parse("$s = \"{ $(Get-Date -Format \"yyyy\") }\"\n").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_parse_multiline_param_block() {
        let src = "param(\n  [string]$Path,\n  [int]$Days = 30\n)\n$x = 1\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(is_param_block(&nodes[0].as_stmt().unwrap().text));
    }

    #[test]
    fn test_parse_here_string() {
        let src = "$t = @\"\nline {1}\n\"@\n$u = 2\n";
        let nodes = parse(src).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].as_stmt().unwrap().text.ends_with("\"@"));
    }

    #[test]
    fn test_parse_unbalanced_close_brace_is_error() {
        let err = parse("$a = 1\n}\n").unwrap_err();
        assert!(err.to_string().contains("unbalanced"));
    }

    #[test]
    fn test_parse_unterminated_block_is_error() {
        let err = parse("if ($a) {\n$b = 1\n").unwrap_err();
        assert!(err.to_string().contains("unterminated block"));
    }

    #[test]
    fn test_parse_unterminated_string_is_error() {
        assert!(parse("$a = \"oops\n").is_err());
    }

    #[test]
    fn test_parse_tracks_lines() {
        let nodes = parse("\n\n$a = 1\nif ($a) {\n  $b = 2\n}\n").unwrap();
        assert_eq!(nodes[0].as_stmt().unwrap().line, 3);
        assert_eq!(block(&nodes, 1).line, 4);
    }

    // ============================================================================
    // RENDER TESTS
    // ============================================================================

    #[test]
    fn test_render_indented_block_with_pass() {
        let nodes = vec![Node::Block(Block {
            header: "if x".to_string(),
            body: vec![Node::Comment("# nothing".to_string())],
            line: 1,
            form: BlockForm::Indented,
        })];
        assert_eq!(render(&nodes), "if x:\n    # nothing\n    pass\n");
    }

    #[test]
    fn test_render_braced_block_strips_braces() {
        let nodes = vec![Node::Block(Block {
            header: "do".to_string(),
            body: vec![Node::stmt("x = 1", 1)],
            line: 1,
            form: BlockForm::Braced,
        })];
        assert_eq!(render(&nodes), "do\n    x = 1\n");
    }

    // ============================================================================
    // HELPER TESTS
    // ============================================================================

    #[test]
    fn test_is_block_header() {
        assert!(is_block_header("if ($a)"));
        assert!(is_block_header("ElseIf ($b)"));
        assert!(is_block_header("else"));
        assert!(is_block_header("catch [System.IO.IOException]"));
        assert!(is_block_header("function Get-Thing"));
        assert!(is_block_header("switch -Regex ($x)"));
        assert!(!is_block_header("$list | ForEach-Object"));
        assert!(!is_block_header("$h = @"));
        assert!(!is_block_header("iffy"));
    }

    #[test]
    fn test_strip_attributes() {
        assert_eq!(strip_attributes("[CmdletBinding()] param($a)"), "param($a)");
        assert_eq!(strip_attributes("[string]$a"), "[string]$a");
    }

    #[test]
    fn test_find_matching_skips_strings() {
        let text = "(a, \")\", (b))";
        assert_eq!(find_matching(text, 0), Some(text.len() - 1));
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("a, (b, c), \"d, e\"", b',');
        assert_eq!(parts, vec!["a", " (b, c)", " \"d, e\""]);
    }

    #[test]
    fn test_split_words() {
        let words = split_words("-Path \"C:\\a b\" -Filter (x y) z");
        assert_eq!(words, vec!["-Path", "\"C:\\a b\"", "-Filter", "(x y)", "z"]);
    }

    #[test]
    fn test_string_ranges() {
        let text = "a \"b\" 'c' # d";
        let ranges = string_ranges(text);
        assert!(in_ranges(&ranges, 3));
        assert!(in_ranges(&ranges, 7));
        assert!(in_ranges(&ranges, 12));
        assert!(!in_ranges(&ranges, 0));
    }
}
