//! The general lexical rule table.
//!
//! Rules are grouped in the order they must run:
//! literals and strings first, then operators, then .NET members, then
//! variable sigils, then member rewrites that expect bare identifiers, and
//! finally hashtable literals.

use super::ConversionRule;
use crate::error::ConversionError;
use crate::syntax;
use crate::types::ConversionLevel;
use regex_lite::Captures;

/// Name of the rule that turns interpolated strings into f-strings
pub const INTERPOLATION_RULE: &str = "string_interpolation";

/// Name of the rule that strips `$` from variable references
pub const SIGIL_RULE: &str = "strip_sigil";

/// Build the lexical table. `bridge_handle` names the bridge object in
/// generated code.
pub fn rules(bridge_handle: &str) -> Result<Vec<ConversionRule>, ConversionError> {
    use ConversionRule as R;

    let rules = vec![
        // Automatic variables and discards
        R::template("discard_null", r"(?i)^\$null\s*=\s*", "_ = ", "$null = x discards")?,
        R::template("void_cast", r"(?i)^\[void\]\s*", "", "[void] discards")?,
        R::template("true", r"(?i)\$true\b", "True", "$true literal")?,
        R::template("false", r"(?i)\$false\b", "False", "$false literal")?,
        R::template("null", r"(?i)\$null\b", "None", "$null literal")?,
        R::template(
            "script_root",
            r"(?i)\$PSScriptRoot\b",
            "os.path.dirname(os.path.abspath(__file__))",
            "script directory",
        )?,
        R::template(
            "command_path",
            r"(?i)\$PSCommandPath\b",
            "os.path.abspath(__file__)",
            "script path",
        )?,
        R::template("args", r"(?i)\$args\b", "sys.argv[1:]", "script arguments")?,
        // Environment
        R::template(
            "env_assign",
            r#"(?i)^\$env:(\w+)\s*=\s*([^=].*)$"#,
            r#"os.environ["${1}"] = ${2}"#,
            "environment variable assignment",
        )?,
        R::template(
            "env_read",
            r"(?i)\$env:(\w+)",
            r#"os.environ.get("${1}")"#,
            "environment variable read",
        )?,
        // Strings
        R::template(
            "here_string_expandable",
            r#"(?s)@"\n(.*?)\n"@"#,
            "\"\"\"\n${1}\n\"\"\"",
            "expandable here-string",
        )?
        .anywhere(),
        R::template(
            "here_string_literal",
            r"(?s)@'\n(.*?)\n'@",
            "'''\n${1}\n'''",
            "literal here-string",
        )?
        .anywhere(),
        R::callback(
            INTERPOLATION_RULE,
            r#"(?s)""".*?"""|'''.*?'''|'(?:[^']|'')*'|"(?:[^"`]|`.|"")*""#,
            convert_string_literal,
            "string literals and interpolation to f-strings",
        )?
        .anywhere(),
        R::callback(
            "format_operator",
            r#"(f?"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')\s+-[fF]\s+(.+)"#,
            format_operator,
            "-f format operator to str.format",
        )?
        .anywhere(),
        // Collections and subexpressions
        R::template("subexpression", r"\$\(", "(", "$( ) subexpression")?,
        R::template("empty_array", r"@\(\s*\)", "[]", "empty array")?,
        R::template(
            "array_literal",
            r"@\(((?:[^()]|\([^()]*\))*)\)",
            "[${1}]",
            "array subexpression to list",
        )?,
        R::callback(
            "range",
            r"(\$\w+|\d+)\.\.(\$\w+|\d+)",
            range_operator,
            "range operator",
        )?,
        // Comparison and logical operators
        R::template("eq", r"(?i)\s-[ci]?eq\b", " ==", "-eq")?,
        R::template("ne", r"(?i)\s-[ci]?ne\b", " !=", "-ne")?,
        R::template("ge", r"(?i)\s-[ci]?ge\b", " >=", "-ge")?,
        R::template("gt", r"(?i)\s-[ci]?gt\b", " >", "-gt")?,
        R::template("le", r"(?i)\s-[ci]?le\b", " <=", "-le")?,
        R::template("lt", r"(?i)\s-[ci]?lt\b", " <", "-lt")?,
        R::template("and", r"(?i)\s-and\b", " and", "-and")?,
        R::template("or", r"(?i)\s-or\b", " or", "-or")?,
        R::template("xor", r"(?i)\s-xor\b", " ^", "-xor")?,
        R::template("band", r"(?i)\s-band\b", " &", "-band")?,
        R::template("bor", r"(?i)\s-bor\b", " |", "-bor")?,
        R::template("not", r"(?i)-not\b\s*", "not ", "-not")?,
        R::template("bang", r"!\s*([$(\w])", "not ${1}", "! negation")?,
        // Pattern operators
        R::template(
            "notlike",
            r"(?i)(\S+)\s+-[ci]?notlike\s+(\S+)",
            "not fnmatch.fnmatch(${1}, ${2})",
            "-notlike wildcard",
        )?,
        R::template(
            "like",
            r"(?i)(\S+)\s+-[ci]?like\s+(\S+)",
            "fnmatch.fnmatch(${1}, ${2})",
            "-like wildcard",
        )?,
        R::template(
            "notmatch",
            r"(?i)(\S+)\s+-[ci]?notmatch\s+(\S+)",
            "not re.search(${2}, ${1})",
            "-notmatch regex",
        )?,
        R::template(
            "match",
            r"(?i)(\S+)\s+-[ci]?match\s+(\S+)",
            "re.search(${2}, ${1})",
            "-match regex",
        )?,
        R::template(
            "replace_pair",
            r"(?i)(\S+)\s+-[ci]?replace\s+(\S+?)\s*,\s*(\S+)",
            "re.sub(${2}, ${3}, ${1})",
            "-replace with replacement",
        )?,
        R::template(
            "replace_single",
            r"(?i)(\S+)\s+-[ci]?replace\s+(\S+)",
            r#"re.sub(${2}, "", ${1})"#,
            "-replace removal",
        )?,
        R::template(
            "notcontains",
            r"(?i)(\S+)\s+-[ci]?notcontains\s+(\S+)",
            "${2} not in ${1}",
            "-notcontains",
        )?,
        R::template(
            "contains",
            r"(?i)(\S+)\s+-[ci]?contains\s+(\S+)",
            "${2} in ${1}",
            "-contains",
        )?,
        R::template("notin", r"(?i)\s-notin\b", " not in", "-notin")?,
        R::template("in", r"(?i)\s-in\b", " in", "-in")?,
        R::template(
            "split",
            r"(?i)(\S+)\s+-[ci]?split\s+(\S+)",
            "re.split(${2}, ${1})",
            "-split",
        )?,
        R::template(
            "join",
            r"(?i)(\S+)\s+-join\s+(\S+)",
            "${2}.join(${1})",
            "-join",
        )?,
        // Increment and decrement
        R::template("increment", r"(\$\w+)\+\+", "${1} += 1", "++")?,
        R::template("decrement", r"(\$\w+)--", "${1} -= 1", "--")?,
        // Well-known .NET static members
        R::callback(
            "math",
            r"(?i)\[(?:System\.)?math\]::(\w+)",
            math_member,
            "[math]:: members",
        )?,
        R::template(
            "is_null_or_empty",
            r"(?i)\[string\]::IsNullOr(?:Empty|WhiteSpace)\(",
            "not (",
            "[string]::IsNullOrEmpty",
        )?,
        R::template(
            "string_join",
            r"(?i)\[string\]::Join\(",
            "str.join(",
            "[string]::Join",
        )?,
        R::template(
            "file_exists",
            r"(?i)\[(?:System\.)?IO\.File\]::Exists\(",
            "os.path.isfile(",
            "[IO.File]::Exists",
        )?,
        R::callback(
            "file_contents",
            r"(?i)\[(?:System\.)?IO\.File\]::(ReadAllText|ReadAllLines|WriteAllText)\(((?:[^()]|\([^()]*\))*)\)",
            file_member,
            "[IO.File]::ReadAllText / ReadAllLines / WriteAllText",
        )?,
        R::template(
            "directory_exists",
            r"(?i)\[(?:System\.)?IO\.Directory\]::Exists\(",
            "os.path.isdir(",
            "[IO.Directory]::Exists",
        )?,
        R::template(
            "path_combine",
            r"(?i)\[(?:System\.)?IO\.Path\]::Combine\(",
            "os.path.join(",
            "[IO.Path]::Combine",
        )?,
        R::template(
            "path_file_name",
            r"(?i)\[(?:System\.)?IO\.Path\]::GetFileName\(",
            "os.path.basename(",
            "[IO.Path]::GetFileName",
        )?,
        R::template(
            "utc_now",
            r"(?i)\[(?:System\.)?DateTime\]::UtcNow",
            "datetime.now(timezone.utc)",
            "[DateTime]::UtcNow",
        )?,
        R::template(
            "now",
            r"(?i)\[(?:System\.)?DateTime\]::Now",
            "datetime.now()",
            "[DateTime]::Now",
        )?,
        R::template(
            "newline",
            r"(?i)\[(?:System\.)?Environment\]::NewLine",
            "os.linesep",
            "[Environment]::NewLine",
        )?,
        R::template(
            "new_guid",
            r"(?i)\[(?:System\.)?guid\]::NewGuid\(\)",
            "uuid.uuid4()",
            "[guid]::NewGuid",
        )?,
        R::template(
            "dotnet_static",
            r"\[([A-Za-z][\w.]*)\]::(\w+)",
            format!("{}.dotnet(\"${{1}}\").${{2}}", bridge_handle),
            ".NET static members through the bridge",
        )?
        .at_level(ConversionLevel::Hybrid),
        // Host-only automatic variables
        R::template(
            "host_variables",
            r"\$(Host|PSVersionTable|ExecutionContext|MyInvocation|PSCmdlet)\b",
            format!("{}.variable(\"${{1}}\")", bridge_handle),
            "host automatic variables through the bridge",
        )?
        .at_level(ConversionLevel::Bridge),
        // Variables
        R::template("pipeline_item", r"\$(?:_|PSItem)\b", "item", "$_ and $PSItem")?,
        R::template(
            "scope_prefix",
            r"(?i)\$(?:script|global|local|private|using):(\w+)",
            "$$${1}",
            "scope-qualified variables",
        )?,
        R::callback(
            "braced_variable",
            r"\$\{([^}]+)\}",
            braced_variable,
            "${name} variables",
        )?,
        R::callback(
            SIGIL_RULE,
            r#"'(?:[^'\\]|\\.|'')*'|"(?:[^"\\`]|\\.|`.)*"|\$([A-Za-z_]\w*)"#,
            strip_sigil,
            "strip variable sigils outside literal strings",
        )?
        .anywhere(),
        // Members that expect bare identifiers
        R::template(
            "count",
            r"(\w+(?:\.\w+)*(?:\[[^\]]*\])?)\.(?:Count|Length)\b",
            "len(${1})",
            ".Count and .Length",
        )?,
        R::template(
            "to_string",
            r"(\w+(?:\.\w+)*)\.ToString\(\)",
            "str(${1})",
            ".ToString()",
        )?,
        R::template("to_upper", r"\.ToUpper(?:Invariant)?\(\)", ".upper()", ".ToUpper()")?,
        R::template("to_lower", r"\.ToLower(?:Invariant)?\(\)", ".lower()", ".ToLower()")?,
        R::template("trim_start", r"\.TrimStart\(", ".lstrip(", ".TrimStart()")?,
        R::template("trim_end", r"\.TrimEnd\(", ".rstrip(", ".TrimEnd()")?,
        R::template("trim", r"\.Trim\(", ".strip(", ".Trim()")?,
        R::template("starts_with", r"\.StartsWith\(", ".startswith(", ".StartsWith()")?,
        R::template("ends_with", r"\.EndsWith\(", ".endswith(", ".EndsWith()")?,
        R::template("contains_method", r"\.Contains\(", ".__contains__(", ".Contains()")?,
        R::template("replace_method", r"\.Replace\(", ".replace(", ".Replace()")?,
        R::template("split_method", r"\.Split\(", ".split(", ".Split()")?,
        R::template("index_of", r"\.IndexOf\(", ".find(", ".IndexOf()")?,
        R::template("list_add", r"\.Add\(", ".append(", ".Add() on lists")?,
        R::template("keys", r"\.Keys\b", ".keys()", ".Keys")?,
        R::template("values", r"\.Values\b", ".values()", ".Values")?,
        R::callback(
            "substring",
            r"\.Substring\(([^(),]+)(?:,\s*([^()]+))?\)",
            substring,
            ".Substring() to slicing",
        )?,
        // Statements
        R::callback("throw", r"(?is)^throw\b\s*(.*)$", throw_statement, "throw")?,
        R::callback("exit", r"(?is)^exit\b\s*(.*)$", exit_statement, "exit")?,
        // Hashtables
        R::template(
            "typed_hashtable",
            r"(?i)\[(?:ordered|pscustomobject|hashtable)\]\s*@\{",
            "@{",
            "[ordered] and [pscustomobject] hashtables",
        )?,
        R::callback(
            "hashtable",
            r"@\{((?:[^{}]|\{[^{}]*\})*)\}",
            hashtable,
            "hashtable literal to dict",
        )?,
    ];
    Ok(rules)
}

// ============================================================================
// Strings
// ============================================================================

fn convert_string_literal(caps: &Captures<'_>) -> String {
    let lit = &caps[0];
    if lit.starts_with("'''") {
        return lit.to_string();
    }
    if let Some(body) = lit
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
    {
        let interpolated = has_interpolation(body);
        let converted = convert_body(body, interpolated, true);
        let prefix = if interpolated { "f" } else { "" };
        return format!("{}\"\"\"{}\"\"\"", prefix, converted);
    }
    if lit.len() < 2 {
        return lit.to_string();
    }
    let body = &lit[1..lit.len() - 1];
    if lit.starts_with('\'') {
        let body = body.replace('\\', "\\\\").replace("''", "\\'");
        return format!("'{}'", body);
    }
    let interpolated = has_interpolation(body);
    let converted = convert_body(body, interpolated, false);
    if interpolated {
        format!("f\"{}\"", converted)
    } else {
        format!("\"{}\"", converted)
    }
}

/// Whether an expandable string body references a variable or subexpression
fn has_interpolation(body: &str) -> bool {
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '`' => i += 2,
            '$' => {
                if matches!(chars.get(i + 1), Some(c) if *c == '(' || *c == '{' || *c == '_' || c.is_ascii_alphabetic())
                {
                    return true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    false
}

fn convert_body(body: &str, fstring: bool, here: bool) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '`' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                if fstring && (next == '{' || next == '}') {
                    out.push(next);
                    out.push(next);
                } else {
                    out.push_str(&backtick_escape(next));
                }
                i += 2;
            }
            '"' if !here && chars.get(i + 1) == Some(&'"') => {
                out.push_str("\\\"");
                i += 2;
            }
            '"' if !here => {
                out.push_str("\\\"");
                i += 1;
            }
            '\\' => {
                out.push_str("\\\\");
                i += 1;
            }
            '{' | '}' if fstring => {
                out.push(c);
                out.push(c);
                i += 1;
            }
            '$' if fstring => match interpolation_at(&chars, i) {
                Some((expr, next)) => {
                    out.push('{');
                    out.push_str(&expr);
                    out.push('}');
                    i = next;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn backtick_escape(c: char) -> String {
    match c {
        'n' => "\\n".to_string(),
        't' => "\\t".to_string(),
        'r' => "\\r".to_string(),
        '0' => "\\0".to_string(),
        'a' => "\\a".to_string(),
        'b' => "\\b".to_string(),
        'e' => "\\x1b".to_string(),
        '"' => "\\\"".to_string(),
        other => other.to_string(),
    }
}

/// Expression for the interpolation starting at `chars[start] == '$'`,
/// plus the index just past it
fn interpolation_at(chars: &[char], start: usize) -> Option<(String, usize)> {
    let next = *chars.get(start + 1)?;
    if next == '(' {
        let close = matching_paren(chars, start + 1)?;
        let inner: String = chars[start + 2..close].iter().collect();
        return Some((inline_expression(&inner), close + 1));
    }
    if next == '{' {
        let close = (start + 2..chars.len()).find(|&j| chars[j] == '}')?;
        let name: String = chars[start + 2..close].iter().collect();
        return Some((sanitize_identifier(&name), close + 1));
    }
    if !(next == '_' || next.is_ascii_alphabetic()) {
        return None;
    }

    let mut end = start + 1;
    while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    let ident: String = chars[start + 1..end].iter().collect();

    let scoped = chars.get(end) == Some(&':')
        && chars
            .get(end + 1)
            .is_some_and(|c| c.is_ascii_alphabetic() || *c == '_');
    if scoped {
        let mut name_end = end + 1;
        while name_end < chars.len()
            && (chars[name_end].is_ascii_alphanumeric() || chars[name_end] == '_')
        {
            name_end += 1;
        }
        let name: String = chars[end + 1..name_end].iter().collect();
        match ident.to_ascii_lowercase().as_str() {
            "env" => return Some((format!("os.environ.get('{}')", name), name_end)),
            "script" | "global" | "local" | "private" | "using" => {
                return Some((automatic_variable(&name), name_end))
            }
            _ => {}
        }
    }
    Some((automatic_variable(&ident), end))
}

fn automatic_variable(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "_" | "psitem" => "item".to_string(),
        "true" => "True".to_string(),
        "false" => "False".to_string(),
        "null" => "None".to_string(),
        _ => name.to_string(),
    }
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (j, &c) in chars.iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
    }
    None
}

/// Light conversion of a `$( ... )` body embedded in an f-string
fn inline_expression(expr: &str) -> String {
    let chars: Vec<char> = expr.trim().chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '"' => {
                out.push('\'');
                i += 1;
            }
            '$' => match interpolation_at(&chars, i) {
                Some((inner, next)) => {
                    out.push_str(&inner);
                    i = next;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn sanitize_identifier(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", cleaned)
    } else {
        cleaned
    }
}

fn format_operator(caps: &Captures<'_>) -> String {
    let literal = &caps[1];
    let rest = &caps[2];
    let end = syntax::expression_end(rest);
    format!(
        "{}.format({}){}",
        literal,
        rest[..end].trim_end(),
        &rest[end..]
    )
}

// ============================================================================
// Operators and members
// ============================================================================

fn range_operator(caps: &Captures<'_>) -> String {
    let (start, end) = (&caps[1], &caps[2]);
    match (start.parse::<i64>(), end.parse::<i64>()) {
        (Ok(a), Ok(b)) if a <= b => format!("range({}, {})", a, b + 1),
        (Ok(a), Ok(b)) => format!("range({}, {}, -1)", a, b - 1),
        _ => format!("range({}, {} + 1)", start, end),
    }
}

fn math_member(caps: &Captures<'_>) -> String {
    match caps[1].to_ascii_lowercase().as_str() {
        "round" => "round".to_string(),
        "abs" => "abs".to_string(),
        "max" => "max".to_string(),
        "min" => "min".to_string(),
        "ceiling" => "math.ceil".to_string(),
        "truncate" => "math.trunc".to_string(),
        "pi" => "math.pi".to_string(),
        "e" => "math.e".to_string(),
        other => format!("math.{}", other),
    }
}

/// Whole-file reads and writes as `pathlib` calls
fn file_member(caps: &Captures<'_>) -> String {
    let args = syntax::split_top_level(&caps[2], b',');
    let path = args.first().map_or("", |a| a.trim());
    match caps[1].to_ascii_lowercase().as_str() {
        "readalltext" => format!("Path({}).read_text()", path),
        "readalllines" => format!("Path({}).read_text().splitlines()", path),
        _ => {
            let content = args.get(1).map_or("", |a| a.trim());
            format!("Path({}).write_text({})", path, content)
        }
    }
}

fn braced_variable(caps: &Captures<'_>) -> String {
    sanitize_identifier(&caps[1])
}

fn strip_sigil(caps: &Captures<'_>) -> String {
    if let Some(name) = caps.get(1) {
        return name.as_str().to_string();
    }
    let literal = &caps[0];
    if literal.starts_with('\'') {
        return literal.to_string();
    }
    // Double-quoted literal: drop sigils in front of identifiers
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') {
            continue;
        }
        out.push(c);
    }
    out
}

fn substring(caps: &Captures<'_>) -> String {
    let start = caps[1].trim();
    match caps.get(2) {
        Some(len) => format!("[{}:{} + {}]", start, start, len.as_str().trim()),
        None => format!("[{}:]", start),
    }
}

fn throw_statement(caps: &Captures<'_>) -> String {
    let arg = caps[1].trim();
    if arg.is_empty() {
        "raise".to_string()
    } else {
        format!("raise Exception({})", arg)
    }
}

fn exit_statement(caps: &Captures<'_>) -> String {
    format!("sys.exit({})", caps[1].trim())
}

// ============================================================================
// Hashtables
// ============================================================================

fn hashtable(caps: &Captures<'_>) -> String {
    hashtable_to_dict(&caps[1])
}

fn hashtable_to_dict(body: &str) -> String {
    let mut entries = Vec::new();
    for line in syntax::split_top_level(body, b'\n') {
        for entry in syntax::split_top_level(line, b';') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match split_assignment(entry) {
                Some((key, value)) => entries.push(format!("{}: {}", dict_key(key), dict_value(value))),
                None => entries.push(entry.to_string()),
            }
        }
    }
    format!("{{{}}}", entries.join(", "))
}

fn dict_key(key: &str) -> String {
    let bare = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        format!("\"{}\"", key)
    } else {
        key.to_string()
    }
}

fn dict_value(value: &str) -> String {
    match value.strip_prefix("@{").and_then(|v| v.strip_suffix('}')) {
        Some(inner) => hashtable_to_dict(inner),
        None => value.to_string(),
    }
}

/// Split `key = value` at the first top-level assignment sign
fn split_assignment(entry: &str) -> Option<(&str, &str)> {
    let bytes = entry.as_bytes();
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
            b'=' if depth == 0 => {
                let prev = if i > 0 { bytes[i - 1] } else { b' ' };
                let next = bytes.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    return Some((entry[..i].trim(), entry[i + 1..].trim()));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
