//! Rendering, import inference and the generated-file header.

use super::types::{ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::syntax;
use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Usage patterns in generated code and the import each one needs
const USAGE_IMPORTS: &[(&str, &str)] = &[
    (r"\bos\.", "import os"),
    (r"\bsys\.", "import sys"),
    (
        r"\bre\.(?:search|match|fullmatch|sub|split|findall|compile|escape)\(",
        "import re",
    ),
    (r"\bfnmatch\.", "import fnmatch"),
    (r"\bjson\.", "import json"),
    (r"\bshutil\.", "import shutil"),
    (r"\bmath\.", "import math"),
    (r"\buuid\.", "import uuid"),
    (r"\bsubprocess\.", "import subprocess"),
    (r"\blogging\.", "import logging"),
    (r"\btime\.sleep\(", "import time"),
    (
        r"\bdatetime\.(?:now|utcnow|fromisoformat|strptime|fromtimestamp)\(",
        "from datetime import datetime",
    ),
    (r"\btimezone\.utc\b", "from datetime import timezone"),
    (r"\bPath\(", "from pathlib import Path"),
];

static USAGE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    USAGE_IMPORTS
        .iter()
        .filter_map(|(pattern, import)| Regex::new(pattern).ok().map(|re| (re, *import)))
        .collect()
});

/// Final pass: renders the tree, then prepends the header comment and the
/// sorted import block
#[derive(Debug, Default)]
pub struct ImportPass;

impl ImportPass {
    pub fn new() -> Self {
        Self
    }
}

impl ConversionPass for ImportPass {
    fn name(&self) -> &str {
        "imports"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let text = unit.text_mut();
        for import in infer_imports(text, &ctx.options.bridge_handle) {
            if import == BRIDGE_MARKER {
                let bridge = ctx.options.bridge_import.clone();
                ctx.add_import(bridge);
            } else {
                ctx.add_import(import);
            }
        }

        let mut out = String::new();
        if ctx.options.header {
            out.push_str(&format!(
                "# Converted from {} by psmigrate (level: {})\n\n",
                ctx.source_name,
                ctx.level()
            ));
        }
        if !ctx.imports.is_empty() {
            for import in &ctx.imports {
                out.push_str(import);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(text);
        *text = out;
        Ok(())
    }
}

/// Stands in for the configured bridge import
const BRIDGE_MARKER: &str = "<bridge>";

/// Imports implied by what the text uses. Comments are ignored; string
/// literals are not, since f-string fields hold code.
fn infer_imports(text: &str, bridge_handle: &str) -> Vec<&'static str> {
    let ranges: Vec<(usize, usize)> = syntax::string_ranges(text)
        .into_iter()
        .filter(|&(start, _)| text.as_bytes()[start] == b'#')
        .collect();
    let used = |re: &Regex| re.find_iter(text).any(|m| !syntax::in_ranges(&ranges, m.start()));

    let mut imports: Vec<&'static str> = USAGE
        .iter()
        .filter(|(re, _)| used(re))
        .map(|(_, import)| *import)
        .collect();

    let bridge = Regex::new(&format!(r"\b{}\.", regex_lite::escape(bridge_handle))).ok();
    if bridge.as_ref().is_some_and(|re| used(re)) {
        imports.push(BRIDGE_MARKER);
    }
    imports
}
