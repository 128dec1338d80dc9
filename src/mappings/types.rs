//! PowerShell type accelerator → Python annotation mapping

use std::collections::HashMap;

/// Annotation used for any type the table does not know
pub const FALLBACK_TYPE: &str = "Any";

/// Static table of type names, keyed case-insensitively with any `System.`
/// prefix removed
#[derive(Debug, Clone)]
pub struct TypeMapper {
    types: HashMap<String, &'static str>,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMapper {
    pub fn new() -> Self {
        let mut types = HashMap::new();

        for (source, target) in [
            ("string", "str"),
            ("char", "str"),
            ("guid", "str"),
            ("securestring", "str"),
            ("int", "int"),
            ("int16", "int"),
            ("int32", "int"),
            ("int64", "int"),
            ("long", "int"),
            ("byte", "int"),
            ("uint32", "int"),
            ("uint64", "int"),
            ("double", "float"),
            ("float", "float"),
            ("single", "float"),
            ("decimal", "float"),
            ("bool", "bool"),
            ("boolean", "bool"),
            ("switch", "bool"),
            ("array", "list"),
            ("object[]", "list"),
            ("string[]", "list[str]"),
            ("int[]", "list[int]"),
            ("hashtable", "dict"),
            ("ordered", "dict"),
            ("pscustomobject", "dict"),
            ("collections.hashtable", "dict"),
            ("collections.arraylist", "list"),
            ("datetime", "datetime"),
            ("timespan", "timedelta"),
            ("scriptblock", "Callable"),
            ("object", "object"),
            ("psobject", "object"),
            ("void", "None"),
        ] {
            types.insert(source.to_string(), target);
        }

        Self { types }
    }

    fn key(name: &str) -> String {
        let name = name.trim();
        // One outer `[...]` pair; an array suffix keeps its brackets
        let name = name
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(name);
        let lower = name.to_ascii_lowercase();
        lower
            .strip_prefix("system.")
            .map(str::to_string)
            .unwrap_or(lower)
    }

    /// Python annotation for a PowerShell type name, `Any` when unknown
    pub fn map_type(&self, name: &str) -> &'static str {
        self.types
            .get(&Self::key(name))
            .copied()
            .unwrap_or(FALLBACK_TYPE)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.types.contains_key(&Self::key(name))
    }

    /// Import a generated annotation depends on, if any
    pub fn required_import(target: &str) -> Option<&'static str> {
        match target {
            "Any" => Some("from typing import Any"),
            "Callable" => Some("from typing import Callable"),
            "datetime" => Some("from datetime import datetime"),
            "timedelta" => Some("from datetime import timedelta"),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
