//! Pass types and trait definitions.

use crate::error::ConversionError;
use crate::syntax::{self, Node};
use crate::types::ConversionLevel;
use std::collections::{BTreeMap, BTreeSet};

/// The unit a conversion works on: a block tree until the final pass
/// renders it to text. Tree passes refuse to run on a rendered unit.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    tree: Option<Vec<Node>>,
    text: String,
}

impl SourceUnit {
    pub fn from_tree(nodes: Vec<Node>) -> Self {
        Self {
            tree: Some(nodes),
            text: String::new(),
        }
    }

    /// Parse source text into a tree unit
    pub fn parse(source: &str) -> Result<Self, ConversionError> {
        Ok(Self::from_tree(syntax::parse(source)?))
    }

    pub fn is_rendered(&self) -> bool {
        self.tree.is_none()
    }

    /// The block tree, for a pass named `pass`
    pub fn tree_mut(&mut self, pass: &str) -> Result<&mut Vec<Node>, ConversionError> {
        self.tree.as_mut().ok_or_else(|| ConversionError::PassOrder {
            pass: pass.to_string(),
        })
    }

    /// Rendered text; renders the tree on first use
    pub fn text_mut(&mut self) -> &mut String {
        if let Some(nodes) = self.tree.take() {
            self.text = syntax::render(&nodes);
        }
        &mut self.text
    }

    pub fn into_text(mut self) -> String {
        self.text_mut();
        self.text
    }
}

/// Where a piece of code sits in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Statement,
    Header,
}

/// Visit every statement text and block header, depth first
pub fn visit_code(nodes: &mut [Node], f: &mut dyn FnMut(&mut String, usize, CodeKind)) {
    for node in nodes.iter_mut() {
        match node {
            Node::Stmt(stmt) => f(&mut stmt.text, stmt.line, CodeKind::Statement),
            Node::Block(block) => {
                f(&mut block.header, block.line, CodeKind::Header);
                visit_code(&mut block.body, f);
            }
            Node::Comment(_) => {}
        }
    }
}

/// Translation policy handed to every pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub level: ConversionLevel,
    pub bridge_handle: String,
    pub bridge_import: String,
    pub header: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            level: ConversionLevel::Hybrid,
            bridge_handle: "bridge".to_string(),
            bridge_import: "from powershell_bridge import bridge".to_string(),
            header: true,
        }
    }
}

impl From<&crate::config::MigrationConfig> for ConversionOptions {
    fn from(config: &crate::config::MigrationConfig) -> Self {
        Self {
            level: config.conversion.level,
            bridge_handle: config.conversion.bridge_handle.clone(),
            bridge_import: config.conversion.bridge_import.clone(),
            header: config.output.header,
        }
    }
}

/// A function defined in the file being converted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFunction {
    /// Name as written in the definition
    pub declared: String,
    pub python: String,
}

/// State accumulated while converting one file
#[derive(Debug, Clone)]
pub struct ConversionContext {
    pub source_name: String,
    pub options: ConversionOptions,
    pub warnings: Vec<String>,
    pub imports: BTreeSet<String>,
    pub bridge_calls: Vec<String>,
    /// Functions defined in this file, keyed by lowercased source name
    pub functions: BTreeMap<String, LocalFunction>,
}

impl ConversionContext {
    pub fn new(source_name: &str, options: ConversionOptions) -> Self {
        Self {
            source_name: source_name.to_string(),
            options,
            warnings: Vec::new(),
            imports: BTreeSet::new(),
            bridge_calls: Vec::new(),
            functions: BTreeMap::new(),
        }
    }

    pub fn level(&self) -> ConversionLevel {
        self.options.level
    }

    pub fn warn(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}:{}: {}", self.source_name, line, message);
        self.warnings.push(format!("line {}: {}", line, message));
    }

    pub fn add_import(&mut self, import: impl Into<String>) {
        self.imports.insert(import.into());
    }

    /// Record a bridged builtin once, in first-use order
    pub fn record_bridge_call(&mut self, name: &str) {
        if !self.bridge_calls.iter().any(|n| n == name) {
            self.bridge_calls.push(name.to_string());
        }
        let import = self.options.bridge_import.clone();
        self.add_import(import);
    }

    pub fn define_function(&mut self, declared: &str, python: &str) {
        self.functions.insert(
            declared.to_ascii_lowercase(),
            LocalFunction {
                declared: declared.to_string(),
                python: python.to_string(),
            },
        );
    }

    /// Python name of a function defined in this file
    pub fn local_function(&self, name: &str) -> Option<&str> {
        self.functions
            .get(&name.to_ascii_lowercase())
            .map(|f| f.python.as_str())
    }

    /// Bare words only count as calls when spelled exactly as defined,
    /// since sigil-free variables share their namespace
    pub fn declares_exactly(&self, name: &str) -> bool {
        self.functions
            .get(&name.to_ascii_lowercase())
            .is_some_and(|f| f.declared == name)
    }
}

/// One step of the conversion pipeline
pub trait ConversionPass {
    /// Name of this pass
    fn name(&self) -> &str;

    /// Rewrite the unit in place
    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError>;
}
