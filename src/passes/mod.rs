//! Ordered conversion passes.
//!
//! The converter runs these over one [`SourceUnit`] in a fixed order:
//! 1. Functions - `function` blocks become `def` headers with typed parameters
//! 2. Parameters - script-level `param(...)` blocks become assignments
//! 3. Control flow - `if`/`foreach`/`switch`/`try` headers in target form
//! 4. Lexical - the ordered rule table over every statement and header
//! 5. Cmdlets - builtin commands become idioms or bridge calls
//! 6. Casts - `[T]x` casts and typed assignments
//! 7. Pipelines - two-stage pipelines become comprehensions
//! 8. Imports - render to text and prepend the header and import block
//!
//! Passes 1-7 rewrite the block tree; the imports pass renders it. Any tree
//! pass run after rendering fails with a pass-order error.

mod casts;
mod cmdlets;
mod control_flow;
mod functions;
mod imports;
mod lexical;
mod pipes;
#[cfg(test)]
mod tests;
mod types;

pub use types::{
    visit_code, CodeKind, ConversionContext, ConversionOptions, ConversionPass, LocalFunction,
    SourceUnit,
};

pub use casts::CastPass;
pub use cmdlets::CmdletPass;
pub use control_flow::ControlFlowPass;
pub use functions::{FunctionPass, ParamBlockPass};
pub use imports::ImportPass;
pub use lexical::LexicalPass;
pub use pipes::PipelinePass;
