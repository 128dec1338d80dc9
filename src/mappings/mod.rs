//! Static lookup tables shared by the analyzer and the converter.
//!
//! Tables are built once and handed around by reference; nothing in here
//! is mutated after construction.

pub mod cmdlets;
pub mod types;

pub use cmdlets::{CmdletArgs, CmdletMapper, CmdletMapping};
pub use types::TypeMapper;

/// Both tables, constructed together
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    pub types: TypeMapper,
    pub cmdlets: CmdletMapper,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }
}
