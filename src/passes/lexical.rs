//! The rule table applied to every statement and block header.

use super::types::{visit_code, ConversionContext, ConversionPass, SourceUnit};
use crate::error::ConversionError;
use crate::rules::RuleEngine;
use std::sync::Arc;

pub struct LexicalPass {
    engine: Arc<RuleEngine>,
}

impl LexicalPass {
    pub fn new(engine: Arc<RuleEngine>) -> Self {
        Self { engine }
    }
}

impl ConversionPass for LexicalPass {
    fn name(&self) -> &str {
        "lexical"
    }

    fn apply(
        &self,
        unit: &mut SourceUnit,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let level = ctx.level();
        let tree = unit.tree_mut(self.name())?;
        visit_code(tree, &mut |text, _, _| {
            *text = self.engine.apply(text, level);
        });
        Ok(())
    }
}
