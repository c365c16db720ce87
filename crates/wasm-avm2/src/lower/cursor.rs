//! A one-token-lookahead wrapper over `wasmparser`'s operator reader.
//!
//! The expression lowerer needs to peek at the operator immediately
//! following a comparison to decide whether to fold it into a branch
//! (§4.1.2) before committing to either encoding, so a plain `read()` isn't
//! enough; this is the smallest thing that gets us `peek`.

use wasmparser::{OperatorsReader, Result as WpResult};

pub struct OpCursor<'a> {
    reader: OperatorsReader<'a>,
    lookahead: Option<wasmparser::Operator<'a>>,
}

impl<'a> OpCursor<'a> {
    #[must_use]
    pub fn new(reader: OperatorsReader<'a>) -> Self {
        Self {
            reader,
            lookahead: None,
        }
    }

    pub fn next(&mut self) -> WpResult<wasmparser::Operator<'a>> {
        if let Some(op) = self.lookahead.take() {
            return Ok(op);
        }
        self.reader.read()
    }

    pub fn peek(&mut self) -> WpResult<&wasmparser::Operator<'a>> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.reader.read()?);
        }
        Ok(self.lookahead.as_ref().expect("just filled"))
    }
}
