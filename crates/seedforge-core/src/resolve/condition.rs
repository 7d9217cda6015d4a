//! Conditional FK predicate: a single equality between a child column and a
//! string literal. The grammar is intentionally minimal and parsed strictly;
//! any other shape is rejected at configuration load.

use indexmap::IndexMap;

use crate::generate::value::Value;
use crate::patterns::FK_CONDITION;

/// Parsed `<column> = '<literal>'` predicate of a conditional FK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FkPredicate {
    pub column: String,
    pub literal: String,
}

impl FkPredicate {
    /// Parse strictly. Whitespace around `=` is ignored; doubled quotes in
    /// the literal are unescaped. Returns `None` for any other shape.
    pub fn parse(input: &str) -> Option<Self> {
        let caps = FK_CONDITION.captures(input)?;
        Some(Self {
            column: caps[1].to_string(),
            literal: caps[2].replace("''", "'"),
        })
    }

    /// Render back to the configuration syntax.
    pub fn render(&self) -> String {
        format!("{} = '{}'", self.column, self.literal.replace('\'', "''"))
    }

    /// Evaluate against a partially filled row. A missing discriminator
    /// column or a non-string value makes the predicate false.
    pub fn matches(&self, row: &IndexMap<String, Value>) -> bool {
        match row.get(&self.column) {
            Some(Value::Str(s)) => s == &self.literal,
            Some(Value::SetLiteral(s)) => s == &self.literal,
            _ => false,
        }
    }
}
