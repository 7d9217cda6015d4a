//! Pre-compiled regex patterns shared across the crate.

use regex::Regex;
use std::sync::LazyLock;

/// Column-name heuristic for age-like integer columns.
pub static AGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)age|years?").expect("valid regex"));

/// Quoted literal inside an enum(...) or set(...) column type. Doubled single
/// quotes inside the literal are part of the match and unescaped by callers.
pub static QUOTED_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^']|(?:''))*)'").expect("valid regex"));

/// Conditional FK predicate: `<column> = '<literal>'`, whitespace around `=`
/// ignored. Anything else is rejected.
pub static FK_CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*'((?:[^']|(?:''))*)'\s*$")
        .expect("valid regex")
});

/// User-variable reference passed through to SQL unquoted.
pub static USER_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[0-9A-Za-z_]+$").expect("valid regex"));

/// Integer placeholder in a `format` config string: `{}` or `{:08}` style.
pub static FORMAT_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?::0?(\d+))?\}").expect("valid regex"));

/// Extract enum/set literals from a raw column type like `enum('a','b''c')`.
pub fn extract_quoted_literals(column_type: &str) -> Vec<String> {
    QUOTED_LITERAL
        .captures_iter(column_type)
        .map(|c| c[1].replace("''", "'"))
        .collect()
}
