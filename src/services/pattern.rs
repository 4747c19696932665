//! Pattern compiler: user search specification → executable matcher.
//!
//! The compiled form keeps both the byte regex used to verify matches in
//! file content and the parsed syntax tree used to derive the trigram
//! posting query. Both come from the same expression string so the index
//! pre-filter and the verifier always agree on what the pattern means.

use crate::error::PatternError;
use crate::types::Regexp;
use memchr::memchr;
use regex::bytes::{Regex, RegexBuilder};
use regex_syntax::hir::Hir;
use regex_syntax::ParserBuilder;

/// Default upper bound on the compiled program size (bytes).
pub const DEFAULT_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// Inline flag prepended to expressions searched case-insensitively.
const CASE_INSENSITIVE_FLAG: &str = "(?i)";

/// Executable form of a search pattern.
///
/// Immutable once built and `Send + Sync`, so a single matcher is shared by
/// every candidate file of a request.
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    expr: String,
    regex: Regex,
    syntax: Hir,
}

impl CompiledMatcher {
    /// The expression actually compiled (including any inline flags).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Parsed syntax tree, used to build the trigram posting query.
    #[must_use]
    pub fn syntax(&self) -> &Hir {
        &self.syntax
    }

    /// Returns true if the pattern matches anywhere in `haystack`.
    #[must_use]
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.regex.is_match(haystack)
    }

    /// Finds the leftmost non-empty match starting at or after `from` and
    /// reports the end of the line holding the match's end: the offset of
    /// the terminating `\n`, or `haystack.len()` on the last line.
    ///
    /// A match whose only newline is the one sitting at `from` belongs to a
    /// line the caller has already consumed and is skipped. Returns `None`
    /// when nothing matches in the remaining content.
    #[must_use]
    pub fn match_end(&self, haystack: &[u8], from: usize) -> Option<usize> {
        let mut at = from;
        while at <= haystack.len() {
            let m = self.regex.find_at(haystack, at)?;
            if m.is_empty() {
                at = m.end() + 1;
                continue;
            }

            // A trailing newline ends the matched line itself.
            let last = if haystack[m.end() - 1] == b'\n' {
                m.end() - 1
            } else {
                m.end()
            };
            let line_end = memchr(b'\n', &haystack[last..]).map_or(haystack.len(), |i| last + i);

            if line_end > from {
                return Some(line_end);
            }
            at = m.start() + 1;
        }
        None
    }
}

/// Compiles an expression with the default size limit.
///
/// # Errors
///
/// Returns `PatternError::Empty` for an empty expression and
/// `PatternError::Syntax` if the expression does not parse or compile.
pub fn compile(expr: &str, case_sensitive: bool) -> Result<CompiledMatcher, PatternError> {
    compile_with_limit(expr, case_sensitive, DEFAULT_SIZE_LIMIT)
}

/// Compiles an expression, bounding the compiled program to `size_limit` bytes.
///
/// Matching is line-oriented: `^` and `$` match at line boundaries and `.`
/// never crosses a newline.
///
/// # Errors
///
/// Same as [`compile`]; exceeding `size_limit` is reported as a syntax error.
pub fn compile_with_limit(
    expr: &str,
    case_sensitive: bool,
    size_limit: usize,
) -> Result<CompiledMatcher, PatternError> {
    if expr.is_empty() {
        return Err(PatternError::Empty);
    }

    let expr = if case_sensitive {
        expr.to_string()
    } else {
        format!("{CASE_INSENSITIVE_FLAG}{expr}")
    };

    let syntax = ParserBuilder::new()
        .multi_line(true)
        .utf8(false)
        .build()
        .parse(&expr)
        .map_err(|e| PatternError::Syntax(e.to_string()))?;

    let regex = RegexBuilder::new(&expr)
        .multi_line(true)
        .size_limit(size_limit)
        .build()
        .map_err(|e| PatternError::Syntax(e.to_string()))?;

    tracing::trace!(expr = %expr, "compiled search pattern");

    Ok(CompiledMatcher {
        expr,
        regex,
        syntax,
    })
}

impl Regexp {
    /// Compiles this search specification.
    ///
    /// # Errors
    ///
    /// See [`compile`].
    pub fn compile(&self) -> Result<CompiledMatcher, PatternError> {
        compile(&self.expr, self.case_sensitive)
    }
}
