//! Snippet extraction: one left-to-right sweep over a file's bytes.
//!
//! Each snippet is the line holding a match, tagged with its 1-based line
//! number. The cursor jumps to the end of the emitted line, so at most one
//! snippet is produced per physical line and the sweep is linear in the
//! file size.

use crate::services::pattern::CompiledMatcher;
use crate::types::Snippet;
use memchr::{memchr_iter, memrchr};

/// Snippets kept per file before extraction stops.
pub const MAX_SNIPPETS_PER_FILE: usize = 5;

/// Extracts up to `max_snippets` line snippets from `content`, in match order.
///
/// Non-UTF-8 bytes are replaced with U+FFFD in the snippet text.
#[must_use]
pub fn extract_snippets(
    content: &[u8],
    matcher: &CompiledMatcher,
    max_snippets: usize,
) -> Vec<Snippet> {
    let mut snippets = Vec::new();
    let mut chunk_start = 0;
    let mut line_no: usize = 1;

    while chunk_start < content.len() && snippets.len() < max_snippets {
        let Some(match_end) = matcher.match_end(content, chunk_start) else {
            break;
        };

        let line_start = memrchr(b'\n', &content[chunk_start..match_end])
            .map_or(chunk_start, |i| chunk_start + i + 1);
        let line_end = match_end.min(content.len());

        line_no += memchr_iter(b'\n', &content[chunk_start..line_start]).count();

        snippets.push(Snippet {
            content: String::from_utf8_lossy(&content[line_start..line_end]).into_owned(),
            line_number: i32::try_from(line_no).unwrap_or(i32::MAX),
        });

        chunk_start = line_end;
    }

    snippets
}
