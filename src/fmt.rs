//! Human-friendly CLI output formatters.
//!
//! When `color` is true, ANSI escape codes are emitted via `owo_colors`.

use crate::services::{IndexProgress, IndexStats};
use crate::types::CodeSearchReply;
use owo_colors::OwoColorize;
use std::io::{self, Write};

// ── search ──────────────────────────────────────────────────────────────────

pub fn fmt_search(w: &mut impl Write, reply: &CodeSearchReply, color: bool) -> io::Result<()> {
    for (i, file) in reply.matches.iter().enumerate() {
        if i > 0 {
            writeln!(w)?;
        }
        if color {
            writeln!(w, "{}", file.filename.bold())?;
        } else {
            writeln!(w, "{}", file.filename)?;
        }

        for s in &file.snippet {
            if color {
                writeln!(w, "  {}{}", format_args!("{:>5}│ ", s.line_number).green(), s.content)?;
            } else {
                writeln!(w, "  {:>5}│ {}", s.line_number, s.content)?;
            }
        }
    }

    if reply.is_empty() {
        if color {
            writeln!(w, "{}", "no matches".dimmed())?;
        } else {
            writeln!(w, "no matches")?;
        }
    }

    Ok(())
}

// ── index ───────────────────────────────────────────────────────────────────

pub fn fmt_index(w: &mut impl Write, out: &IndexProgress) -> io::Result<()> {
    writeln!(
        w,
        "Indexed {} files ({} unchanged, {} deleted, {} skipped)",
        out.files_indexed, out.files_unchanged, out.files_deleted, out.files_skipped
    )
}

// ── stats ───────────────────────────────────────────────────────────────────

pub fn fmt_stats(w: &mut impl Write, out: &IndexStats, color: bool) -> io::Result<()> {
    if color {
        writeln!(w, "{:<16} {}", "Files:".bold(), out.file_count)?;
        writeln!(w, "{:<16} {}", "Trigrams:".bold(), out.trigram_count)?;
    } else {
        writeln!(w, "{:<16} {}", "Files:", out.file_count)?;
        writeln!(w, "{:<16} {}", "Trigrams:", out.trigram_count)?;
    }
    Ok(())
}
