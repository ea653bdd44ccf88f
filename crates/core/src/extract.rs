//! Extraction of structured analyses from free-text model replies.
//!
//! Model replies follow the layout requested by the prompt template only loosely, so extraction
//! is tolerant rather than strict: the reply is split on the format's section marker, the habit
//! section is cut into blocks, and each block is scanned line by line for a name, a
//! `Description:` line, numbered implementation steps and a `Basis:` line. Anything that cannot
//! be located is replaced by placeholder text. [`ResponseExtractor::extract`] never fails.
//!
//! Reply layout for [`ResponseFormat::V1`]:
//! ```text
//! GENERAL:
//! <analysis>
//!
//! Habits:
//! 1. **<name>**
//!    - **Description:** <text>
//!    - **Implementation:** 1. <step>
//!    2. <step>
//!    - **Scientific Basis:** <text>
//!
//! 2. **<name>**
//!    ...
//! ```
//!
//! [`ResponseFormat::V2`] replaces the `Habits:` header with one `### Habit N: <name>` heading per
//! habit; blank lines inside a habit are then allowed.

use crate::constants::{DEFAULT_MIN_HABIT_BLOCK_LINES, GENERAL_LABEL};
use crate::format::ResponseFormat;
use crate::model::{default_steps, FormattedAnalysis, Habit};
use std::panic::{catch_unwind, AssertUnwindSafe};

const DESCRIPTION_LABEL: &str = "Description:";
const IMPLEMENTATION_LABEL: &str = "Implementation:";
const BASIS_LABEL: &str = "Basis:";

/// Turns raw model replies into [`FormattedAnalysis`] records.
#[derive(Debug, Clone, Copy)]
pub struct ResponseExtractor {
    format: ResponseFormat,
    min_block_lines: usize,
}

impl Default for ResponseExtractor {
    fn default() -> Self {
        Self::new(ResponseFormat::default(), DEFAULT_MIN_HABIT_BLOCK_LINES)
    }
}

impl ResponseExtractor {
    /// Creates an extractor for `format`. Habit blocks with fewer than `min_block_lines`
    /// non-empty lines are discarded.
    pub fn new(format: ResponseFormat, min_block_lines: usize) -> Self {
        Self {
            format,
            min_block_lines,
        }
    }

    /// Extracts a structured analysis from `raw`.
    ///
    /// Always returns a record with at least one habit. If extraction itself panics, the raw
    /// text becomes the general analysis and a single placeholder habit is returned.
    pub fn extract(&self, raw: &str) -> FormattedAnalysis {
        match catch_unwind(AssertUnwindSafe(|| self.extract_sections(raw))) {
            Ok(analysis) => analysis,
            Err(_) => {
                tracing::error!("response extraction panicked; returning raw reply");
                degraded(raw)
            }
        }
    }

    fn extract_sections(&self, raw: &str) -> FormattedAnalysis {
        let marker = self.format.marker();
        let (head, tail) = match raw.find(marker) {
            Some(pos) => (&raw[..pos], Some(&raw[pos + marker.len()..])),
            None => (raw, None),
        };

        let general_analysis = general_text(head, tail.is_some());

        let mut habits = Vec::new();
        if let Some(tail) = tail {
            for block in self.blocks(tail) {
                let line_count = block.iter().filter(|l| !l.trim().is_empty()).count();
                if line_count < self.min_block_lines {
                    tracing::warn!(
                        "Incomplete habit section found ({} of {} lines), skipping.",
                        line_count,
                        self.min_block_lines
                    );
                    continue;
                }
                habits.push(habit_from_block(&block));
            }
        }

        if habits.is_empty() {
            habits = Habit::fallback_set();
        }

        FormattedAnalysis {
            general_analysis,
            recommended_habits: habits,
        }
    }

    /// Cuts the habit section into blocks of lines.
    fn blocks<'a>(&self, section: &'a str) -> Vec<Vec<&'a str>> {
        let section = section.trim_start_matches(['*', '_']);

        if self.format.marker_delimits_blocks() {
            return section
                .split(self.format.marker())
                .map(|chunk| chunk.lines().filter(|l| !l.trim().is_empty()).collect())
                .collect();
        }

        let mut blocks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in section.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            blocks.push(current);
        }
        blocks
    }
}

/// Text before the habit section, with a leading `GENERAL:` label removed.
fn general_text(head: &str, had_marker: bool) -> String {
    let mut text = head.trim();
    if had_marker {
        // Decoration belonging to the marker itself, e.g. `**Habits:**` or `## Habits:`.
        text = text.trim_end_matches(['*', '_', '#']).trim_end();
    }

    let undecorated = text.trim_start_matches(['#', '*', '_', ' ']);
    match undecorated.get(..GENERAL_LABEL.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(GENERAL_LABEL) => undecorated
            [GENERAL_LABEL.len()..]
            .trim_start_matches(['*', '_'])
            .trim()
            .to_string(),
        _ => text.to_string(),
    }
}

fn habit_from_block(lines: &[&str]) -> Habit {
    let plain: Vec<String> = lines.iter().map(|l| strip_emphasis(l)).collect();

    // The first line names the habit unless the name was omitted and a field comes first.
    let name_line = plain.first().filter(|l| !is_field_line(l));
    let body_start = usize::from(name_line.is_some());

    let name = name_line
        .map(|l| clean_name(l))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| crate::constants::DEFAULT_HABIT_NAME.to_string());

    let description = plain
        .iter()
        .find_map(|l| value_after(l, DESCRIPTION_LABEL))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| crate::constants::DEFAULT_HABIT_DESCRIPTION.to_string());

    let scientific_basis = plain
        .iter()
        .find_map(|l| value_after(l, BASIS_LABEL))
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| crate::constants::DEFAULT_HABIT_BASIS.to_string());

    Habit {
        name,
        description,
        implementation: implementation_steps(&plain[body_start..]),
        scientific_basis,
    }
}

/// Result used when extraction itself fails: the untouched reply plus one placeholder habit.
fn degraded(raw: &str) -> FormattedAnalysis {
    FormattedAnalysis {
        general_analysis: raw.to_string(),
        recommended_habits: vec![Habit::placeholder()],
    }
}

/// Collects numbered steps. Falls back to inline `Implementation:` text, then to placeholder
/// steps.
fn implementation_steps(lines: &[String]) -> Vec<String> {
    let mut numbered = Vec::new();
    let mut inline = None;

    for line in lines {
        let unbulleted = strip_bullet(line.trim());
        let candidate = match value_after(unbulleted, IMPLEMENTATION_LABEL) {
            Some(rest) => {
                if !rest.is_empty() && inline.is_none() {
                    inline = Some(rest.clone());
                }
                rest
            }
            None => unbulleted.to_string(),
        };

        if let Some(step) = numbered_step(&candidate) {
            numbered.push(step.to_string());
        }
    }

    if !numbered.is_empty() {
        numbered
    } else if let Some(inline) = inline {
        vec![inline]
    } else {
        default_steps()
    }
}

fn is_field_line(line: &str) -> bool {
    [DESCRIPTION_LABEL, IMPLEMENTATION_LABEL, BASIS_LABEL]
        .iter()
        .any(|label| contains_label(line, label))
}

fn contains_label(line: &str, label: &str) -> bool {
    line.contains(label)
}

/// Text following the first occurrence of `label`, trimmed. `None` if the label is absent.
fn value_after(line: &str, label: &str) -> Option<String> {
    line.find(label).map(|pos| {
        line[pos + label.len()..]
            .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
            .to_string()
    })
}

/// Removes bold markers so `**Description:** x` and `**Description**: x` read alike.
fn strip_emphasis(line: &str) -> String {
    line.replace("**", "").replace("__", "")
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches(['-', '*', '•', '+']).trim_start()
}

/// Returns the text after a leading `N.` or `N)` marker.
fn numbered_step(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > 3 {
        return None;
    }
    let rest = line[digits..].strip_prefix(['.', ')'])?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let step = rest.trim();
    (!step.is_empty()).then_some(step)
}

/// Strips heading hashes, emphasis, a leading enumeration and a `Habit N:` label.
fn clean_name(line: &str) -> String {
    let s = line
        .trim()
        .trim_start_matches('#')
        .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_');
    let s = strip_enumeration(s);
    let s = strip_habit_label(s);
    s.trim_start_matches([':', '-'])
        .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
        .to_string()
}

fn strip_enumeration(s: &str) -> &str {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return s;
    }
    match s[digits..].strip_prefix(['.', ')', ':']) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => s,
    }
}

fn strip_habit_label(s: &str) -> &str {
    const HABIT: &str = "habit";
    match s.get(..HABIT.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(HABIT) => {
            let rest = s[HABIT.len()..].trim_start();
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit()).trim_start();
            match rest.strip_prefix(':') {
                Some(name) => name.trim_start(),
                None => s,
            }
        }
        _ => s,
    }
}
