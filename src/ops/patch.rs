//! Unified-diff hunks used as a Modify payload.
//!
//! Only the hunk bodies matter here: file headers (`---`/`+++`, `diff`,
//! `index`) are skipped because the target path comes from the operation.
//! Each hunk is located at the line its header states, or at the nearest
//! offset where its context and removed lines match exactly. The patched
//! text keeps the line terminator of the original.

use crate::error::{EditError, Result};
use regex::Regex;
use std::sync::LazyLock;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk header regex")
});

/// A line within a hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Add(String),
    Remove(String),
}

impl HunkLine {
    /// The line as it must appear in the current content, if any.
    fn match_content(&self) -> Option<&str> {
        match self {
            Self::Context(s) | Self::Remove(s) => Some(s),
            Self::Add(_) => None,
        }
    }

    /// The line as it will appear in the new content, if any.
    fn result_content(&self) -> Option<&str> {
        match self {
            Self::Context(s) | Self::Add(s) => Some(s),
            Self::Remove(_) => None,
        }
    }
}

/// A contiguous block of changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Starting line in the original content (1-indexed).
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    fn match_lines(&self) -> Vec<&str> {
        self.lines.iter().filter_map(HunkLine::match_content).collect()
    }

    fn result_lines(&self) -> Vec<&str> {
        self.lines.iter().filter_map(HunkLine::result_content).collect()
    }

    /// Checks the line counts against the header.
    fn validate(&self) -> bool {
        let old = self.lines.iter().filter(|l| l.match_content().is_some()).count();
        let new = self.lines.iter().filter(|l| l.result_content().is_some()).count();
        old == self.old_count && new == self.new_count
    }

    /// Zero-based line index the hunk expects to start at.
    fn expected_index(&self) -> usize {
        if self.old_count == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

/// A parsed set of hunks for a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    hunks: Vec<Hunk>,
}

impl PatchSet {
    /// Parses unified-diff text.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::InvalidPatch`] if the text holds no hunk, a line
    /// inside a hunk has an unknown prefix, or a hunk's line counts disagree
    /// with its header.
    pub fn parse(text: &str) -> Result<Self> {
        let mut hunks: Vec<Hunk> = Vec::new();
        let mut current: Option<Hunk> = None;

        for (line_no, line) in text.lines().enumerate() {
            if let Some(caps) = HUNK_HEADER.captures(line) {
                if let Some(hunk) = current.take() {
                    hunks.push(finish_hunk(hunk)?);
                }
                let num = |i: usize| -> usize {
                    caps.get(i)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(1)
                };
                current = Some(Hunk {
                    old_start: num(1),
                    old_count: num(2),
                    new_start: num(3),
                    new_count: num(4),
                    lines: Vec::new(),
                });
                continue;
            }

            let Some(hunk) = current.as_mut() else {
                // File headers and preamble before the first hunk.
                continue;
            };

            if line.starts_with('\\') {
                // "\ No newline at end of file"
                continue;
            }

            let parsed = match line.chars().next() {
                Some(' ') => HunkLine::Context(line[1..].to_string()),
                Some('+') => HunkLine::Add(line[1..].to_string()),
                Some('-') => HunkLine::Remove(line[1..].to_string()),
                None => HunkLine::Context(String::new()),
                Some(_) => {
                    return Err(EditError::InvalidPatch(format!(
                        "unexpected line {} inside hunk: '{}'",
                        line_no + 1,
                        line
                    )));
                }
            };
            hunk.lines.push(parsed);
        }

        if let Some(hunk) = current.take() {
            hunks.push(finish_hunk(hunk)?);
        }

        if hunks.is_empty() {
            return Err(EditError::InvalidPatch("no hunks found".to_string()));
        }

        Ok(Self { hunks })
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Applies every hunk to `content`.
    ///
    /// Hunks must not overlap and are applied in order. On failure the
    /// returned string says which hunk did not match.
    pub fn apply(&self, content: &str) -> std::result::Result<String, String> {
        let original: Vec<&str> = content.lines().collect();
        let mut output: Vec<&str> = Vec::with_capacity(original.len());
        let mut pos = 0;

        for (idx, hunk) in self.hunks.iter().enumerate() {
            let wanted = hunk.match_lines();
            let start = locate(&original, &wanted, hunk.expected_index(), pos).ok_or_else(|| {
                format!(
                    "hunk {} does not match near line {}",
                    idx + 1,
                    hunk.old_start
                )
            })?;

            if start != hunk.expected_index() {
                log::debug!(
                    "Hunk {} applied at offset {}",
                    idx + 1,
                    start as isize - hunk.expected_index() as isize
                );
            }

            output.extend_from_slice(&original[pos..start]);
            output.extend(hunk.result_lines());
            pos = start + wanted.len();
        }
        output.extend_from_slice(&original[pos..]);

        let eol = line_ending(content);
        let mut result = output.join(eol);
        let trailing_newline = content.ends_with('\n') || content.is_empty();
        if trailing_newline && !result.is_empty() {
            result.push_str(eol);
        }
        Ok(result)
    }
}

/// The terminator the content uses, judged by its first line.
fn line_ending(content: &str) -> &'static str {
    match content.find('\n') {
        Some(i) if content[..i].ends_with('\r') => "\r\n",
        _ => "\n",
    }
}

fn finish_hunk(hunk: Hunk) -> Result<Hunk> {
    if !hunk.validate() {
        return Err(EditError::InvalidPatch(format!(
            "hunk at line {} has line counts that disagree with its header",
            hunk.old_start
        )));
    }
    Ok(hunk)
}

/// Finds where `wanted` occurs in `lines`, searching outward from `expected`
/// and never before `floor`.
fn locate(lines: &[&str], wanted: &[&str], expected: usize, floor: usize) -> Option<usize> {
    if lines.len() < floor + wanted.len() {
        return None;
    }
    let last = lines.len() - wanted.len();
    let expected = expected.clamp(floor, last);

    let matches_at = |start: usize| lines[start..start + wanted.len()] == *wanted;

    for delta in 0..=(last - floor) {
        if let Some(start) = expected.checked_add(delta).filter(|s| *s <= last) {
            if matches_at(start) {
                return Some(start);
            }
        }
        if let Some(start) = expected.checked_sub(delta).filter(|s| *s >= floor) {
            if delta > 0 && matches_at(start) {
                return Some(start);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "one\ntwo\nthree\nfour\nfive\n";

    #[test]
    fn test_parse_skips_file_headers() {
        let patch = PatchSet::parse(
            "--- a/file.txt\n+++ b/file.txt\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n",
        )
        .unwrap();

        assert_eq!(patch.hunks().len(), 1);
        let hunk = &patch.hunks()[0];
        assert_eq!((hunk.old_start, hunk.old_count), (1, 3));
        assert_eq!(hunk.lines[1], HunkLine::Remove("two".to_string()));
    }

    #[test]
    fn test_parse_rejects_empty_and_bad_counts() {
        assert!(matches!(
            PatchSet::parse("just text"),
            Err(EditError::InvalidPatch(_))
        ));
        assert!(matches!(
            PatchSet::parse("@@ -1,5 +1,1 @@\n one\n"),
            Err(EditError::InvalidPatch(_))
        ));
    }

    #[test]
    fn test_apply_replaces_line() {
        let patch = PatchSet::parse("@@ -2,3 +2,3 @@\n two\n-three\n+THREE\n four\n").unwrap();
        assert_eq!(
            patch.apply(ORIGINAL).unwrap(),
            "one\ntwo\nTHREE\nfour\nfive\n"
        );
    }

    #[test]
    fn test_apply_with_offset() {
        // Header says line 1, content actually sits at line 3
        let patch = PatchSet::parse("@@ -1,2 +1,3 @@\n three\n+three-and-a-half\n four\n").unwrap();
        assert_eq!(
            patch.apply(ORIGINAL).unwrap(),
            "one\ntwo\nthree\nthree-and-a-half\nfour\nfive\n"
        );
    }

    #[test]
    fn test_apply_multiple_hunks() {
        let patch = PatchSet::parse(
            "@@ -1,2 +1,2 @@\n-one\n+ONE\n two\n@@ -4,2 +4,1 @@\n four\n-five\n",
        )
        .unwrap();
        assert_eq!(patch.apply(ORIGINAL).unwrap(), "ONE\ntwo\nthree\nfour\n");
    }

    #[test]
    fn test_apply_insert_into_empty() {
        let patch = PatchSet::parse("@@ -0,0 +1,2 @@\n+hello\n+world\n").unwrap();
        assert_eq!(patch.apply("").unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_apply_keeps_crlf_line_endings() {
        let patch = PatchSet::parse("@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n").unwrap();
        assert_eq!(
            patch.apply("one\r\ntwo\r\nthree\r\n").unwrap(),
            "one\r\nTWO\r\nthree\r\n"
        );
        assert_eq!(
            patch.apply("one\r\ntwo\r\nthree").unwrap(),
            "one\r\nTWO\r\nthree"
        );
    }

    #[test]
    fn test_apply_mismatch_fails() {
        let patch = PatchSet::parse("@@ -1,1 +1,1 @@\n-missing\n+found\n").unwrap();
        let err = patch.apply(ORIGINAL).unwrap_err();
        assert!(err.contains("hunk 1"));
    }
}
