use unicode_width::UnicodeWidthChar;

use crate::coverage::{CoverageMap, CoverageStatus, CoverageSummary};

/// Columns a tab advances to in the text layer.
pub const TAB_WIDTH: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLine {
    pub index: usize,
    pub display_number: usize,
    pub text: String,
    pub coverage: CoverageStatus,
}

/// Splits `text` into indexed lines and attaches coverage to each.
///
/// Lines split on `\n`, so a trailing newline yields an empty last line.
/// A trailing `\r` is dropped from every line. Empty input has no lines.
pub fn build(text: &str, coverage: &CoverageMap) -> Vec<SourceLine> {
    if text.is_empty() {
        return Vec::new();
    }

    text.split('\n')
        .enumerate()
        .map(|(index, raw)| {
            let display_number = index + 1;
            SourceLine {
                index,
                display_number,
                text: raw.strip_suffix('\r').unwrap_or(raw).to_string(),
                coverage: coverage.status(display_number),
            }
        })
        .collect()
}

/// Terminal columns taken by `text`, with tabs expanded.
pub fn display_width(text: &str) -> usize {
    text.chars().fold(0, |col, ch| {
        if ch == '\t' {
            col + TAB_WIDTH - col % TAB_WIDTH
        } else {
            col + ch.width().unwrap_or(0)
        }
    })
}

/// Line sequence for one render. Replaced, never mutated, when the text or
/// coverage changes.
#[derive(Clone, Debug, Default)]
pub struct LineModel {
    lines: Vec<SourceLine>,
    max_width: usize,
    summary: CoverageSummary,
}

impl LineModel {
    pub fn new(text: &str, coverage: &CoverageMap) -> Self {
        let lines = build(text, coverage);
        let max_width = lines
            .iter()
            .map(|line| display_width(&line.text))
            .max()
            .unwrap_or(0);
        let summary = CoverageSummary::tally(lines.iter().map(|line| line.coverage));
        Self {
            lines,
            max_width,
            summary,
        }
    }

    pub fn lines(&self) -> &[SourceLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line by 1-based number.
    pub fn line(&self, display_number: usize) -> Option<&SourceLine> {
        display_number
            .checked_sub(1)
            .and_then(|index| self.lines.get(index))
    }

    /// Widest line in columns.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn summary(&self) -> CoverageSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::Coverage;

    #[test]
    fn numbers_lines_from_one() {
        let lines = build("a\nb\nc", &CoverageMap::new());
        let numbers: Vec<_> = lines.iter().map(|l| l.display_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(lines[2].index, 2);
        assert_eq!(lines[1].text, "b");
    }

    #[test]
    fn keeps_trailing_empty_line() {
        let lines = build("a\n", &CoverageMap::new());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "");
    }

    #[test]
    fn empty_text_has_no_lines() {
        assert!(build("", &CoverageMap::new()).is_empty());
        assert_eq!(build("\n", &CoverageMap::new()).len(), 2);
    }

    #[test]
    fn strips_carriage_returns() {
        let lines = build("one\r\ntwo\r\n", &CoverageMap::new());
        assert_eq!(lines[0].text, "one");
        assert_eq!(lines[1].text, "two");
    }

    #[test]
    fn attaches_coverage_by_line_number() {
        let coverage: CoverageMap = [(2, Coverage::Miss)].into_iter().collect();
        let lines = build("x\ny\nz", &coverage);
        assert_eq!(lines[0].coverage, CoverageStatus::None);
        assert_eq!(lines[1].coverage, CoverageStatus::Miss);
        assert_eq!(lines[2].coverage, CoverageStatus::None);
    }

    #[test]
    fn model_tracks_width_and_summary() {
        let coverage: CoverageMap = [(1, Coverage::Hit), (2, Coverage::Miss)]
            .into_iter()
            .collect();
        let model = LineModel::new("short\n\tindented line\n", &coverage);
        assert_eq!(model.len(), 3);
        assert_eq!(model.max_width(), 4 + "indented line".len());
        assert_eq!(model.summary().hits, 1);
        assert_eq!(model.summary().misses, 1);
        assert_eq!(model.line(2).map(|l| l.index), Some(1));
        assert!(model.line(0).is_none());
        assert!(model.line(4).is_none());
    }

    #[test]
    fn wide_chars_count_double() {
        assert_eq!(display_width("日本"), 4);
        assert_eq!(display_width("ab\tc"), 5);
    }
}
