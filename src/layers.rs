//! Composition of the two stacked layers: selectable text underneath and
//! the coverage overlay on top. Both are built from the same `VisibleRange`
//! and the same row offsets, so a coverage bar always sits on its text row.

use crate::coverage::CoverageStatus;
use crate::fragment::HighlightState;
use crate::lines::SourceLine;
use crate::window::{ViewportState, VisibleRange};

/// Which coverage statuses the overlay paints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoverageToggles {
    pub covered: bool,
    pub partial: bool,
    pub uncovered: bool,
}

impl Default for CoverageToggles {
    fn default() -> Self {
        Self {
            covered: true,
            partial: true,
            uncovered: true,
        }
    }
}

impl CoverageToggles {
    pub fn shows(&self, status: CoverageStatus) -> bool {
        match status {
            CoverageStatus::Hit => self.covered,
            CoverageStatus::Miss => self.uncovered,
            CoverageStatus::Partial => self.partial,
            CoverageStatus::None => false,
        }
    }
}

/// Background painted behind one overlay row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Background {
    None,
    Covered,
    Uncovered,
    Partial,
    Highlighted,
}

impl Background {
    fn for_status(status: CoverageStatus, toggles: &CoverageToggles) -> Self {
        if !toggles.shows(status) {
            return Background::None;
        }
        match status {
            CoverageStatus::Hit => Background::Covered,
            CoverageStatus::Miss => Background::Uncovered,
            CoverageStatus::Partial => Background::Partial,
            CoverageStatus::None => Background::None,
        }
    }

    pub fn class_name(self) -> Option<&'static str> {
        match self {
            Background::None => None,
            Background::Covered => Some("covered"),
            Background::Uncovered => Some("uncovered"),
            Background::Partial => Some("partial"),
            Background::Highlighted => Some("highlighted"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TextRow<'a> {
    pub line: &'a SourceLine,
    pub offset_top: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayRow {
    pub index: usize,
    pub display_number: usize,
    pub offset_top: usize,
    pub background: Background,
}

#[derive(Clone, Debug)]
pub struct TextLayer<'a> {
    pub rows: Vec<TextRow<'a>>,
    pub scroll_left: usize,
    /// Widest row; anything past the container width scrolls horizontally.
    pub content_width: usize,
}

/// The overlay never scrolls by itself; its horizontal offset is mirrored
/// from the text layer.
#[derive(Clone, Debug)]
pub struct OverlayLayer {
    pub rows: Vec<OverlayRow>,
    pub scroll_left: usize,
    pub pointer_events: bool,
}

/// Overlay inputs that are not geometry.
#[derive(Clone, Copy, Debug)]
pub struct OverlayParams {
    pub toggles: CoverageToggles,
    pub highlight: HighlightState,
    pub scroll_left: usize,
    pub pointer_events: bool,
}

#[derive(Clone, Debug)]
pub struct LayerFrame<'a> {
    pub scroll_top: usize,
    pub line_height: usize,
    pub spacer_height: usize,
    pub range: VisibleRange,
    pub text: TextLayer<'a>,
    pub overlay: OverlayLayer,
}

impl LayerFrame<'_> {
    /// Offset of a row relative to the container top, or `None` if the row
    /// is overscan outside the container.
    pub fn screen_offset(&self, offset_top: usize, container_height: usize) -> Option<usize> {
        let relative = offset_top.checked_sub(self.scroll_top)?;
        (relative < container_height).then_some(relative)
    }
}

pub fn compose<'a>(
    lines: &'a [SourceLine],
    viewport: &ViewportState,
    range: VisibleRange,
    params: OverlayParams,
) -> LayerFrame<'a> {
    let highlighted = params.highlight.line_number();
    let visible = range.indices().filter_map(|index| lines.get(index));

    let mut text_rows = Vec::with_capacity(range.len());
    let mut overlay_rows = Vec::with_capacity(range.len());
    for line in visible {
        let offset_top = viewport.row_offset(line.index);
        let background = if highlighted == Some(line.display_number) {
            Background::Highlighted
        } else {
            Background::for_status(line.coverage, &params.toggles)
        };
        text_rows.push(TextRow { line, offset_top });
        overlay_rows.push(OverlayRow {
            index: line.index,
            display_number: line.display_number,
            offset_top,
            background,
        });
    }

    LayerFrame {
        scroll_top: viewport.scroll_top(),
        line_height: viewport.line_height(),
        spacer_height: viewport.total_height(),
        range,
        text: TextLayer {
            rows: text_rows,
            scroll_left: viewport.scroll_left(),
            content_width: viewport.content_width(),
        },
        overlay: OverlayLayer {
            rows: overlay_rows,
            scroll_left: params.scroll_left,
            pointer_events: params.pointer_events,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{Coverage, CoverageMap};
    use crate::lines::LineModel;

    fn model() -> LineModel {
        let coverage: CoverageMap = [(1, Coverage::Hit), (2, Coverage::Miss), (3, Coverage::Partial)]
            .into_iter()
            .collect();
        LineModel::new("alpha\nbeta\ngamma\ndelta", &coverage)
    }

    fn viewport(model: &LineModel) -> ViewportState {
        let mut viewport = ViewportState::new(18);
        viewport.set_content(model.len(), model.max_width());
        viewport.resize(300, 400);
        viewport
    }

    fn params() -> OverlayParams {
        OverlayParams {
            toggles: CoverageToggles::default(),
            highlight: HighlightState::Unhighlighted,
            scroll_left: 0,
            pointer_events: true,
        }
    }

    #[test]
    fn layers_share_rows_and_offsets() {
        let model = model();
        let viewport = viewport(&model);
        let frame = compose(model.lines(), &viewport, viewport.visible_range(0), params());
        assert_eq!(frame.text.rows.len(), frame.overlay.rows.len());
        for (text, overlay) in frame.text.rows.iter().zip(&frame.overlay.rows) {
            assert_eq!(text.line.index, overlay.index);
            assert_eq!(text.offset_top, overlay.offset_top);
            assert_eq!(text.offset_top, overlay.index * 18);
        }
        assert_eq!(frame.spacer_height, 4 * 18);
    }

    #[test]
    fn backgrounds_follow_coverage() {
        let model = model();
        let viewport = viewport(&model);
        let frame = compose(model.lines(), &viewport, viewport.visible_range(0), params());
        let classes: Vec<_> = frame
            .overlay
            .rows
            .iter()
            .map(|row| row.background.class_name())
            .collect();
        assert_eq!(
            classes,
            vec![Some("covered"), Some("uncovered"), Some("partial"), None]
        );
    }

    #[test]
    fn toggles_hide_statuses() {
        let model = model();
        let viewport = viewport(&model);
        let mut params = params();
        params.toggles.partial = false;
        params.toggles.covered = false;
        let frame = compose(model.lines(), &viewport, viewport.visible_range(0), params);
        assert_eq!(frame.overlay.rows[0].background, Background::None);
        assert_eq!(frame.overlay.rows[1].background, Background::Uncovered);
        assert_eq!(frame.overlay.rows[2].background, Background::None);
    }

    #[test]
    fn highlight_takes_precedence() {
        let model = model();
        let viewport = viewport(&model);
        let mut params = params();
        params.highlight = HighlightState::Highlighted(2);
        params.toggles.uncovered = false;
        let frame = compose(model.lines(), &viewport, viewport.visible_range(0), params);
        assert_eq!(frame.overlay.rows[1].background, Background::Highlighted);
        assert_eq!(frame.overlay.rows[0].background, Background::Covered);
    }

    #[test]
    fn only_visible_rows_are_composed() {
        let coverage = CoverageMap::new();
        let text: Vec<String> = (0..1000).map(|i| format!("line {i}")).collect();
        let model = LineModel::new(&text.join("\n"), &coverage);
        let mut viewport = ViewportState::new(10);
        viewport.set_content(model.len(), model.max_width());
        viewport.resize(100, 50);
        viewport.scroll_to(5000, 0);
        let frame = compose(model.lines(), &viewport, viewport.visible_range(2), params());
        assert_eq!(frame.text.rows.first().map(|r| r.line.index), Some(498));
        assert_eq!(frame.text.rows.len(), 2 + 5 + 2 + 1);
        assert_eq!(frame.screen_offset(frame.text.rows[2].offset_top, 50), Some(0));
        assert_eq!(frame.screen_offset(frame.text.rows[0].offset_top, 50), None);
    }

    #[test]
    fn empty_model_composes_nothing() {
        let model = LineModel::new("", &CoverageMap::new());
        let viewport = viewport(&model);
        let frame = compose(model.lines(), &viewport, viewport.visible_range(3), params());
        assert!(frame.text.rows.is_empty());
        assert!(frame.overlay.rows.is_empty());
        assert_eq!(frame.spacer_height, 0);
    }
}
