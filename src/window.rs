//! Windowing arithmetic for fixed-height rows.
//!
//! Every row is `line_height` units tall, so the row at `index` starts at
//! `index * line_height` and the whole document is exactly
//! `total_lines * line_height` tall. Units are whatever the host measures in:
//! terminal rows, pixels, points.

use std::ops::Range;

/// Inclusive span of row indices to paint. Empty only for an empty document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibleRange {
    start: usize,
    end: usize,
}

impl VisibleRange {
    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    fn inclusive(first: usize, last: usize) -> Self {
        Self {
            start: first,
            end: last + 1,
        }
    }

    pub fn first_index(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.start)
    }

    pub fn last_index(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.end - 1)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Rows to paint for the given scroll position, `overscan` rows padded on
/// each side.
pub fn compute_visible_range(
    scroll_top: usize,
    container_height: usize,
    line_height: usize,
    total_lines: usize,
    overscan: usize,
) -> VisibleRange {
    if total_lines == 0 {
        return VisibleRange::empty();
    }
    let line_height = line_height.max(1);
    let max_index = total_lines - 1;

    let first = (scroll_top / line_height)
        .saturating_sub(overscan)
        .min(max_index);
    let visible_rows = container_height.div_ceil(line_height);
    let last = first
        .saturating_add(visible_rows)
        .saturating_add(overscan.saturating_mul(2))
        .clamp(first, max_index);

    VisibleRange::inclusive(first, last)
}

/// Scroll offsets and container geometry owned by one viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportState {
    scroll_top: usize,
    scroll_left: usize,
    container_height: usize,
    container_width: usize,
    line_height: usize,
    total_lines: usize,
    content_width: usize,
}

impl ViewportState {
    pub fn new(line_height: usize) -> Self {
        Self {
            scroll_top: 0,
            scroll_left: 0,
            container_height: 0,
            container_width: 0,
            line_height: line_height.max(1),
            total_lines: 0,
            content_width: 0,
        }
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn scroll_left(&self) -> usize {
        self.scroll_left
    }

    pub fn container_height(&self) -> usize {
        self.container_height
    }

    pub fn container_width(&self) -> usize {
        self.container_width
    }

    pub fn line_height(&self) -> usize {
        self.line_height
    }

    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn content_width(&self) -> usize {
        self.content_width
    }

    /// Height of the spacer that gives the scrollbar its proportions.
    pub fn total_height(&self) -> usize {
        self.total_lines.saturating_mul(self.line_height)
    }

    pub fn max_scroll_top(&self) -> usize {
        self.total_height().saturating_sub(self.container_height)
    }

    pub fn max_scroll_left(&self) -> usize {
        self.content_width.saturating_sub(self.container_width)
    }

    /// Vertical offset of the row at `index`.
    pub fn row_offset(&self, index: usize) -> usize {
        index.saturating_mul(self.line_height)
    }

    pub fn set_content(&mut self, total_lines: usize, content_width: usize) {
        self.total_lines = total_lines;
        self.content_width = content_width;
        self.clamp();
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.container_width = width;
        self.container_height = height;
        self.clamp();
    }

    pub fn scroll_to(&mut self, top: usize, left: usize) {
        self.scroll_top = top;
        self.scroll_left = left;
        self.clamp();
    }

    fn clamp(&mut self) {
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
        self.scroll_left = self.scroll_left.min(self.max_scroll_left());
    }

    pub fn visible_range(&self, overscan: usize) -> VisibleRange {
        compute_visible_range(
            self.scroll_top,
            self.container_height,
            self.line_height,
            self.total_lines,
            overscan,
        )
    }

    /// Scroll offset that centers the 1-based `line_number`, clamped to the
    /// scrollable range.
    pub fn scroll_top_for_line(&self, line_number: usize) -> usize {
        let row_top = self.row_offset(line_number.saturating_sub(1));
        let slack = self.container_height.saturating_sub(self.line_height) / 2;
        row_top.saturating_sub(slack).min(self.max_scroll_top())
    }

    /// Whether the whole row of the 1-based `line_number` lies inside the
    /// container at the current scroll offset.
    pub fn is_line_visible(&self, line_number: usize) -> bool {
        if line_number == 0 || line_number > self.total_lines {
            return false;
        }
        let row_top = self.row_offset(line_number - 1);
        row_top >= self.scroll_top
            && row_top + self.line_height <= self.scroll_top + self.container_height
    }

    /// 1-based line under a point `offset_y` units below the container top.
    pub fn line_at(&self, offset_y: usize) -> Option<usize> {
        if offset_y >= self.container_height {
            return None;
        }
        let index = (self.scroll_top + offset_y) / self.line_height;
        (index < self.total_lines).then_some(index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows_intersecting(scroll_top: usize, height: usize, line_height: usize, total: usize) -> Vec<usize> {
        (0..total)
            .filter(|i| {
                let top = i * line_height;
                top < scroll_top + height && top + line_height > scroll_top
            })
            .collect()
    }

    #[test]
    fn empty_document_has_empty_range() {
        let range = compute_visible_range(0, 400, 20, 0, 3);
        assert!(range.is_empty());
        assert_eq!(range.first_index(), None);
        assert_eq!(range.last_index(), None);
        assert_eq!(range.indices().count(), 0);
    }

    #[test]
    fn first_window_without_overscan() {
        let range = compute_visible_range(0, 100, 20, 1000, 0);
        assert_eq!(range.first_index(), Some(0));
        assert_eq!(range.last_index(), Some(5));
    }

    #[test]
    fn overscan_pads_both_sides() {
        let range = compute_visible_range(200, 100, 20, 1000, 3);
        assert_eq!(range.first_index(), Some(7));
        assert_eq!(range.last_index(), Some(7 + 5 + 6));
    }

    #[test]
    fn clamps_at_document_end() {
        let range = compute_visible_range(10_000, 100, 20, 10, 2);
        assert_eq!(range.first_index(), Some(9));
        assert_eq!(range.last_index(), Some(9));

        let range = compute_visible_range(120, 100, 20, 10, 0);
        assert_eq!(range.last_index(), Some(9));
    }

    #[test]
    fn covers_every_intersecting_row() {
        for total in [1usize, 2, 7, 50] {
            for line_height in [1usize, 3, 20] {
                let height = line_height * 5 + 1;
                let max_top = total * line_height;
                for scroll_top in 0..=max_top {
                    let range = compute_visible_range(scroll_top, height, line_height, total, 0);
                    for row in rows_intersecting(scroll_top, height, line_height, total) {
                        assert!(
                            range.contains(row),
                            "row {row} missing at top={scroll_top} lh={line_height} total={total}"
                        );
                    }
                    assert!(range.len() <= height.div_ceil(line_height) + 1);
                }
            }
        }
    }

    #[test]
    fn zero_line_height_does_not_divide_by_zero() {
        let range = compute_visible_range(5, 10, 0, 100, 0);
        assert_eq!(range.first_index(), Some(5));
    }

    #[test]
    fn viewport_clamps_scroll_offsets() {
        let mut viewport = ViewportState::new(20);
        viewport.set_content(10, 120);
        viewport.resize(80, 100);
        assert_eq!(viewport.total_height(), 200);
        viewport.scroll_to(5_000, 5_000);
        assert_eq!(viewport.scroll_top(), 100);
        assert_eq!(viewport.scroll_left(), 40);
        assert_eq!(viewport.container_width(), 80);
        assert_eq!(viewport.container_height(), 100);

        viewport.resize(200, 400);
        assert_eq!(viewport.scroll_top(), 0);
        assert_eq!(viewport.scroll_left(), 0);

        viewport.resize(80, 100);
        viewport.scroll_to(100, 40);
        viewport.set_content(6, 90);
        assert_eq!(viewport.scroll_top(), 20);
        assert_eq!(viewport.scroll_left(), 10);
    }

    #[test]
    fn centers_requested_line_and_keeps_it_visible() {
        let mut viewport = ViewportState::new(20);
        viewport.set_content(100, 0);
        viewport.resize(80, 100);
        for line in 1..=100 {
            let top = viewport.scroll_top_for_line(line);
            viewport.scroll_to(top, 0);
            assert!(viewport.is_line_visible(line), "line {line} hidden at {top}");
        }
        assert_eq!(viewport.scroll_top_for_line(50), 49 * 20 - 40);
        assert_eq!(viewport.scroll_top_for_line(1), 0);
        assert_eq!(viewport.scroll_top_for_line(100), viewport.max_scroll_top());
    }

    #[test]
    fn maps_points_to_lines() {
        let mut viewport = ViewportState::new(2);
        viewport.set_content(10, 0);
        viewport.resize(10, 6);
        viewport.scroll_to(4, 0);
        assert_eq!(viewport.line_at(0), Some(3));
        assert_eq!(viewport.line_at(5), Some(5));
        assert_eq!(viewport.line_at(6), None);
    }
}
