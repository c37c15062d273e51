//! Terminal painting of a [`LayerFrame`]: overlay backgrounds first, then
//! the line-number gutter and the text layer on top.

use ratatui::buffer::Buffer;
use ratatui::prelude::{Color, Modifier, Rect, Style};
use ratatui::widgets::{Block, Widget};
use unicode_width::UnicodeWidthChar;

use crate::layers::{Background, LayerFrame};
use crate::lines::TAB_WIDTH;
use crate::syntax::StyledSegment;

pub fn background_color(background: Background) -> Option<Color> {
    match background {
        Background::None => None,
        Background::Covered => Some(Color::Rgb(24, 66, 38)),
        Background::Uncovered => Some(Color::Rgb(92, 30, 36)),
        Background::Partial => Some(Color::Rgb(92, 76, 22)),
        Background::Highlighted => Some(Color::Rgb(30, 62, 120)),
    }
}

/// Viewport units covered by `rows` terminal rows. Each row shows one line,
/// so a row is `line_height` units tall.
pub fn rows_to_units(rows: u16, line_height: usize) -> usize {
    usize::from(rows).saturating_mul(line_height.max(1))
}

/// Columns taken by the gutter for a document of `total_lines`.
pub fn gutter_width(total_lines: usize) -> u16 {
    let digits = total_lines.max(1).to_string().len();
    u16::try_from(digits + 1).unwrap_or(u16::MAX)
}

pub struct CoverageView<'a> {
    frame: &'a LayerFrame<'a>,
    styled: &'a [Vec<StyledSegment>],
    total_lines: usize,
    hovered: Option<usize>,
    block: Option<Block<'a>>,
}

impl<'a> CoverageView<'a> {
    pub fn new(frame: &'a LayerFrame<'a>, styled: &'a [Vec<StyledSegment>], total_lines: usize) -> Self {
        Self {
            frame,
            styled,
            total_lines,
            hovered: None,
            block: None,
        }
    }

    pub fn hovered(mut self, hovered: Option<usize>) -> Self {
        self.hovered = hovered;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Screen row of the line starting at `offset_top`. Row 0 holds the line
    /// under the top edge, matching `ViewportState::line_at`.
    fn row_y(&self, offset_top: usize, area: Rect) -> Option<u16> {
        let line_height = self.frame.line_height.max(1);
        let row = (offset_top / line_height).checked_sub(self.frame.scroll_top / line_height)?;
        u16::try_from(row)
            .ok()
            .filter(|row| *row < area.height)
            .map(|row| area.y + row)
    }
}

impl Widget for CoverageView<'_> {
    fn render(mut self, area: Rect, buf: &mut Buffer) {
        let area = match self.block.take() {
            Some(block) => {
                let inner = block.inner(area);
                block.render(area, buf);
                inner
            }
            None => area,
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        for row in &self.frame.overlay.rows {
            let Some(y) = self.row_y(row.offset_top, area) else {
                continue;
            };
            if let Some(color) = background_color(row.background) {
                buf.set_style(Rect::new(area.x, y, area.width, 1), Style::default().bg(color));
            }
        }

        let gutter = gutter_width(self.total_lines).min(area.width);
        let text_x = area.x + gutter;
        let text_width = area.width - gutter;

        for row in &self.frame.text.rows {
            let Some(y) = self.row_y(row.offset_top, area) else {
                continue;
            };
            let number = format!("{:>width$} ", row.line.display_number, width = usize::from(gutter.saturating_sub(1)));
            let mut number_style = Style::default().fg(Color::DarkGray);
            if self.hovered == Some(row.line.display_number) {
                number_style = number_style
                    .fg(Color::White)
                    .add_modifier(Modifier::UNDERLINED);
            }
            buf.set_stringn(area.x, y, number, usize::from(gutter), number_style);

            let fallback;
            let segments = match self.styled.get(row.line.index) {
                Some(segments) => segments.as_slice(),
                None => {
                    fallback = [StyledSegment {
                        text: row.line.text.clone(),
                        style: Style::default(),
                    }];
                    &fallback[..]
                }
            };
            paint_segments(buf, text_x, y, text_width, self.frame.text.scroll_left, segments);
        }
    }
}

/// Writes segments into one row, skipping the first `skip` columns and
/// expanding tabs.
fn paint_segments(buf: &mut Buffer, x: u16, y: u16, width: u16, skip: usize, segments: &[StyledSegment]) {
    let limit = skip + usize::from(width);
    let mut col = 0usize;
    for segment in segments {
        for ch in segment.text.chars() {
            if col >= limit {
                return;
            }
            if ch == '\t' {
                let next = col + TAB_WIDTH - col % TAB_WIDTH;
                while col < next && col < limit {
                    put(buf, x, y, col, skip, " ", 1, segment.style);
                    col += 1;
                }
                continue;
            }
            let ch_width = ch.width().unwrap_or(0);
            if ch_width == 0 {
                continue;
            }
            if col >= skip && col + ch_width <= limit {
                let mut tmp = [0u8; 4];
                put(buf, x, y, col, skip, ch.encode_utf8(&mut tmp), ch_width, segment.style);
            }
            col += ch_width;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn put(buf: &mut Buffer, x: u16, y: u16, col: usize, skip: usize, symbol: &str, width: usize, style: Style) {
    if col < skip {
        return;
    }
    let Ok(offset) = u16::try_from(col - skip) else {
        return;
    };
    let cell = buf.get_mut(x + offset, y);
    cell.set_symbol(symbol);
    if let Some(fg) = style.fg {
        cell.set_fg(fg);
    }
    for extra in 1..width {
        if let Ok(extra) = u16::try_from(extra) {
            buf.get_mut(x + offset + extra, y).set_symbol("");
        }
    }
}
