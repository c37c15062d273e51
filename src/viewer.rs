//! One mounted viewer instance. The host feeds it resize, scroll, frame,
//! navigation and click notifications one at a time; each call leaves the
//! viewport, the visible range and both layers consistent before returning.
//! Dropping the viewer is its teardown.

use std::sync::mpsc::Receiver;
use std::time::Duration;

use tracing::{debug, trace};

use crate::diagnostics::Diagnostics;
use crate::fragment::{HighlightController, HighlightState, Navigation};
use crate::guard::{Clock, FrameHandle, FrameScheduler, ScrollGuard, QUIESCENCE_THRESHOLD};
use crate::hscroll::HorizontalSync;
use crate::layers::{compose, CoverageToggles, LayerFrame, OverlayParams};
use crate::lines::LineModel;
use crate::window::{ViewportState, VisibleRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerOptions {
    pub line_height: usize,
    pub overscan: usize,
    pub quiescence: Duration,
    pub toggles: CoverageToggles,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            line_height: 1,
            overscan: 3,
            quiescence: QUIESCENCE_THRESHOLD,
            toggles: CoverageToggles::default(),
        }
    }
}

/// Host services injected at mount.
pub struct Capabilities {
    pub navigation: Box<dyn Navigation>,
    pub diagnostics: Box<dyn Diagnostics>,
    pub frames: Box<dyn FrameScheduler>,
    pub clock: Box<dyn Clock>,
}

pub struct Viewer {
    model: LineModel,
    display_name: String,
    options: ViewerOptions,
    viewport: ViewportState,
    range: VisibleRange,
    hsync: HorizontalSync,
    highlight: HighlightController,
    guard: ScrollGuard,
    hovered: Option<usize>,
    /// Line to center once the container has a size.
    pending_reveal: Option<usize>,
    fragments: Receiver<String>,
    caps: Capabilities,
}

impl Viewer {
    /// Mounts a viewer: subscribes to fragment changes and applies the
    /// current fragment.
    pub fn mount(
        model: LineModel,
        display_name: impl Into<String>,
        options: ViewerOptions,
        mut caps: Capabilities,
    ) -> Self {
        let fragments = caps.navigation.subscribe();
        let initial = caps.navigation.current_fragment();

        let mut viewport = ViewportState::new(options.line_height);
        viewport.set_content(model.len(), model.max_width());

        let mut viewer = Self {
            display_name: display_name.into(),
            range: viewport.visible_range(options.overscan),
            viewport,
            model,
            options,
            hsync: HorizontalSync::default(),
            highlight: HighlightController::new(),
            guard: ScrollGuard::new(options.quiescence),
            hovered: None,
            pending_reveal: None,
            fragments,
            caps,
        };
        debug!(
            target: "viewer",
            display_name = %viewer.display_name,
            lines = viewer.model.len(),
            "viewer_mounted"
        );
        viewer.apply_fragment(&initial);
        viewer
    }

    pub fn model(&self) -> &LineModel {
        &self.model
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.range
    }

    pub fn highlight(&self) -> HighlightState {
        self.highlight.state()
    }

    pub fn toggles(&self) -> CoverageToggles {
        self.options.toggles
    }

    pub fn is_scrolling(&self) -> bool {
        self.guard.is_scrolling()
    }

    pub fn pointer_events_enabled(&self) -> bool {
        self.guard.pointer_events_enabled()
    }

    pub fn overlay_scroll_left(&self) -> usize {
        self.hsync.overlay_left()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    fn recompute_range(&mut self) {
        self.range = self.viewport.visible_range(self.options.overscan);
    }

    fn note_scroll_activity(&mut self) {
        self.hovered = None;
        let now = self.caps.clock.now();
        self.guard.on_scroll(now, self.caps.frames.as_mut());
    }

    pub fn on_resize(&mut self, width: usize, height: usize) {
        if self.viewport.container_width() == width && self.viewport.container_height() == height {
            return;
        }
        self.viewport.resize(width, height);
        self.hsync.on_text_scroll(self.viewport.scroll_left());
        self.recompute_range();
        trace!(target: "viewer", width, height, range = ?self.range, "resized");
        if height > 0 {
            if let Some(line_number) = self.pending_reveal.take() {
                self.scroll_to_line(line_number);
            }
        }
    }

    /// Scroll notification from the viewport, either axis.
    pub fn on_scroll(&mut self, top: usize, left: usize) {
        self.viewport.scroll_to(top, left);
        self.hsync.on_text_scroll(self.viewport.scroll_left());
        self.note_scroll_activity();
        self.recompute_range();
    }

    /// Horizontal scroll notification from the text layer.
    pub fn on_text_scroll_left(&mut self, left: usize) {
        self.on_scroll(self.viewport.scroll_top(), left);
    }

    pub fn scroll_by(&mut self, rows: isize, columns: isize) {
        let top = self
            .viewport
            .scroll_top()
            .saturating_add_signed(rows.saturating_mul(self.viewport.line_height() as isize));
        let left = self.viewport.scroll_left().saturating_add_signed(columns);
        self.on_scroll(top, left);
    }

    pub fn on_frame(&mut self, handle: FrameHandle) -> bool {
        let now = self.caps.clock.now();
        self.guard.on_frame(handle, now, self.caps.frames.as_mut())
    }

    /// Applies every fragment change delivered since the last call.
    pub fn pump_navigation(&mut self) -> usize {
        let changes: Vec<String> = self.fragments.try_iter().collect();
        for raw in &changes {
            self.apply_fragment(raw);
        }
        changes.len()
    }

    fn apply_fragment(&mut self, raw: &str) {
        let target = self
            .highlight
            .observe(raw, self.model.len(), self.caps.diagnostics.as_ref());
        match target {
            Some(line_number) => self.scroll_to_line(line_number),
            None => self.pending_reveal = None,
        }
    }

    /// Scrolls so `line_number` is centered in the container.
    pub fn scroll_to_line(&mut self, line_number: usize) {
        if self.viewport.container_height() == 0 {
            self.pending_reveal = Some(line_number);
            return;
        }
        self.pending_reveal = None;
        let top = self.viewport.scroll_top_for_line(line_number);
        self.on_scroll(top, self.viewport.scroll_left());
    }

    pub fn click_line(&mut self, line_number: usize) {
        self.highlight
            .click(line_number, self.model.len(), self.caps.navigation.as_mut());
    }

    /// Pointer position over the overlay. Ignored while scrolling.
    pub fn on_pointer_move(&mut self, offset_y: Option<usize>) {
        if !self.guard.pointer_events_enabled() {
            return;
        }
        self.hovered = offset_y.and_then(|y| self.viewport.line_at(y));
    }

    /// 1-based line under a point below the container top.
    pub fn hit_test(&self, offset_y: usize) -> Option<usize> {
        self.viewport.line_at(offset_y)
    }

    /// Swaps in a rebuilt line model, keeping the scroll position where the
    /// new document allows it.
    pub fn replace_model(&mut self, model: LineModel) {
        self.model = model;
        self.viewport
            .set_content(self.model.len(), self.model.max_width());
        self.hsync.on_text_scroll(self.viewport.scroll_left());
        self.highlight.revalidate(self.model.len());
        if self.pending_reveal.is_some_and(|n| n > self.model.len()) {
            self.pending_reveal = None;
        }
        if self.hovered.is_some_and(|n| n > self.model.len()) {
            self.hovered = None;
        }
        self.recompute_range();
        debug!(target: "viewer", lines = self.model.len(), "model_replaced");
    }

    pub fn set_toggles(&mut self, toggles: CoverageToggles) {
        self.options.toggles = toggles;
    }

    pub fn frame(&self) -> LayerFrame<'_> {
        compose(
            self.model.lines(),
            &self.viewport,
            self.range,
            OverlayParams {
                toggles: self.options.toggles,
                highlight: self.highlight.state(),
                scroll_left: self.hsync.overlay_left(),
                pointer_events: self.guard.pointer_events_enabled(),
            },
        )
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.guard.teardown(self.caps.frames.as_mut());
        debug!(target: "viewer", display_name = %self.display_name, "viewer_unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::CoverageMap;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::fragment::MemoryNavigation;
    use crate::guard::{FrameQueue, ManualClock};

    struct Host {
        navigation: MemoryNavigation,
        diagnostics: MemoryDiagnostics,
        frames: FrameQueue,
        clock: ManualClock,
    }

    impl Host {
        fn new(fragment: &str) -> Self {
            Self {
                navigation: MemoryNavigation::new(fragment),
                diagnostics: MemoryDiagnostics::new(),
                frames: FrameQueue::new(),
                clock: ManualClock::new(),
            }
        }

        fn mount(&self, lines: usize) -> Viewer {
            let text: Vec<String> = (1..=lines).map(|i| format!("line {i}")).collect();
            let model = LineModel::new(&text.join("\n"), &CoverageMap::new());
            let mut viewer = Viewer::mount(
                model,
                "file.txt",
                ViewerOptions {
                    line_height: 2,
                    overscan: 1,
                    ..ViewerOptions::default()
                },
                Capabilities {
                    navigation: Box::new(self.navigation.clone()),
                    diagnostics: Box::new(self.diagnostics.clone()),
                    frames: Box::new(self.frames.clone()),
                    clock: Box::new(self.clock.clone()),
                },
            );
            viewer.on_resize(40, 20);
            viewer
        }
    }

    #[test]
    fn resize_recomputes_range_synchronously() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        assert_eq!(viewer.visible_range().last_index(), Some(10 + 2));
        viewer.on_resize(40, 40);
        assert_eq!(viewer.visible_range().last_index(), Some(20 + 2));
    }

    #[test]
    fn scroll_moves_range_and_engages_guard() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        viewer.on_scroll(100, 0);
        assert_eq!(viewer.visible_range().first_index(), Some(49));
        assert!(!viewer.pointer_events_enabled());
        assert!(!viewer.frame().overlay.pointer_events);
    }

    #[test]
    fn hover_is_suspended_while_scrolling() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        viewer.on_pointer_move(Some(4));
        assert_eq!(viewer.hovered(), Some(3));

        viewer.scroll_by(3, 0);
        assert_eq!(viewer.hovered(), None);
        viewer.on_pointer_move(Some(4));
        assert_eq!(viewer.hovered(), None);

        host.clock.advance(Duration::from_millis(200));
        for handle in host.frames.take_due() {
            viewer.on_frame(handle);
        }
        viewer.on_pointer_move(Some(4));
        assert_eq!(viewer.hovered(), Some(6));
    }

    #[test]
    fn external_navigation_highlights_and_scrolls() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        host.navigation.navigate("#L60");
        assert_eq!(viewer.pump_navigation(), 1);
        assert_eq!(viewer.highlight(), HighlightState::Highlighted(60));
        assert!(viewer.viewport().is_line_visible(60));
    }

    #[test]
    fn clicking_does_not_jump_the_viewport() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        viewer.on_scroll(50, 0);
        let before = viewer.viewport().scroll_top();
        viewer.click_line(30);
        viewer.pump_navigation();
        assert_eq!(viewer.viewport().scroll_top(), before);
        assert_eq!(viewer.highlight(), HighlightState::Highlighted(30));
    }

    #[test]
    fn double_click_between_pumps_stays_cleared() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        viewer.on_scroll(50, 0);
        let before = viewer.viewport().scroll_top();

        viewer.click_line(7);
        viewer.click_line(7);
        assert_eq!(viewer.pump_navigation(), 2);
        assert_eq!(viewer.highlight(), HighlightState::Unhighlighted);
        assert_eq!(host.navigation.current_fragment(), "");
        assert_eq!(viewer.viewport().scroll_top(), before);
    }

    #[test]
    fn replacing_model_revalidates_highlight_and_scroll() {
        let host = Host::new("#L90");
        let mut viewer = host.mount(100);
        assert_eq!(viewer.highlight(), HighlightState::Highlighted(90));
        assert_eq!(viewer.viewport().scroll_top(), 178 - 9);
        viewer.replace_model(LineModel::new("a\nb\nc", &CoverageMap::new()));
        assert_eq!(viewer.highlight(), HighlightState::Unhighlighted);
        assert_eq!(viewer.viewport().scroll_top(), 0);
        assert_eq!(viewer.visible_range().last_index(), Some(2));
    }

    #[test]
    fn drop_cancels_pending_frame() {
        let host = Host::new("");
        let mut viewer = host.mount(100);
        viewer.scroll_by(1, 0);
        assert_eq!(host.frames.pending(), 1);
        drop(viewer);
        assert_eq!(host.frames.pending(), 0);
        assert_eq!(host.frames.cancelled(), 1);
    }
}
