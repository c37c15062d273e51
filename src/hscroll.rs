use tracing::trace;

/// Mirrors the text layer's horizontal offset onto the overlay. The overlay
/// never scrolls on its own and never drives the text layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HorizontalSync {
    text_left: usize,
    overlay_left: usize,
}

impl HorizontalSync {
    /// Applies a text-layer scroll and returns the overlay's new offset.
    pub fn on_text_scroll(&mut self, left: usize) -> usize {
        if self.text_left != left {
            trace!(target: "viewer", from = self.text_left, to = left, "horizontal_sync");
        }
        self.text_left = left;
        self.overlay_left = left;
        self.overlay_left
    }

    pub fn text_left(&self) -> usize {
        self.text_left
    }

    pub fn overlay_left(&self) -> usize {
        self.overlay_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_follows_text_in_the_same_call() {
        let mut sync = HorizontalSync::default();
        assert_eq!(sync.on_text_scroll(100), 100);
        assert_eq!(sync.overlay_left(), 100);
        assert_eq!(sync.text_left(), 100);
        sync.on_text_scroll(0);
        assert_eq!(sync.overlay_left(), 0);
    }
}
