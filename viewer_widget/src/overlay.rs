//! Loading indicator shown over the canvas

/// Progress overlay state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadingOverlay {
    pub visible: bool,
    /// Whole percent, 0 to 100
    pub percent: u8,
    /// Whether the host placeholder image is still shown behind the canvas
    pub placeholder_visible: bool,
}

impl LoadingOverlay {
    /// Back to a visible 0% for a new load
    pub fn reset(&mut self, has_placeholder: bool) {
        self.visible = true;
        self.percent = 0;
        self.placeholder_visible = has_placeholder;
    }

    /// Update from byte counts; unknown or zero totals leave it unchanged
    pub fn set_progress(&mut self, loaded: u64, total: Option<u64>) {
        let Some(total) = total.filter(|total| *total > 0) else {
            return;
        };
        let percent = (loaded.min(total) as f64 / total as f64 * 100.0).round() as u8;
        self.percent = percent.max(self.percent);
    }

    pub fn finish(&mut self) {
        self.visible = false;
        self.percent = 100;
        self.placeholder_visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_needs_a_known_total() {
        let mut overlay = LoadingOverlay::default();
        overlay.reset(true);
        overlay.set_progress(10, None);
        assert_eq!(overlay.percent, 0);
        overlay.set_progress(50, Some(200));
        assert_eq!(overlay.percent, 25);
        overlay.set_progress(400, Some(200));
        assert_eq!(overlay.percent, 100);
    }

    #[test]
    fn finish_clears_everything() {
        let mut overlay = LoadingOverlay::default();
        overlay.reset(true);
        overlay.finish();
        assert!(!overlay.visible);
        assert!(!overlay.placeholder_visible);
    }
}
