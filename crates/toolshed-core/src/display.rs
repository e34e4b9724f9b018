//! Window display mode.

use std::sync::atomic::{AtomicU8, Ordering};

/// How the main window is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Normal,
    /// Small always-on-top window showing only the selected tool.
    CompactOverlay,
}

impl DisplayMode {
    fn to_u8(self) -> u8 {
        match self {
            DisplayMode::Normal => 0,
            DisplayMode::CompactOverlay => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => DisplayMode::CompactOverlay,
            _ => DisplayMode::Normal,
        }
    }
}

/// Shared display mode, readable from any task.
///
/// While in compact overlay, recommendation and automatic selection are
/// suppressed.
#[derive(Debug, Default)]
pub struct DisplayState {
    mode: AtomicU8,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> DisplayMode {
        DisplayMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: DisplayMode) {
        self.mode.store(mode.to_u8(), Ordering::Release);
    }

    pub fn is_suppressed(&self) -> bool {
        self.mode() == DisplayMode::CompactOverlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mode_transitions() {
        let state = DisplayState::new();
        assert_eq!(state.mode(), DisplayMode::Normal);
        assert!(!state.is_suppressed());

        state.set_mode(DisplayMode::CompactOverlay);
        assert!(state.is_suppressed());

        state.set_mode(DisplayMode::Normal);
        assert!(!state.is_suppressed());
    }
}
