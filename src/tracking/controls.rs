//! Operator control inputs shared between input handlers and the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::pose::ControlFlags;

/// Thread-safe holder for the toggle and momentary button.
///
/// Input handlers write from any thread; the pipeline takes a
/// [`ControlFlags`] snapshot when composing each outgoing message. The two
/// flags are independent and carry no ordering relative to poses.
#[derive(Debug, Default)]
pub struct ControlPanel {
    toggle: AtomicBool,
    button: AtomicBool,
}

impl ControlPanel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Flip the toggle and return its new value.
    pub fn toggle(&self) -> bool {
        !self.toggle.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn set_toggle(&self, value: bool) {
        self.toggle.store(value, Ordering::SeqCst);
    }

    /// Press (`true`) or release (`false`) the momentary button.
    pub fn set_button(&self, pressed: bool) {
        self.button.store(pressed, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ControlFlags {
        ControlFlags {
            toggle: self.toggle.load(Ordering::SeqCst),
            button: self.button.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_and_reports_new_value() {
        let panel = ControlPanel::new();

        assert!(panel.toggle());
        assert!(panel.snapshot().toggle);
        assert!(!panel.toggle());
        assert!(!panel.snapshot().toggle);
    }

    #[test]
    fn test_button_is_independent_of_toggle() {
        let panel = ControlPanel::new();
        panel.set_button(true);

        assert_eq!(
            panel.snapshot(),
            ControlFlags {
                toggle: false,
                button: true
            }
        );

        panel.set_toggle(true);
        panel.set_button(false);
        assert_eq!(
            panel.snapshot(),
            ControlFlags {
                toggle: true,
                button: false
            }
        );
    }
}
