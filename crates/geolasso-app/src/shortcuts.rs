//! Interaction reference for selection mode.

use geolasso_core::{ModifierBindings, ModifierKey};

/// A pointer or keyboard gesture and what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub modifier: Option<ModifierKey>,
    pub gesture: &'static str,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(modifier: Option<ModifierKey>, gesture: &'static str, description: &'static str) -> Self {
        Self {
            modifier,
            gesture,
            description,
        }
    }

    /// Format the gesture for display (e.g., "Shift+Click").
    pub fn format(&self) -> String {
        match self.modifier {
            Some(key) => format!("{}+{}", key_name(key), self.gesture),
            None => self.gesture.to_string(),
        }
    }
}

fn key_name(key: ModifierKey) -> &'static str {
    match key {
        ModifierKey::Shift => "Shift",
        ModifierKey::Ctrl => "Ctrl",
        ModifierKey::Alt => "Alt",
        ModifierKey::Meta => "Meta",
    }
}

/// Gestures understood while selection mode is active.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// Gestures for the given modifier bindings.
    pub fn all(bindings: &ModifierBindings) -> Vec<Shortcut> {
        vec![
            Shortcut::new(None, "Click", "Start a stroke"),
            Shortcut::new(None, "Move", "Extend the stroke"),
            Shortcut::new(None, "Click again", "Finish and replace the selection"),
            Shortcut::new(Some(bindings.add), "Click to finish", "Add to the selection"),
            Shortcut::new(Some(bindings.remove), "Click to finish", "Remove from the selection"),
            Shortcut::new(None, "Escape", "Cancel the current stroke"),
        ]
    }

    /// Render the reference as aligned text.
    pub fn help_text(bindings: &ModifierBindings) -> String {
        let mut text = String::from("Selection gestures:\n");
        for shortcut in Self::all(bindings) {
            text.push_str(&format!("  {:24} {}\n", shortcut.format(), shortcut.description));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts_follow_bindings() {
        let bindings = ModifierBindings {
            add: ModifierKey::Ctrl,
            remove: ModifierKey::Meta,
        };
        let text = ShortcutRegistry::help_text(&bindings);
        assert!(text.contains("Ctrl+Click to finish"));
        assert!(text.contains("Meta+Click to finish"));
        assert!(!text.contains("Shift+"));
    }

    #[test]
    fn test_format_without_modifier() {
        assert_eq!(Shortcut::new(None, "Escape", "Cancel").format(), "Escape");
    }
}
