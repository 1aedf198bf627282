//! Pointer and modifier-key input for the selection tool.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// The button that starts and finishes a stroke.
    pub fn is_primary(self) -> bool {
        self == MouseButton::Left
    }
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    /// No modifier held.
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Only shift held.
    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    /// Only alt held.
    pub fn alt() -> Self {
        Self {
            alt: true,
            ..Self::NONE
        }
    }

    /// Only ctrl held.
    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Whether the given key is held.
    pub fn is_held(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
            ModifierKey::Meta => self.meta,
        }
    }
}

/// Pointer event in screen coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
}

impl PointerEvent {
    /// Screen position carried by the event.
    pub fn position(&self) -> Point {
        match self {
            PointerEvent::Down { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Move { position } => *position,
        }
    }
}

/// A single modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKey {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

/// Which modifier keys mean "add to" and "remove from" the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierBindings {
    pub add: ModifierKey,
    pub remove: ModifierKey,
}

impl Default for ModifierBindings {
    fn default() -> Self {
        Self {
            add: ModifierKey::Shift,
            remove: ModifierKey::Alt,
        }
    }
}

impl ModifierBindings {
    /// Snapshot the selection intent from the modifiers of one event.
    pub fn resolve(&self, modifiers: Modifiers) -> ModifierState {
        ModifierState {
            add: modifiers.is_held(self.add),
            remove: modifiers.is_held(self.remove),
        }
    }
}

/// Add/remove intent frozen at the moment a stroke finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierState {
    pub add: bool,
    pub remove: bool,
}

impl ModifierState {
    pub const REPLACE: ModifierState = ModifierState {
        add: false,
        remove: false,
    };
    pub const ADD: ModifierState = ModifierState {
        add: true,
        remove: false,
    };
    pub const REMOVE: ModifierState = ModifierState {
        add: false,
        remove: true,
    };

    /// Resolve the mutation this snapshot asks for. Remove wins over add.
    pub fn mode(&self) -> SelectionMode {
        if self.remove {
            SelectionMode::Difference
        } else if self.add {
            SelectionMode::Union
        } else {
            SelectionMode::Replace
        }
    }
}

/// How a stroke's matches are merged into the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Replace,
    Union,
    Difference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = ModifierBindings::default();
        assert_eq!(bindings.resolve(Modifiers::NONE), ModifierState::REPLACE);
        assert_eq!(bindings.resolve(Modifiers::shift()), ModifierState::ADD);
        assert_eq!(bindings.resolve(Modifiers::alt()), ModifierState::REMOVE);
        assert_eq!(bindings.resolve(Modifiers::ctrl()), ModifierState::REPLACE);
    }

    #[test]
    fn test_custom_bindings() {
        let bindings = ModifierBindings {
            add: ModifierKey::Ctrl,
            remove: ModifierKey::Meta,
        };
        assert_eq!(bindings.resolve(Modifiers::ctrl()), ModifierState::ADD);
        assert_eq!(bindings.resolve(Modifiers::shift()), ModifierState::REPLACE);
    }

    #[test]
    fn test_remove_takes_precedence() {
        let both = ModifierState {
            add: true,
            remove: true,
        };
        assert_eq!(both.mode(), SelectionMode::Difference);
        assert_eq!(ModifierState::ADD.mode(), SelectionMode::Union);
        assert_eq!(ModifierState::REPLACE.mode(), SelectionMode::Replace);
    }

    #[test]
    fn test_event_position() {
        let event = PointerEvent::Down {
            position: Point::new(3.0, 4.0),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        };
        assert_eq!(event.position(), Point::new(3.0, 4.0));
        assert!(MouseButton::Left.is_primary());
        assert!(!MouseButton::Right.is_primary());
    }
}
