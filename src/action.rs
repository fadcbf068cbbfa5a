//! Semantic navigation actions produced by the key translator.

use crate::event::Button;
use std::fmt;
use std::str::FromStr;

/// One of the four vim directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Down,
    Up,
    Right,
}

impl Direction {
    /// Unit vector in screen coordinates (y grows downward).
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Down => (0.0, 1.0),
            Direction::Up => (0.0, -1.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    /// Unit vector in wheel coordinates (up and right are positive).
    pub fn scroll_unit(self) -> (f64, f64) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Down => (0.0, -1.0),
            Direction::Up => (0.0, 1.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::Right => "right",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Direction::Left),
            "down" => Some(Direction::Down),
            "up" => Some(Direction::Up),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Cursor step size for a held direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Magnitude {
    Normal,
    /// Cursor speed divided by the precision divisor.
    Precise,
}

/// Behaviours that last for as long as a key is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldKind {
    /// Slow every cursor direction down.
    Precision,
}

/// A screen edge, used by jump actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    fn name(self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
            Edge::Right => "right",
        }
    }
}

/// What a bound key means while navigation mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationAction {
    MoveCursor(Direction, Magnitude),
    Scroll(Direction),
    Click(Button),
    ToggleMode,
    ModifierHold(HoldKind),
    /// Press the left button and keep it down until toggled again.
    ToggleDrag,
    JumpToEdge(Edge),
}

impl NavigationAction {
    /// Whether holding the key keeps the action going across ticks.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            NavigationAction::MoveCursor(..)
                | NavigationAction::Scroll(_)
                | NavigationAction::ModifierHold(_)
        )
    }
}

impl fmt::Display for NavigationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationAction::MoveCursor(dir, Magnitude::Normal) => {
                write!(f, "move-{}", dir.name())
            }
            NavigationAction::MoveCursor(dir, Magnitude::Precise) => {
                write!(f, "fine-{}", dir.name())
            }
            NavigationAction::Scroll(dir) => write!(f, "scroll-{}", dir.name()),
            NavigationAction::Click(Button::Left) => f.write_str("click-left"),
            NavigationAction::Click(Button::Right) => f.write_str("click-right"),
            NavigationAction::Click(Button::Middle) => f.write_str("click-middle"),
            NavigationAction::ToggleMode => f.write_str("toggle"),
            NavigationAction::ModifierHold(HoldKind::Precision) => f.write_str("precision"),
            NavigationAction::ToggleDrag => f.write_str("toggle-drag"),
            NavigationAction::JumpToEdge(edge) => write!(f, "jump-{}", edge.name()),
        }
    }
}

impl FromStr for NavigationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let parsed = match s.as_str() {
            "click-left" => Some(NavigationAction::Click(Button::Left)),
            "click-right" => Some(NavigationAction::Click(Button::Right)),
            "click-middle" => Some(NavigationAction::Click(Button::Middle)),
            "toggle" => Some(NavigationAction::ToggleMode),
            "precision" => Some(NavigationAction::ModifierHold(HoldKind::Precision)),
            "toggle-drag" => Some(NavigationAction::ToggleDrag),
            "jump-top" => Some(NavigationAction::JumpToEdge(Edge::Top)),
            "jump-bottom" => Some(NavigationAction::JumpToEdge(Edge::Bottom)),
            "jump-left" => Some(NavigationAction::JumpToEdge(Edge::Left)),
            "jump-right" => Some(NavigationAction::JumpToEdge(Edge::Right)),
            other => match other.split_once('-') {
                Some(("move", dir)) => Direction::parse(dir)
                    .map(|d| NavigationAction::MoveCursor(d, Magnitude::Normal)),
                Some(("fine", dir)) => Direction::parse(dir)
                    .map(|d| NavigationAction::MoveCursor(d, Magnitude::Precise)),
                Some(("scroll", dir)) => Direction::parse(dir).map(NavigationAction::Scroll),
                _ => None,
            },
        };
        parsed.ok_or_else(|| format!("unknown action '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for name in [
            "move-left",
            "fine-up",
            "scroll-down",
            "click-middle",
            "toggle-drag",
            "jump-bottom",
            "precision",
        ] {
            let action: NavigationAction = name.parse().unwrap();
            assert_eq!(action.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!("move-sideways".parse::<NavigationAction>().is_err());
        assert!("yank".parse::<NavigationAction>().is_err());
    }

    #[test]
    fn test_direction_units() {
        assert_eq!(Direction::Down.unit(), (0.0, 1.0));
        assert_eq!(Direction::Down.scroll_unit(), (0.0, -1.0));
        assert_eq!(Direction::Right.scroll_unit(), (1.0, 0.0));
    }

    #[test]
    fn test_continuous_actions() {
        assert!(NavigationAction::Scroll(Direction::Up).is_continuous());
        assert!(!NavigationAction::Click(Button::Left).is_continuous());
        assert!(!NavigationAction::ToggleMode.is_continuous());
    }
}
