use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Logical note buttons. Each one is bound to a MIDI pitch so chart notes can
/// be mapped to the button the player has to strike.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NoteAction {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
    FaceWest = 4,
    FaceSouth = 5,
    FaceNorth = 6,
    FaceEast = 7,
}

pub const NOTE_ACTIONS: [NoteAction; 8] = [
    NoteAction::Left,
    NoteAction::Down,
    NoteAction::Up,
    NoteAction::Right,
    NoteAction::FaceWest,
    NoteAction::FaceSouth,
    NoteAction::FaceNorth,
    NoteAction::FaceEast,
];

impl NoteAction {
    #[inline(always)]
    pub const fn flag(self) -> ActionSet {
        ActionSet::from_bits_truncate(1 << self as u8)
    }

    pub const fn ini_key(self) -> &'static str {
        match self {
            Self::Left => "Button1",
            Self::Down => "Button2",
            Self::Up => "Button3",
            Self::Right => "Button4",
            Self::FaceWest => "Button5",
            Self::FaceSouth => "Button6",
            Self::FaceNorth => "Button7",
            Self::FaceEast => "Button8",
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ActionSet: u8 {
        const LEFT = 1 << 0;
        const DOWN = 1 << 1;
        const UP = 1 << 2;
        const RIGHT = 1 << 3;
        const FACE_WEST = 1 << 4;
        const FACE_SOUTH = 1 << 5;
        const FACE_NORTH = 1 << 6;
        const FACE_EAST = 1 << 7;
    }
}

impl ActionSet {
    #[inline(always)]
    pub fn has(self, action: NoteAction) -> bool {
        self.contains(action.flag())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEdge {
    pub action: NoteAction,
    pub pressed: bool,
}

impl InputEdge {
    pub const fn press(action: NoteAction) -> Self {
        Self {
            action,
            pressed: true,
        }
    }

    pub const fn release(action: NoteAction) -> Self {
        Self {
            action,
            pressed: false,
        }
    }
}

/// What the engine sees for one tick: actions that went down this tick, and
/// everything currently held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputFrame {
    pub triggered: ActionSet,
    pub held: ActionSet,
}

impl InputFrame {
    #[inline(always)]
    pub fn any_triggered(&self) -> bool {
        !self.triggered.is_empty()
    }

    #[inline(always)]
    pub fn was_triggered(&self, action: NoteAction) -> bool {
        self.triggered.has(action)
    }

    #[inline(always)]
    pub fn is_held(&self, action: NoteAction) -> bool {
        self.held.has(action)
    }
}

/// Collects raw edges between ticks and folds them into an `InputFrame`.
/// A press only counts as a trigger on the up-to-down transition.
#[derive(Debug, Default)]
pub struct InputState {
    pending: VecDeque<InputEdge>,
    held: ActionSet,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, edge: InputEdge) {
        self.pending.push_back(edge);
    }

    pub fn take_frame(&mut self) -> InputFrame {
        let mut triggered = ActionSet::empty();
        while let Some(edge) = self.pending.pop_front() {
            let flag = edge.action.flag();
            let was_down = self.held.contains(flag);
            if edge.pressed {
                if !was_down {
                    triggered |= flag;
                }
                self.held |= flag;
            } else {
                self.held.remove(flag);
            }
        }
        InputFrame {
            triggered,
            held: self.held,
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.held = ActionSet::empty();
    }
}

/// Pitch → button table, plus the pitches that would rather sit on the
/// right-hand side of a two-button combination.
#[derive(Clone, Debug)]
pub struct InputBindings {
    by_pitch: FxHashMap<u8, NoteAction>,
    prefer_right: FxHashSet<u8>,
}

pub const DEFAULT_FIRST_PITCH: u8 = 48;

impl Default for InputBindings {
    fn default() -> Self {
        let mut by_pitch = FxHashMap::default();
        for (i, action) in NOTE_ACTIONS.iter().enumerate() {
            by_pitch.insert(DEFAULT_FIRST_PITCH + i as u8, *action);
        }
        // Face buttons sit on the right of the pad.
        let prefer_right = (DEFAULT_FIRST_PITCH + 4..DEFAULT_FIRST_PITCH + 8).collect();
        Self {
            by_pitch,
            prefer_right,
        }
    }
}

impl InputBindings {
    /// Rebinds `action` to `pitch`, dropping whatever pitch it had before.
    pub fn bind(&mut self, pitch: u8, action: NoteAction) {
        self.by_pitch.retain(|_, a| *a != action);
        self.by_pitch.insert(pitch, action);
    }

    pub fn set_prefer_right(&mut self, pitches: impl IntoIterator<Item = u8>) {
        self.prefer_right = pitches.into_iter().collect();
    }

    #[inline(always)]
    pub fn action_for(&self, pitch: u8) -> Option<NoteAction> {
        self.by_pitch.get(&pitch).copied()
    }

    #[inline(always)]
    pub fn prefers_right(&self, pitch: u8) -> bool {
        self.prefer_right.contains(&pitch)
    }

    pub fn pitch_for(&self, action: NoteAction) -> Option<u8> {
        self.by_pitch
            .iter()
            .find_map(|(p, a)| (*a == action).then_some(*p))
    }

    pub fn prefer_right_pitches(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.prefer_right.iter().copied().collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_triggers_only_on_rising_edge() {
        let mut input = InputState::new();
        input.queue(InputEdge::press(NoteAction::Left));
        let frame = input.take_frame();
        assert!(frame.was_triggered(NoteAction::Left));
        assert!(frame.is_held(NoteAction::Left));

        // Key repeat while held is not a new trigger.
        input.queue(InputEdge::press(NoteAction::Left));
        let frame = input.take_frame();
        assert!(!frame.was_triggered(NoteAction::Left));
        assert!(frame.is_held(NoteAction::Left));

        input.queue(InputEdge::release(NoteAction::Left));
        input.queue(InputEdge::press(NoteAction::Left));
        let frame = input.take_frame();
        assert!(
            frame.was_triggered(NoteAction::Left),
            "release then press inside one tick is a fresh trigger"
        );
    }

    #[test]
    fn empty_tick_has_no_triggers_but_keeps_held() {
        let mut input = InputState::new();
        input.queue(InputEdge::press(NoteAction::FaceEast));
        let _ = input.take_frame();
        let frame = input.take_frame();
        assert!(!frame.any_triggered());
        assert!(frame.is_held(NoteAction::FaceEast));
    }

    #[test]
    fn default_bindings_cover_pitches_48_to_55() {
        let bindings = InputBindings::default();
        assert_eq!(bindings.action_for(48), Some(NoteAction::Left));
        assert_eq!(bindings.action_for(55), Some(NoteAction::FaceEast));
        assert_eq!(bindings.action_for(60), None);
        assert!(bindings.prefers_right(52));
        assert!(!bindings.prefers_right(51));
        assert_eq!(bindings.pitch_for(NoteAction::Up), Some(50));
    }

    #[test]
    fn rebinding_moves_the_action() {
        let mut bindings = InputBindings::default();
        bindings.bind(60, NoteAction::Left);
        assert_eq!(bindings.action_for(60), Some(NoteAction::Left));
        assert_eq!(bindings.action_for(48), None);
    }
}
