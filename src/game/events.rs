use crate::game::prompt::{PromptId, PromptInput};
use serde::Serialize;

/// Notifications for whatever presents the game. Queued after the state
/// change they describe and drained once per tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    PromptSpawned {
        uid: PromptId,
        #[serde(skip)]
        first: Option<PromptInput>,
        #[serde(skip)]
        second: Option<PromptInput>,
    },
    PromptRetired {
        uid: PromptId,
        was_hit: bool,
    },
    ScoreChanged {
        score: u32,
        delta: u32,
    },
    ComboChanged {
        combo: u32,
        combo_high: u32,
    },
    HealthChanged {
        health: i32,
    },
    SessionEnded {
        cleared: bool,
    },
}
