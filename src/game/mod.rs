pub mod chart;
pub mod events;
pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod note;
pub mod prompt;
pub mod run_state;
pub mod scores;
pub mod scroll;
pub mod session;
pub mod song;
pub mod stage_stats;
pub mod timing;
