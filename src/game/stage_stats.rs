use crate::game::run_state::RunState;
use serde::Serialize;

/// Results of one finished session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub song_id: String,
    pub difficulty: Option<usize>,
    pub cleared: bool,
    pub score: u32,
    pub combo_high: u32,
    pub notes_hit: u32,
    pub notes_total: u32,
    pub previous_highscore: u32,
    pub new_highscore: bool,
}

impl StageSummary {
    /// `saved` is whether the score actually made it into the highscore
    /// store; only then is it reported as a new highscore.
    pub fn from_run(
        song_id: &str,
        difficulty: Option<usize>,
        cleared: bool,
        run: &RunState,
        previous_highscore: u32,
        saved: bool,
    ) -> Self {
        Self {
            song_id: song_id.to_string(),
            difficulty,
            cleared,
            score: run.score(),
            combo_high: run.combo_high(),
            notes_hit: run.notes_hit(),
            notes_total: run.notes_total(),
            previous_highscore,
            new_highscore: saved,
        }
    }

    pub fn hit_ratio(&self) -> f64 {
        if self.notes_total == 0 {
            0.0
        } else {
            f64::from(self.notes_hit) / f64::from(self.notes_total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with_hits(hits: u32, total: u32) -> RunState {
        let mut run = RunState::new(100, total);
        for _ in 0..hits {
            run.add_score(90);
            run.increment_combo();
            run.record_hit();
        }
        run
    }

    #[test]
    fn new_highscore_follows_the_save_result() {
        let run = run_with_hits(2, 4);
        let saved = StageSummary::from_run("song", Some(0), true, &run, 100, true);
        assert!(saved.new_highscore);
        assert_eq!(saved.score, 180);
        assert_eq!(saved.difficulty, Some(0));

        let unsaved = StageSummary::from_run("song", Some(0), true, &run, 100, false);
        assert!(!unsaved.new_highscore, "a failed write is not a new highscore");
        assert_eq!(unsaved.previous_highscore, 100);
    }

    #[test]
    fn hit_ratio_handles_empty_charts() {
        let empty = StageSummary::from_run("none", None, true, &RunState::default(), 0, false);
        assert_eq!(empty.hit_ratio(), 0.0);
        let half = StageSummary::from_run("half", None, true, &run_with_hits(2, 4), 0, false);
        assert!((half.hit_ratio() - 0.5).abs() < 1e-12);
    }
}
