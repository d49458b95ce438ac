use crate::core::audio::{self, AudioClip};
use crate::core::input::{InputBindings, InputEdge, InputState};
use crate::core::midi::{self, MidiSource};
use crate::error::{AssetError, LoadError, MidiError, SessionError};
use crate::game::chart::{Chart, TrackSelection};
use crate::game::events::GameEvent;
use crate::game::gameplay::{EngineSettings, JudgmentEngine, TickOutcome};
use crate::game::scores::HighscoreStore;
use crate::game::song;
use crate::game::stage_stats::StageSummary;
use crate::game::timing::lead_in_seconds;
use log::{info, warn};
use std::path::Path;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    CountingIn,
    Playing,
    Ended { cleared: bool },
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::CountingIn | Self::Playing)
    }
}

struct PendingLoad {
    song_id: String,
    selection: TrackSelection,
    chart: Option<Chart>,
    clip: Option<AudioClip>,
}

struct ActiveSession {
    song_id: String,
    selection: TrackSelection,
    engine: JudgmentEngine,
    clip: AudioClip,
    phase: SessionState,
    lead_in: f32,
    level_time: f32,
    summary: Option<StageSummary>,
}

impl ActiveSession {
    fn music_time(&self) -> f32 {
        self.level_time - self.lead_in
    }

    fn difficulty(&self) -> Option<usize> {
        match self.selection {
            TrackSelection::All => None,
            TrackSelection::Difficulty(n) => Some(n),
        }
    }
}

/// Owns at most one loaded session and at most one pending load. A load
/// replaces the current session only once both chart and clip have arrived;
/// a failed load is dropped and the previous session is left as it was. The
/// count-in and the song end are deadlines checked in `update`.
pub struct SessionController {
    settings: EngineSettings,
    bindings: InputBindings,
    scores: Box<dyn HighscoreStore>,
    pending: Option<PendingLoad>,
    session: Option<ActiveSession>,
    input: InputState,
    events: Vec<GameEvent>,
}

impl SessionController {
    pub fn new(
        settings: EngineSettings,
        bindings: InputBindings,
        scores: Box<dyn HighscoreStore>,
    ) -> Self {
        Self {
            settings,
            bindings,
            scores,
            pending: None,
            session: None,
            input: InputState::new(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.pending.is_some() {
            return SessionState::Loading;
        }
        self.session
            .as_ref()
            .map_or(SessionState::Idle, |s| s.phase)
    }

    /// Starts loading `song_id`. The chart and clip arrive later through
    /// `supply_midi` / `supply_audio`.
    pub fn play_song(&mut self, song_id: &str, selection: TrackSelection) -> Result<(), SessionError> {
        if self.state().is_active() {
            return Err(SessionError::AlreadyPlaying);
        }
        if let Some(prev) = self.pending.as_ref() {
            info!("Load of '{}' superseded by '{song_id}'", prev.song_id);
        }
        info!("Loading '{song_id}' ({selection:?})");
        self.pending = Some(PendingLoad {
            song_id: song_id.to_string(),
            selection,
            chart: None,
            clip: None,
        });
        Ok(())
    }

    pub fn supply_midi(&mut self, result: Result<MidiSource, MidiError>) -> Result<(), LoadError> {
        let pending = self.pending.as_mut().ok_or(SessionError::LoadIncomplete)?;
        let built = result
            .map_err(LoadError::from)
            .and_then(|source| Chart::build(&source, pending.selection).map_err(LoadError::from));
        match built {
            Ok(chart) => {
                pending.chart = Some(chart);
                Ok(())
            }
            Err(e) => Err(self.abort_load(e)),
        }
    }

    pub fn supply_audio(&mut self, result: Result<AudioClip, AssetError>) -> Result<(), LoadError> {
        let pending = self.pending.as_mut().ok_or(SessionError::LoadIncomplete)?;
        match result {
            Ok(clip) => {
                pending.clip = Some(clip);
                Ok(())
            }
            Err(e) => Err(self.abort_load(e.into())),
        }
    }

    /// `play_song` plus both fetches from a song folder on disk.
    pub fn load_from_folder(
        &mut self,
        folder: &Path,
        song_id: &str,
        selection: TrackSelection,
    ) -> Result<(), LoadError> {
        self.play_song(song_id, selection)?;
        let midi = match song::find_midi(folder) {
            Ok(path) => midi::load(&path),
            Err(e) => return Err(self.abort_load(e.into())),
        };
        self.supply_midi(midi)?;
        self.supply_audio(audio::fetch_clip(folder))
    }

    fn abort_load(&mut self, error: LoadError) -> LoadError {
        if let Some(pending) = self.pending.take() {
            warn!("Loading '{}' failed: {error}", pending.song_id);
        }
        error
    }

    pub fn queue_input(&mut self, edge: InputEdge) {
        if self.state().is_active() {
            self.input.queue(edge);
        }
    }

    /// Advances the session by one fixed step and returns the state after it.
    pub fn update(&mut self, delta_time: f32) -> SessionState {
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.chart.is_some() && p.clip.is_some())
        {
            self.begin_pending();
            return self.state();
        }

        let Some(session) = self.session.as_mut() else {
            return self.state();
        };
        if !session.phase.is_active() {
            return self.state();
        }

        let frame = self.input.take_frame();
        let outcome = session.engine.tick(delta_time, &frame);
        self.events.extend(session.engine.drain_events());
        session.level_time += delta_time;

        if session.phase == SessionState::CountingIn && session.level_time >= session.lead_in {
            session.phase = SessionState::Playing;
            info!("Music started for '{}'", session.song_id);
        }

        if outcome == TickOutcome::NoHealthLeft {
            self.finish(false);
        } else if session.phase == SessionState::Playing
            && session.music_time() >= session.clip.duration_seconds
        {
            let cleared = !session.engine.is_out_of_health();
            info!("Music end reached for '{}'", session.song_id);
            self.finish(cleared);
        }
        self.state()
    }

    fn begin_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let (Some(chart), Some(clip)) = (pending.chart, pending.clip) else {
            return;
        };
        let lead_in = lead_in_seconds(
            self.settings.layout.time_to_judgment_line(),
            self.settings.correction_seconds,
            chart.initial_bpm(),
        );
        if chart.is_empty() {
            warn!("'{}' has no notes on the selected track", pending.song_id);
        }
        let engine = JudgmentEngine::new(chart, self.settings, self.bindings.clone());
        info!(
            "Counting in '{}': {:.3}s lead-in, {:.2}s of music",
            pending.song_id, lead_in, clip.duration_seconds
        );
        self.input.clear();
        self.session = Some(ActiveSession {
            song_id: pending.song_id,
            selection: pending.selection,
            engine,
            clip,
            phase: SessionState::CountingIn,
            lead_in,
            level_time: 0.0,
            summary: None,
        });
    }

    fn finish(&mut self, cleared: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.engine.stop();
        self.events.extend(session.engine.drain_events());
        self.input.clear();

        let run = session.engine.run();
        let previous = self.scores.get(&session.song_id);
        let mut saved = false;
        if cleared && run.score() > previous {
            saved = self.scores.set(&session.song_id, run.score());
            if !saved {
                warn!("Could not save the highscore for '{}'", session.song_id);
            }
        }
        let summary = StageSummary::from_run(
            &session.song_id,
            session.difficulty(),
            cleared,
            run,
            previous,
            saved,
        );
        info!(
            "Session '{}' ended (cleared: {}): score {}, max combo {}, {}/{} hit",
            summary.song_id,
            cleared,
            summary.score,
            summary.combo_high,
            summary.notes_hit,
            summary.notes_total
        );
        session.summary = Some(summary);
        session.phase = SessionState::Ended { cleared };
        self.events.push(GameEvent::SessionEnded { cleared });
    }

    /// Ends an active session as not cleared. Nothing is saved. A pending
    /// load is dropped as well.
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending.take() {
            info!("Load of '{}' cancelled", pending.song_id);
        }
        if self.session.as_ref().is_some_and(|s| s.phase.is_active()) {
            self.finish(false);
        }
    }

    /// Replays the loaded song from the top with a fresh run.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.pending.is_some() {
            return Err(SessionError::LoadIncomplete);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::LoadIncomplete);
        };
        session.engine.stop();
        self.events.extend(session.engine.drain_events());
        session.engine.reset();
        session.phase = SessionState::CountingIn;
        session.level_time = 0.0;
        session.summary = None;
        self.input.clear();
        info!("Restarting '{}'", session.song_id);
        Ok(())
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GameEvent> {
        self.events.drain(..)
    }

    pub fn summary(&self) -> Option<&StageSummary> {
        self.session.as_ref()?.summary.as_ref()
    }

    pub fn engine(&self) -> Option<&JudgmentEngine> {
        self.session.as_ref().map(|s| &s.engine)
    }

    pub fn song_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.song_id.as_str())
    }

    pub fn lead_in(&self) -> Option<f32> {
        self.session.as_ref().map(|s| s.lead_in)
    }

    pub fn clip_seconds(&self) -> Option<f32> {
        self.session.as_ref().map(|s| s.clip.duration_seconds)
    }

    pub fn highscore(&self, song_id: &str) -> u32 {
        self.scores.get(song_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::NoteAction;
    use crate::core::midi::{MidiEvent, MidiTrack};
    use crate::game::scores::MemoryHighscores;
    use crate::game::scroll::ScrollLayout;

    const DT: f32 = 0.125;

    fn settings() -> EngineSettings {
        EngineSettings {
            layout: ScrollLayout {
                spawn_y: 300.0,
                judgment_y: 100.0,
                end_y: -100.0,
                transition_time: 2.0,
            },
            ..EngineSettings::default()
        }
    }

    fn controller() -> SessionController {
        SessionController::new(
            settings(),
            InputBindings::default(),
            Box::new(MemoryHighscores::new()),
        )
    }

    // 125 BPM at 480 TPQ: 1000 ticks per second.
    fn source(note_ticks: &[(u64, u8)]) -> MidiSource {
        let mut events = vec![MidiEvent::tempo(0, 125.0)];
        events.extend(note_ticks.iter().map(|&(t, p)| MidiEvent::note_on(t, p)));
        MidiSource {
            ticks_per_quarter: 480,
            tracks: vec![MidiTrack { events }],
        }
    }

    fn load(ctrl: &mut SessionController, id: &str, src: MidiSource, seconds: f32) {
        ctrl.play_song(id, TrackSelection::All).expect("play_song");
        ctrl.supply_midi(Ok(src)).expect("midi");
        ctrl.supply_audio(Ok(AudioClip::synthetic(seconds))).expect("audio");
        assert_eq!(ctrl.update(DT), SessionState::CountingIn);
    }

    fn run_until_ended(ctrl: &mut SessionController, max_ticks: usize) -> SessionState {
        for _ in 0..max_ticks {
            let state = ctrl.update(DT);
            if matches!(state, SessionState::Ended { .. }) {
                return state;
            }
        }
        ctrl.state()
    }

    #[test]
    fn load_waits_for_both_resources() {
        let mut ctrl = controller();
        assert_eq!(ctrl.state(), SessionState::Idle);
        ctrl.play_song("song", TrackSelection::All).expect("play");
        assert_eq!(ctrl.update(DT), SessionState::Loading);
        ctrl.supply_audio(Ok(AudioClip::synthetic(5.0))).expect("audio");
        assert_eq!(ctrl.update(DT), SessionState::Loading);
        ctrl.supply_midi(Ok(source(&[(1000, 48)]))).expect("midi");
        assert_eq!(ctrl.update(DT), SessionState::CountingIn);
    }

    #[test]
    fn count_in_then_music_then_song_end_clears() {
        let mut ctrl = controller();
        load(&mut ctrl, "short", source(&[]), 1.0);
        // 1.0s to the line minus 0.5 * 125 * 0.01 of correction.
        let lead_in = ctrl.lead_in().expect("lead-in");
        assert!((lead_in - 0.375).abs() < 1e-6);

        assert_eq!(ctrl.update(DT), SessionState::CountingIn);
        assert_eq!(ctrl.update(DT), SessionState::CountingIn);
        assert_eq!(ctrl.update(DT), SessionState::Playing);
        assert_eq!(
            run_until_ended(&mut ctrl, 20),
            SessionState::Ended { cleared: true }
        );
        let events: Vec<_> = ctrl.drain_events().collect();
        assert_eq!(events.last(), Some(&GameEvent::SessionEnded { cleared: true }));
    }

    #[test]
    fn no_health_left_ends_the_session_on_the_twentieth_miss() {
        let mut ctrl = controller();
        let notes: Vec<(u64, u8)> = (0..21).map(|i| (i * 500, 48)).collect();
        load(&mut ctrl, "hard", source(&notes), 120.0);

        let state = run_until_ended(&mut ctrl, 1000);
        assert_eq!(state, SessionState::Ended { cleared: false });
        let retired_misses = ctrl
            .drain_events()
            .filter(|e| matches!(e, GameEvent::PromptRetired { was_hit: false, .. }))
            .count();
        // 20 expiries, plus the 21st prompt swept away without penalty.
        assert_eq!(retired_misses, 21);

        let summary = ctrl.summary().expect("summary");
        assert!(!summary.cleared);
        assert_eq!(summary.notes_total, 21);
        assert_eq!(ctrl.engine().map(|e| e.run().health()), Some(0));
        assert_eq!(ctrl.highscore("hard"), 0, "a failed run saves nothing");
    }

    // A store whose writes always fail.
    struct ReadOnlyScores;

    impl HighscoreStore for ReadOnlyScores {
        fn get(&self, _song_id: &str) -> u32 {
            0
        }

        fn set(&mut self, _song_id: &str, _score: u32) -> bool {
            false
        }
    }

    fn play_hitting_every_prompt(ctrl: &mut SessionController) {
        for _ in 0..100 {
            let near = ctrl
                .engine()
                .and_then(|e| e.upcoming().map(|p| e.distance_to_line(p)))
                .is_some_and(|d| d < 1.0);
            if near {
                ctrl.queue_input(InputEdge::press(NoteAction::Left));
            }
            if matches!(ctrl.update(DT), SessionState::Ended { .. }) {
                break;
            }
            ctrl.queue_input(InputEdge::release(NoteAction::Left));
        }
    }

    #[test]
    fn cleared_run_saves_a_better_highscore() {
        let mut ctrl = controller();
        load(&mut ctrl, "one", source(&[(0, 48)]), 2.0);
        play_hitting_every_prompt(&mut ctrl);

        let summary = ctrl.summary().expect("summary").clone();
        assert!(summary.cleared);
        assert_eq!(summary.notes_hit, 1);
        assert!(summary.score > 0);
        assert!(summary.new_highscore);
        assert_eq!(ctrl.highscore("one"), summary.score);
    }

    #[test]
    fn failed_highscore_write_is_not_reported_as_new() {
        let mut ctrl = SessionController::new(
            settings(),
            InputBindings::default(),
            Box::new(ReadOnlyScores),
        );
        load(&mut ctrl, "one", source(&[(0, 48)]), 2.0);
        play_hitting_every_prompt(&mut ctrl);

        let summary = ctrl.summary().expect("summary");
        assert!(summary.cleared);
        assert!(summary.score > 0);
        assert!(!summary.new_highscore);
    }

    #[test]
    fn restart_mid_song_reports_swept_prompts() {
        let mut ctrl = controller();
        load(&mut ctrl, "mid", source(&[(0, 48), (100, 49)]), 10.0);
        for _ in 0..3 {
            ctrl.update(DT);
        }
        assert!(ctrl.engine().is_some_and(|e| e.live_prompts().count() == 2));
        ctrl.drain_events().for_each(drop);

        ctrl.restart().expect("restart");
        let retired: Vec<_> = ctrl
            .drain_events()
            .filter(|e| matches!(e, GameEvent::PromptRetired { was_hit: false, .. }))
            .collect();
        assert_eq!(
            retired,
            vec![
                GameEvent::PromptRetired { uid: 0, was_hit: false },
                GameEvent::PromptRetired { uid: 1, was_hit: false },
            ]
        );
        assert!(ctrl.engine().is_some_and(|e| e.live_prompts().count() == 0));
    }

    #[test]
    fn play_song_while_playing_is_rejected() {
        let mut ctrl = controller();
        load(&mut ctrl, "a", source(&[(500, 48)]), 10.0);
        assert_eq!(
            ctrl.play_song("b", TrackSelection::All),
            Err(SessionError::AlreadyPlaying)
        );
    }

    #[test]
    fn failed_load_leaves_the_previous_session_alone() {
        let mut ctrl = controller();
        load(&mut ctrl, "first", source(&[]), 0.5);
        let ended = run_until_ended(&mut ctrl, 50);
        let before = ctrl.summary().cloned();

        ctrl.play_song("second", TrackSelection::All).expect("play");
        assert_eq!(ctrl.state(), SessionState::Loading);
        let empty = MidiSource {
            ticks_per_quarter: 480,
            tracks: vec![],
        };
        let err = ctrl.supply_midi(Ok(empty)).expect_err("no tracks");
        assert!(matches!(err, LoadError::Chart(crate::error::ChartError::NoTracks)));

        assert_eq!(ctrl.state(), ended);
        assert_eq!(ctrl.song_id(), Some("first"));
        assert_eq!(ctrl.summary().cloned(), before);
        assert!(matches!(
            ctrl.supply_audio(Ok(AudioClip::synthetic(1.0))),
            Err(LoadError::Session(SessionError::LoadIncomplete))
        ));
    }

    #[test]
    fn missing_audio_aborts_the_load() {
        let mut ctrl = controller();
        ctrl.play_song("x", TrackSelection::All).expect("play");
        let err = ctrl.supply_audio(Err(AssetError::NotFound {
            folder: "x".into(),
        }));
        assert!(matches!(err, Err(LoadError::Asset(AssetError::NotFound { .. }))));
        assert_eq!(ctrl.state(), SessionState::Idle);
    }

    #[test]
    fn restart_without_a_loaded_song_fails() {
        let mut ctrl = controller();
        assert_eq!(ctrl.restart(), Err(SessionError::LoadIncomplete));
        ctrl.play_song("x", TrackSelection::All).expect("play");
        assert_eq!(ctrl.restart(), Err(SessionError::LoadIncomplete));
    }

    #[test]
    fn restart_replays_identical_times_with_a_fresh_run() {
        let mut ctrl = controller();
        load(&mut ctrl, "again", source(&[(0, 48), (250, 49), (250, 50)]), 3.0);
        let times = ctrl.engine().map(|e| e.chart().times()).expect("engine");
        run_until_ended(&mut ctrl, 200);
        assert!(ctrl.engine().is_some_and(|e| e.run().health() < 100));

        ctrl.restart().expect("restart");
        assert_eq!(ctrl.state(), SessionState::CountingIn);
        let engine = ctrl.engine().expect("engine");
        assert_eq!(engine.chart().times(), times);
        assert_eq!(engine.run().score(), 0);
        assert_eq!(engine.run().combo_high(), 0);
        assert_eq!(engine.run().health(), 100);
        assert_eq!(engine.run().notes_hit(), 0);
        assert!(ctrl.summary().is_none());
    }

    #[test]
    fn stop_ends_uncleared_and_sweeps_prompts() {
        let mut ctrl = controller();
        load(&mut ctrl, "s", source(&[(0, 48), (100, 49)]), 10.0);
        for _ in 0..3 {
            ctrl.update(DT);
        }
        assert!(ctrl.engine().is_some_and(|e| e.live_prompts().count() == 2));
        ctrl.stop();
        assert_eq!(ctrl.state(), SessionState::Ended { cleared: false });
        assert!(ctrl.engine().is_some_and(|e| e.live_prompts().count() == 0 && !e.is_listening()));
        assert_eq!(ctrl.engine().map(|e| e.run().health()), Some(100));
    }
}
