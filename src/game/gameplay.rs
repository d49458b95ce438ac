use crate::core::input::{InputBindings, InputFrame};
use crate::game::chart::Chart;
use crate::game::events::GameEvent;
use crate::game::judgment::{JudgmentSettings, ListeningWindow, Verdict, hit_score};
use crate::game::life::HealthSettings;
use crate::game::prompt::{
    Prompt, PromptId, PromptInput, PromptPool, RetireNotice, RetireReason,
};
use crate::game::run_state::RunState;
use crate::game::scroll::{ScrollLayout, ScrollTrajectory};
use crate::game::timing::DEFAULT_CORRECTION_SECONDS;
use log::{debug, info};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

// Enough for every prompt that can be on screen at typical chart densities.
const INITIAL_POOL_CAPACITY: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub judgment: JudgmentSettings,
    pub health: HealthSettings,
    pub layout: ScrollLayout,
    /// Count-in correction in seconds at 100 BPM, scaled by the chart tempo.
    pub correction_seconds: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            judgment: JudgmentSettings::default(),
            health: HealthSettings::default(),
            layout: ScrollLayout::default(),
            correction_seconds: DEFAULT_CORRECTION_SECONDS,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    NoHealthLeft,
}

/// Turns a chart and a stream of input frames into prompts, judgments and
/// run-state changes. One `tick` per fixed step; the order inside a tick is
/// spawn, scroll, nearest-prompt, input, resolve, expire.
pub struct JudgmentEngine {
    chart: Chart,
    pool: PromptPool,
    run: RunState,
    settings: EngineSettings,
    bindings: InputBindings,
    spawn_cursor: usize,
    elapsed: f32,
    upcoming: Option<PromptId>,
    window: Option<ListeningWindow>,
    // Uids judged by a window but whose retire notice has not been handled
    // yet. Keeps the expiry path from punishing them a second time.
    judged: FxHashSet<PromptId>,
    events: Vec<GameEvent>,
    out_of_health: bool,
    log_timer: f32,
}

impl JudgmentEngine {
    pub fn new(chart: Chart, settings: EngineSettings, bindings: InputBindings) -> Self {
        let settings = EngineSettings {
            health: settings.health.sanitized(),
            ..settings
        };
        let run = RunState::new(settings.health.start, chart.combination_count() as u32);
        Self {
            chart,
            pool: PromptPool::with_capacity(INITIAL_POOL_CAPACITY),
            run,
            settings,
            bindings,
            spawn_cursor: 0,
            elapsed: 0.0,
            upcoming: None,
            window: None,
            judged: FxHashSet::default(),
            events: Vec::new(),
            out_of_health: false,
            log_timer: 0.0,
        }
    }

    /// Back to the state right after construction: notes unspawned, field
    /// empty, run state zeroed. Uids keep counting up.
    pub fn reset(&mut self) {
        self.pool.retire_all(RetireReason::Cleared);
        self.pool.drain_retired().for_each(drop);
        self.chart.reset_progress();
        self.run = RunState::new(
            self.settings.health.start,
            self.chart.combination_count() as u32,
        );
        self.spawn_cursor = 0;
        self.elapsed = 0.0;
        self.upcoming = None;
        self.window = None;
        self.judged.clear();
        self.events.clear();
        self.out_of_health = false;
        self.log_timer = 0.0;
    }

    pub fn tick(&mut self, delta_time: f32, frame: &InputFrame) -> TickOutcome {
        if self.out_of_health {
            return TickOutcome::NoHealthLeft;
        }
        self.elapsed += delta_time.max(0.0);

        self.spawn_due_notes();
        let expiring = self.advance_prompts();
        self.track_upcoming();
        self.handle_input(frame);
        if let Some((uid, verdict)) = self.poll_window() {
            self.resolve(uid, verdict);
        }
        // Scroll ends are retired after this tick's input has been judged; a
        // prompt hit on its last tick is already gone and this is a no-op.
        for uid in expiring {
            self.pool.retire(uid, RetireReason::Expired);
        }
        let outcome = self.apply_retire_notices();

        self.log_timer += delta_time;
        if self.log_timer >= 1.0 {
            info!(
                "Time: {:.2}, Score: {}, Combo: {}, Health: {}, Live Prompts: {}/{}",
                self.elapsed,
                self.run.score(),
                self.run.combo(),
                self.run.health(),
                self.pool.live_count(),
                self.pool.capacity()
            );
            self.log_timer -= 1.0;
        }
        outcome
    }

    /// Cancels the open window and sweeps every live prompt off the field
    /// without judging it.
    pub fn stop(&mut self) {
        if self.window.take().is_some() {
            debug!("Listening window cancelled by stop");
        }
        self.upcoming = None;
        let cleared = self.pool.retire_all(RetireReason::Cleared);
        if cleared > 0 {
            debug!("Cleared {cleared} live prompts on stop");
        }
        self.apply_retire_notices();
    }

    fn spawn_due_notes(&mut self) {
        let elapsed = self.elapsed;
        while self.spawn_cursor < self.chart.len() {
            let i = self.spawn_cursor;
            let notes = self.chart.notes();
            if notes[i].time >= elapsed {
                break;
            }
            if !notes[i].is_pending() {
                self.spawn_cursor += 1;
                continue;
            }

            let paired = i + 1 < notes.len() && notes[i + 1].time == notes[i].time;
            let mut first = i;
            let mut second = paired.then_some(i + 1);
            // A note that wants the right-hand side hands the first slot to
            // its partner. The chart order itself is left alone.
            if let Some(s) = second
                && self.bindings.prefers_right(notes[first].pitch)
            {
                second = Some(first);
                first = s;
            }

            let chart_notes = self.chart.notes_mut();
            chart_notes[first].spawn();
            if let Some(s) = second {
                chart_notes[s].spawn();
            }
            self.spawn_cursor += if paired { 2 } else { 1 };

            let first_input = self.input_for(first);
            let second_input = second.map(|s| self.input_for(s));
            let mut indices: SmallVec<[usize; 2]> = SmallVec::new();
            indices.push(first);
            indices.extend(second);

            let layout = self.settings.layout;
            let prompt = self.pool.spawn_at(layout.spawn_y);
            prompt.first = Some(first_input);
            prompt.second = second_input;
            prompt.attach_notes(&indices);
            prompt.begin_scroll(ScrollTrajectory::begin(elapsed, layout.transition_time));
            let uid = prompt.uid();

            if self.window.take().is_some() {
                debug!("Listening window cancelled by spawn of prompt {uid}");
            }
            self.events.push(GameEvent::PromptSpawned {
                uid,
                first: Some(first_input),
                second: second_input,
            });
        }
    }

    fn input_for(&self, note_idx: usize) -> PromptInput {
        let pitch = self.chart.notes()[note_idx].pitch;
        PromptInput {
            pitch,
            action: self.bindings.action_for(pitch),
        }
    }

    /// Moves every live prompt along its scroll and returns the uids whose
    /// scroll completed this tick.
    fn advance_prompts(&mut self) -> SmallVec<[PromptId; 4]> {
        let now = self.elapsed;
        let layout = self.settings.layout;
        let mut expiring = SmallVec::new();
        for prompt in self.pool.live_list_mut() {
            let Some(trajectory) = prompt.trajectory().copied() else {
                continue;
            };
            prompt.set_position(layout.position_at(trajectory.progress(now)));
            if trajectory.is_complete(now) {
                expiring.push(prompt.uid());
            }
        }
        expiring
    }

    fn apply_retire_notices(&mut self) -> TickOutcome {
        let notices: SmallVec<[RetireNotice; 4]> = self.pool.drain_retired().collect();
        for notice in notices {
            if self.window.as_ref().is_some_and(|w| w.uid() == notice.uid) {
                self.window = None;
            }
            if self.upcoming == Some(notice.uid) {
                self.upcoming = None;
            }
            let already_judged = self.judged.remove(&notice.uid);
            let was_hit = notice.reason == RetireReason::Hit;
            for &idx in &notice.notes {
                if let Some(note) = self.chart.notes_mut().get_mut(idx) {
                    note.pass(was_hit);
                }
            }
            self.events.push(GameEvent::PromptRetired {
                uid: notice.uid,
                was_hit,
            });

            if notice.reason == RetireReason::Expired && !already_judged && !self.out_of_health {
                debug!("Prompt {} expired unjudged", notice.uid);
                self.apply_miss();
            }
        }
        if self.out_of_health {
            TickOutcome::NoHealthLeft
        } else {
            TickOutcome::Continue
        }
    }

    fn track_upcoming(&mut self) {
        let max = self.settings.judgment.max_score_distance;
        let min_age = self.settings.judgment.minimum_reaction_seconds;
        let mut best = f32::MAX;
        let mut upcoming = None;
        for prompt in self.pool.live_list() {
            let age = prompt
                .trajectory()
                .map_or(0.0, |t| self.elapsed - t.started_at());
            if age < min_age {
                continue;
            }
            let distance = self.settings.layout.distance_to_line(prompt.position());
            if distance < best && distance < max {
                best = distance;
                upcoming = Some(prompt.uid());
            }
        }
        self.upcoming = upcoming;
    }

    fn handle_input(&mut self, frame: &InputFrame) {
        if frame.any_triggered()
            && let Some(uid) = self.upcoming
        {
            let keep = self.window.as_ref().is_some_and(|w| w.uid() == uid);
            if !keep {
                let needs_second = self.pool.get(uid).is_some_and(Prompt::is_combination);
                self.window = Some(ListeningWindow::open(
                    uid,
                    self.elapsed,
                    self.settings.judgment.input_listen_duration,
                    needs_second,
                ));
            }
        }

        let Some(window) = self.window.as_mut() else {
            return;
        };
        let Some(prompt) = self.pool.get(window.uid()) else {
            self.window = None;
            return;
        };
        let first = input_satisfied(prompt.first, frame);
        let second = prompt.second.is_some_and(|input| input_satisfied(Some(input), frame));
        window.latch(self.elapsed, first, second);
    }

    fn poll_window(&mut self) -> Option<(PromptId, Verdict)> {
        let verdict = self.window.as_ref()?.poll(self.elapsed)?;
        let window = self.window.take()?;
        Some((window.uid(), verdict))
    }

    fn resolve(&mut self, uid: PromptId, verdict: Verdict) {
        let Some(prompt) = self.pool.get(uid) else {
            return;
        };
        match verdict {
            Verdict::Hit => {
                // Scored on where the prompt is now, not where it was at the press.
                let distance = self.settings.layout.distance_to_line(prompt.position());
                let delta = hit_score(distance, self.settings.judgment.max_score_distance);
                self.run.add_score(delta);
                self.run.increment_combo();
                self.run.adjust_health(self.settings.health.recovery);
                self.run.record_hit();
                debug!("Prompt {uid} hit at distance {distance:.1} for {delta}");

                self.events.push(GameEvent::ScoreChanged {
                    score: self.run.score(),
                    delta,
                });
                self.push_combo_event();
                self.events.push(GameEvent::HealthChanged {
                    health: self.run.health(),
                });
                self.judged.insert(uid);
                self.pool.retire(uid, RetireReason::Hit);
            }
            Verdict::Miss => {
                debug!("Prompt {uid} missed: window closed");
                self.judged.insert(uid);
                self.pool.retire(uid, RetireReason::Missed);
                self.apply_miss();
            }
        }
    }

    fn apply_miss(&mut self) {
        self.run.reset_combo();
        self.run.adjust_health(-self.settings.health.depletion);
        self.push_combo_event();
        self.events.push(GameEvent::HealthChanged {
            health: self.run.health(),
        });
        if self.run.is_out_of_health() {
            info!("No health left at {:.2}s", self.elapsed);
            self.out_of_health = true;
            self.window = None;
        }
    }

    fn push_combo_event(&mut self) {
        self.events.push(GameEvent::ComboChanged {
            combo: self.run.combo(),
            combo_high: self.run.combo_high(),
        });
    }

    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GameEvent> {
        self.events.drain(..)
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_out_of_health(&self) -> bool {
        self.out_of_health
    }

    pub fn upcoming(&self) -> Option<&Prompt> {
        self.pool.get(self.upcoming?)
    }

    pub fn live_prompts(&self) -> impl Iterator<Item = &Prompt> {
        self.pool.live_list()
    }

    pub fn is_listening(&self) -> bool {
        self.window.is_some()
    }

    pub fn distance_to_line(&self, prompt: &Prompt) -> f32 {
        self.settings.layout.distance_to_line(prompt.position())
    }

    /// Every note has been spawned and nothing is left on the field.
    pub fn chart_exhausted(&self) -> bool {
        self.spawn_cursor >= self.chart.len() && self.pool.live_count() == 0
    }
}

/// A button with no pitch binding accepts any press.
fn input_satisfied(input: Option<PromptInput>, frame: &InputFrame) -> bool {
    match input {
        Some(PromptInput {
            action: Some(action),
            ..
        }) => frame.was_triggered(action),
        Some(PromptInput { action: None, .. }) => frame.any_triggered(),
        None => true,
    }
}
