use crate::config::{self, Config};
use crate::core::input::{InputEdge, NOTE_ACTIONS, NoteAction};
use crate::game::chart::TrackSelection;
use crate::game::prompt::PromptId;
use crate::game::scores::{DiskHighscores, HighscoreStore, MemoryHighscores};
use crate::game::session::{SessionController, SessionState};
use crate::game::song::{self, SongEntry};
use crate::game::stage_stats::StageSummary;
use clap::Parser;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use std::error::Error;
use std::path::PathBuf;

// The bot presses once the prompt is this close to the line.
const AUTOPLAY_TOLERANCE: f32 = 8.0;
// Seconds of silence allowed past the end of the music before giving up.
const RUN_SLACK_SECONDS: f32 = 10.0;

fn parse_difficulty(s: &str) -> Result<TrackSelection, String> {
    config::parse_difficulty(s).ok_or_else(|| format!("expected 'all' or a track number, got '{s}'"))
}

fn parse_probability(s: &str) -> Result<f64, String> {
    let p: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{p} is outside 0.0..=1.0"))
    }
}

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "kickblips", about = "Plays a MIDI-charted song headlessly and prints the result")]
pub struct RunOptions {
    /// Song folder to play; the first song in the library when omitted
    pub song: Option<String>,

    /// Note track to play: a difficulty number or "all" (default from config)
    #[arg(long, value_parser = parse_difficulty)]
    pub difficulty: Option<TrackSelection>,

    /// List the songs in the music folder and exit
    #[arg(long)]
    pub list: bool,

    /// Let the bot play
    #[arg(long)]
    pub autoplay: bool,

    /// Probability that the bot skips a prompt
    #[arg(long, default_value_t = 0.0, value_parser = parse_probability)]
    pub miss_chance: f64,

    /// Seed for the bot
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Print the stage summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Keep highscores in memory only
    #[arg(long)]
    pub no_save: bool,

    /// Config file
    #[arg(long = "config", default_value = config::CONFIG_PATH)]
    pub config_path: PathBuf,
}

/// Stands in for the player: presses the upcoming prompt's buttons as it
/// crosses the line, skipping a seeded share of prompts.
pub struct AutoPlayer {
    rng: StdRng,
    miss_chance: f64,
    last_seen: Option<PromptId>,
    held: SmallVec<[NoteAction; 2]>,
}

impl AutoPlayer {
    pub fn new(seed: u64, miss_chance: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            miss_chance: miss_chance.clamp(0.0, 1.0),
            last_seen: None,
            held: SmallVec::new(),
        }
    }

    /// Queues this tick's presses. Call before `SessionController::update`.
    pub fn press(&mut self, ctrl: &mut SessionController) {
        let Some(engine) = ctrl.engine() else {
            return;
        };
        let Some(prompt) = engine.upcoming() else {
            return;
        };
        if self.last_seen == Some(prompt.uid())
            || engine.distance_to_line(prompt) > AUTOPLAY_TOLERANCE
        {
            return;
        }
        self.last_seen = Some(prompt.uid());
        if self.rng.random_bool(self.miss_chance) {
            debug!("Autoplay skipping prompt {}", prompt.uid());
            return;
        }
        // Unbound pitches accept any button.
        let first = prompt.first.and_then(|i| i.action).unwrap_or(NOTE_ACTIONS[0]);
        self.held.push(first);
        if let Some(second) = prompt.second {
            let action = second.action.unwrap_or(NOTE_ACTIONS[1]);
            if action != first {
                self.held.push(action);
            }
        }
        for &action in &self.held {
            ctrl.queue_input(InputEdge::press(action));
        }
    }

    /// Releases whatever `press` pushed. Call after `update`.
    pub fn release(&mut self, ctrl: &mut SessionController) {
        for action in self.held.drain(..) {
            ctrl.queue_input(InputEdge::release(action));
        }
    }
}

fn print_library(songs: &[SongEntry]) {
    if songs.is_empty() {
        println!("No songs found.");
        return;
    }
    for s in songs {
        println!(
            "{:<32} {:>2} difficulties  {:>7.2} BPM  best {}",
            s.id, s.difficulties, s.initial_bpm, s.highscore
        );
    }
}

fn print_summary(summary: &StageSummary, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    let difficulty = summary
        .difficulty
        .map_or_else(|| "all tracks".to_string(), |d| d.to_string());
    println!("Song:        {}", summary.song_id);
    println!("Difficulty:  {difficulty}");
    println!("Result:      {}", if summary.cleared { "CLEARED" } else { "FAILED" });
    println!("Score:       {}", summary.score);
    println!("Max combo:   {}", summary.combo_high);
    println!(
        "Notes hit:   {}/{} ({:.1}%)",
        summary.notes_hit,
        summary.notes_total,
        summary.hit_ratio() * 100.0
    );
    if summary.new_highscore {
        println!("New highscore! (previous {})", summary.previous_highscore);
    }
    Ok(())
}

/// Runs one song to the end with a fixed step. Returns `None` if the session
/// never ended within the allotted time.
pub fn drive_session(
    ctrl: &mut SessionController,
    tick_seconds: f32,
    max_seconds: f32,
    mut bot: Option<&mut AutoPlayer>,
) -> Option<StageSummary> {
    let max_ticks = (max_seconds / tick_seconds).ceil().max(1.0) as usize;
    for _ in 0..max_ticks {
        if let Some(bot) = bot.as_deref_mut() {
            bot.press(ctrl);
        }
        let state = ctrl.update(tick_seconds);
        if let Some(bot) = bot.as_deref_mut() {
            bot.release(ctrl);
        }
        for event in ctrl.drain_events() {
            debug!("{event:?}");
        }
        if let SessionState::Ended { .. } = state {
            return ctrl.summary().cloned();
        }
    }
    warn!("Session did not end within {max_seconds:.1}s; stopping it");
    ctrl.stop();
    ctrl.summary().cloned()
}

pub fn run(config: &Config, opts: &RunOptions) -> Result<(), Box<dyn Error>> {
    debug!(
        "Preferences: music volume {}, sfx volume {}, resolution index {}",
        config.music_volume, config.sfx_volume, config.resolution_index
    );
    let scores: Box<dyn HighscoreStore> = if opts.no_save {
        Box::new(MemoryHighscores::new())
    } else {
        let store = DiskHighscores::new(&config.save_folder);
        info!("Highscores stored in {:?}", store.dir());
        Box::new(store)
    };

    let songs = song::scan_library(&config.music_folder, scores.as_ref());
    if opts.list {
        print_library(&songs);
        return Ok(());
    }

    let entry = match &opts.song {
        Some(id) => songs
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| format!("song '{id}' not found in {:?}", config.music_folder))?,
        None => songs
            .first()
            .ok_or_else(|| format!("no songs in {:?}", config.music_folder))?,
    };
    let selection = opts.difficulty.unwrap_or(config.difficulty);

    let mut ctrl = SessionController::new(config.engine, config.bindings.clone(), scores);
    ctrl.load_from_folder(&entry.folder, &entry.id, selection)?;
    // One tick to move from Loading into the count-in.
    ctrl.update(0.0);

    // The clip decides when the song ends; this only bounds a runaway loop.
    let budget = ctrl.lead_in().unwrap_or(0.0) + ctrl.clip_seconds().unwrap_or(0.0) + RUN_SLACK_SECONDS;

    let mut bot = opts.autoplay.then(|| AutoPlayer::new(opts.seed, opts.miss_chance));
    let summary = drive_session(&mut ctrl, config.tick_seconds(), budget, bot.as_mut())
        .ok_or("session produced no summary")?;
    print_summary(&summary, opts.json)
}
