use crate::core::input::{InputBindings, NOTE_ACTIONS};
use crate::game::chart::TrackSelection;
use crate::game::gameplay::EngineSettings;
use crate::game::judgment::JudgmentSettings;
use crate::game::life::HealthSettings;
use crate::game::scroll::ScrollLayout;
use ini::Ini;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_PATH: &str = "kickblips.ini";

const DEFAULT_MUSIC_FOLDER: &str = "Music";
const FALLBACK_SAVE_FOLDER: &str = "save/highscores";
const DEFAULT_TICK_RATE_HZ: u32 = 120;
const MIN_TICK_RATE_HZ: u32 = 10;
const MAX_TICK_RATE_HZ: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

pub(crate) fn parse_difficulty(s: &str) -> Option<TrackSelection> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("all") {
        return Some(TrackSelection::All);
    }
    s.parse::<usize>().ok().map(TrackSelection::Difficulty)
}

fn difficulty_str(selection: TrackSelection) -> String {
    match selection {
        TrackSelection::All => "All".to_string(),
        TrackSelection::Difficulty(n) => n.to_string(),
    }
}

fn parse_pitch_list(s: &str) -> Option<Vec<u8>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u8>().ok().filter(|v| *v <= 127))
        .collect()
}

/// Empty means the platform data directory.
pub fn resolve_save_folder(configured: &str) -> PathBuf {
    let configured = configured.trim();
    if !configured.is_empty() {
        return PathBuf::from(configured);
    }
    directories::ProjectDirs::from("", "", "kickblips")
        .map(|dirs| dirs.data_dir().join("highscores"))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_SAVE_FOLDER))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: LogLevel,
    pub music_folder: PathBuf,
    pub save_folder: PathBuf,
    pub tick_rate_hz: u32,
    pub music_volume: u8,
    pub sfx_volume: u8,
    pub resolution_index: usize,
    pub difficulty: TrackSelection,
    pub engine: EngineSettings,
    pub bindings: InputBindings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            music_folder: PathBuf::from(DEFAULT_MUSIC_FOLDER),
            save_folder: resolve_save_folder(""),
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            music_volume: 100,
            sfx_volume: 100,
            resolution_index: 0,
            difficulty: TrackSelection::All,
            engine: EngineSettings::default(),
            bindings: InputBindings::default(),
        }
    }
}

impl Config {
    #[inline(always)]
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate_hz as f32
    }

    /// Reads every known key, keeping the default for anything missing or
    /// malformed.
    pub fn from_ini(conf: &Ini) -> Self {
        let default = Self::default();
        let opt = |section: &str, key: &str| conf.get_from(Some(section), key);
        let float = |section: &str, key: &str, fallback: f32| {
            opt(section, key)
                .and_then(|v| v.trim().parse::<f32>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(fallback)
        };
        let int = |section: &str, key: &str, fallback: i32| {
            opt(section, key)
                .and_then(|v| v.trim().parse::<i32>().ok())
                .unwrap_or(fallback)
        };

        let log_level = opt("Options", "LogLevel")
            .and_then(|v| LogLevel::from_str(v).ok())
            .unwrap_or(default.log_level);
        let music_folder = opt("Options", "MusicFolder")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or(default.music_folder, PathBuf::from);
        let save_folder = opt("Options", "SaveFolder")
            .map_or(default.save_folder, resolve_save_folder);
        let tick_rate_hz = opt("Options", "TickRateHz")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .map_or(default.tick_rate_hz, |v| v.clamp(MIN_TICK_RATE_HZ, MAX_TICK_RATE_HZ));
        let music_volume = opt("Options", "MusicVolume")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .map_or(default.music_volume, |v| v.min(100));
        let sfx_volume = opt("Options", "SFXVolume")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .map_or(default.sfx_volume, |v| v.min(100));
        let resolution_index = opt("Options", "ResolutionIndex")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(default.resolution_index);
        let difficulty = opt("Options", "Difficulty")
            .and_then(parse_difficulty)
            .unwrap_or(default.difficulty);

        let d = default.engine;
        let judgment = JudgmentSettings {
            max_score_distance: float("Judgment", "MaxScoreDistance", d.judgment.max_score_distance)
                .max(f32::EPSILON),
            input_listen_duration: float("Judgment", "InputListenDuration", d.judgment.input_listen_duration)
                .max(0.0),
            minimum_reaction_seconds: float(
                "Judgment",
                "MinimumReactionSeconds",
                d.judgment.minimum_reaction_seconds,
            )
            .max(0.0),
        };
        let layout = ScrollLayout {
            spawn_y: float("Judgment", "SpawnY", d.layout.spawn_y),
            judgment_y: float("Judgment", "JudgmentLineY", d.layout.judgment_y),
            end_y: float("Judgment", "EndY", d.layout.end_y),
            transition_time: float("Judgment", "TransitionTime", d.layout.transition_time)
                .max(f32::EPSILON),
        };
        let health = HealthSettings {
            start: int("Health", "Start", d.health.start),
            recovery: int("Health", "Recovery", d.health.recovery),
            depletion: int("Health", "Depletion", d.health.depletion),
        }
        .sanitized();
        let engine = EngineSettings {
            judgment,
            health,
            layout,
            correction_seconds: float("Judgment", "CorrectionSecondsAt100Bpm", d.correction_seconds),
        };

        let mut bindings = default.bindings;
        for action in NOTE_ACTIONS {
            if let Some(pitch) = opt("Bindings", action.ini_key())
                .and_then(|v| v.trim().parse::<u8>().ok())
                .filter(|v| *v <= 127)
            {
                bindings.bind(pitch, action);
            }
        }
        if let Some(pitches) = opt("Bindings", "PreferRight").and_then(parse_pitch_list) {
            bindings.set_prefer_right(pitches);
        }

        Self {
            log_level,
            music_folder,
            save_folder,
            tick_rate_hz,
            music_volume,
            sfx_volume,
            resolution_index,
            difficulty,
            engine,
            bindings,
        }
    }

    fn to_ini(&self, save_folder_value: &str) -> Ini {
        let e = &self.engine;
        let mut conf = Ini::new();
        // Keys in alphabetical order within each section.
        conf.with_section(Some("Options"))
            .set("Difficulty", difficulty_str(self.difficulty))
            .set("LogLevel", self.log_level.as_str())
            .set("MusicFolder", self.music_folder.to_string_lossy())
            .set("MusicVolume", self.music_volume.to_string())
            .set("ResolutionIndex", self.resolution_index.to_string())
            .set("SFXVolume", self.sfx_volume.to_string())
            .set("SaveFolder", save_folder_value)
            .set("TickRateHz", self.tick_rate_hz.to_string());
        conf.with_section(Some("Judgment"))
            .set("CorrectionSecondsAt100Bpm", e.correction_seconds.to_string())
            .set("EndY", e.layout.end_y.to_string())
            .set("InputListenDuration", e.judgment.input_listen_duration.to_string())
            .set("JudgmentLineY", e.layout.judgment_y.to_string())
            .set("MaxScoreDistance", e.judgment.max_score_distance.to_string())
            .set("MinimumReactionSeconds", e.judgment.minimum_reaction_seconds.to_string())
            .set("SpawnY", e.layout.spawn_y.to_string())
            .set("TransitionTime", e.layout.transition_time.to_string());
        conf.with_section(Some("Health"))
            .set("Depletion", e.health.depletion.to_string())
            .set("Recovery", e.health.recovery.to_string())
            .set("Start", e.health.start.to_string());
        for action in NOTE_ACTIONS {
            if let Some(pitch) = self.bindings.pitch_for(action) {
                conf.with_section(Some("Bindings"))
                    .set(action.ini_key(), pitch.to_string());
            }
        }
        let prefer_right: Vec<String> = self
            .bindings
            .prefer_right_pitches()
            .iter()
            .map(u8::to_string)
            .collect();
        conf.with_section(Some("Bindings"))
            .set("PreferRight", prefer_right.join(","));
        conf
    }
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    Config::default().to_ini("").write_to_file(path)
}

/// Loads `path`, writing a default file first if there is none. Never fails:
/// problems are logged and defaults used.
pub fn load(path: &Path) -> Config {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(path) {
        Ok(conf) => {
            let cfg = Config::from_ini(&conf);
            info!("Configuration loaded from '{}'.", path.display());
            cfg
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using defaults.", path.display());
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::NoteAction;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let conf = Ini::load_from_str("[Options]\nLogLevel=Debug\n").expect("parse");
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.engine, EngineSettings::default());
        assert_eq!(cfg.difficulty, TrackSelection::All);
        assert_eq!(cfg.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
    }

    #[test]
    fn malformed_values_are_ignored_and_ranges_clamped() {
        let text = "\
[Options]
LogLevel=loud
TickRateHz=5
MusicVolume=250
Difficulty=2

[Judgment]
MaxScoreDistance=abc
InputListenDuration=0.5
TransitionTime=3

[Health]
Start=500
Depletion=-4
";
        let conf = Ini::load_from_str(text).expect("parse");
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.log_level, LogLevel::Warn);
        assert_eq!(cfg.tick_rate_hz, MIN_TICK_RATE_HZ);
        assert_eq!(cfg.music_volume, 100);
        assert_eq!(cfg.difficulty, TrackSelection::Difficulty(2));
        assert_eq!(cfg.engine.judgment.max_score_distance, 130.0);
        assert_eq!(cfg.engine.judgment.input_listen_duration, 0.5);
        assert_eq!(cfg.engine.layout.transition_time, 3.0);
        assert_eq!(cfg.engine.health.start, 100);
        assert_eq!(cfg.engine.health.depletion, 0);
    }

    #[test]
    fn bindings_section_rebinds_and_sets_right_side() {
        let text = "[Bindings]\nButton1=60\nButton2=999\nPreferRight=60, 61\n";
        let conf = Ini::load_from_str(text).expect("parse");
        let cfg = Config::from_ini(&conf);
        assert_eq!(cfg.bindings.action_for(60), Some(NoteAction::Left));
        assert_eq!(cfg.bindings.action_for(49), Some(NoteAction::Down), "bad pitch keeps default");
        assert!(cfg.bindings.prefers_right(61));
        assert!(!cfg.bindings.prefers_right(52));
    }

    #[test]
    fn default_file_is_written_and_read_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_PATH);

        let cfg = load(&path);
        assert!(path.exists());
        assert_eq!(cfg.engine, EngineSettings::default());
        assert_eq!(cfg.bindings.action_for(55), Some(NoteAction::FaceEast));
        assert_eq!(cfg.bindings.prefer_right_pitches(), vec![52, 53, 54, 55]);
    }

    #[test]
    fn empty_save_folder_resolves_somewhere() {
        assert!(!resolve_save_folder("").as_os_str().is_empty());
        assert_eq!(resolve_save_folder(" scores "), PathBuf::from("scores"));
    }
}
