use bincode::{Decode, Encode};
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use twox_hash::XxHash64;

/// Per-song best score, keyed by the song's folder name.
pub trait HighscoreStore {
    /// Zero when nothing has been stored yet.
    fn get(&self, song_id: &str) -> u32;
    fn set(&mut self, song_id: &str, score: u32) -> bool;
}

// --- On-disk store ---

#[derive(Debug, Clone, Encode, Decode)]
struct HighscoreEntry {
    song_id: String,
    score: u32,
    achieved_at_ms: i64,
}

/// One bincode record per song, named by a hash of the song id so folder
/// names never have to be valid file names.
#[derive(Debug, Clone)]
pub struct DiskHighscores {
    dir: PathBuf,
}

impl DiskHighscores {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, song_id: &str) -> PathBuf {
        let hash = XxHash64::oneshot(0, song_id.as_bytes());
        self.dir.join(format!("{hash:016x}.bin"))
    }

    fn load_entry(&self, song_id: &str) -> Option<HighscoreEntry> {
        let path = self.path_for(song_id);
        let bytes = fs::read(&path).ok()?;
        match bincode::decode_from_slice::<HighscoreEntry, _>(&bytes, bincode::config::standard()) {
            // A hash collision reads as "no score" rather than someone else's.
            Ok((entry, _)) if entry.song_id == song_id => Some(entry),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring unreadable highscore file {path:?}: {e}");
                None
            }
        }
    }
}

impl HighscoreStore for DiskHighscores {
    fn get(&self, song_id: &str) -> u32 {
        self.load_entry(song_id).map_or(0, |e| e.score)
    }

    fn set(&mut self, song_id: &str, score: u32) -> bool {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!("Failed to create highscore dir {:?}: {}", self.dir, e);
            return false;
        }
        let entry = HighscoreEntry {
            song_id: song_id.to_string(),
            score,
            achieved_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        let path = self.path_for(song_id);
        match bincode::encode_to_vec(&entry, bincode::config::standard()) {
            Ok(buf) => {
                if let Err(e) = fs::write(&path, buf) {
                    warn!("Failed to write highscore file {path:?}: {e}");
                    false
                } else {
                    info!("Stored highscore {score} for '{song_id}' at {path:?}");
                    true
                }
            }
            Err(e) => {
                warn!("Failed to encode highscore for '{song_id}': {e}");
                false
            }
        }
    }
}

// --- In-memory store ---

#[derive(Debug, Default, Clone)]
pub struct MemoryHighscores {
    scores: FxHashMap<String, u32>,
}

impl MemoryHighscores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HighscoreStore for MemoryHighscores {
    fn get(&self, song_id: &str) -> u32 {
        self.scores.get(song_id).copied().unwrap_or(0)
    }

    fn set(&mut self, song_id: &str, score: u32) -> bool {
        self.scores.insert(song_id.to_string(), score);
        true
    }
}
