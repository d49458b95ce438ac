use crate::core::{audio, midi};
use crate::error::{AssetError, LoadError};
use crate::game::chart::{Chart, difficulty_count};
use crate::game::scores::HighscoreStore;
use crate::game::timing::DEFAULT_BPM;
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq)]
pub struct SongEntry {
    /// Folder name; also the highscore key.
    pub id: String,
    pub folder: PathBuf,
    pub midi_path: PathBuf,
    pub difficulties: usize,
    pub initial_bpm: f64,
    pub highscore: u32,
}

fn is_midi(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
}

/// The one MIDI file in `folder`.
pub fn find_midi(folder: &Path) -> Result<PathBuf, AssetError> {
    let entries = std::fs::read_dir(folder).map_err(|e| AssetError::Unreadable {
        path: folder.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_midi(p))
        .collect();
    match candidates.len() {
        0 => Err(AssetError::NotFound {
            folder: folder.to_path_buf(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => {
            candidates.sort();
            Err(AssetError::Ambiguous {
                folder: folder.to_path_buf(),
                candidates,
            })
        }
    }
}

/// Validates one song folder: a single MIDI with tracks and a tempo, and a
/// single playable audio file.
pub fn inspect_folder(folder: &Path, scores: &dyn HighscoreStore) -> Result<SongEntry, LoadError> {
    let id = folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let midi_path = find_midi(folder)?;
    let source = midi::load(&midi_path)?;
    Chart::validate(&source)?;
    audio::locate_clip(folder)?;

    let initial_bpm = source
        .tracks
        .iter()
        .flat_map(|t| t.events.iter())
        .find_map(|e| match e.kind {
            midi::MidiEventKind::Tempo { bpm } => Some(bpm),
            _ => None,
        })
        .unwrap_or(DEFAULT_BPM);

    Ok(SongEntry {
        highscore: scores.get(&id),
        difficulties: difficulty_count(&source),
        id,
        folder: folder.to_path_buf(),
        midi_path,
        initial_bpm,
    })
}

/// Every valid song under `music_dir`, sorted by folder name. Broken folders
/// are logged and skipped.
pub fn scan_library(music_dir: &Path, scores: &dyn HighscoreStore) -> Vec<SongEntry> {
    let Ok(read_dir) = std::fs::read_dir(music_dir) else {
        warn!("Music folder {music_dir:?} could not be read");
        return Vec::new();
    };
    let mut folders: Vec<PathBuf> = read_dir
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    folders.sort();

    let mut songs = Vec::with_capacity(folders.len());
    for folder in folders {
        match inspect_folder(&folder, scores) {
            Ok(entry) => songs.push(entry),
            Err(e) => warn!("Skipping {folder:?}: {e}"),
        }
    }
    info!("Found {} songs in {:?}", songs.len(), music_dir);
    songs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::scores::MemoryHighscores;

    // Format 1, two tracks: a 125 BPM conductor and one note track.
    fn tiny_smf(with_tempo: bool) -> Vec<u8> {
        let mut conductor = Vec::new();
        if with_tempo {
            conductor.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0x53, 0x00]);
        }
        conductor.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        let notes = vec![0x00, 0x90, 48, 100, 0x60, 0x80, 48, 0, 0x00, 0xFF, 0x2F, 0x00];

        let mut out = b"MThd".to_vec();
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&480u16.to_be_bytes());
        for body in [conductor, notes] {
            out.extend_from_slice(b"MTrk");
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }
        out
    }

    fn write_song(root: &Path, name: &str, with_tempo: bool, audio_files: &[&str]) {
        let folder = root.join(name);
        std::fs::create_dir_all(&folder).expect("song folder");
        std::fs::write(folder.join("chart.mid"), tiny_smf(with_tempo)).expect("midi");
        for file in audio_files {
            std::fs::write(folder.join(file), b"").expect("audio placeholder");
        }
    }

    #[test]
    fn scan_keeps_valid_songs_only() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let root = tmp.path();
        write_song(root, "b_good", true, &["song.wav"]);
        write_song(root, "a_good", true, &["song.mp3"]);
        write_song(root, "no_tempo", false, &["song.wav"]);
        write_song(root, "two_clips", true, &["a.mp3", "b.mp3"]);
        write_song(root, "no_audio", true, &[]);

        let mut scores = MemoryHighscores::new();
        crate::game::scores::HighscoreStore::set(&mut scores, "b_good", 420);
        let songs = scan_library(root, &scores);

        let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a_good", "b_good"]);
        assert_eq!(songs[1].highscore, 420);
        assert_eq!(songs[0].difficulties, 1);
        assert!((songs[0].initial_bpm - 125.0).abs() < 1e-9);
    }

    #[test]
    fn missing_music_folder_is_empty() {
        let scores = MemoryHighscores::new();
        let songs = scan_library(Path::new("/definitely/not/here/kickblips"), &scores);
        assert!(songs.is_empty());
    }

    #[test]
    fn find_midi_reports_ambiguity() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let root = tmp.path();
        std::fs::write(root.join("a.mid"), b"").expect("a");
        std::fs::write(root.join("b.MID"), b"").expect("b");
        assert!(matches!(find_midi(root), Err(AssetError::Ambiguous { .. })));
    }
}
