use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::warn;

use crate::quiz::GameResult;

/// Lifetime counters kept across sessions. Mutated exactly once per
/// completed game; the session is responsible for calling `record_game`
/// exactly once.
pub trait StatisticsStore {
    fn record_game(&mut self, correct: u32, total: u32);
    fn best_game(&self) -> GameResult;
    /// Percentage of correct answers across all recorded games,
    /// 0.0 when nothing has been recorded yet.
    fn total_accuracy(&self) -> f64;
    fn games_count(&self) -> u32;
}

// The same scalars the app has always persisted, one JSON file per player.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct StatisticsData {
    best_game: GameResult,
    total_correct_answers: u64,
    total_questions: u64,
    games_count: u32,
}

/// File-backed [`StatisticsStore`]. Single-writer, synchronous; the file is
/// rewritten after every recorded game.
#[derive(Debug)]
pub struct FileStatistics {
    path: PathBuf,
    data: StatisticsData,
}

impl FileStatistics {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("stats file {} is unreadable ({err}), starting fresh", path.display());
                StatisticsData::default()
            }),
            Err(_) => StatisticsData::default(),
        };

        Self { path, data }
    }

    /// Per-player store: one file named after the chat id.
    pub fn for_chat(dir: &Path, chat_id: i64) -> Self {
        Self::open(dir.join(format!("{chat_id}.json")))
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, contents)
    }
}

impl StatisticsStore for FileStatistics {
    fn record_game(&mut self, correct: u32, total: u32) {
        self.data.total_correct_answers += u64::from(correct);
        self.data.total_questions += u64::from(total);
        self.data.games_count += 1;

        let current = GameResult::new(correct, total, Utc::now());
        if current.is_better_than(&self.data.best_game) {
            self.data.best_game = current;
        }

        if let Err(err) = self.save() {
            warn!("failed to persist stats to {}: {err}", self.path.display());
        }
    }

    fn best_game(&self) -> GameResult {
        self.data.best_game.clone()
    }

    fn total_accuracy(&self) -> f64 {
        if self.data.total_questions == 0 {
            return 0.0;
        }
        (self.data.total_correct_answers as f64 * 100.0) / self.data.total_questions as f64
    }

    fn games_count(&self) -> u32 {
        self.data.games_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileStatistics {
        FileStatistics::for_chat(dir.path(), 42)
    }

    #[test]
    fn accuracy_is_zero_before_any_game() {
        let dir = tempfile::tempdir().unwrap();
        let stats = store_in(&dir);

        assert_eq!(stats.total_accuracy(), 0.0);
        assert_eq!(stats.games_count(), 0);
        assert_eq!(stats.best_game(), GameResult::default());
    }

    #[test]
    fn single_game_sets_accuracy_and_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = store_in(&dir);

        stats.record_game(7, 10);

        assert_eq!(stats.total_accuracy(), 70.0);
        assert_eq!(stats.games_count(), 1);
        assert_eq!(stats.best_game().correct, 7);
        assert_eq!(stats.best_game().total, 10);
        assert!(stats.best_game().finished_at.is_some());
    }

    #[test]
    fn best_game_takes_the_larger_correct_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = store_in(&dir);

        stats.record_game(5, 10);
        stats.record_game(8, 10);
        assert_eq!(stats.best_game().correct, 8);

        stats.record_game(3, 10);
        assert_eq!(stats.best_game().correct, 8);
    }

    #[test]
    fn tied_result_keeps_the_first_recorded_best() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = store_in(&dir);

        stats.record_game(6, 10);
        let first_best = stats.best_game();

        stats.record_game(6, 10);
        assert_eq!(stats.best_game(), first_best);
    }

    #[test]
    fn counters_accumulate_across_games() {
        let dir = tempfile::tempdir().unwrap();
        let mut stats = store_in(&dir);

        stats.record_game(5, 10);
        stats.record_game(10, 10);

        assert_eq!(stats.games_count(), 2);
        assert_eq!(stats.total_accuracy(), 75.0);
    }

    #[test]
    fn stats_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut stats = store_in(&dir);
            stats.record_game(9, 10);
        }

        let reopened = store_in(&dir);
        assert_eq!(reopened.games_count(), 1);
        assert_eq!(reopened.best_game().correct, 9);
        assert_eq!(reopened.total_accuracy(), 90.0);
    }

    #[test]
    fn chats_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = FileStatistics::for_chat(dir.path(), 1);
        first.record_game(10, 10);

        let second = FileStatistics::for_chat(dir.path(), 2);
        assert_eq!(second.games_count(), 0);
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("42.json");
        fs::write(&path, "not json at all").unwrap();

        let stats = FileStatistics::open(&path);
        assert_eq!(stats.games_count(), 0);
    }
}
