use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use super::{
    environment::{RLEnvironment, Replay},
    rl_error::RLResult,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: u32,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
    pub episode: usize,
}

/// Every transition of a run in the order it happened.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TransitionLog {
    rows: Vec<Transition>,
    finished_episodes: usize,
}

/// One episode cut out of a [`TransitionLog`].
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeView {
    pub episode: usize,
    pub path: Vec<Vec<f32>>,
    pub start: Vec<f32>,
    pub end: Vec<f32>,
    pub rewards: Vec<f32>,
    pub total_reward: f32,
}

impl TransitionLog {
    /// The row's episode is the number of finished episodes before it, so the `done` row
    /// still belongs to the episode it ends.
    pub fn push(
        &mut self,
        state: Vec<f32>,
        action: u32,
        reward: f32,
        next_state: Vec<f32>,
        done: bool,
    ) {
        self.rows.push(Transition {
            state,
            action,
            reward,
            next_state,
            done,
            episode: self.finished_episodes,
        });
        if done {
            self.finished_episodes += 1;
        }
    }

    pub fn push_replay<E: RLEnvironment>(&mut self, replay: &Replay<E>) {
        self.push(
            replay.prev_state.as_ref().to_vec(),
            replay.action.into(),
            replay.reward,
            replay.next_state.as_ref().to_vec(),
            replay.terminal,
        );
    }

    pub fn rows(&self) -> &[Transition] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of episodes with at least one row, the unfinished one included.
    pub fn episodes(&self) -> usize {
        self.rows.last().map(|row| row.episode + 1).unwrap_or(0)
    }

    /// `None` selects the last episode.
    pub fn episode(&self, episode: Option<usize>) -> Option<EpisodeView> {
        let episode = match episode {
            Some(episode) => episode,
            None => self.episodes().checked_sub(1)?,
        };
        let rows: Vec<&Transition> = self
            .rows
            .iter()
            .skip_while(|row| row.episode < episode)
            .take_while(|row| row.episode == episode)
            .collect();
        let first = rows.first()?;
        let last = rows.last()?;
        let rewards: Vec<f32> = rows.iter().map(|row| row.reward).collect();
        Some(EpisodeView {
            episode,
            path: rows.iter().map(|row| row.state.clone()).collect(),
            start: first.state.clone(),
            end: last.next_state.clone(),
            total_reward: rewards.iter().sum(),
            rewards,
        })
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> RLResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> RLResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::rl_error::RLError;
    use super::*;

    fn log_with_episodes(lengths: &[usize]) -> TransitionLog {
        let mut log = TransitionLog::default();
        for (episode, length) in lengths.iter().enumerate() {
            for step in 0..*length {
                let x = (episode * 10 + step) as f32;
                log.push(vec![x], 1, -1.0, vec![x + 1.0], step + 1 == *length);
            }
        }
        log
    }

    #[test]
    fn test_episode_column_counts_previous_dones() {
        let log = log_with_episodes(&[2, 3]);
        let episodes: Vec<usize> = log.rows().iter().map(|row| row.episode).collect();
        assert_eq!(episodes, vec![0, 0, 1, 1, 1]);
        assert_eq!(log.episodes(), 2);
    }

    #[test]
    fn test_unfinished_episode_is_counted() {
        let mut log = log_with_episodes(&[2]);
        log.push(vec![0.0], 0, -1.0, vec![0.0], false);
        assert_eq!(log.episodes(), 2);
        assert_eq!(log.episode(None).unwrap().path.len(), 1);
    }

    #[test]
    fn test_episode_view() {
        let log = log_with_episodes(&[2, 3]);
        let view = log.episode(Some(1)).unwrap();
        assert_eq!(view.path, vec![vec![10.0], vec![11.0], vec![12.0]]);
        assert_eq!(view.start, vec![10.0]);
        assert_eq!(view.end, vec![13.0]);
        assert_eq!(view.rewards, vec![-1.0; 3]);
        assert_eq!(view.total_reward, -3.0);
        assert_eq!(log.episode(None), Some(view));
        assert_eq!(log.episode(Some(2)), None);
    }

    #[test]
    fn test_empty_log() {
        let log = TransitionLog::default();
        assert_eq!(log.episodes(), 0);
        assert!(log.episode(None).is_none());
    }

    #[test]
    fn test_json_file() {
        let log = log_with_episodes(&[1, 2]);
        let path = std::env::temp_dir().join("rllearn_transition_log_test.json");
        log.save_json(&path).unwrap();
        let loaded = TransitionLog::load_json(&path).unwrap();
        assert_eq!(loaded, log);
        let _ = std::fs::remove_file(path);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_json_write_failure_is_reported() {
        // the log fits in the write buffer, so the error only shows up on flush
        let log = log_with_episodes(&[1]);
        assert!(matches!(
            log.save_json("/dev/full"),
            Err(RLError::IOError(_))
        ));
    }
}
