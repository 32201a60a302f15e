use tracing::info;

use super::{
    agent::Agent,
    environment::{RLEnvironment, Replay, Reward},
    rl_error::RLResult,
    transition_log::TransitionLog,
};

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub episodes: usize,
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            verbose: true,
        }
    }
}

/// Summary handed to the hook after every episode.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeReport {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: Reward,
    pub path: Vec<Vec<f32>>,
    /// State after the last step.
    pub end: Vec<f32>,
}

/// Plays `config.episodes` episodes and logs every transition. The hook can stop the run
/// early by returning `true`, the transitions so far are returned either way.
pub fn run<E, A, H>(
    env: &mut E,
    agent: &mut A,
    config: &RunConfig,
    mut hook: H,
) -> RLResult<TransitionLog>
where
    E: RLEnvironment,
    A: Agent<E> + ?Sized,
    H: FnMut(&EpisodeReport, &A) -> bool,
{
    let mut log = TransitionLog::default();
    for episode in 0..config.episodes {
        env.reset();
        let mut state = env.state();
        let mut total_reward = 0.0;
        let mut path = Vec::new();
        loop {
            let action = agent.act(&state)?;
            let (action, reward, next_state, done) = env.record_step(action);
            path.push(state.as_ref().to_vec());
            let replay = Replay {
                prev_state: state,
                action,
                reward,
                next_state: next_state.clone(),
                terminal: done,
            };
            agent.observe(&replay, episode, path.len() - 1)?;
            log.push_replay(&replay);
            total_reward += reward;
            state = next_state;
            if done {
                break;
            }
        }
        agent.end_episode(episode)?;
        let report = EpisodeReport {
            episode,
            steps: path.len(),
            total_reward,
            path,
            end: state.as_ref().to_vec(),
        };
        if config.verbose {
            info!(
                "Episode {} finished after {} steps with total reward {}",
                report.episode, report.steps, report.total_reward
            );
        }
        if hook(&report, agent) {
            break;
        }
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::super::environment::corridor::{Corridor, Walk};
    use super::*;

    #[derive(Default)]
    struct Forward {
        observed: Vec<(usize, usize, bool)>,
        ended: Vec<usize>,
    }

    impl Agent<Corridor> for Forward {
        fn act(&mut self, _state: &<Corridor as RLEnvironment>::State) -> RLResult<Walk> {
            Ok(Walk::Forward)
        }

        fn observe(
            &mut self,
            replay: &Replay<Corridor>,
            episode: usize,
            step: usize,
        ) -> RLResult<()> {
            self.observed.push((episode, step, replay.terminal));
            Ok(())
        }

        fn end_episode(&mut self, episode: usize) -> RLResult<()> {
            self.ended.push(episode);
            Ok(())
        }
    }

    #[test]
    fn test_run_logs_every_transition() {
        let mut env = Corridor::new(4);
        let mut agent = Forward::default();
        let config = RunConfig {
            episodes: 3,
            verbose: false,
        };
        let mut reports = Vec::new();
        let log = run(&mut env, &mut agent, &config, |report, _| {
            reports.push(report.clone());
            false
        })
        .unwrap();
        assert_eq!(log.len(), 9);
        assert_eq!(log.episodes(), 3);
        assert_eq!(agent.ended, vec![0, 1, 2]);
        assert_eq!(agent.observed[..3], [(0, 0, false), (0, 1, false), (0, 2, true)]);
        assert_eq!(reports[2].steps, 3);
        assert_eq!(reports[2].total_reward, -3.0);
        assert_eq!(reports[2].path, vec![vec![0.0], vec![1.0], vec![2.0]]);
        assert_eq!(reports[2].end, vec![3.0]);
    }

    #[test]
    fn test_hook_stops_run() {
        let mut env = Corridor::new(3);
        let mut agent = Forward::default();
        let config = RunConfig {
            episodes: 10,
            verbose: true,
        };
        let log = run(&mut env, &mut agent, &config, |report, _| report.episode == 1).unwrap();
        assert_eq!(log.episodes(), 2);
        assert_eq!(agent.ended, vec![0, 1]);
    }
}
