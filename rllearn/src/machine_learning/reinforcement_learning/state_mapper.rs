use serde::{Deserialize, Serialize};

use super::environment::RLEnvironment;

/// Preprocessing applied to a state before any network sees it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum StateMapper {
    #[default]
    Identity,
    /// Affine map of every component from `[low, high]` onto `[-1, 1]`.
    Range { low: Vec<f32>, high: Vec<f32> },
}

impl StateMapper {
    pub fn for_environment<E: RLEnvironment>(env: &E) -> Self {
        StateMapper::Range {
            low: env.observation_low(),
            high: env.observation_high(),
        }
    }

    pub fn map(&self, state: &[f32]) -> Vec<f32> {
        match self {
            StateMapper::Identity => state.to_vec(),
            StateMapper::Range { low, high } => state
                .iter()
                .enumerate()
                .map(|(i, x)| match (low.get(i), high.get(i)) {
                    (Some(low), Some(high)) if high > low => {
                        2.0 * (x - low) / (high - low) - 1.0
                    }
                    (Some(_), Some(_)) => 0.0,
                    _ => *x,
                })
                .collect(),
        }
    }

    pub fn map_all<S: AsRef<[f32]>>(&self, states: &[S]) -> Vec<Vec<f32>> {
        states.iter().map(|s| self.map(s.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::machine_learning::compare_outputs;

    use super::*;

    #[test]
    fn test_range_maps_bounds_to_unit_interval() {
        let mapper = StateMapper::Range {
            low: vec![-1.2, -0.07],
            high: vec![0.6, 0.07],
        };
        assert!(compare_outputs(&mapper.map(&[-1.2, -0.07]), &[-1.0, -1.0]));
        assert!(compare_outputs(&mapper.map(&[0.6, 0.07]), &[1.0, 1.0]));
        assert!(compare_outputs(&mapper.map(&[-0.3, 0.0]), &[0.0, 0.0]));
    }

    #[test]
    fn test_degenerate_axis_maps_to_zero() {
        let mapper = StateMapper::Range {
            low: vec![1.0, 0.0],
            high: vec![1.0, 2.0],
        };
        assert_eq!(mapper.map(&[5.0, 2.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn test_identity() {
        assert_eq!(StateMapper::Identity.map(&[3.0, -4.0]), vec![3.0, -4.0]);
    }
}
