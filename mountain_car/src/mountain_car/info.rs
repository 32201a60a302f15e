// info.rs

use std::time::Instant;

use ratatui::{
    prelude::*,
    widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph, WidgetRef},
};

/// Number of episodes in the moving average of the reward chart.
const AVERAGE_WINDOW: usize = 10;

#[derive(Clone, Debug)]
pub struct TrainingInfo {
    agent_name: String,
    current_episode: usize,
    max_episodes: usize,
    last_steps: usize,
    reward_history: Vec<(f64, f64)>,
    average_history: Vec<(f64, f64)>,
    best_reward: Option<f32>,
    start_time: Instant,
    eta: Option<(u64, u64)>,
    finished: bool,
}

impl TrainingInfo {
    pub fn new(agent_name: impl Into<String>, max_episodes: usize) -> TrainingInfo {
        TrainingInfo {
            agent_name: agent_name.into(),
            current_episode: 0,
            max_episodes,
            last_steps: 0,
            reward_history: Vec::new(),
            average_history: Vec::new(),
            best_reward: None,
            start_time: Instant::now(),
            eta: None,
            finished: false,
        }
    }

    pub fn add_episode(&mut self, episode: usize, steps: usize, total_reward: f32) {
        self.current_episode = episode + 1;
        self.last_steps = steps;
        self.reward_history
            .push((episode as f64, total_reward as f64));
        let window = &self.reward_history[self.reward_history.len().saturating_sub(AVERAGE_WINDOW)..];
        let average = window.iter().map(|r| r.1).sum::<f64>() / window.len() as f64;
        self.average_history.push((episode as f64, average));
        self.best_reward = Some(match self.best_reward {
            Some(best) => best.max(total_reward),
            None => total_reward,
        });

        let elapsed_time = self.start_time.elapsed().as_secs_f64();
        let estimated = (elapsed_time / self.current_episode as f64) * self.max_episodes as f64;
        let eta = (estimated - elapsed_time).max(0.0) as u64;
        self.eta = Some((eta / 3600, (eta % 3600) / 60));
    }

    pub fn set_finished(&mut self) {
        self.finished = true;
    }

    pub fn current_episode(&self) -> usize {
        self.current_episode
    }

    pub fn average_reward(&self) -> Option<f64> {
        self.average_history.last().map(|a| a.1)
    }

    fn reward_bounds(&self) -> [f64; 2] {
        let (min, max) = self
            .reward_history
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), r| {
                (min.min(r.1), max.max(r.1))
            });
        if min < max {
            [min, max]
        } else if min.is_finite() {
            [min - 1.0, max + 1.0]
        } else {
            [0.0, 1.0]
        }
    }
}

impl Widget for TrainingInfo {
    fn render(self, area: Rect, buf: &mut Buffer)
    where
        Self: Sized,
    {
        self.render_ref(area, buf)
    }
}

impl WidgetRef for TrainingInfo {
    fn render_ref(&self, info_area: Rect, buf: &mut Buffer) {
        let [up, down] =
            Layout::vertical([Constraint::Percentage(65), Constraint::Percentage(35)])
                .areas(info_area);
        let y_bounds = self.reward_bounds();
        let x_max = self.max_episodes.max(1) as f64;
        let datasets = vec![
            Dataset::default()
                .name("episode")
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::LightBlue))
                .data(&self.reward_history),
            Dataset::default()
                .name(format!(
                    "average({AVERAGE_WINDOW}): {:.2}",
                    self.average_reward().unwrap_or_default()
                ))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&self.average_history),
        ];
        Chart::new(datasets)
            .block(Block::bordered().title(Span::styled(
                "Episode rewards",
                Style::default()
                    .fg(Color::LightBlue)
                    .add_modifier(Modifier::BOLD),
            )))
            .x_axis(
                Axis::default()
                    .title("Episode")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, x_max])
                    .labels(vec![
                        Span::styled("0", Style::default().add_modifier(Modifier::BOLD)),
                        Span::styled(
                            format!("{}", self.max_episodes),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("Reward")
                    .style(Style::default().fg(Color::Gray))
                    .bounds(y_bounds)
                    .labels(vec![
                        Span::styled(
                            format!("{:.1}", y_bounds[0]),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!("{:.1}", y_bounds[1]),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                    ]),
            )
            .render(up, buf);

        let duration = self.start_time.elapsed();
        let elapsed_hours = duration.as_secs() / 3600;
        let elapsed_minutes = (duration.as_secs() % 3600) / 60;
        let eta = match (self.finished, self.eta) {
            (true, _) => "Finished, press q to quit".to_string(),
            (false, Some((hours, mins))) => format!("Eta: {hours} h {mins} mins"),
            (false, None) => "-".to_string(),
        };
        let best = self
            .best_reward
            .map(|b| format!("{b:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let text = Text::from(vec![
            Line::from(format!("Agent: {}", self.agent_name)),
            Line::from(format!(
                "Episode: {} / {}",
                self.current_episode, self.max_episodes
            )),
            Line::from(format!("Steps in last episode: {}", self.last_steps)),
            Line::from(format!("Best reward: {best}")),
            Line::from(format!(
                "Elapsed time: {elapsed_hours} h {elapsed_minutes} mins"
            )),
            Line::from(eta),
        ]);
        Paragraph::new(text)
            .block(Block::bordered().title_top("Info"))
            .render(down, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut info = TrainingInfo::new("test", 20);
        for episode in 0..12 {
            info.add_episode(episode, 200, episode as f32);
        }
        assert_eq!(info.current_episode(), 12);
        // mean of 2..=11
        assert_eq!(info.average_reward(), Some(6.5));
        assert_eq!(info.best_reward, Some(11.0));
    }

    #[test]
    fn test_render_info() {
        let mut info = TrainingInfo::new("q-learning", 5);
        info.add_episode(0, 200, -200.0);
        info.set_finished();
        let area = Rect::new(0, 0, 80, 30);
        let mut buf = Buffer::empty(area);
        info.render_ref(area, &mut buf);
        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Episode: 1 / 5"));
        assert!(text.contains("Agent: q-learning"));
        assert!(text.contains("Finished"));
    }
}
