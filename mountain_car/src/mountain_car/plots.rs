// plots.rs
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Axis, Block, Chart, Dataset, GraphType, WidgetRef,
    },
};
use rllearn::machine_learning::{
    linspace,
    reinforcement_learning::{
        agent::ValueEstimator, environment::RLEnvironment, rl_error::RLResult,
        transition_log::EpisodeView,
    },
};

const VALUE_COLORS: [Color; 6] = [
    Color::Blue,
    Color::Cyan,
    Color::Green,
    Color::LightGreen,
    Color::Yellow,
    Color::LightRed,
];

/// Cartesian grid of `points_per_axis` evenly spaced values on every axis, the first axis
/// varying slowest.
pub fn uniform_state_grid(low: &[f32], high: &[f32], points_per_axis: usize) -> Vec<Vec<f32>> {
    low.iter()
        .zip(high)
        .map(|(&low, &high)| linspace(low, high, points_per_axis))
        .multi_cartesian_product()
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
        (min.min(v), max.max(v))
    });
    match (min.is_finite(), max.is_finite()) {
        (true, true) if max > min => [min, max],
        (true, true) => [min - 1.0, max + 1.0],
        _ => [0.0, 1.0],
    }
}

fn axis_labels<'a>(bounds: [f64; 2]) -> Vec<Span<'a>> {
    vec![
        Span::styled(
            format!("{:.2}", bounds[0]),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{:.2}", bounds[1]),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ]
}

/// Colour index of every value when `[min, max]` is split into equally wide bins. Zero
/// bins is treated as one.
pub fn value_bins(values: &[f32], bins: usize) -> Vec<usize> {
    let bins = bins.max(1);
    let [min, max] = bounds(values.iter().map(|v| *v as f64));
    values
        .iter()
        .map(|v| {
            let relative = (*v as f64 - min) / (max - min);
            ((relative * bins as f64) as usize).min(bins - 1)
        })
        .collect()
}

/// Scatter of the first two state components coloured by value, one panel per channel.
#[derive(Clone, Debug, Default)]
pub struct ValueMap {
    titles: Vec<String>,
    points: Vec<(f64, f64)>,
    values: Vec<Vec<f32>>,
}

impl ValueMap {
    pub fn new(titles: Vec<String>, states: &[Vec<f32>], values: Vec<Vec<f32>>) -> Self {
        let points = states
            .iter()
            .map(|s| {
                (
                    s.first().copied().unwrap_or_default() as f64,
                    s.get(1).copied().unwrap_or_default() as f64,
                )
            })
            .collect();
        Self {
            titles,
            points,
            values,
        }
    }

    pub fn from_estimator<E, V>(estimator: &V, states: &[E::State]) -> RLResult<Self>
    where
        E: RLEnvironment,
        V: ValueEstimator<E> + ?Sized,
    {
        let values = estimator.state_values(states)?;
        let raw_states: Vec<Vec<f32>> = states.iter().map(|s| s.as_ref().to_vec()).collect();
        Ok(Self::new(estimator.channel_names(), &raw_states, values))
    }

    pub fn channels(&self) -> usize {
        self.titles.len()
    }

    fn channel_values(&self, channel: usize) -> Vec<f32> {
        self.values
            .iter()
            .map(|row| row.get(channel).copied().unwrap_or_default())
            .collect()
    }

    fn render_channel(&self, channel: usize, area: Rect, buf: &mut Buffer) {
        let values = self.channel_values(channel);
        let [min, max] = bounds(values.iter().map(|v| *v as f64));
        let bins = value_bins(&values, VALUE_COLORS.len());
        let mut binned: Vec<Vec<(f64, f64)>> = vec![Vec::new(); VALUE_COLORS.len()];
        for (point, bin) in self.points.iter().zip(bins) {
            binned[bin].push(*point);
        }
        let width = (max - min) / VALUE_COLORS.len() as f64;
        let datasets = binned
            .iter()
            .enumerate()
            .filter(|(_, points)| !points.is_empty())
            .map(|(i, points)| {
                let low = min + i as f64 * width;
                Dataset::default()
                    .name(format!("{:.2}..{:.2}", low, low + width))
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Scatter)
                    .style(Style::default().fg(VALUE_COLORS[i]))
                    .data(points)
            })
            .collect::<Vec<_>>();
        let x_bounds = bounds(self.points.iter().map(|p| p.0));
        let y_bounds = bounds(self.points.iter().map(|p| p.1));
        Chart::new(datasets)
            .block(Block::bordered().title(Span::styled(
                self.titles[channel].clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )))
            .x_axis(
                Axis::default()
                    .title("pos")
                    .style(Style::default().fg(Color::Gray))
                    .bounds(x_bounds)
                    .labels(axis_labels(x_bounds)),
            )
            .y_axis(
                Axis::default()
                    .title("vel")
                    .style(Style::default().fg(Color::Gray))
                    .bounds(y_bounds)
                    .labels(axis_labels(y_bounds)),
            )
            .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)))
            .render(area, buf);
    }
}

impl WidgetRef for ValueMap {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if self.channels() == 0 {
            Block::bordered().title("No values yet").render(area, buf);
            return;
        }
        let panels = Layout::horizontal(vec![
            Constraint::Ratio(1, self.channels() as u32);
            self.channels()
        ])
        .split(area);
        for (channel, panel) in panels.iter().enumerate() {
            self.render_channel(channel, *panel, buf);
        }
    }
}

/// Position/velocity path of an episode with start and end markers.
#[derive(Clone, Debug, PartialEq)]
pub struct StatePathChart {
    episode: usize,
    path: Vec<(f64, f64)>,
    start: (f64, f64),
    end: (f64, f64),
}

impl StatePathChart {
    pub fn new(episode: usize, path: &[Vec<f32>], end: &[f32]) -> Self {
        let to_point = |s: &[f32]| {
            (
                s.first().copied().unwrap_or_default() as f64,
                s.get(1).copied().unwrap_or_default() as f64,
            )
        };
        let path: Vec<(f64, f64)> = path.iter().map(|s| to_point(s)).collect();
        let end = to_point(end);
        Self {
            episode,
            start: path.first().copied().unwrap_or(end),
            end,
            path,
        }
    }

    pub fn from_episode(view: &EpisodeView) -> Self {
        Self::new(view.episode, &view.path, &view.end)
    }
}

impl WidgetRef for StatePathChart {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let all_points = || self.path.iter().chain([&self.end]);
        let x_bounds = bounds(all_points().map(|p| p.0));
        let y_bounds = bounds(all_points().map(|p| p.1));
        let block = Block::bordered().title(Span::styled(
            format!("episode {} (pos, vel)", self.episode),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        Canvas::default()
            .block(block)
            .x_bounds(x_bounds)
            .y_bounds(y_bounds)
            .paint(|ctx| {
                for (from, to) in all_points().tuple_windows() {
                    ctx.draw(&CanvasLine {
                        x1: from.0,
                        y1: from.1,
                        x2: to.0,
                        y2: to.1,
                        color: Color::LightBlue,
                    });
                }
                ctx.layer();
                ctx.print(self.start.0, self.start.1, "▲".green());
                ctx.print(self.end.0, self.end.1, "▼".red());
            })
            .render(area, buf);
    }
}

/// Per-step reward of an episode, the total is shown in the legend.
#[derive(Clone, Debug)]
pub struct RewardChart {
    episode: usize,
    rewards: Vec<(f64, f64)>,
    total: f32,
}

impl RewardChart {
    pub fn new(episode: usize, rewards: &[f32]) -> Self {
        Self {
            episode,
            rewards: rewards
                .iter()
                .enumerate()
                .map(|(i, r)| (i as f64, *r as f64))
                .collect(),
            total: rewards.iter().sum(),
        }
    }

    pub fn from_episode(view: &EpisodeView) -> Self {
        Self::new(view.episode, &view.rewards)
    }
}

impl WidgetRef for RewardChart {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let x_bounds = [0.0, self.rewards.len().max(1) as f64];
        let y_bounds = bounds(self.rewards.iter().map(|r| r.1));
        let datasets = vec![Dataset::default()
            .name(format!("total(ep={})={:.2}", self.episode, self.total))
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::LightRed))
            .data(&self.rewards)];
        Chart::new(datasets)
            .block(Block::bordered().title(Span::styled(
                "Reward",
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )))
            .x_axis(
                Axis::default()
                    .title("Step")
                    .style(Style::default().fg(Color::Gray))
                    .bounds(x_bounds)
                    .labels(axis_labels(x_bounds)),
            )
            .y_axis(
                Axis::default()
                    .title("Reward")
                    .style(Style::default().fg(Color::Gray))
                    .bounds(y_bounds)
                    .labels(axis_labels(y_bounds)),
            )
            .hidden_legend_constraints((Constraint::Ratio(1, 1), Constraint::Ratio(1, 1)))
            .render(area, buf);
    }
}

/// State path and rewards of one logged episode side by side.
#[derive(Clone, Debug)]
pub struct EpisodePanel {
    path: StatePathChart,
    rewards: RewardChart,
}

impl EpisodePanel {
    pub fn new(view: &EpisodeView) -> Self {
        Self {
            path: StatePathChart::from_episode(view),
            rewards: RewardChart::from_episode(view),
        }
    }
}

impl WidgetRef for EpisodePanel {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(area);
        self.path.render_ref(left, buf);
        self.rewards.render_ref(right, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    fn episode() -> EpisodeView {
        EpisodeView {
            episode: 4,
            path: vec![vec![-0.5, 0.0], vec![-0.55, -0.01], vec![-0.45, 0.02]],
            start: vec![-0.5, 0.0],
            end: vec![-0.3, 0.03],
            rewards: vec![-1.0, -1.0, -1.0],
            total_reward: -3.0,
        }
    }

    #[test]
    fn test_uniform_state_grid_order() {
        let grid = uniform_state_grid(&[0.0, 10.0], &[1.0, 20.0], 3);
        assert_eq!(grid.len(), 9);
        assert_eq!(grid[0], vec![0.0, 10.0]);
        assert_eq!(grid[1], vec![0.0, 15.0]);
        assert_eq!(grid[3], vec![0.5, 10.0]);
        assert_eq!(grid[8], vec![1.0, 20.0]);
    }

    #[test]
    fn test_value_bins_cover_range() {
        let bins = value_bins(&[0.0, 0.5, 1.0, 0.99], 4);
        assert_eq!(bins, vec![0, 2, 3, 3]);
        assert_eq!(value_bins(&[2.0, 2.0], 4), vec![2, 2]);
        assert_eq!(value_bins(&[0.0, 1.0], 0), vec![0, 0]);
    }

    #[test]
    fn test_value_map_panels() {
        let states = uniform_state_grid(&[-1.2, -0.07], &[0.6, 0.07], 5);
        let values = states.iter().map(|s| vec![s[0], -s[0]]).collect();
        let map = ValueMap::new(
            vec![
                "Q(s in S, action = 0)".to_string(),
                "Q(s in S, action = 1)".to_string(),
            ],
            &states,
            values,
        );
        let area = Rect::new(0, 0, 120, 30);
        let mut buf = Buffer::empty(area);
        map.render_ref(area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains("Q(s in S, action = 0)"));
        assert!(text.contains("Q(s in S, action = 1)"));
    }

    #[test]
    fn test_state_path_markers() {
        let chart = StatePathChart::from_episode(&episode());
        let area = Rect::new(0, 0, 60, 20);
        let mut buf = Buffer::empty(area);
        chart.render_ref(area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains('▲'));
        assert!(text.contains('▼'));
        assert!(text.contains("episode 4"));
    }

    #[test]
    fn test_reward_chart_legend_has_total() {
        let chart = RewardChart::from_episode(&episode());
        let area = Rect::new(0, 0, 80, 20);
        let mut buf = Buffer::empty(area);
        chart.render_ref(area, &mut buf);
        assert!(buffer_text(&buf).contains("total(ep=4)=-3.00"));
    }

    #[test]
    fn test_episode_panel() {
        let panel = EpisodePanel::new(&episode());
        let area = Rect::new(0, 0, 140, 24);
        let mut buf = Buffer::empty(area);
        panel.render_ref(area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains("Reward"));
        assert!(text.contains('▲'));
    }
}
