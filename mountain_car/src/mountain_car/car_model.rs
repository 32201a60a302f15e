// car_model.rs
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use ratatui::{
    prelude::*,
    widgets::{
        canvas::{Canvas, Points},
        Block, Borders, WidgetRef,
    },
};
use rllearn::machine_learning::reinforcement_learning::environment::{
    RLAction, RLEnvironment, RLState, Reward,
};

pub const MIN_POSITION: f32 = -1.2;
pub const MAX_POSITION: f32 = 0.6;
pub const MAX_SPEED: f32 = 0.07;
pub const GOAL_POSITION: f32 = 0.5;
pub const GOAL_VELOCITY: f32 = 0.0;
const FORCE: f32 = 0.001;
const GRAVITY: f32 = 0.0025;
pub const MAX_EPISODE_STEPS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarAction {
    Left,
    Idle,
    Right,
}

impl RLAction for CarAction {
    const SIZE: u32 = 3;
}

impl From<u32> for CarAction {
    fn from(value: u32) -> Self {
        match value {
            0 => CarAction::Left,
            1 => CarAction::Idle,
            _ => CarAction::Right,
        }
    }
}

impl From<CarAction> for u32 {
    fn from(val: CarAction) -> Self {
        match val {
            CarAction::Left => 0,
            CarAction::Idle => 1,
            CarAction::Right => 2,
        }
    }
}

/// `[position, velocity]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CarState([f32; 2]);

impl CarState {
    pub fn new(position: f32, velocity: f32) -> Self {
        Self([position, velocity])
    }

    pub fn position(&self) -> f32 {
        self.0[0]
    }

    pub fn velocity(&self) -> f32 {
        self.0[1]
    }
}

impl AsRef<[f32]> for CarState {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl RLState for CarState {
    const SIZE: usize = 2;
}

impl From<&[f32]> for CarState {
    fn from(value: &[f32]) -> Self {
        Self::new(
            value.first().copied().unwrap_or_default(),
            value.get(1).copied().unwrap_or_default(),
        )
    }
}

pub fn hill_height(position: f32) -> f32 {
    (3.0 * position).sin() * 0.45 + 0.55
}

/// The classic car in a valley that has to swing back and forth to reach the flag.
#[derive(Clone, Debug)]
pub struct CarModel {
    position: f32,
    velocity: f32,
    steps: usize,
    max_steps: usize,
    cumulative_reward: Reward,
    rng: XorShiftRng,
}

impl CarModel {
    pub fn new(seed: Option<u64>) -> Self {
        let mut model = Self {
            position: 0.0,
            velocity: 0.0,
            steps: 0,
            max_steps: MAX_EPISODE_STEPS,
            cumulative_reward: 0.0,
            rng: XorShiftRng::seed_from_u64(seed.unwrap_or_else(rand::random)),
        };
        model.reset();
        model
    }

    pub fn with_state(mut self, position: f32, velocity: f32) -> Self {
        self.position = position;
        self.velocity = velocity;
        self
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn reached_goal(&self) -> bool {
        self.position >= GOAL_POSITION && self.velocity >= GOAL_VELOCITY
    }

    pub fn has_episode_ended(&self) -> bool {
        self.reached_goal() || self.steps >= self.max_steps
    }
}

impl RLEnvironment for CarModel {
    type State = CarState;
    type Action = CarAction;

    fn cumulative_reward(&self) -> Reward {
        self.cumulative_reward
    }

    fn step(&mut self, action: &Self::Action) -> (Reward, bool) {
        let push = u32::from(*action) as f32 - 1.0;
        self.velocity += push * FORCE - GRAVITY * (3.0 * self.position).cos();
        self.velocity = self.velocity.clamp(-MAX_SPEED, MAX_SPEED);
        self.position += self.velocity;
        self.position = self.position.clamp(MIN_POSITION, MAX_POSITION);
        if self.position <= MIN_POSITION && self.velocity < 0.0 {
            self.velocity = 0.0;
        }
        self.steps += 1;
        let reward = -1.0;
        self.cumulative_reward += reward;
        (reward, self.has_episode_ended())
    }

    fn reset(&mut self) {
        self.position = self.rng.gen_range(-0.6..-0.4);
        self.velocity = 0.0;
        self.steps = 0;
        self.cumulative_reward = 0.0;
    }

    fn state(&self) -> Self::State {
        CarState::new(self.position, self.velocity)
    }

    fn observation_low(&self) -> Vec<f32> {
        vec![MIN_POSITION, -MAX_SPEED]
    }

    fn observation_high(&self) -> Vec<f32> {
        vec![MAX_POSITION, MAX_SPEED]
    }
}

impl WidgetRef for CarModel {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let hill: Vec<(f64, f64)> = (0..=180)
            .map(|i| {
                let x = MIN_POSITION + i as f32 * (MAX_POSITION - MIN_POSITION) / 180.0;
                (x as f64, hill_height(x) as f64)
            })
            .collect();
        let title = format!(
            "Step: {} Position: {:.3} Velocity: {:.4}",
            self.steps, self.position, self.velocity
        );
        let block = Block::default()
            .border_style(Style::default().fg(Color::Blue))
            .borders(Borders::ALL)
            .title(Span::styled(
                title,
                Style::default()
                    .add_modifier(Modifier::BOLD)
                    .fg(Color::Rgb(255, 192, 203)),
            ))
            .title_alignment(Alignment::Center);
        let car = (self.position as f64, hill_height(self.position) as f64 + 0.05);
        let flag = (GOAL_POSITION as f64, hill_height(GOAL_POSITION) as f64 + 0.08);
        Canvas::default()
            .block(block)
            .x_bounds([MIN_POSITION as f64, MAX_POSITION as f64])
            .y_bounds([0.0, 1.2])
            .paint(|ctx| {
                ctx.draw(&Points {
                    coords: &hill,
                    color: Color::Green,
                });
                ctx.print(flag.0, flag.1, "⚑".yellow());
                ctx.print(car.0, car.1, "●".light_red());
            })
            .render(area, buf);
    }
}

impl Widget for CarModel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.render_ref(area, buf)
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_reset_is_inside_start_range() {
        let mut car = CarModel::new(Some(1));
        for _ in 0..20 {
            car.reset();
            let state = car.state();
            assert!((-0.6..-0.4).contains(&state.position()));
            assert_eq!(state.velocity(), 0.0);
        }
    }

    #[test]
    fn test_step_dynamics() {
        let mut car = CarModel::new(Some(0)).with_state(-0.5, 0.0);
        let (reward, done) = car.step(&CarAction::Right);
        let velocity = 0.001 - 0.0025 * (3.0f32 * -0.5).cos();
        assert_eq!(reward, -1.0);
        assert!(!done);
        assert!(approx_eq!(f32, car.state().velocity(), velocity, ulps = 2));
        assert!(approx_eq!(f32, car.state().position(), -0.5 + velocity, ulps = 2));
    }

    #[test]
    fn test_left_wall_stops_car() {
        let mut car = CarModel::new(Some(0)).with_state(-1.19, -0.07);
        car.step(&CarAction::Left);
        assert_eq!(car.state().position(), MIN_POSITION);
        assert_eq!(car.state().velocity(), 0.0);
    }

    #[test]
    fn test_speed_is_clipped() {
        let mut car = CarModel::new(Some(0)).with_state(-0.2, 0.07);
        car.step(&CarAction::Right);
        assert!(car.state().velocity() <= MAX_SPEED);
    }

    #[test]
    fn test_goal_ends_episode() {
        let mut car = CarModel::new(Some(0)).with_state(0.49, 0.05);
        let (_, done) = car.step(&CarAction::Right);
        assert!(done);
        assert!(car.reached_goal());
    }

    #[test]
    fn test_episode_is_truncated() {
        let mut car = CarModel::new(Some(0));
        let mut steps = 0;
        loop {
            steps += 1;
            if car.step(&CarAction::Idle).1 {
                break;
            }
        }
        assert_eq!(steps, MAX_EPISODE_STEPS);
        assert_eq!(car.cumulative_reward(), -(MAX_EPISODE_STEPS as f32));
    }

    #[test]
    fn test_render_draws_car_and_flag() {
        let car = CarModel::new(Some(0));
        let area = Rect::new(0, 0, 60, 20);
        let mut buf = Buffer::empty(area);
        car.render_ref(area, &mut buf);
        let content: String = buf.content().iter().map(|cell| cell.symbol()).collect();
        assert!(content.contains('●'));
        assert!(content.contains('⚑'));
        assert!(content.contains("Step: 0"));
    }
}
