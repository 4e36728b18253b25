//! Simplified ice-hockey drill rink
//!
//! One controlled skater against a scripted opponent on a walled rink
//! with a goal mouth at each end. Continuous positions, discrete
//! actions, faceoff after every goal, episode ends when the period
//! clock runs out.

use rand::Rng;

/// Rink dimensions, in metres-ish units.
const RINK_W: f32 = 25.0;
const RINK_H: f32 = 11.0;

/// Goal mouth spans the middle third of each end board.
const GOAL_TOP: f32 = RINK_H / 3.0;
const GOAL_BOTTOM: f32 = 2.0 * RINK_H / 3.0;

const PLAYER_SPEED: f32 = 0.5;
const OPPONENT_SPEED: f32 = 0.35;
const SHOT_SPEED: f32 = 1.4;
const PUCK_FRICTION: f32 = 0.98;
const REACH: f32 = 0.9;
const MAX_PUCK_SPEED: f32 = 2.0;

/// Per-step cost so that stalling scores worse than playing.
const STEP_COST: f32 = -0.005;

/// Observation width: skater, puck position + velocity, opponent.
pub const STATE_DIM: usize = 8;

/// Flat observation vector, components normalized to roughly [-1, 1].
pub type Observation = [f32; STATE_DIM];

/// Discrete skater actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Stay,
    Shoot,
}

impl Action {
    pub const COUNT: usize = 6;

    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Up,
            1 => Self::Down,
            2 => Self::Left,
            3 => Self::Right,
            4 => Self::Stay,
            _ => Self::Shoot,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Steps per episode before the period ends.
    pub period_length: u32,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self { period_length: 500 }
    }
}

/// What one step hands back to the agent.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub state: Observation,
    pub reward: f32,
    pub done: bool,
}

#[derive(Debug, Clone, Copy)]
struct Vec2 {
    x: f32,
    y: f32,
}

impl Vec2 {
    fn dist(&self, other: &Vec2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// The rink. The controlled skater defends the left goal and attacks
/// the right one.
pub struct RinkEnv {
    config: EnvConfig,
    player: Vec2,
    opponent: Vec2,
    puck: Vec2,
    puck_vel: Vec2,
    clock: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl RinkEnv {
    pub fn new(config: EnvConfig) -> Self {
        let mut env = Self {
            config,
            player: Vec2 { x: 0.0, y: 0.0 },
            opponent: Vec2 { x: 0.0, y: 0.0 },
            puck: Vec2 { x: 0.0, y: 0.0 },
            puck_vel: Vec2 { x: 0.0, y: 0.0 },
            clock: 0,
            goals_for: 0,
            goals_against: 0,
        };
        env.faceoff();
        env
    }

    /// Start a fresh episode: zero the clock and the score, drop the
    /// puck at center ice.
    pub fn reset(&mut self) -> Observation {
        self.clock = 0;
        self.goals_for = 0;
        self.goals_against = 0;
        self.faceoff();
        self.observe()
    }

    /// Center-ice faceoff with a small random puck nudge.
    fn faceoff(&mut self) {
        let mut rng = rand::rng();
        self.player = Vec2 {
            x: RINK_W * 0.25,
            y: RINK_H * 0.5,
        };
        self.opponent = Vec2 {
            x: RINK_W * 0.75,
            y: RINK_H * 0.5,
        };
        self.puck = Vec2 {
            x: RINK_W * 0.5,
            y: RINK_H * 0.5,
        };
        self.puck_vel = Vec2 {
            x: rng.random_range(-0.2..0.2),
            y: rng.random_range(-0.2..0.2),
        };
    }

    pub fn step(&mut self, action: Action) -> StepResult {
        self.clock += 1;
        let mut reward = STEP_COST;

        // Skater movement, clamped to the boards.
        match action {
            Action::Up => self.player.y -= PLAYER_SPEED,
            Action::Down => self.player.y += PLAYER_SPEED,
            Action::Left => self.player.x -= PLAYER_SPEED,
            Action::Right => self.player.x += PLAYER_SPEED,
            Action::Stay | Action::Shoot => {}
        }
        self.player.x = self.player.x.clamp(0.0, RINK_W);
        self.player.y = self.player.y.clamp(0.0, RINK_H);

        let player_has_puck = self.player.dist(&self.puck) < REACH;
        let opponent_has_puck = !player_has_puck && self.opponent.dist(&self.puck) < REACH;

        if player_has_puck {
            if action == Action::Shoot {
                self.shoot_toward(RINK_W, RINK_H * 0.5);
            } else {
                // Puck carried on the stick.
                self.puck = self.player;
                self.puck_vel = Vec2 { x: 0.0, y: 0.0 };
            }
        } else if opponent_has_puck {
            // Scripted opponent fires at the defended goal on sight.
            self.shoot_toward(0.0, RINK_H * 0.5);
        }

        // Opponent skates toward the puck.
        let dx = self.puck.x - self.opponent.x;
        let dy = self.puck.y - self.opponent.y;
        let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
        self.opponent.x += OPPONENT_SPEED * dx / dist;
        self.opponent.y += OPPONENT_SPEED * dy / dist;
        self.opponent.x = self.opponent.x.clamp(0.0, RINK_W);
        self.opponent.y = self.opponent.y.clamp(0.0, RINK_H);

        // Free puck physics: glide, rub off speed, bounce off boards.
        if !player_has_puck || action == Action::Shoot {
            self.puck.x += self.puck_vel.x;
            self.puck.y += self.puck_vel.y;
            self.puck_vel.x *= PUCK_FRICTION;
            self.puck_vel.y *= PUCK_FRICTION;

            if self.puck.y < 0.0 || self.puck.y > RINK_H {
                self.puck.y = self.puck.y.clamp(0.0, RINK_H);
                self.puck_vel.y = -self.puck_vel.y;
            }

            let in_mouth = self.puck.y >= GOAL_TOP && self.puck.y <= GOAL_BOTTOM;
            if self.puck.x >= RINK_W {
                if in_mouth {
                    self.goals_for += 1;
                    reward += 1.0;
                    self.faceoff();
                } else {
                    self.puck.x = RINK_W;
                    self.puck_vel.x = -self.puck_vel.x;
                }
            } else if self.puck.x <= 0.0 {
                if in_mouth {
                    self.goals_against += 1;
                    reward -= 1.0;
                    self.faceoff();
                } else {
                    self.puck.x = 0.0;
                    self.puck_vel.x = -self.puck_vel.x;
                }
            }
        }

        StepResult {
            state: self.observe(),
            reward,
            done: self.clock >= self.config.period_length,
        }
    }

    fn shoot_toward(&mut self, x: f32, y: f32) {
        let dx = x - self.puck.x;
        let dy = y - self.puck.y;
        let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
        self.puck_vel = Vec2 {
            x: SHOT_SPEED * dx / dist,
            y: SHOT_SPEED * dy / dist,
        };
    }

    fn observe(&self) -> Observation {
        [
            self.player.x / RINK_W * 2.0 - 1.0,
            self.player.y / RINK_H * 2.0 - 1.0,
            self.puck.x / RINK_W * 2.0 - 1.0,
            self.puck.y / RINK_H * 2.0 - 1.0,
            self.puck_vel.x / MAX_PUCK_SPEED,
            self.puck_vel.y / MAX_PUCK_SPEED,
            self.opponent.x / RINK_W * 2.0 - 1.0,
            self.opponent.y / RINK_H * 2.0 - 1.0,
        ]
    }

    /// ASCII rendering of the rink, one char per cell.
    pub fn render(&self) -> String {
        const COLS: usize = 50;
        const ROWS: usize = 13;
        let cell = |v: Vec2| {
            let c = ((v.x / RINK_W) * (COLS - 1) as f32).round() as usize;
            let r = ((v.y / RINK_H) * (ROWS - 1) as f32).round() as usize;
            (r.min(ROWS - 1), c.min(COLS - 1))
        };

        let mut grid = vec![vec![' '; COLS]; ROWS];
        let (pr, pc) = cell(self.player);
        let (or, oc) = cell(self.opponent);
        let (kr, kc) = cell(self.puck);
        grid[pr][pc] = 'P';
        grid[or][oc] = 'O';
        grid[kr][kc] = '*';

        let goal_rows = |r: usize| {
            let y = r as f32 / (ROWS - 1) as f32 * RINK_H;
            (GOAL_TOP..=GOAL_BOTTOM).contains(&y)
        };

        let mut out = String::new();
        out.push('+');
        out.push_str(&"-".repeat(COLS));
        out.push_str("+\n");
        for (r, row) in grid.iter().enumerate() {
            out.push(if goal_rows(r) { ']' } else { '|' });
            out.extend(row.iter());
            out.push(if goal_rows(r) { '[' } else { '|' });
            out.push('\n');
        }
        out.push('+');
        out.push_str(&"-".repeat(COLS));
        out.push_str("+\n");
        out.push_str(&format!(
            "clock {:>4}  score {}:{}\n",
            self.clock, self.goals_for, self.goals_against
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_fresh_env_when_reset_then_observation_normalized() {
        let mut env = RinkEnv::new(EnvConfig::default());
        let state = env.reset();
        for component in state {
            assert!((-1.0..=1.0).contains(&component), "out of range: {component}");
        }
        // Puck drops at center ice.
        assert!(state[2].abs() < 1e-6);
    }

    #[test]
    fn given_up_action_when_step_then_player_moves_up() {
        let mut env = RinkEnv::new(EnvConfig::default());
        let before = env.reset();
        let after = env.step(Action::Up).state;
        assert!(after[1] < before[1]);
    }

    #[test]
    fn given_period_length_when_clock_expires_then_done() {
        let mut env = RinkEnv::new(EnvConfig { period_length: 5 });
        env.reset();
        let mut done = false;
        for _ in 0..5 {
            done = env.step(Action::Stay).done;
        }
        assert!(done);
    }

    #[test]
    fn given_goal_scored_when_faceoff_then_puck_back_at_center() {
        let mut env = RinkEnv::new(EnvConfig::default());
        env.reset();
        // Park the puck in front of the open mouth and fire it in.
        env.player = Vec2 {
            x: RINK_W - 1.0,
            y: RINK_H * 0.5,
        };
        env.puck = env.player;
        let mut scored = false;
        for _ in 0..10 {
            let result = env.step(Action::Shoot);
            if env.goals_for > 0 {
                assert!(result.reward > 0.5);
                scored = true;
                break;
            }
        }
        assert!(scored, "shot from the slot should go in");
        let state = env.observe();
        assert!(state[2].abs() < 1e-6);
    }

    #[test]
    fn given_render_when_called_then_shows_skaters_and_score() {
        let mut env = RinkEnv::new(EnvConfig::default());
        env.reset();
        let frame = env.render();
        assert!(frame.contains('P'));
        assert!(frame.contains('O'));
        assert!(frame.contains("score 0:0"));
    }
}
