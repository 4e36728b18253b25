//! DQN agent: MLP Q-network, uniform replay, epsilon-greedy control
//!
//! Built on candle; checkpoints are safetensors files written and read
//! through the agent's `VarMap`.

use std::collections::VecDeque;
use std::path::Path;

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{linear, loss, AdamW, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use rand::Rng;

use crate::config::TrainConfig;
use crate::pipeline::env::{Action, Observation, STATE_DIM};

/// Hyperparameters the agent needs at construction time.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub state_dim: usize,
    pub hidden_dim: usize,
    pub action_count: usize,
    pub replay_capacity: usize,
    pub batch_size: usize,
    pub gamma: f64,
    pub learning_rate: f64,
    pub epsilon_start: f64,
    pub epsilon_end: f64,
    pub epsilon_decay_steps: u32,
    pub learning_starts: u32,
    pub target_sync_interval: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_train_config(&TrainConfig::default())
    }
}

impl AgentConfig {
    /// Network width and target-sync cadence are fixed; the rest mirrors
    /// the training config.
    pub fn from_train_config(config: &TrainConfig) -> Self {
        Self {
            state_dim: STATE_DIM,
            hidden_dim: 128,
            action_count: Action::COUNT,
            replay_capacity: config.replay_capacity,
            batch_size: config.batch_size,
            gamma: config.gamma,
            learning_rate: config.learning_rate,
            epsilon_start: config.epsilon_start,
            epsilon_end: config.epsilon_end,
            epsilon_decay_steps: config.epsilon_decay_steps,
            learning_starts: config.learning_starts,
            target_sync_interval: 1_000,
        }
    }
}

/// One replay-buffer entry.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: Observation,
    pub action: usize,
    pub reward: f32,
    pub next_state: Observation,
    pub done: bool,
}

struct QNet {
    l1: Linear,
    l2: Linear,
    l3: Linear,
}

impl QNet {
    fn new(vb: VarBuilder, cfg: &AgentConfig) -> Result<Self> {
        Ok(Self {
            l1: linear(cfg.state_dim, cfg.hidden_dim, vb.pp("l1"))?,
            l2: linear(cfg.hidden_dim, cfg.hidden_dim, vb.pp("l2"))?,
            l3: linear(cfg.hidden_dim, cfg.action_count, vb.pp("l3"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.l1.forward(xs)?.relu()?;
        let xs = self.l2.forward(&xs)?.relu()?;
        self.l3.forward(&xs)
    }
}

pub struct DqnAgent {
    cfg: AgentConfig,
    device: Device,
    varmap: VarMap,
    qnet: QNet,
    target_varmap: VarMap,
    target_net: QNet,
    opt: AdamW,
    replay: VecDeque<Transition>,
    /// Current exploration rate. Annealed by [`train_step`]; set to 0.0
    /// by evaluation for greedy play.
    pub epsilon: f64,
    /// Gradient steps taken.
    pub train_steps: u64,
    /// Environment steps observed, drives the epsilon schedule.
    pub total_env_steps: u64,
}

impl DqnAgent {
    pub fn new(device: &Device, cfg: AgentConfig) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let qnet = QNet::new(vb, &cfg)?;

        let target_varmap = VarMap::new();
        let target_vb = VarBuilder::from_varmap(&target_varmap, DType::F32, device);
        let target_net = QNet::new(target_vb, &cfg)?;

        let opt = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: cfg.learning_rate,
                ..Default::default()
            },
        )?;

        let epsilon = cfg.epsilon_start;
        let mut agent = Self {
            cfg,
            device: device.clone(),
            varmap,
            qnet,
            target_varmap,
            target_net,
            opt,
            replay: VecDeque::new(),
            epsilon,
            train_steps: 0,
            total_env_steps: 0,
        };
        agent.sync_target()?;
        Ok(agent)
    }

    /// Epsilon-greedy action selection over the online network.
    pub fn select_action(&self, state: &Observation) -> Result<usize> {
        let mut rng = rand::rng();
        if rng.random::<f64>() < self.epsilon {
            return Ok(rng.random_range(0..self.cfg.action_count));
        }
        let input = Tensor::from_slice(state, (1, self.cfg.state_dim), &self.device)?;
        let qs = self.qnet.forward(&input)?;
        let best = qs.argmax(1)?.squeeze(0)?.to_scalar::<u32>()?;
        Ok(best as usize)
    }

    pub fn remember(&mut self, transition: Transition) {
        self.replay.push_back(transition);
        if self.replay.len() > self.cfg.replay_capacity {
            self.replay.pop_front();
        }
    }

    /// Linear anneal from `epsilon_start` to `epsilon_end` over
    /// `epsilon_decay_steps` environment steps.
    pub fn scheduled_epsilon(&self) -> f64 {
        let span = self.cfg.epsilon_start - self.cfg.epsilon_end;
        let progress =
            (self.total_env_steps as f64 / self.cfg.epsilon_decay_steps as f64).min(1.0);
        self.cfg.epsilon_start - span * progress
    }

    /// One TD(0) step on a uniform minibatch. Returns 0.0 while the
    /// warm-up threshold or the batch size is not yet met.
    pub fn train_step(&mut self) -> Result<f32> {
        self.epsilon = self.scheduled_epsilon();

        if self.total_env_steps < u64::from(self.cfg.learning_starts)
            || self.replay.len() < self.cfg.batch_size
        {
            return Ok(0.0);
        }

        let batch = self.cfg.batch_size;
        let mut rng = rand::rng();
        let mut states = Vec::with_capacity(batch * self.cfg.state_dim);
        let mut next_states = Vec::with_capacity(batch * self.cfg.state_dim);
        let mut actions = Vec::with_capacity(batch);
        let mut rewards = Vec::with_capacity(batch);
        let mut not_done = Vec::with_capacity(batch);
        for _ in 0..batch {
            let t = &self.replay[rng.random_range(0..self.replay.len())];
            states.extend_from_slice(&t.state);
            next_states.extend_from_slice(&t.next_state);
            actions.push(t.action as u32);
            rewards.push(t.reward);
            not_done.push(if t.done { 0.0f32 } else { 1.0 });
        }

        let states = Tensor::from_vec(states, (batch, self.cfg.state_dim), &self.device)?;
        let next_states =
            Tensor::from_vec(next_states, (batch, self.cfg.state_dim), &self.device)?;
        let actions = Tensor::from_vec(actions, (batch, 1), &self.device)?;
        let rewards = Tensor::from_vec(rewards, batch, &self.device)?;
        let not_done = Tensor::from_vec(not_done, batch, &self.device)?;

        let q = self
            .qnet
            .forward(&states)?
            .gather(&actions, 1)?
            .squeeze(1)?;
        let next_max = self.target_net.forward(&next_states)?.max(1)?;
        let future = next_max.mul(&not_done)?.affine(self.cfg.gamma, 0.0)?;
        let target = rewards.add(&future)?.detach();

        let loss = loss::mse(&q, &target)?;
        self.opt.backward_step(&loss)?;

        self.train_steps += 1;
        if self.train_steps % u64::from(self.cfg.target_sync_interval) == 0 {
            self.sync_target()?;
        }
        loss.to_scalar::<f32>()
    }

    /// Copy online weights into the target network.
    fn sync_target(&mut self) -> Result<()> {
        let src = self.varmap.data().lock().unwrap();
        let dst = self.target_varmap.data().lock().unwrap();
        for (name, var) in src.iter() {
            if let Some(target) = dst.get(name) {
                target.set(&var.as_tensor().detach())?;
            }
        }
        Ok(())
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Write the online network as a safetensors checkpoint.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)
    }

    /// Load a safetensors checkpoint into both networks.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path)?;
        self.sync_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> AgentConfig {
        AgentConfig {
            hidden_dim: 16,
            replay_capacity: 32,
            batch_size: 4,
            learning_starts: 4,
            epsilon_decay_steps: 100,
            ..AgentConfig::default()
        }
    }

    fn dummy_transition(reward: f32, done: bool) -> Transition {
        Transition {
            state: [0.1; STATE_DIM],
            action: 0,
            reward,
            next_state: [0.2; STATE_DIM],
            done,
        }
    }

    #[test]
    fn given_greedy_agent_when_selecting_then_action_in_range() {
        let mut agent = DqnAgent::new(&Device::Cpu, small_config()).unwrap();
        agent.epsilon = 0.0;
        let action = agent.select_action(&[0.0; STATE_DIM]).unwrap();
        assert!(action < Action::COUNT);
    }

    #[test]
    fn given_full_replay_when_remembering_then_capacity_bounded() {
        let mut agent = DqnAgent::new(&Device::Cpu, small_config()).unwrap();
        for _ in 0..100 {
            agent.remember(dummy_transition(0.0, false));
        }
        assert_eq!(agent.replay_len(), 32);
    }

    #[test]
    fn given_env_steps_when_annealing_then_epsilon_hits_endpoints() {
        let mut agent = DqnAgent::new(&Device::Cpu, small_config()).unwrap();
        assert!((agent.scheduled_epsilon() - 1.0).abs() < 1e-9);
        agent.total_env_steps = 1_000_000;
        assert!((agent.scheduled_epsilon() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn given_warm_replay_when_training_then_loss_finite() {
        let mut agent = DqnAgent::new(&Device::Cpu, small_config()).unwrap();
        for _ in 0..16 {
            agent.remember(dummy_transition(1.0, false));
        }
        agent.total_env_steps = 16;
        let loss = agent.train_step().unwrap();
        assert!(loss.is_finite());
    }

    #[test]
    fn given_saved_checkpoint_when_loading_then_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.safetensors");

        let agent = DqnAgent::new(&Device::Cpu, small_config()).unwrap();
        agent.save(&path).unwrap();

        let mut restored = DqnAgent::new(&Device::Cpu, small_config()).unwrap();
        restored.load(&path).unwrap();
    }
}
