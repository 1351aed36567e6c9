//! World abstraction and drive loops.
//!
//! A [`World`] is a vectorized simulation that can be stepped, observed,
//! and overwritten. Observations are flattened row-major over
//! environments, `[n_envs * obs_dim]`, matching the layout the collector
//! and translator consume.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::collect::{CollectError, TransitionCollector};
use crate::deploy::{TranslateError, WorldTranslator};
use burn::prelude::Backend;

/// Trait for vectorized worlds that produce observation streams.
///
/// `get_last_obs` returns the observation from before the most recent
/// [`World::physics_step`], so a `(prev_obs, obs)` transition pair is
/// always available without external bookkeeping.
pub trait World {
    /// Number of parallel environments.
    fn n_envs(&self) -> usize;

    /// Observation dimension per environment.
    fn obs_dim(&self) -> usize;

    /// Reset all environments to freshly randomized states.
    fn reset(&mut self);

    /// Advance every environment by one physics step.
    fn physics_step(&mut self);

    /// Current observations, `[n_envs * obs_dim]`.
    fn get_obs(&self) -> &[f32];

    /// Observations from before the latest step, `[n_envs * obs_dim]`.
    fn get_last_obs(&self) -> &[f32];

    /// Overwrite the current observations, e.g. with translated state.
    ///
    /// `obs` must hold exactly `n_envs * obs_dim` values.
    fn set_obs(&mut self, obs: &[f32]);
}

/// Observation dimension of [`BallWorld`]: one 3d velocity per ball.
pub const BALL_OBS_DIM: usize = 3;

/// Vectorized bouncing-ball world.
///
/// One ball per environment inside a unit box. Gravity acts on the
/// vertical axis, walls reflect with restitution, and a small drag term
/// bleeds energy each step. The observation is the ball's velocity.
pub struct BallWorld {
    n_envs: usize,
    dt: f32,
    gravity: f32,
    restitution: f32,
    drag: f32,
    pos: Vec<f32>,
    vel: Vec<f32>,
    last_vel: Vec<f32>,
    rng: StdRng,
}

impl BallWorld {
    /// Create a world with default dynamics, reset to a randomized state.
    pub fn new(n_envs: usize, seed: u64) -> Self {
        Self::with_dynamics(n_envs, seed, -9.81, 0.9, 0.02)
    }

    /// Create a world with explicit gravity, wall restitution, and drag.
    ///
    /// Differing dynamics between two worlds are exactly the gap the
    /// translation model learns to bridge.
    pub fn with_dynamics(
        n_envs: usize,
        seed: u64,
        gravity: f32,
        restitution: f32,
        drag: f32,
    ) -> Self {
        assert!(n_envs > 0, "n_envs must be > 0");
        let mut world = Self {
            n_envs,
            dt: 0.01,
            gravity,
            restitution,
            drag,
            pos: vec![0.0; n_envs * BALL_OBS_DIM],
            vel: vec![0.0; n_envs * BALL_OBS_DIM],
            last_vel: vec![0.0; n_envs * BALL_OBS_DIM],
            rng: StdRng::seed_from_u64(seed),
        };
        world.reset();
        world
    }
}

impl World for BallWorld {
    fn n_envs(&self) -> usize {
        self.n_envs
    }

    fn obs_dim(&self) -> usize {
        BALL_OBS_DIM
    }

    fn reset(&mut self) {
        for p in self.pos.iter_mut() {
            *p = self.rng.gen_range(-0.8..0.8);
        }
        for v in self.vel.iter_mut() {
            *v = self.rng.gen_range(-2.0..2.0);
        }
        self.last_vel.copy_from_slice(&self.vel);
    }

    fn physics_step(&mut self) {
        self.last_vel.copy_from_slice(&self.vel);
        for env in 0..self.n_envs {
            let base = env * BALL_OBS_DIM;
            // Vertical axis is the last component.
            self.vel[base + 2] += self.gravity * self.dt;
            for axis in 0..BALL_OBS_DIM {
                let i = base + axis;
                self.vel[i] *= 1.0 - self.drag;
                self.pos[i] += self.vel[i] * self.dt;
                if self.pos[i] > 1.0 {
                    self.pos[i] = 1.0;
                    self.vel[i] = -self.vel[i].abs() * self.restitution;
                } else if self.pos[i] < -1.0 {
                    self.pos[i] = -1.0;
                    self.vel[i] = self.vel[i].abs() * self.restitution;
                }
            }
        }
    }

    fn get_obs(&self) -> &[f32] {
        &self.vel
    }

    fn get_last_obs(&self) -> &[f32] {
        &self.last_vel
    }

    fn set_obs(&mut self, obs: &[f32]) {
        assert_eq!(
            obs.len(),
            self.n_envs * BALL_OBS_DIM,
            "set_obs expects n_envs * obs_dim values"
        );
        self.vel.copy_from_slice(obs);
    }
}

/// Step `world` for `steps` physics steps, recording every transition
/// through `collector`. The world is reset up front and again every
/// `reset_every` steps; transitions are never recorded across a reset
/// boundary. Pass `reset_every = 0` to never reset mid-run.
///
/// The collector must already be started.
pub fn drive_collection<W: World>(
    world: &mut W,
    collector: &TransitionCollector,
    steps: usize,
    reset_every: usize,
) -> Result<(), CollectError> {
    for step in 0..steps {
        if step == 0 || (reset_every > 0 && step % reset_every == 0) {
            world.reset();
        }
        world.physics_step();
        collector.add_transition(world.get_last_obs(), &[], world.get_obs())?;
    }
    Ok(())
}

/// Step `source` for `steps` physics steps, translating every transition
/// from domain `from` into domain `to` and injecting the translated
/// observations into `target` via [`World::set_obs`]. Returns the
/// translated observation vector of each step, `n_envs * obs_dim` values
/// in the target domain. Reset cadence matches [`drive_collection`].
pub fn drive_translated<S: World, T: World, B: Backend>(
    source: &mut S,
    target: &mut T,
    translator: &WorldTranslator<B>,
    from: &str,
    to: &str,
    steps: usize,
    reset_every: usize,
) -> Result<Vec<Vec<f32>>, TranslateError> {
    let mut translated = Vec::with_capacity(steps);
    for step in 0..steps {
        if step == 0 || (reset_every > 0 && step % reset_every == 0) {
            source.reset();
        }
        source.physics_step();
        let obs = translator.translate(
            from,
            to,
            source.get_last_obs(),
            &[],
            source.get_obs(),
        )?;
        target.set_obs(&obs);
        translated.push(obs);
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorConfig;
    use crate::data::{DomainDataset, DomainSpec};
    use crate::model::TranslationModelConfig;
    use crate::train::checkpoint::{CheckpointMetadata, ConfigSnapshot};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_world_is_deterministic_per_seed() {
        let mut a = BallWorld::new(4, 99);
        let mut b = BallWorld::new(4, 99);
        for _ in 0..50 {
            a.physics_step();
            b.physics_step();
        }
        assert_eq!(a.get_obs(), b.get_obs());

        let mut c = BallWorld::new(4, 100);
        for _ in 0..50 {
            c.physics_step();
        }
        assert_ne!(a.get_obs(), c.get_obs());
    }

    #[test]
    fn test_step_keeps_velocities_finite() {
        let mut world = BallWorld::new(8, 3);
        for _ in 0..1000 {
            world.physics_step();
        }
        assert!(world.get_obs().iter().all(|v| v.is_finite()));
        assert_eq!(world.get_obs().len(), 8 * BALL_OBS_DIM);
    }

    #[test]
    fn test_last_obs_tracks_previous_step() {
        let mut world = BallWorld::new(2, 5);
        let before = world.get_obs().to_vec();
        world.physics_step();
        assert_eq!(world.get_last_obs(), before.as_slice());
        assert_ne!(world.get_obs(), before.as_slice());
    }

    #[test]
    fn test_set_obs_overwrites_velocities() {
        let mut world = BallWorld::new(2, 5);
        let injected = vec![0.5f32; 2 * BALL_OBS_DIM];
        world.set_obs(&injected);
        assert_eq!(world.get_obs(), injected.as_slice());
    }

    #[test]
    fn test_drive_collection_records_every_step() {
        let dir = TempDir::new().unwrap();
        let mut world = BallWorld::new(4, 21);
        let mut collector = TransitionCollector::new(
            CollectorConfig::new(dir.path(), BALL_OBS_DIM, 0).with_chunk_size(64),
        );
        collector.start_collection().unwrap();
        drive_collection(&mut world, &collector, 100, 40).unwrap();
        let stats = collector.stop_collection().unwrap();
        assert_eq!(stats.transitions_persisted, 400);

        let dataset = DomainDataset::open(
            dir.path(),
            DomainSpec::new("sim-world", BALL_OBS_DIM, 0),
        )
        .unwrap();
        assert_eq!(dataset.len(), 400);
    }

    #[test]
    fn test_drive_translated_yields_target_observations() {
        let domain_a = DomainSpec::new("sim-world", BALL_OBS_DIM, 0);
        let domain_b = DomainSpec::new("real-world", BALL_OBS_DIM, 0);
        let device = Default::default();
        let model = TranslationModelConfig::new(
            domain_a.transition_dim(),
            domain_b.transition_dim(),
            8,
        )
        .with_hidden_dim(16)
        .init(&device);
        let metadata = CheckpointMetadata {
            format_version: 1,
            epoch: 1,
            domain_a,
            domain_b,
            latent_dim: 8,
            hidden_dim: 16,
            config: ConfigSnapshot {
                batch_size: 128,
                lambda_cycle: 10.0,
                learning_rate: 1e-3,
                num_workers: 2,
            },
        };
        let translator = WorldTranslator::<TestBackend>::new(model, metadata, device);

        let mut source = BallWorld::new(3, 8);
        let mut target = BallWorld::new(3, 9);
        let out = drive_translated(
            &mut source,
            &mut target,
            &translator,
            "sim-world",
            "real-world",
            10,
            4,
        )
        .unwrap();
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|obs| obs.len() == 3 * BALL_OBS_DIM));
        // The target world now carries the last translated state.
        assert_eq!(target.get_obs(), out.last().unwrap().as_slice());
    }
}
