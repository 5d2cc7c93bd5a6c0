//! The training loop: one tick is encode -> decide -> step -> remember -> replay,
//! strictly in that order.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::approximator::QApproximator;
use crate::environment::Environment;
use crate::error::Result;
use crate::log;
use crate::policy::{Choice, Decision, EpsilonGreedy};
use crate::render::Overlay;
use crate::replay_buffer::Transition;
use crate::stats::{EpisodeReport, FitTally, Statistics};
use crate::trainer::Trainer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Epsilon-greedy actions, every step is stored and trained on.
    Train,
    /// Greedy actions only, nothing is learned.
    Evaluate,
}

/// Handed to the per-tick observer (usually the display).
#[derive(Debug, Clone, Copy)]
pub struct TickInfo {
    pub episode: usize,
    pub survival: u32,              // ticks survived so far this episode
    pub decision: Decision,         // action taken and how it was chosen
    pub score: u32,
    pub explored: u32,              // random actions this episode
    pub exploited: u32,             // greedy actions this episode
    pub mean_loss: Option<f32>,     // rolling window over recent fits
    pub mean_accuracy: Option<f32>, // percent, same window
}

impl TickInfo {
    pub fn overlay(&self) -> Overlay {
        Overlay {
            episode: self.episode,
            score: self.score,
            survival: self.survival,
            epsilon: self.decision.epsilon,
            explored: self.explored,
            exploited: self.exploited,
            mean_loss: self.mean_loss,
            mean_accuracy: self.mean_accuracy,
        }
    }
}

/// Everything a training run mutates: trainer (replay memory + approximator),
/// policy, global step counter, RNG and metric windows.
pub struct TrainingSession<A> {
    trainer: Trainer<A>,
    policy: EpsilonGreedy,
    mode: Mode,
    step_counter: u64,      // training ticks over the whole run, drives epsilon
    max_steps: usize,       // per-episode tick cap
    tick: Option<Duration>, // frame limiter, None = flat out
    rng: StdRng,            // policy draws and replay sampling
    stats: Statistics,      // rolling loss/accuracy window
}

impl<A: QApproximator> TrainingSession<A> {
    pub fn new(trainer: Trainer<A>, policy: EpsilonGreedy, mode: Mode, seed: u64) -> Self {
        Self {
            trainer,
            policy,
            mode,
            step_counter: 0,
            max_steps: usize::MAX,
            tick: None,
            rng: StdRng::seed_from_u64(seed),
            stats: Statistics::new(100),
        }
    }

    pub fn with_stat_limit(mut self, limit: usize) -> Self {
        self.stats = Statistics::new(limit);
        self
    }

    /// Cap on ticks per episode.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Fixed-rate frame limiter; zero disables it.
    pub fn with_tick(mut self, interval: Duration) -> Self {
        self.tick = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn trainer(&self) -> &Trainer<A> { &self.trainer }
    pub fn trainer_mut(&mut self) -> &mut Trainer<A> { &mut self.trainer }
    pub fn stats(&self) -> &Statistics { &self.stats }
    pub fn step_counter(&self) -> u64 { self.step_counter }

    /// Continue a previous run's epsilon schedule.
    pub fn resume_at(&mut self, steps: u64) {
        self.step_counter = steps;
    }

    pub fn epsilon(&self) -> f64 {
        match self.mode {
            Mode::Train => self.policy.schedule().epsilon(self.step_counter),
            Mode::Evaluate => 0.0,
        }
    }

    /// Plays one episode until the environment reports a terminal step or the
    /// tick cap is reached. `on_tick` errors are logged and otherwise ignored.
    pub fn run_episode<E, F>(&mut self, env: &mut E, episode: usize, mut on_tick: F) -> Result<EpisodeReport>
    where
        E: Environment,
        F: FnMut(&E, &TickInfo) -> Result<()>,
    {
        let mut explored = 0u32;
        let mut exploited = 0u32;
        let mut survival = 0u32;
        let mut tally = FitTally::default();
        let mut last_frame = Instant::now();

        while (survival as usize) < self.max_steps {
            let state = env.state(); // s
            let epsilon = self.epsilon();
            let trainer = &self.trainer;
            let decision = self.policy.decide(&mut self.rng, epsilon, || trainer.exploit(&state))?;
            match decision.choice {
                Choice::Explore => explored += 1,
                Choice::Exploit => exploited += 1,
            }

            let result = env.step(decision.action); // r and whether s' ends the episode
            survival += 1;

            if self.mode == Mode::Train {
                self.step_counter += 1;
                let next_state = env.state(); // s'
                self.trainer.remember(Transition {
                    state,
                    action: decision.action,
                    reward: result.reward,
                    next_state,
                    terminal: result.terminal,
                });
                // the episode-ending tick trains on raw rewards only
                if let Some(metrics) = self.trainer.replay(&mut self.rng, result.terminal)? {
                    self.stats.record(metrics);
                    tally.add(metrics);
                    debug!(step = self.step_counter, loss = metrics.loss, accuracy = metrics.accuracy, "fit");
                }
            }

            let info = TickInfo {
                episode,
                survival,
                decision,
                score: env.score(),
                explored,
                exploited,
                mean_loss: self.stats.mean_loss(),
                mean_accuracy: self.stats.mean_accuracy(),
            };
            if let Err(e) = on_tick(env, &info) {
                debug!(error = %e, "display update failed");
            }
            if let Some(interval) = self.tick {
                throttle(&mut last_frame, interval);
            }
            if result.terminal {
                break;
            }
        }

        let report = EpisodeReport {
            episode,
            score: env.score(),
            steps: survival,
            epsilon: self.epsilon(),
            explored,
            exploited,
            mean_loss: tally.mean_loss(),
            mean_accuracy: tally.mean_accuracy(),
        };
        log::scalar(self.step_counter, "score", f64::from(report.score));
        log::scalar(self.step_counter, "epsilon", report.epsilon);
        if let Some(loss) = report.mean_loss {
            log::scalar(self.step_counter, "loss", f64::from(loss));
        }
        if let Some(accuracy) = report.mean_accuracy {
            log::scalar(self.step_counter, "accuracy", f64::from(accuracy) * 100.0);
        }
        Ok(report)
    }
}

fn throttle(last: &mut Instant, interval: Duration) {
    let elapsed = last.elapsed();
    if elapsed < interval {
        std::thread::sleep(interval - elapsed);
    }
    *last = Instant::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approximator::FitMetrics;
    use crate::environment::StepResult;
    use crate::error::Error;
    use crate::matrix::Matrix;
    use crate::policy::EpsilonSchedule;
    use crate::replay_buffer::ReplayBuffer;
    use std::path::Path;

    /// Corridor of `len` ticks; action 1 scores, the last tick is terminal.
    struct Corridor {
        len: u32,
        pos: u32,
        score: u32,
    }

    impl Environment for Corridor {
        fn state(&self) -> Vec<f32> {
            vec![self.pos as f32, 1.0]
        }

        fn step(&mut self, action: usize) -> StepResult {
            self.pos += 1;
            let ate = action == 1;
            if ate {
                self.score += 1;
            }
            let terminal = self.pos >= self.len;
            StepResult { reward: if terminal { -10.0 } else if ate { 10.0 } else { -1.0 }, terminal }
        }

        fn reset(&mut self) {
            self.pos = 0;
            self.score = 0;
        }

        fn score(&self) -> u32 {
            self.score
        }
    }

    /// Always prefers action 1 and counts fits.
    #[derive(Default)]
    struct Fixed {
        fits: usize,
    }

    impl QApproximator for Fixed {
        fn predict(&self, states: &Matrix) -> Result<Matrix> {
            let data = (0..states.rows()).flat_map(|_| [0.0, 1.0, 0.0, 0.0]).collect();
            Matrix::from_vec(states.rows(), 4, data)
        }

        fn fit(&mut self, _states: &Matrix, _targets: &Matrix) -> Result<FitMetrics> {
            self.fits += 1;
            Ok(FitMetrics { loss: 1.0, accuracy: 0.5 })
        }

        fn save_weights(&self, _path: &Path) -> Result<()> { Ok(()) }
        fn load_weights(&mut self, _path: &Path) -> Result<()> { Ok(()) }
    }

    fn session(mode: Mode) -> TrainingSession<Fixed> {
        let trainer = Trainer::new(Fixed::default(), ReplayBuffer::new(100, 8).unwrap(), 0.9);
        let schedule = EpsilonSchedule { start: 1.0, end: 0.03, decay: 0.01 };
        TrainingSession::new(trainer, EpsilonGreedy::new(schedule), mode, 5)
    }

    #[test]
    fn training_episode_stores_and_fits_every_tick() {
        let mut s = session(Mode::Train);
        let mut env = Corridor { len: 6, pos: 0, score: 0 };
        let report = s.run_episode(&mut env, 1, |_, _| Ok(())).unwrap();

        assert_eq!(report.steps, 6);
        assert_eq!(report.explored + report.exploited, 6);
        assert_eq!(s.step_counter(), 6);
        assert_eq!(s.trainer().memory().len(), 6);
        assert_eq!(s.trainer().model().fits, 6);
        assert!(s.trainer().memory().iter().last().unwrap().terminal);
        assert_eq!(report.mean_loss, Some(1.0));
        assert!(report.epsilon < 1.0);
    }

    #[test]
    fn step_counter_keeps_growing_across_episodes() {
        let mut s = session(Mode::Train);
        let mut env = Corridor { len: 4, pos: 0, score: 0 };
        s.run_episode(&mut env, 1, |_, _| Ok(())).unwrap();
        let eps_after_first = s.epsilon();
        env.reset();
        s.run_episode(&mut env, 2, |_, _| Ok(())).unwrap();
        assert_eq!(s.step_counter(), 8);
        assert!(s.epsilon() < eps_after_first);
    }

    #[test]
    fn evaluation_is_greedy_and_learns_nothing() {
        let mut s = session(Mode::Evaluate);
        let mut env = Corridor { len: 5, pos: 0, score: 0 };
        let report = s.run_episode(&mut env, 1, |_, _| Ok(())).unwrap();
        assert_eq!(report.exploited, 5);
        assert_eq!(report.score, 5);
        assert!(s.trainer().memory().is_empty());
        assert_eq!(s.trainer().model().fits, 0);
    }

    #[test]
    fn display_errors_do_not_stop_the_episode() {
        let mut s = session(Mode::Train);
        let mut env = Corridor { len: 3, pos: 0, score: 0 };
        let mut calls = 0;
        let report = s
            .run_episode(&mut env, 1, |_, _| {
                calls += 1;
                Err(Error::Io(std::io::Error::other("no display")))
            })
            .unwrap();
        assert_eq!(report.steps, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn ticks_carry_the_rolling_fit_metrics() {
        let mut s = session(Mode::Train);
        let mut env = Corridor { len: 4, pos: 0, score: 0 };
        let mut overlays = Vec::new();
        s.run_episode(&mut env, 1, |_, tick| {
            overlays.push(tick.overlay());
            Ok(())
        })
        .unwrap();

        assert_eq!(overlays.len(), 4);
        for overlay in &overlays {
            assert_eq!(overlay.mean_loss, Some(1.0));
            assert_eq!(overlay.mean_accuracy, Some(50.0));
        }
        assert_eq!(s.stats().mean_loss(), Some(1.0));
    }

    #[test]
    fn evaluation_ticks_have_no_fit_metrics() {
        let mut s = session(Mode::Evaluate);
        let mut env = Corridor { len: 2, pos: 0, score: 0 };
        s.run_episode(&mut env, 1, |_, tick| {
            assert_eq!(tick.mean_loss, None);
            assert_eq!(tick.mean_accuracy, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn tick_cap_ends_endless_episodes() {
        let mut s = session(Mode::Evaluate).with_max_steps(10);
        let mut env = Corridor { len: u32::MAX, pos: 0, score: 0 };
        let report = s.run_episode(&mut env, 1, |_, _| Ok(())).unwrap();
        assert_eq!(report.steps, 10);
    }
}
