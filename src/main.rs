use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use snake_dqn::approximator::QApproximator;
use snake_dqn::checkpoint::{self, AgentState};
use snake_dqn::config::{Config, TrainConfig};
use snake_dqn::db::EpisodeLog;
use snake_dqn::environment::{Environment, SnakeEnv};
use snake_dqn::log;
use snake_dqn::network::Mlp;
use snake_dqn::policy::EpsilonGreedy;
use snake_dqn::render::{NullRenderer, Renderer, TextRenderer};
use snake_dqn::replay_buffer::ReplayBuffer;
use snake_dqn::session::{Mode, TrainingSession};
use snake_dqn::snake::ACTIONS;
use snake_dqn::trainer::Trainer;

#[derive(Parser, Debug)]
#[command(version, about = "Deep Q-Learning agent for snake", long_about = None)]
struct Args {
    /// JSON config file. Built-in defaults are used when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the agent, checkpointing weights along the way.
    Train {
        #[arg(short, long)]
        episodes: Option<usize>,
        #[arg(short, long)]
        weights: Option<PathBuf>,
        /// Continue from saved weights and progress; fails if they are missing.
        #[arg(long)]
        resume: bool,
        #[arg(short, long)]
        display: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Play greedily with trained weights.
    Play {
        #[arg(short, long)]
        weights: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        episodes: usize,
        #[arg(short, long)]
        display: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("loading config")?;
    log::init(&config.train.log_path, args.verbose)?;

    match args.command {
        Command::Train { episodes, weights, resume, display, seed } => {
            if let Some(n) = episodes {
                config.train.episodes = n;
            }
            if let Some(w) = weights {
                config.train.weights_path = w;
            }
            if let Some(s) = seed {
                config.agent.seed = s;
            }
            train(&config, resume, display)
        }
        Command::Play { weights, episodes, display } => play(&config, &weights, episodes, display),
    }
}

fn build_session(config: &Config, mode: Mode) -> Result<(TrainingSession<Mlp>, SnakeEnv)> {
    let agent = &config.agent;
    let env = SnakeEnv::new(config.game.clone(), config.reward, agent.food_distance_feature, agent.seed);

    // weight init and the policy/sampling stream use separate seeds
    let mut init_rng = StdRng::seed_from_u64(agent.seed ^ 0xA5A5_5A5A);
    let model = Mlp::new(env.state_len(), &agent.hidden, ACTIONS, agent.learning_rate, &mut init_rng);
    let memory = ReplayBuffer::new(agent.capacity, agent.batch_size)?;

    let session = TrainingSession::new(
        Trainer::new(model, memory, agent.gamma),
        EpsilonGreedy::new(agent.schedule()),
        mode,
        agent.seed ^ 0xDEAD_BEEF,
    )
    .with_stat_limit(config.train.stat_limit)
    .with_max_steps(config.train.max_steps)
    .with_tick(Duration::from_millis(config.game.tick_millis));
    Ok((session, env))
}

fn renderer(display: bool) -> Box<dyn Renderer> {
    if display { Box::new(TextRenderer::stdout()) } else { Box::new(NullRenderer) }
}

fn train(config: &Config, resume: bool, display: bool) -> Result<()> {
    let t = &config.train;
    let (mut session, mut env) = build_session(config, Mode::Train)?;

    let mut progress = AgentState::default();
    if resume {
        session
            .trainer_mut()
            .model_mut()
            .load_weights(&t.weights_path)
            .context("resuming needs the saved weights")?;
        progress = checkpoint::load_agent_state(&t.state_path)
            .with_context(|| format!("reading {}", t.state_path.display()))?;
        session.resume_at(progress.steps);
        info!(episode = progress.episode, steps = progress.steps, epsilon = progress.epsilon, "resumed training");
    }

    let history = EpisodeLog::open(&t.db_path).context("opening episode history")?;
    if let Some(best) = history.best_score()? {
        info!(best, recorded = history.count()?, "episode history found");
    }
    if let Some(last) = history.recent(1)?.first() {
        info!(episode = last.episode, score = last.score, recorded_at = %last.recorded_at, "last recorded episode");
    }
    let mut screen = renderer(display);

    let first = progress.episode + 1;
    for episode in first..first + t.episodes {
        env.reset();
        let report = session.run_episode(&mut env, episode, |env, tick| {
            Ok(screen.draw(env.game(), &tick.overlay())?)
        })?;
        info!(
            episode,
            score = report.score,
            survival = report.steps,
            epsilon = report.epsilon,
            explored = report.explored,
            exploited = report.exploited,
            loss = ?report.mean_loss,
            rolling_loss = ?session.stats().mean_loss(),
            "episode finished"
        );
        if let Err(e) = history.insert(&report) {
            warn!(error = %e, "could not record episode");
        }

        progress = AgentState {
            episode,
            steps: session.step_counter(),
            epsilon: report.epsilon,
            best_score: progress.best_score.max(report.score),
        };
        if episode % t.save_every == 0 {
            save(&session, t, &progress)?;
        }
    }

    save(&session, t, &progress)?;
    info!(best_score = progress.best_score, "training finished");
    Ok(())
}

fn play(config: &Config, weights: &Path, episodes: usize, display: bool) -> Result<()> {
    let (mut session, mut env) = build_session(config, Mode::Evaluate)?;
    session
        .trainer_mut()
        .model_mut()
        .load_weights(weights)
        .context("playing needs trained weights")?;

    let mut screen = renderer(display);
    for episode in 1..=episodes {
        env.reset();
        let report = session.run_episode(&mut env, episode, |env, tick| {
            Ok(screen.draw(env.game(), &tick.overlay())?)
        })?;
        info!(episode, score = report.score, survival = report.steps, "game over");
    }
    Ok(())
}

fn save(session: &TrainingSession<Mlp>, t: &TrainConfig, progress: &AgentState) -> Result<()> {
    session.trainer().model().save_weights(&t.weights_path)?;
    checkpoint::save_agent_state(&t.state_path, progress)?;
    info!(path = %t.weights_path.display(), episode = progress.episode, "saved weights");
    Ok(())
}
