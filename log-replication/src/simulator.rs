//! Randomised failure injection for followers.
//!
//! The simulator runs on its own thread, ticking at the configured interval.
//! Every tick draws one random value per follower and flips it down or up
//! according to the current [`ChaosConfig`]. The master is never touched.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use rand::rngs::StdRng;
use rand::Rng;
use tokio::runtime::Builder;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::ChaosConfig;
use crate::error::Result;
use crate::follower::Follower;
use crate::node::Node;

/// Random source shared by read routing and failure injection.
pub type SharedRng = Arc<Mutex<StdRng>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    CameUp,
}

/// One availability change made by a simulator tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaosEvent {
    pub node: String,
    pub transition: Transition,
}

struct Control {
    config_tx: watch::Sender<ChaosConfig>,
    thread: JoinHandle<()>,
}

pub struct FailureSimulator {
    followers: Vec<Arc<Follower>>,
    rng: SharedRng,
    control: Mutex<Option<Control>>,
}

impl FailureSimulator {
    pub fn new(followers: Vec<Arc<Follower>>, rng: SharedRng) -> Self {
        Self {
            followers,
            rng,
            control: Mutex::new(None),
        }
    }

    /// Starts ticking with `config`, or swaps in `config` if already running.
    ///
    /// A swap restarts the period from now; it never adds a second timer.
    pub fn start(&self, config: ChaosConfig) -> Result<()> {
        let mut control = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = control.as_ref() {
            if !running.thread.is_finished() {
                running.config_tx.send_replace(config);
                info!(?config, "failure simulator reconfigured");
                return Ok(());
            }
        }
        // A timer thread that exited on its own is replaced, not retuned.
        if let Some(Control { thread, .. }) = control.take() {
            if thread.join().is_err() {
                warn!("failure simulator thread panicked, restarting it");
            }
        }

        let runtime = Builder::new_current_thread().enable_time().build()?;
        let (config_tx, config_rx) = watch::channel(config);
        let followers = self.followers.clone();
        let rng = Arc::clone(&self.rng);
        let thread = thread::Builder::new()
            .name("failure-simulator".to_string())
            .spawn(move || runtime.block_on(run(config_rx, followers, rng)))?;

        info!(?config, "failure simulator started");
        *control = Some(Control { config_tx, thread });
        Ok(())
    }

    /// True while the timer thread is alive.
    pub fn is_running(&self) -> bool {
        self.control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.thread.is_finished())
    }

    /// Stops the timer thread and waits for it to exit. Idempotent.
    pub fn stop(&self) {
        let control = self
            .control
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Control { config_tx, thread }) = control else {
            return;
        };
        // Closing the channel ends the tick loop.
        drop(config_tx);
        if thread.join().is_err() {
            warn!("failure simulator thread panicked");
        }
        info!("failure simulator stopped");
    }

    /// Runs a single tick with `config`, outside the timer.
    pub fn tick(&self, config: &ChaosConfig) -> Vec<ChaosEvent> {
        inject_failures(&self.followers, &self.rng, config)
    }
}

impl Drop for FailureSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    mut config_rx: watch::Receiver<ChaosConfig>,
    followers: Vec<Arc<Follower>>,
    rng: SharedRng,
) {
    loop {
        let config = *config_rx.borrow_and_update();
        let mut ticker = time::interval_at(Instant::now() + config.interval(), config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    inject_failures(&followers, &rng, &config);
                }
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
            }
        }
    }
}

fn inject_failures(
    followers: &[Arc<Follower>],
    rng: &Mutex<StdRng>,
    config: &ChaosConfig,
) -> Vec<ChaosEvent> {
    let mut events = Vec::new();
    for follower in followers {
        let roll: f64 = rng.lock().unwrap_or_else(PoisonError::into_inner).gen();
        let transition = if follower.is_available() {
            if roll >= config.failure_probability() {
                continue;
            }
            follower.go_down();
            Transition::WentDown
        } else {
            if roll >= config.recovery_probability() {
                continue;
            }
            follower.go_up();
            Transition::CameUp
        };
        events.push(ChaosEvent {
            node: follower.id().to_string(),
            transition,
        });
    }
    if !events.is_empty() {
        info!(?events, "failure simulator tick");
    }
    events
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;

    use super::*;
    use crate::master::Master;

    fn fixture(followers: usize) -> (Arc<Master>, FailureSimulator) {
        let master = Master::new("master", 1).unwrap();
        let followers = (0..followers)
            .map(|i| Follower::new(format!("follower-{i}"), &master))
            .collect();
        let rng = Arc::new(Mutex::new(StdRng::seed_from_u64(7)));
        (master, FailureSimulator::new(followers, rng))
    }

    #[test]
    fn calm_tick_brings_everyone_up() {
        let (master, simulator) = fixture(4);
        let followers = master.followers();
        followers[0].go_down();
        followers[2].go_down();

        let calm = ChaosConfig::calm(Duration::from_secs(1)).unwrap();
        let events = simulator.tick(&calm);

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.transition == Transition::CameUp));
        assert!(followers.iter().all(|follower| follower.is_available()));
        master.shutdown();
    }

    #[test]
    fn certain_failure_downs_every_follower_but_not_the_master() {
        let (master, simulator) = fixture(3);
        let storm = ChaosConfig::new(1.0, 0.0, Duration::from_secs(1)).unwrap();

        assert_eq!(simulator.tick(&storm).len(), 3);
        assert!(master.followers().iter().all(|f| !f.is_available()));
        assert!(master.is_available());

        // Down followers stay down when recovery is impossible.
        assert!(simulator.tick(&storm).is_empty());
        master.shutdown();
    }

    #[test]
    fn timer_ticks_and_can_be_reconfigured() {
        let (master, simulator) = fixture(2);
        let storm = ChaosConfig::new(1.0, 0.0, Duration::from_millis(20)).unwrap();
        simulator.start(storm).unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(master.followers().iter().all(|f| !f.is_available()));

        simulator
            .start(ChaosConfig::calm(Duration::from_millis(20)).unwrap())
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(master.followers().iter().all(|f| f.is_available()));

        // Nothing changes under a quiet config. A storm timer still running
        // alongside would down a follower every 20ms and nothing would bring
        // it back, so every sample must see everyone up.
        simulator
            .start(ChaosConfig::new(0.0, 0.0, Duration::from_millis(20)).unwrap())
            .unwrap();
        for _ in 0..75 {
            assert!(master.followers().iter().all(|f| f.is_available()));
            thread::sleep(Duration::from_millis(2));
        }
        assert!(simulator.is_running());

        simulator.stop();
        simulator.stop();
        assert!(!simulator.is_running());
        master.shutdown();
    }
}
