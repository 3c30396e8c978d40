// src/actuation.rs - Actuation loop: recompute IK for every leg at its own cadence
use std::sync::Arc;
use std::time::Duration;

use crate::leg::Leg;
use crate::worker::PeriodicWorker;

/// Pushes joint angles for every registered leg from its latest goal.
///
/// Goals are read lock-free from each leg's `GoalCell`; the control tick
/// never waits on this loop and a goal may be one cycle stale.
pub struct ActuationLoop {
    legs: Vec<Arc<Leg>>,
    interval: Duration,
    worker: Option<PeriodicWorker>,
}

impl ActuationLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            legs: Vec::new(),
            interval,
            worker: None,
        }
    }

    /// Register a leg. Legs added while running are picked up on the next start.
    pub fn add_leg(&mut self, leg: Arc<Leg>) {
        self.legs.push(leg);
    }

    pub fn legs(&self) -> &[Arc<Leg>] {
        &self.legs
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// One actuation pass. Returns how many legs received new angles.
    pub fn run_once(legs: &[Arc<Leg>]) -> usize {
        legs.iter().filter(|leg| leg.update_actuators()).count()
    }

    pub fn start(&mut self) {
        if self.worker.is_some() {
            tracing::warn!("Actuation loop already running");
            return;
        }
        let legs = self.legs.clone();
        self.worker = Some(PeriodicWorker::spawn("actuation", self.interval, move || {
            Self::run_once(&legs);
        }));
    }

    /// Stop the loop and wait until its last pass has finished.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop().await;
        }
    }
}
