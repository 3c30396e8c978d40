// src/sensors.rs - Latest-value sensor cache and the sampling loop that fills it
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use std::time::Duration;

use crate::geometry::Vec3;
use crate::hardware::{HardwareSet, LoadSampler, OrientationSampler};
use crate::leg::LEG_COUNT;
use crate::worker::PeriodicWorker;

/// Most recent load and orientation readings. The sampler replaces whole
/// values; the controller reads without blocking.
#[derive(Debug)]
pub struct SensorCache {
    loads: ArcSwap<[i32; LEG_COUNT]>,
    level: ArcSwapOption<Vec3>,
    orientation_available: bool,
}

impl SensorCache {
    pub fn new(orientation_available: bool) -> Self {
        Self {
            loads: ArcSwap::from_pointee([0; LEG_COUNT]),
            level: ArcSwapOption::empty(),
            orientation_available,
        }
    }

    pub fn loads(&self) -> [i32; LEG_COUNT] {
        **self.loads.load()
    }

    pub fn publish_loads(&self, loads: [i32; LEG_COUNT]) {
        self.loads.store(Arc::new(loads));
    }

    /// Latest gravity vector, if an orientation sensor has reported one.
    pub fn level(&self) -> Option<Vec3> {
        self.level.load().as_deref().copied()
    }

    pub fn publish_level(&self, level: Vec3) {
        self.level.store(Some(Arc::new(level)));
    }

    pub fn has_orientation(&self) -> bool {
        self.orientation_available
    }
}

pub struct SensorSampler {
    cache: Arc<SensorCache>,
    loads: Arc<dyn LoadSampler>,
    orientation: Option<Arc<dyn OrientationSampler>>,
    interval: Duration,
    worker: Option<PeriodicWorker>,
}

impl SensorSampler {
    pub fn new(hardware: &HardwareSet, interval: Duration) -> Self {
        Self {
            cache: Arc::new(SensorCache::new(hardware.has_orientation())),
            loads: hardware.loads.clone(),
            orientation: hardware.orientation.clone(),
            interval,
            worker: None,
        }
    }

    pub fn cache(&self) -> Arc<SensorCache> {
        self.cache.clone()
    }

    /// Poll every sensor once. Failed reads keep the previous value.
    pub fn sample_once(
        cache: &SensorCache,
        loads: &dyn LoadSampler,
        orientation: Option<&dyn OrientationSampler>,
    ) {
        match loads.loads() {
            Ok(values) => cache.publish_loads(values),
            Err(e) => tracing::debug!("Load sample failed: {}", e),
        }
        if let Some(sensor) = orientation {
            match sensor.level() {
                Ok(level) => cache.publish_level(level),
                Err(e) => tracing::debug!("Orientation sample failed: {}", e),
            }
        }
    }

    pub fn poll(&self) {
        Self::sample_once(&self.cache, self.loads.as_ref(), self.orientation.as_deref());
    }

    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let cache = self.cache.clone();
        let loads = self.loads.clone();
        let orientation = self.orientation.clone();
        self.worker = Some(PeriodicWorker::spawn("sensor sampling", self.interval, move || {
            Self::sample_once(&cache, loads.as_ref(), orientation.as_deref());
        }));
    }

    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hardware::HardwareError;
    use crate::hardware::simulated::SimulatedRig;

    #[test]
    fn test_cache_defaults() {
        let cache = SensorCache::new(false);
        assert_eq!(cache.loads(), [0; LEG_COUNT]);
        assert_eq!(cache.level(), None);
        assert!(!cache.has_orientation());
    }

    #[test]
    fn test_failed_reads_keep_previous_values() {
        let rig = SimulatedRig::for_config(&Config::default(), true);
        rig.loads.set_loads([7; LEG_COUNT]);
        let sampler = SensorSampler::new(&rig.hardware_set(), Duration::from_millis(5));
        sampler.poll();

        rig.loads.set_silent(Some(21));
        rig.loads.set_loads([9; LEG_COUNT]);
        assert!(matches!(rig.loads.loads(), Err(HardwareError::Bus { id: 21, .. })));
        let orientation = rig.orientation.as_ref().unwrap();
        orientation.clear_level();
        assert!(matches!(orientation.level(), Err(HardwareError::Unavailable(_))));

        sampler.poll();
        let cache = sampler.cache();
        assert_eq!(cache.loads(), [7; LEG_COUNT]);
        assert_eq!(cache.level(), Some(Vec3::zeros()));

        rig.loads.set_silent(None);
        sampler.poll();
        assert_eq!(cache.loads(), [9; LEG_COUNT]);
    }

    #[test]
    fn test_poll_copies_latest_readings() {
        let rig = SimulatedRig::for_config(&Config::default(), true);
        rig.loads.set_loads([1, 2, 3, 4, 5, 6]);
        if let Some(orientation) = &rig.orientation {
            orientation.set_level(Vec3::new(0.0, 0.1, 9.8));
        }
        let sampler = SensorSampler::new(&rig.hardware_set(), Duration::from_millis(5));
        sampler.poll();
        let cache = sampler.cache();
        assert_eq!(cache.loads(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(cache.level(), Some(Vec3::new(0.0, 0.1, 9.8)));
        assert!(cache.has_orientation());
    }
}
