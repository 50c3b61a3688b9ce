//! # tracker
//!
//! The [Tracker] measures the energy consumed between its `start()` and
//! its `stop()`, then turns it into CO2 emissions with the emissions factor
//! of the place the computation runs in.
//!
//! While running, a sampler thread owns the sensors and the
//! [EnergyAccumulator]. It wakes up every `measure_power_secs`, reads the
//! power drawn by the CPU, the GPU (if any) and the RAM, and adds the
//! energy consumed since its previous reading. `stop()` signals the thread,
//! joins it to get the accumulator back and performs a last reading so the
//! time since the last tick is accounted for.
use crate::config::{AppConfig, TrackerConfig};
use crate::emissions::{EmissionsData, EmissionsFactor};
use crate::errors::TrackerError;
use crate::exporters::{file::FileExporter, utils, EmissionsRecord, Exporter};
use crate::location::{CloudMetadata, GeoMetadata, Location, Locator};
use crate::sensors::units::Unit;
use crate::sensors::{current_system_time_since_epoch, Hardware, PowerSensor};
use chrono::Utc;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle of a tracker. Trackers can't be restarted once stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerState::Idle => write!(f, "idle"),
            TrackerState::Running => write!(f, "running"),
            TrackerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Power drawn by each component at one sampling instant, in Watts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSample {
    pub cpu_watts: f64,
    pub gpu_watts: f64,
    pub ram_watts: f64,
    pub instant: Instant,
    /// Wall clock time of the reading, since the epoch
    pub timestamp: Duration,
}

impl PowerSample {
    pub fn total_watts(&self) -> f64 {
        self.cpu_watts + self.gpu_watts + self.ram_watts
    }
}

/// Energy consumed since the start of the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyAccumulator {
    pub cpu_kwh: f64,
    pub gpu_kwh: f64,
    pub ram_kwh: f64,
    pub elapsed_secs: f64,
    pub ticks: u64,
}

impl EnergyAccumulator {
    /// Adds the energy drawn at the power of `sample` for `elapsed`.
    /// Negative powers count as zero so the totals never decrease.
    pub fn add(&mut self, sample: &PowerSample, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.cpu_kwh += Unit::watts_over_secs_to_kwh(sample.cpu_watts.max(0.0), secs);
        self.gpu_kwh += Unit::watts_over_secs_to_kwh(sample.gpu_watts.max(0.0), secs);
        self.ram_kwh += Unit::watts_over_secs_to_kwh(sample.ram_watts.max(0.0), secs);
        self.elapsed_secs += secs;
        self.ticks += 1;
    }

    pub fn total_kwh(&self) -> f64 {
        self.cpu_kwh + self.gpu_kwh + self.ram_kwh
    }
}

/// State moved into the sampler thread.
struct Sampler {
    hardware: Hardware,
    gpu_available: bool,
    accumulator: EnergyAccumulator,
    last_instant: Instant,
}

fn read_watts(sensor: &mut dyn PowerSensor) -> f64 {
    match sensor.read_power().and_then(|r| r.as_watts()) {
        Ok(watts) => watts,
        Err(e) => {
            warn!("Couldn't read {} power, counting 0 W: {}", sensor.name(), e);
            0.0
        }
    }
}

impl Sampler {
    /// Energy will be counted from `started_at`.
    fn new(mut hardware: Hardware, started_at: Instant) -> Sampler {
        let gpu_available = hardware.gpu.is_gpu_details_available();
        if gpu_available {
            info!("GPU telemetry available");
        } else {
            info!("No GPU telemetry, GPU energy won't be measured");
        }
        Sampler {
            hardware,
            gpu_available,
            accumulator: EnergyAccumulator::default(),
            last_instant: started_at,
        }
    }

    fn sample(&mut self) -> PowerSample {
        let cpu_watts = read_watts(self.hardware.cpu.as_mut());
        let gpu_watts = if self.gpu_available {
            match self.hardware.gpu.get_gpu_power() {
                Ok(watts) => watts,
                Err(e) => {
                    warn!("Couldn't read GPU power, counting 0 W: {}", e);
                    0.0
                }
            }
        } else {
            0.0
        };
        let ram_watts = read_watts(self.hardware.ram.as_mut());
        PowerSample {
            cpu_watts,
            gpu_watts,
            ram_watts,
            instant: Instant::now(),
            timestamp: current_system_time_since_epoch(),
        }
    }

    /// First reading, so that counter based sensors have a reference.
    /// Nothing is accumulated.
    fn prime(&mut self) {
        let sample = self.sample();
        trace!("baseline at {:.2} W", sample.total_watts());
    }

    fn tick(&mut self) {
        let sample = self.sample();
        let elapsed = sample.instant.saturating_duration_since(self.last_instant);
        self.accumulator.add(&sample, elapsed);
        self.last_instant = sample.instant;
        debug!(
            "tick {}: {:.2} W over {:?}, {} kWh so far",
            self.accumulator.ticks,
            sample.total_watts(),
            elapsed,
            self.accumulator.total_kwh()
        );
    }
}

struct RunningSampler {
    stop_tx: Sender<()>,
    handle: JoinHandle<Sampler>,
    started_at: Instant,
}

impl RunningSampler {
    fn spawn(
        mut sampler: Sampler,
        interval: Duration,
        started_at: Instant,
    ) -> Result<RunningSampler, TrackerError> {
        sampler.prime();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(String::from("co2-tracker-sampler"))
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => sampler.tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                sampler
            })?;
        Ok(RunningSampler {
            stop_tx,
            handle,
            started_at,
        })
    }

    /// Signals the thread and waits for it to hand the sampler back.
    fn halt(self) -> Result<(Sampler, Instant), TrackerError> {
        // the thread may already be gone, join tells
        let _ = self.stop_tx.send(());
        let sampler = self
            .handle
            .join()
            .map_err(|_| TrackerError::InvalidState(String::from("the sampler thread panicked")))?;
        Ok((sampler, self.started_at))
    }
}

/// Measures the energy consumed by the host during a run and the CO2
/// emissions it amounts to.
///
/// # Examples
///
/// ```no_run
/// use co2_tracker::{Tracker, TrackerConfig};
///
/// let mut tracker = Tracker::new(TrackerConfig::default());
/// tracker.start().unwrap();
/// // train the model...
/// let emissions = tracker.stop().unwrap();
/// println!("{:?} kg CO2eq", emissions);
/// ```
pub struct Tracker {
    config: TrackerConfig,
    state: TrackerState,
    hardware: Option<Hardware>,
    locator: Locator,
    emissions_data: EmissionsData,
    exporters: Vec<Box<dyn Exporter>>,
    cloud: Option<CloudMetadata>,
    location: Option<Location>,
    factor: Option<EmissionsFactor>,
    factor_error: Option<TrackerError>,
    running: Option<RunningSampler>,
    accumulator: Option<EnergyAccumulator>,
    last_record: Option<EmissionsRecord>,
}

impl Tracker {
    /// Instantiates a tracker using the sensors of this host, the real
    /// location services and the reference tables shipped with the crate.
    pub fn new(config: TrackerConfig) -> Tracker {
        let app = AppConfig::default();
        let locator = Locator::from_app_config(&app);
        Tracker::with_collaborators(config, app, Hardware::detect(), locator)
    }

    pub fn with_collaborators(
        config: TrackerConfig,
        app: AppConfig,
        hardware: Hardware,
        locator: Locator,
    ) -> Tracker {
        Tracker {
            config,
            state: TrackerState::Idle,
            hardware: Some(hardware),
            locator,
            emissions_data: EmissionsData::new(app),
            exporters: vec![],
            cloud: None,
            location: None,
            factor: None,
            factor_error: None,
            running: None,
            accumulator: None,
            last_record: None,
        }
    }

    /// Adds an exporter the record is handed to on `stop()`, on top of the
    /// emissions file when `save_to_file` is set.
    pub fn add_exporter(&mut self, exporter: Box<dyn Exporter>) {
        self.exporters.push(exporter);
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn cloud_metadata(&self) -> Option<&CloudMetadata> {
        self.cloud.as_ref()
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Physical location, when the run isn't on a known cloud.
    pub fn geo_metadata(&self) -> Option<&GeoMetadata> {
        match &self.location {
            Some(Location::Private(geo)) => Some(geo),
            _ => None,
        }
    }

    /// Emissions factor resolved at `start()`.
    pub fn emissions_factor(&self) -> Option<&EmissionsFactor> {
        self.factor.as_ref()
    }

    /// Energy consumed during the run, available once stopped.
    pub fn energy(&self) -> Option<&EnergyAccumulator> {
        self.accumulator.as_ref()
    }

    pub fn last_record(&self) -> Option<&EmissionsRecord> {
        self.last_record.as_ref()
    }

    /// Resolves the location of the run and starts sampling in the background.
    ///
    /// Fails when the tracker isn't idle or when the configuration is
    /// unusable (e.g. offline without a country). Failing to locate the host
    /// online isn't an error: emissions will be reported as unknown.
    ///
    /// Energy is counted from the moment `start()` is called, the time
    /// spent locating the host included.
    pub fn start(&mut self) -> Result<(), TrackerError> {
        let started_at = Instant::now();
        if self.state != TrackerState::Idle {
            return Err(TrackerError::InvalidState(format!(
                "start() called on a {} tracker",
                self.state
            )));
        }
        self.config.validate()?;
        let interval = self.config.measure_interval()?;

        let (cloud, location) = self.locator.resolve(&self.config)?;
        match self.emissions_data.resolve(&location) {
            Ok(factor) => self.factor = factor,
            Err(e) => {
                warn!("No emissions factor for this run: {}", e);
                self.factor_error = Some(e);
            }
        }
        self.cloud = Some(cloud);
        self.location = Some(location);

        let hardware = self.hardware.take().ok_or_else(|| {
            TrackerError::InvalidState(String::from("the tracker has no hardware to sample"))
        })?;
        match RunningSampler::spawn(Sampler::new(hardware, started_at), interval, started_at) {
            Ok(running) => {
                self.running = Some(running);
                self.state = TrackerState::Running;
                info!(
                    "Tracking {} every {:?}",
                    self.config.project_name, interval
                );
                Ok(())
            }
            Err(e) => {
                self.state = TrackerState::Stopped;
                Err(e)
            }
        }
    }

    /// Stops sampling and returns the emissions of the run, in kg of CO2eq.
    ///
    /// Returns `Ok(None)` when the location couldn't be resolved. The record
    /// is persisted before a missing emissions factor is reported.
    pub fn stop(&mut self) -> Result<Option<f64>, TrackerError> {
        let running = match (self.state, self.running.take()) {
            (TrackerState::Running, Some(running)) => running,
            (state, _) => {
                return Err(TrackerError::InvalidState(format!(
                    "stop() called on a {state} tracker"
                )))
            }
        };
        self.state = TrackerState::Stopped;
        let (mut sampler, started_at) = running.halt()?;
        sampler.tick();
        let accumulator = sampler.accumulator;
        trace!(
            "sampler ran {:?} for {} ticks",
            sampler.last_instant.saturating_duration_since(started_at),
            accumulator.ticks
        );

        let energy_kwh = accumulator.total_kwh();
        let emissions_kg = self.factor.as_ref().map(|f| f.emissions_kg(energy_kwh));
        let record = self.build_record(&accumulator, emissions_kg);
        self.accumulator = Some(accumulator);
        match emissions_kg {
            Some(kg) => info!("{} kWh consumed, {} kg CO2eq emitted", energy_kwh, kg),
            None => info!("{} kWh consumed, emissions unknown", energy_kwh),
        }

        self.persist(&record)?;
        self.last_record = Some(record);
        if let Some(e) = self.factor_error.take() {
            return Err(e);
        }
        Ok(emissions_kg)
    }

    /// Starts the tracker and returns a guard stopping it when dropped.
    pub fn scoped(mut self) -> Result<ScopedTracker, TrackerError> {
        self.start()?;
        Ok(ScopedTracker { tracker: self })
    }

    fn build_record(&self, accumulator: &EnergyAccumulator, emissions_kg: Option<f64>) -> EmissionsRecord {
        let cloud = self.cloud.clone().unwrap_or_default();
        let geo = self.geo_metadata();
        let factor = self.factor.as_ref();
        EmissionsRecord {
            timestamp: Utc::now().to_rfc3339(),
            project_name: self.config.project_name.clone(),
            hostname: utils::get_hostname(),
            duration_secs: accumulator.elapsed_secs,
            cpu_energy_kwh: accumulator.cpu_kwh,
            gpu_energy_kwh: accumulator.gpu_kwh,
            ram_energy_kwh: accumulator.ram_kwh,
            energy_kwh: accumulator.total_kwh(),
            emissions_kg,
            emissions_factor_kg_per_kwh: factor.map(|f| f.kg_per_kwh),
            emissions_factor_source: factor.map(|f| f.source.to_string()),
            cloud_provider: cloud.provider,
            cloud_region: cloud.region,
            country_iso_code: factor
                .and_then(|f| f.country_iso_code.clone())
                .or_else(|| geo.and_then(|g| g.country_iso_code.clone())),
            country_name: factor
                .and_then(|f| f.country_name.clone())
                .or_else(|| geo.and_then(|g| g.country_name.clone())),
            region: geo.and_then(|g| g.region.clone()),
        }
    }

    fn persist(&mut self, record: &EmissionsRecord) -> Result<(), TrackerError> {
        if self.config.save_to_file {
            FileExporter::new(self.config.emissions_file_path()).export(record)?;
        }
        for exporter in self.exporters.iter_mut() {
            if let Err(e) = exporter.export(record) {
                error!("{} exporter failed: {}", exporter.kind(), e);
            }
        }
        Ok(())
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            warn!("Tracker dropped while running, nothing will be persisted");
            if let Err(e) = running.halt() {
                error!("{}", e);
            }
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("location", &self.location)
            .field("factor", &self.factor)
            .finish()
    }
}

/// A running tracker, stopped when dropped.
pub struct ScopedTracker {
    tracker: Tracker,
}

impl ScopedTracker {
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Stops the tracker now and returns its result.
    pub fn finish(mut self) -> Result<Option<f64>, TrackerError> {
        self.tracker.stop()
    }
}

impl Drop for ScopedTracker {
    fn drop(&mut self) {
        if self.tracker.state() == TrackerState::Running {
            if let Err(e) = self.tracker.stop() {
                error!("Couldn't finalize the emissions of {}: {}", self.tracker.config.project_name, e);
            }
        }
    }
}

/// Runs `f` while `tracker` measures it, and returns what `f` returns.
///
/// The tracker is stopped (and the record persisted) even if `f` panics, in
/// which case the panic is resumed once done. Failing to finalize the
/// emissions after `f` returned is logged and doesn't hide its value.
pub fn track_co2_with<F, R>(tracker: Tracker, f: F) -> Result<R, TrackerError>
where
    F: FnOnce() -> R,
{
    let guard = tracker.scoped()?;
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    let project_name = guard.tracker().config().project_name.clone();
    match guard.finish() {
        Ok(Some(kg)) => info!("{} emitted {} kg CO2eq", project_name, kg),
        Ok(None) => warn!("Emissions of {} couldn't be computed", project_name),
        Err(e) => error!("Couldn't finalize the emissions of {}: {}", project_name, e),
    }
    match result {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Runs `f` while a tracker built from `config` with the host's own sensors
/// measures it. See [track_co2_with].
pub fn track_co2<F, R>(config: TrackerConfig, f: F) -> Result<R, TrackerError>
where
    F: FnOnce() -> R,
{
    track_co2_with(Tracker::new(config), f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{geo_metadata_canada, StaticCloudProbe, StaticGeoLocator};
    use crate::sensors::debug::{debug_hardware, DebugGpuSensor, DebugPowerSensor};

    fn quiet_config() -> TrackerConfig {
        TrackerConfig {
            measure_power_secs: 0.05,
            save_to_file: false,
            ..Default::default()
        }
    }

    fn tracker(config: TrackerConfig, cloud: CloudMetadata, geo: StaticGeoLocator) -> Tracker {
        Tracker::with_collaborators(
            config,
            AppConfig::default(),
            debug_hardware(DebugGpuSensor::absent()),
            Locator::new(Box::new(StaticCloudProbe::new(cloud)), Box::new(geo)),
        )
    }

    fn sample(watts: f64) -> PowerSample {
        PowerSample {
            cpu_watts: watts,
            gpu_watts: watts,
            ram_watts: watts,
            instant: Instant::now(),
            timestamp: Duration::from_secs(0),
        }
    }

    #[test]
    fn accumulator_integrates_power_over_time() {
        let mut acc = EnergyAccumulator::default();
        acc.add(&sample(1000.0), Duration::from_secs(1800));
        assert!((acc.cpu_kwh - 0.5).abs() < 1e-12);
        assert!((acc.total_kwh() - 1.5).abs() < 1e-12);
        assert_eq!(acc.ticks, 1);
        assert_eq!(acc.elapsed_secs, 1800.0);
    }

    #[test]
    fn accumulator_never_decreases() {
        let mut acc = EnergyAccumulator::default();
        acc.add(&sample(10.0), Duration::from_secs(10));
        let before = acc.total_kwh();
        acc.add(&sample(-50.0), Duration::from_secs(10));
        assert_eq!(acc.total_kwh(), before);
    }

    #[test]
    fn stop_before_start_is_an_error() {
        let mut t = tracker(quiet_config(), CloudMetadata::none(), StaticGeoLocator::timing_out());
        assert!(matches!(t.stop(), Err(TrackerError::InvalidState(_))));
        assert_eq!(t.state(), TrackerState::Idle);
    }

    #[test]
    fn lifecycle_is_idle_running_stopped() {
        let mut t = tracker(
            quiet_config(),
            CloudMetadata::none(),
            StaticGeoLocator::new(geo_metadata_canada()),
        );
        t.start().unwrap();
        assert_eq!(t.state(), TrackerState::Running);
        assert!(matches!(t.start(), Err(TrackerError::InvalidState(_))));
        let emissions = t.stop().unwrap().unwrap();
        assert!(emissions >= 0.0);
        assert_eq!(t.state(), TrackerState::Stopped);
        assert!(matches!(t.stop(), Err(TrackerError::InvalidState(_))));
        assert!(matches!(t.start(), Err(TrackerError::InvalidState(_))));
    }

    #[test]
    fn immediate_stop_is_near_zero() {
        let mut t = tracker(
            quiet_config(),
            CloudMetadata::none(),
            StaticGeoLocator::new(geo_metadata_canada()),
        );
        t.start().unwrap();
        let emissions = t.stop().unwrap().unwrap();
        assert!(emissions >= 0.0);
        assert!(emissions < 1e-6);
    }

    #[test]
    fn cloud_factor_is_resolved_once() {
        let cloud = StaticCloudProbe::new(CloudMetadata::new("aws", "us-east-1"));
        let cloud_calls = cloud.call_counter();
        let mut t = Tracker::with_collaborators(
            quiet_config(),
            AppConfig::default(),
            debug_hardware(DebugGpuSensor::absent()),
            Locator::new(Box::new(cloud), Box::new(StaticGeoLocator::timing_out())),
        );
        t.start().unwrap();
        let first = t.emissions_factor().cloned();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(t.emissions_factor().cloned(), first);
        t.stop().unwrap();
        assert_eq!(t.emissions_factor().cloned(), first);
        assert_eq!(cloud_calls.get(), 1);
        let factor = first.unwrap();
        assert_eq!(factor.region_key, "aws/us-east-1");
        let record = t.last_record().unwrap();
        assert_eq!(record.cloud_provider.as_deref(), Some("aws"));
    }

    #[test]
    fn unknown_region_fails_at_stop() {
        let mut t = tracker(
            quiet_config(),
            CloudMetadata::new("aws", "mars-east-1"),
            StaticGeoLocator::timing_out(),
        );
        t.start().unwrap();
        assert!(t.emissions_factor().is_none());
        assert!(matches!(t.stop(), Err(TrackerError::RegionNotFound(_))));
        let record = t.last_record().unwrap();
        assert_eq!(record.emissions_kg, None);
    }

    #[test]
    fn offline_without_country_fails_at_start() {
        let config = TrackerConfig {
            offline: true,
            ..quiet_config()
        };
        let mut t = tracker(config, CloudMetadata::none(), StaticGeoLocator::timing_out());
        assert!(matches!(t.start(), Err(TrackerError::Config(_))));
        assert_eq!(t.state(), TrackerState::Idle);
    }

    #[test]
    fn dropping_a_running_tracker_joins_the_sampler() {
        let cpu = DebugPowerSensor::new("cpu", 40.0);
        let cpu_reads = cpu.call_counter();
        let mut t = Tracker::with_collaborators(
            quiet_config(),
            AppConfig::default(),
            Hardware::new(
                Box::new(cpu),
                Box::new(DebugGpuSensor::absent()),
                Box::new(DebugPowerSensor::new("ram", 6.0)),
            ),
            Locator::new(
                Box::new(StaticCloudProbe::new(CloudMetadata::none())),
                Box::new(StaticGeoLocator::timing_out()),
            ),
        );
        t.start().unwrap();
        thread::sleep(Duration::from_millis(120));
        drop(t);
        let reads_at_drop = cpu_reads.get();
        assert!(reads_at_drop >= 2);
        thread::sleep(Duration::from_millis(200));
        assert_eq!(cpu_reads.get(), reads_at_drop);
    }

    #[test]
    fn unavailable_gpu_counts_zero() {
        let gpu = DebugGpuSensor::absent();
        let availability_calls = gpu.availability_counter();
        let details_calls = gpu.details_counter();
        let mut t = Tracker::with_collaborators(
            quiet_config(),
            AppConfig::default(),
            debug_hardware(gpu),
            Locator::new(
                Box::new(StaticCloudProbe::new(CloudMetadata::none())),
                Box::new(StaticGeoLocator::new(geo_metadata_canada())),
            ),
        );
        t.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        assert!(t.stop().unwrap().unwrap() > 0.0);
        let energy = t.energy().unwrap();
        assert_eq!(availability_calls.get(), 1);
        assert_eq!(details_calls.get(), 0);
        assert_eq!(energy.gpu_kwh, 0.0);
        assert!(energy.cpu_kwh > 0.0);
        assert!(energy.ticks >= 2);
    }

    #[test]
    fn oversized_interval_fails_at_start() {
        let config = TrackerConfig {
            measure_power_secs: 1e20,
            ..quiet_config()
        };
        let mut t = tracker(config, CloudMetadata::none(), StaticGeoLocator::timing_out());
        assert!(matches!(t.start(), Err(TrackerError::Config(_))));
        assert_eq!(t.state(), TrackerState::Idle);
    }

    #[test]
    fn energy_is_counted_from_the_call_to_start() {
        let mut t = tracker(
            quiet_config(),
            CloudMetadata::none(),
            StaticGeoLocator::new(geo_metadata_canada()),
        );
        let before_start = Instant::now();
        t.start().unwrap();
        t.stop().unwrap();
        let measured = t.energy().unwrap().elapsed_secs;
        assert!(measured > 0.0);
        assert!(measured <= before_start.elapsed().as_secs_f64());
    }

    #[test]
    fn wrapper_resumes_panics_after_finalizing() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig {
            save_to_file: true,
            output_dir: dir.path().to_path_buf(),
            project_name: String::from("panicky"),
            ..quiet_config()
        };
        let path = config.emissions_file_path();
        let t = tracker(config, CloudMetadata::none(), StaticGeoLocator::new(geo_metadata_canada()));
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            track_co2_with(t, || -> u32 { panic!("training diverged") })
        }));
        let payload = res.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"training diverged"));
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}

//  Copyright 2020 The co2-tracker authors.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
