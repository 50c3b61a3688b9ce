use co2_tracker::emissions::FactorSource;
use co2_tracker::location::{
    geo_metadata_canada, CloudMetadata, Locator, StaticCloudProbe, StaticGeoLocator,
};
use co2_tracker::sensors::debug::{debug_hardware, two_gpu_details, DebugGpuSensor};
use co2_tracker::{track_co2_with, AppConfig, Tracker, TrackerConfig, TrackerError};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// 40 W of CPU, 6 W of RAM and two GPUs drawing 58 W.
const DEBUG_HOST_WATTS: f64 = 104.0;

fn build_tracker(config: TrackerConfig, gpu: DebugGpuSensor, geo: StaticGeoLocator) -> Tracker {
    Tracker::with_collaborators(
        config,
        AppConfig::default(),
        debug_hardware(gpu),
        Locator::new(
            Box::new(StaticCloudProbe::new(CloudMetadata::none())),
            Box::new(geo),
        ),
    )
}

fn config_in(dir: &Path, measure_power_secs: f64) -> TrackerConfig {
    TrackerConfig {
        measure_power_secs,
        output_dir: dir.to_path_buf(),
        project_name: String::from("project_foo"),
        ..Default::default()
    }
}

fn output_lines(config: &TrackerConfig) -> Vec<String> {
    fs::read_to_string(config.emissions_file_path())
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

fn heavy_computation(run_time: Duration) {
    thread::sleep(run_time);
}

#[test]
fn two_gpu_private_infra_canada() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackerConfig {
        save_to_file: false,
        ..config_in(dir.path(), 1.0)
    };
    let gpu = DebugGpuSensor::new(two_gpu_details(), true);
    let availability_calls = gpu.availability_counter();
    let details_calls = gpu.details_counter();
    let geo = StaticGeoLocator::new(geo_metadata_canada());
    let geo_calls = geo.call_counter();
    let mut tracker = build_tracker(config, gpu, geo);

    tracker.start().unwrap();
    heavy_computation(Duration::from_millis(2500));
    let emissions = tracker.stop().unwrap().unwrap();

    // baseline + 2 ticks + final one
    assert!(
        (3..=5).contains(&details_calls.get()),
        "{} GPU reads",
        details_calls.get()
    );
    assert_eq!(availability_calls.get(), 1);
    assert_eq!(geo_calls.get(), 1);

    let energy = tracker.energy().unwrap();
    assert!(energy.elapsed_secs >= 2.5);
    let expected_kwh = DEBUG_HOST_WATTS * energy.elapsed_secs / 3_600_000.0;
    assert!((energy.total_kwh() - expected_kwh).abs() < expected_kwh * 1e-9);
    assert!((energy.gpu_kwh - 58.0 * energy.elapsed_secs / 3_600_000.0).abs() < 1e-12);

    let factor = tracker.emissions_factor().unwrap();
    assert_eq!(factor.source, FactorSource::CountryEnergyMix);
    assert!((emissions - energy.total_kwh() * factor.kg_per_kwh).abs() < 1e-15);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn geo_ip_timeout_still_records_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 0.2);
    let geo = StaticGeoLocator::timing_out();
    let geo_calls = geo.call_counter();
    let mut tracker = build_tracker(config.clone(), DebugGpuSensor::absent(), geo);

    tracker.start().unwrap();
    heavy_computation(Duration::from_millis(500));
    let emissions = tracker.stop().unwrap();

    assert_eq!(emissions, None);
    assert_eq!(geo_calls.get(), 1);
    assert!(tracker.energy().unwrap().total_kwh() > 0.0);
    let lines = output_lines(&config);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("timestamp,project_name,"));
    assert!(lines[1].contains(",project_foo,"));
}

#[test]
fn decorator_online_appends_one_line_per_call() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 0.5);

    let tracker = build_tracker(
        config.clone(),
        DebugGpuSensor::absent(),
        StaticGeoLocator::new(geo_metadata_canada()),
    );
    let answer = track_co2_with(tracker, || 42).unwrap();
    assert_eq!(answer, 42);
    assert_eq!(output_lines(&config).len(), 2);

    let tracker = build_tracker(
        config.clone(),
        DebugGpuSensor::absent(),
        StaticGeoLocator::new(geo_metadata_canada()),
    );
    assert_eq!(track_co2_with(tracker, || 42).unwrap(), 42);
    assert_eq!(output_lines(&config).len(), 3);
}

#[test]
fn decorator_passes_errors_through() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 0.5);
    let tracker = build_tracker(
        config.clone(),
        DebugGpuSensor::absent(),
        StaticGeoLocator::new(geo_metadata_canada()),
    );
    let res: Result<Result<u32, String>, TrackerError> =
        track_co2_with(tracker, || Err(String::from("out of memory")));
    assert_eq!(res.unwrap(), Err(String::from("out of memory")));
    assert_eq!(output_lines(&config).len(), 2);
}

#[test]
fn decorator_offline_without_country_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackerConfig {
        offline: true,
        ..config_in(dir.path(), 0.5)
    };
    let tracker = build_tracker(
        config.clone(),
        DebugGpuSensor::absent(),
        StaticGeoLocator::new(geo_metadata_canada()),
    );
    let mut called = false;
    let res = track_co2_with(tracker, || called = true);
    assert!(matches!(res, Err(TrackerError::Config(_))));
    assert!(!called);
    assert!(!config.emissions_file_path().exists());
}

#[test]
fn decorator_offline_with_country() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrackerConfig {
        offline: true,
        country: Some(String::from("Canada")),
        ..config_in(dir.path(), 0.5)
    };
    let geo = StaticGeoLocator::new(geo_metadata_canada());
    let geo_calls = geo.call_counter();
    let tracker = build_tracker(config.clone(), DebugGpuSensor::absent(), geo);

    assert_eq!(track_co2_with(tracker, || 42).unwrap(), 42);
    assert_eq!(geo_calls.get(), 0);
    let lines = output_lines(&config);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(",country_energy_mix,"));
    assert!(lines[1].contains(",CAN,Canada,"));
}

#[test]
fn offline_and_online_canada_agree() {
    let offline_config = TrackerConfig {
        measure_power_secs: 0.5,
        save_to_file: false,
        offline: true,
        country: Some(String::from("Canada")),
        ..Default::default()
    };
    let mut offline = build_tracker(
        offline_config,
        DebugGpuSensor::absent(),
        StaticGeoLocator::timing_out(),
    );
    offline.start().unwrap();
    offline.stop().unwrap().unwrap();

    let online_config = TrackerConfig {
        measure_power_secs: 0.5,
        save_to_file: false,
        ..Default::default()
    };
    let mut online = build_tracker(
        online_config,
        DebugGpuSensor::absent(),
        StaticGeoLocator::new(geo_metadata_canada()),
    );
    online.start().unwrap();
    online.stop().unwrap().unwrap();

    assert_eq!(offline.emissions_factor(), online.emissions_factor());
    let offline_record = offline.last_record().unwrap();
    let online_record = online.last_record().unwrap();
    assert_eq!(offline_record.country_iso_code.as_deref(), Some("CAN"));
    assert_eq!(offline_record.country_iso_code, online_record.country_iso_code);
    assert_eq!(
        offline_record.emissions_factor_kg_per_kwh,
        online_record.emissions_factor_kg_per_kwh
    );
}

#[test]
fn energy_grows_with_duration() {
    let mut totals = vec![];
    for run_time in [Duration::from_millis(100), Duration::from_millis(400)] {
        let config = TrackerConfig {
            measure_power_secs: 0.1,
            save_to_file: false,
            ..Default::default()
        };
        let mut tracker = build_tracker(
            config,
            DebugGpuSensor::absent(),
            StaticGeoLocator::new(geo_metadata_canada()),
        );
        tracker.start().unwrap();
        heavy_computation(run_time);
        tracker.stop().unwrap();
        totals.push(tracker.energy().unwrap().total_kwh());
    }
    assert!(totals[0] > 0.0);
    assert!(totals[1] > totals[0]);
}

#[test]
fn immediate_stop_is_never_negative() {
    let config = TrackerConfig {
        measure_power_secs: 10.0,
        save_to_file: false,
        ..Default::default()
    };
    let mut tracker = build_tracker(
        config,
        DebugGpuSensor::new(two_gpu_details(), true),
        StaticGeoLocator::new(geo_metadata_canada()),
    );
    tracker.start().unwrap();
    let emissions = tracker.stop().unwrap().unwrap();
    assert!(emissions >= 0.0);
    assert!(emissions < 1e-6);
    // the stop signal must not wait for the 10 s interval
    assert!(tracker.energy().unwrap().elapsed_secs < 5.0);
}

#[test]
fn offline_cloud_host_uses_the_cloud_region() {
    let config = TrackerConfig {
        measure_power_secs: 0.5,
        save_to_file: false,
        offline: true,
        country: Some(String::from("Canada")),
        ..Default::default()
    };
    let geo = StaticGeoLocator::new(geo_metadata_canada());
    let geo_calls = geo.call_counter();
    let mut tracker = Tracker::with_collaborators(
        config,
        AppConfig::default(),
        debug_hardware(DebugGpuSensor::absent()),
        Locator::new(
            Box::new(StaticCloudProbe::new(CloudMetadata::new("aws", "us-east-1"))),
            Box::new(geo),
        ),
    );
    tracker.start().unwrap();
    tracker.stop().unwrap().unwrap();

    let factor = tracker.emissions_factor().unwrap();
    assert_eq!(factor.source, FactorSource::CloudRegion);
    assert_eq!(geo_calls.get(), 0);
    let record = tracker.last_record().unwrap();
    assert_eq!(record.cloud_provider.as_deref(), Some("aws"));
    assert_eq!(record.cloud_region.as_deref(), Some("us-east-1"));
}
