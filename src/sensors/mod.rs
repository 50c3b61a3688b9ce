//! # Sensors
//!
//! `sensors` is the module that contains the power reading backends
//! consumed by the tracker: one trait per kind of device, a real backend
//! for each and deterministic ones in [debug].
pub mod debug;
pub mod nvidia;
#[cfg(target_os = "linux")]
pub mod powercap_rapl;
pub mod ram;
pub mod tdp;
pub mod units;

use crate::errors::SensorError;
use std::fmt;
use std::time::{Duration, SystemTime};

// !!!!!!!!!!!!!!!!! Sensors !!!!!!!!!!!!!!!!!!!!!!!
/// PowerSensor trait, the API of CPU and RAM backends.
///
/// A reading is the average power drawn since the previous call to
/// `read_power`, or the instantaneous draw for backends that can't tell.
pub trait PowerSensor: Send {
    fn name(&self) -> &str;
    fn read_power(&mut self) -> Result<Record, SensorError>;
}

/// GpuSensor trait, the API of GPU telemetry backends.
pub trait GpuSensor: Send {
    /// Tells if the telemetry can be queried on this host.
    /// Only called once per run by the tracker.
    fn is_gpu_details_available(&mut self) -> bool;

    /// Returns one snapshot per device.
    fn get_gpu_details(&mut self) -> Result<Vec<GpuDetails>, SensorError>;

    /// Returns the power drawn by all the devices, in Watts.
    fn get_gpu_power(&mut self) -> Result<f64, SensorError> {
        Ok(self
            .get_gpu_details()?
            .iter()
            .map(|d| d.power_draw_watts)
            .sum())
    }
}

/// Snapshot of the power state of one GPU.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuDetails {
    pub index: u32,
    pub name: String,
    /// Power draw, in Watts
    pub power_draw_watts: f64,
    /// Utilization, in percent
    pub utilization_percent: f64,
}

/// The set of backends a tracker samples on each tick.
pub struct Hardware {
    pub cpu: Box<dyn PowerSensor>,
    pub gpu: Box<dyn GpuSensor>,
    pub ram: Box<dyn PowerSensor>,
}

impl Hardware {
    pub fn new(
        cpu: Box<dyn PowerSensor>,
        gpu: Box<dyn GpuSensor>,
        ram: Box<dyn PowerSensor>,
    ) -> Hardware {
        Hardware { cpu, gpu, ram }
    }

    /// Returns the best backends available on this host.
    ///
    /// The CPU falls back to a constant estimate when RAPL counters can't
    /// be read, the GPU to nvidia-smi (which may turn out unavailable).
    pub fn detect() -> Hardware {
        Hardware {
            cpu: default_cpu_sensor(),
            gpu: Box::new(nvidia::NvidiaSmiSensor::new()),
            ram: Box::new(ram::RamSensor::new()),
        }
    }
}

impl fmt::Debug for Hardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hardware (cpu={}, ram={})", self.cpu.name(), self.ram.name())
    }
}

#[cfg(target_os = "linux")]
fn default_cpu_sensor() -> Box<dyn PowerSensor> {
    match powercap_rapl::PowercapRaplSensor::check_module() {
        Ok(_) => Box::new(powercap_rapl::PowercapRaplSensor::new()),
        Err(e) => {
            warn!("RAPL counters unavailable ({}), using a constant CPU power estimate", e);
            Box::new(tdp::ConstantPowerSensor::default())
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn default_cpu_sensor() -> Box<dyn PowerSensor> {
    warn!("No CPU power counters on this platform, using a constant CPU power estimate");
    Box::new(tdp::ConstantPowerSensor::default())
}

/// Computes the average power, in Watts, between two energy counter records.
/// `last` must be the most recent one.
pub fn energy_records_to_power_record(
    last: &Record,
    previous: &Record,
) -> Result<Record, SensorError> {
    let joules_last = units::Unit::to(last.value, &last.unit, &units::Unit::Joule)
        .map_err(SensorError::Malformed)?;
    let joules_previous = units::Unit::to(previous.value, &previous.unit, &units::Unit::Joule)
        .map_err(SensorError::Malformed)?;
    let time_diff = last
        .timestamp
        .checked_sub(previous.timestamp)
        .unwrap_or_default()
        .as_secs_f64();
    let watts = if time_diff > 0.0 {
        ((joules_last - joules_previous) / time_diff).max(0.0)
    } else {
        0.0
    };
    Ok(Record::new(last.timestamp, watts, units::Unit::Watt))
}

pub fn current_system_time_since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
}

// !!!!!!!!!!!!!!!!! Record !!!!!!!!!!!!!!!!!!!!!!!
/// Record struct represents a measurement made by a sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub timestamp: Duration,
    pub value: f64,
    pub unit: units::Unit,
}

impl Record {
    pub fn new(timestamp: Duration, value: f64, unit: units::Unit) -> Record {
        Record {
            timestamp,
            value,
            unit,
        }
    }

    /// Returns a power record stamped now.
    pub fn watts(value: f64) -> Record {
        Record::new(current_system_time_since_epoch(), value, units::Unit::Watt)
    }

    /// Returns the value converted to Watts.
    pub fn as_watts(&self) -> Result<f64, SensorError> {
        units::Unit::to(self.value, &self.unit, &units::Unit::Watt).map_err(SensorError::Malformed)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recorded {} {} at {:?}",
            self.value, self.unit, self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_from_two_energy_records() {
        let previous = Record::new(Duration::from_secs(10), 1_000_000.0, units::Unit::MicroJoule);
        let last = Record::new(Duration::from_secs(12), 41_000_000.0, units::Unit::MicroJoule);
        let power = energy_records_to_power_record(&last, &previous).unwrap();
        assert_eq!(power.unit, units::Unit::Watt);
        assert!((power.value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn power_is_zero_without_elapsed_time() {
        let record = Record::new(Duration::from_secs(10), 5.0, units::Unit::Joule);
        let power = energy_records_to_power_record(&record, &record).unwrap();
        assert_eq!(power.value, 0.0);
    }

    #[test]
    fn power_record_rejects_power_inputs() {
        let previous = Record::new(Duration::from_secs(1), 1.0, units::Unit::Watt);
        let last = Record::new(Duration::from_secs(2), 2.0, units::Unit::Watt);
        assert!(energy_records_to_power_record(&last, &previous).is_err());
    }

    #[test]
    fn gpu_power_sums_devices() {
        let mut gpu = debug::DebugGpuSensor::new(debug::two_gpu_details(), true);
        assert!((gpu.get_gpu_power().unwrap() - 58.0).abs() < 1e-9);
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
