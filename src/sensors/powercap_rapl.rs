use crate::errors::SensorError;
use crate::sensors::units::Unit;
use crate::sensors::{
    current_system_time_since_epoch, energy_records_to_power_record, PowerSensor, Record,
};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BASE_PATH: &str = "/sys/class/powercap";

/// One RAPL package zone (`intel-rapl:N`) and the last value read from it.
#[derive(Debug)]
struct Zone {
    id: u16,
    name: String,
    counter_uj_path: PathBuf,
    max_energy_range_uj: Option<u64>,
}

impl Zone {
    fn read_counter_uj(&self) -> Result<u64, SensorError> {
        let raw = fs::read_to_string(&self.counter_uj_path)?;
        raw.trim().parse::<u64>().map_err(|_| {
            SensorError::Malformed(format!(
                "{} contains {:?}",
                self.counter_uj_path.display(),
                raw.trim()
            ))
        })
    }
}

/// This is a PowerSensor reading the CPU packages energy counters exposed by
/// the powercap/RAPL kernel modules. Each call returns the average power
/// drawn since the previous call.
pub struct PowercapRaplSensor {
    base_path: PathBuf,
    zones: Option<Vec<Zone>>,
    /// Cumulated energy of all the zones at the last read, in microjoules.
    last_record: Option<Record>,
    last_counters: Vec<u64>,
}

impl PowercapRaplSensor {
    pub fn new() -> PowercapRaplSensor {
        PowercapRaplSensor::with_base_path(DEFAULT_BASE_PATH)
    }

    /// Reads the counters below `base_path` instead of the sysfs default.
    pub fn with_base_path<P: AsRef<Path>>(base_path: P) -> PowercapRaplSensor {
        PowercapRaplSensor {
            base_path: base_path.as_ref().to_path_buf(),
            zones: None,
            last_record: None,
            last_counters: vec![],
        }
    }

    /// Checks that the powercap tree exists and exposes readable package counters.
    pub fn check_module() -> Result<String, SensorError> {
        let mut sensor = PowercapRaplSensor::new();
        let zones = sensor.zones()?;
        for zone in zones {
            zone.read_counter_uj()?;
        }
        Ok(String::from("RAPL counters are readable."))
    }

    fn generate_zones(&self) -> Result<Vec<Zone>, SensorError> {
        let re_package = Regex::new(r"^intel-rapl:(\d+)$")
            .map_err(|e| SensorError::Malformed(e.to_string()))?;
        let mut zones = vec![];
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            let folder_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => String::from(name),
                None => continue,
            };
            // sub-zones (intel-rapl:X:Y) are included in their package's counter
            if let Some(captures) = re_package.captures(&folder_name) {
                let id = captures[1].parse::<u16>().unwrap_or_default();
                let name = fs::read_to_string(path.join("name"))
                    .map(|n| String::from(n.trim()))
                    .unwrap_or_else(|_| format!("package-{id}"));
                let max_energy_range_uj = fs::read_to_string(path.join("max_energy_range_uj"))
                    .ok()
                    .and_then(|v| v.trim().parse::<u64>().ok());
                zones.push(Zone {
                    id,
                    name,
                    counter_uj_path: path.join("energy_uj"),
                    max_energy_range_uj,
                });
            }
        }
        if zones.is_empty() {
            return Err(SensorError::Unavailable(format!(
                "no intel-rapl package found in {}",
                self.base_path.display()
            )));
        }
        zones.sort_by_key(|z| z.id);
        debug!("RAPL zones: {:?}", zones.iter().map(|z| &z.name).collect::<Vec<_>>());
        Ok(zones)
    }

    fn zones(&mut self) -> Result<&Vec<Zone>, SensorError> {
        if self.zones.is_none() {
            self.zones = Some(self.generate_zones()?);
        }
        Ok(self.zones.get_or_insert_with(Vec::new))
    }
}

impl Default for PowercapRaplSensor {
    fn default() -> Self {
        PowercapRaplSensor::new()
    }
}

/// Returns the energy consumed between two reads of a counter that wraps
/// around at `max_range`.
fn counter_delta(previous: u64, current: u64, max_range: Option<u64>) -> u64 {
    if current >= previous {
        current - previous
    } else {
        match max_range {
            Some(max) if max >= previous => max - previous + current,
            _ => current,
        }
    }
}

impl PowerSensor for PowercapRaplSensor {
    fn name(&self) -> &str {
        "powercap_rapl"
    }

    fn read_power(&mut self) -> Result<Record, SensorError> {
        let counters = self
            .zones()?
            .iter()
            .map(|z| z.read_counter_uj())
            .collect::<Result<Vec<u64>, SensorError>>()?;
        let timestamp = current_system_time_since_epoch();

        let power = match &self.last_record {
            Some(previous) if self.last_counters.len() == counters.len() => {
                let zones = self.zones.as_deref().unwrap_or_default();
                let consumed: u64 = self
                    .last_counters
                    .iter()
                    .zip(counters.iter())
                    .zip(zones.iter())
                    .map(|((prev, curr), zone)| counter_delta(*prev, *curr, zone.max_energy_range_uj))
                    .sum();
                let current = Record::new(
                    timestamp,
                    previous.value + consumed as f64,
                    Unit::MicroJoule,
                );
                let power = energy_records_to_power_record(&current, previous)?;
                self.last_record = Some(current);
                power
            }
            _ => {
                // first read: nothing to compare with yet
                self.last_record = Some(Record::new(timestamp, 0.0, Unit::MicroJoule));
                Record::new(timestamp, 0.0, Unit::Watt)
            }
        };
        self.last_counters = counters;
        trace!("RAPL {}", power);
        Ok(power)
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
