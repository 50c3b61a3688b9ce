use crate::errors::SensorError;
use crate::sensors::{PowerSensor, Record};
use sysinfo::{System, SystemExt};

/// 3 Watts per 8 GB of memory.
pub const WATTS_PER_GB: f64 = 3.0 / 8.0;

const BYTES_PER_GB: f64 = 1_000_000_000.0;

/// A PowerSensor estimating the draw of the installed memory from its size.
pub struct RamSensor {
    system: System,
    total_memory_bytes: Option<u64>,
}

impl RamSensor {
    pub fn new() -> RamSensor {
        RamSensor {
            system: System::new(),
            total_memory_bytes: None,
        }
    }

    /// Total installed memory, in bytes. Read once.
    fn total_memory_bytes(&mut self) -> u64 {
        if let Some(total) = self.total_memory_bytes {
            return total;
        }
        self.system.refresh_memory();
        let total = self.system.total_memory();
        debug!("Total memory: {} bytes", total);
        self.total_memory_bytes = Some(total);
        total
    }
}

impl Default for RamSensor {
    fn default() -> Self {
        RamSensor::new()
    }
}

/// Returns the estimated power of `bytes` of memory, in Watts.
pub fn memory_power_watts(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB * WATTS_PER_GB
}

impl PowerSensor for RamSensor {
    fn name(&self) -> &str {
        "ram"
    }

    fn read_power(&mut self) -> Result<Record, SensorError> {
        let total = self.total_memory_bytes();
        if total == 0 {
            return Err(SensorError::Unavailable(String::from(
                "couldn't read the amount of memory",
            )));
        }
        Ok(Record::watts(memory_power_watts(total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_gb_draw_six_watts() {
        assert!((memory_power_watts(16_000_000_000) - 6.0).abs() < 1e-9);
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
