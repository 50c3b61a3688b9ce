use crate::errors::SensorError;
use crate::sensors::{PowerSensor, Record};

/// Half of a common 85 W desktop TDP.
pub const DEFAULT_CPU_POWER_WATTS: f64 = 42.5;

/// A PowerSensor that always reports the same draw, used when the host
/// doesn't expose any energy counter.
#[derive(Debug, Clone)]
pub struct ConstantPowerSensor {
    watts: f64,
}

impl ConstantPowerSensor {
    pub fn new(watts: f64) -> ConstantPowerSensor {
        ConstantPowerSensor {
            watts: watts.max(0.0),
        }
    }
}

impl Default for ConstantPowerSensor {
    fn default() -> Self {
        ConstantPowerSensor::new(DEFAULT_CPU_POWER_WATTS)
    }
}

impl PowerSensor for ConstantPowerSensor {
    fn name(&self) -> &str {
        "constant"
    }

    fn read_power(&mut self) -> Result<Record, SensorError> {
        Ok(Record::watts(self.watts))
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
