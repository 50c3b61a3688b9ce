//! Deterministic sensors, for tests and for hosts without any telemetry.
use crate::errors::SensorError;
use crate::sensors::{GpuDetails, GpuSensor, Hardware, PowerSensor, Record};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counter of the calls made to a debug sensor, readable after the
/// sensor moved into the sampler thread.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub(crate) fn incr(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct DebugPowerSensor {
    name: String,
    watts: f64,
    calls: CallCounter,
}

impl DebugPowerSensor {
    pub fn new(name: &str, watts: f64) -> DebugPowerSensor {
        DebugPowerSensor {
            name: String::from(name),
            watts,
            calls: CallCounter::default(),
        }
    }

    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl PowerSensor for DebugPowerSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_power(&mut self) -> Result<Record, SensorError> {
        self.calls.incr();
        Ok(Record::watts(self.watts))
    }
}

#[derive(Debug, Clone)]
pub struct DebugGpuSensor {
    details: Vec<GpuDetails>,
    available: bool,
    availability_calls: CallCounter,
    details_calls: CallCounter,
}

impl DebugGpuSensor {
    pub fn new(details: Vec<GpuDetails>, available: bool) -> DebugGpuSensor {
        DebugGpuSensor {
            details,
            available,
            availability_calls: CallCounter::default(),
            details_calls: CallCounter::default(),
        }
    }

    /// A host without any GPU.
    pub fn absent() -> DebugGpuSensor {
        DebugGpuSensor::new(vec![], false)
    }

    pub fn availability_counter(&self) -> CallCounter {
        self.availability_calls.clone()
    }

    pub fn details_counter(&self) -> CallCounter {
        self.details_calls.clone()
    }
}

impl GpuSensor for DebugGpuSensor {
    fn is_gpu_details_available(&mut self) -> bool {
        self.availability_calls.incr();
        self.available
    }

    fn get_gpu_details(&mut self) -> Result<Vec<GpuDetails>, SensorError> {
        self.details_calls.incr();
        if !self.available {
            return Err(SensorError::Unavailable(String::from("debug GPU disabled")));
        }
        Ok(self.details.clone())
    }
}

/// Two busy datacenter GPUs drawing 58 W in total.
pub fn two_gpu_details() -> Vec<GpuDetails> {
    vec![
        GpuDetails {
            index: 0,
            name: String::from("Tesla V100-SXM2-16GB"),
            power_draw_watts: 28.0,
            utilization_percent: 0.0,
        },
        GpuDetails {
            index: 1,
            name: String::from("Tesla V100-SXM2-16GB"),
            power_draw_watts: 30.0,
            utilization_percent: 87.0,
        },
    ]
}

/// Hardware made of debug sensors only: 40 W of CPU, 6 W of RAM and the given GPU.
pub fn debug_hardware(gpu: DebugGpuSensor) -> Hardware {
    Hardware::new(
        Box::new(DebugPowerSensor::new("debug_cpu", 40.0)),
        Box::new(gpu),
        Box::new(DebugPowerSensor::new("debug_ram", 6.0)),
    )
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
