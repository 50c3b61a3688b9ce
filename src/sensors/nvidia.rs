use crate::errors::SensorError;
use crate::sensors::{GpuDetails, GpuSensor};
use std::process::Command;

const QUERY: &str = "--query-gpu=index,name,power.draw,utilization.gpu";

/// A GpuSensor asking `nvidia-smi` for the state of the NVIDIA devices.
#[derive(Debug, Clone)]
pub struct NvidiaSmiSensor {
    binary: String,
}

impl NvidiaSmiSensor {
    pub fn new() -> NvidiaSmiSensor {
        NvidiaSmiSensor::with_binary("nvidia-smi")
    }

    pub fn with_binary(binary: &str) -> NvidiaSmiSensor {
        NvidiaSmiSensor {
            binary: String::from(binary),
        }
    }
}

impl Default for NvidiaSmiSensor {
    fn default() -> Self {
        NvidiaSmiSensor::new()
    }
}

/// Parses the output of
/// `nvidia-smi --query-gpu=index,name,power.draw,utilization.gpu --format=csv,noheader,nounits`.
///
/// Fields reported as `[N/A]` or `[Not Supported]` count as zero.
pub fn parse_gpu_details(output: &str) -> Result<Vec<GpuDetails>, SensorError> {
    let mut res = vec![];
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        if fields.len() != 4 {
            return Err(SensorError::Malformed(format!(
                "expected 4 fields, got {:?}",
                line
            )));
        }
        let index = fields[0]
            .parse::<u32>()
            .map_err(|_| SensorError::Malformed(format!("bad GPU index {:?}", fields[0])))?;
        res.push(GpuDetails {
            index,
            name: String::from(fields[1]),
            power_draw_watts: fields[2].parse::<f64>().unwrap_or(0.0),
            utilization_percent: fields[3].parse::<f64>().unwrap_or(0.0),
        });
    }
    Ok(res)
}

impl GpuSensor for NvidiaSmiSensor {
    fn is_gpu_details_available(&mut self) -> bool {
        match Command::new(&self.binary).arg("-L").output() {
            Ok(output) => output.status.success() && !output.stdout.is_empty(),
            Err(e) => {
                debug!("{} can't be run: {}", self.binary, e);
                false
            }
        }
    }

    fn get_gpu_details(&mut self) -> Result<Vec<GpuDetails>, SensorError> {
        let output = Command::new(&self.binary)
            .arg(QUERY)
            .arg("--format=csv,noheader,nounits")
            .output()?;
        if !output.status.success() {
            return Err(SensorError::Unavailable(format!(
                "{} exited with {}",
                self.binary, output.status
            )));
        }
        parse_gpu_details(&String::from_utf8_lossy(&output.stdout))
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
