pub mod file;
pub mod stdout;
pub mod utils;

use crate::errors::TrackerError;
use serde::Serialize;

/// Result of one tracking run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionsRecord {
    /// End of the run, RFC 3339
    pub timestamp: String,
    pub project_name: String,
    pub hostname: String,
    pub duration_secs: f64,
    pub cpu_energy_kwh: f64,
    pub gpu_energy_kwh: f64,
    pub ram_energy_kwh: f64,
    pub energy_kwh: f64,
    /// None when the location of the run couldn't be resolved
    pub emissions_kg: Option<f64>,
    pub emissions_factor_kg_per_kwh: Option<f64>,
    pub emissions_factor_source: Option<String>,
    pub cloud_provider: Option<String>,
    pub cloud_region: Option<String>,
    pub country_iso_code: Option<String>,
    pub country_name: Option<String>,
    pub region: Option<String>,
}

/// Column names of the line-oriented record format, in order.
pub const CSV_HEADER: [&str; 16] = [
    "timestamp",
    "project_name",
    "hostname",
    "duration_secs",
    "cpu_energy_kwh",
    "gpu_energy_kwh",
    "ram_energy_kwh",
    "energy_kwh",
    "emissions_kg",
    "emissions_factor_kg_per_kwh",
    "emissions_factor_source",
    "cloud_provider",
    "cloud_region",
    "country_iso_code",
    "country_name",
    "region",
];

impl EmissionsRecord {
    /// Returns the record as one CSV line, without the line terminator.
    pub fn to_csv_line(&self) -> String {
        let opt_f64 = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let opt_str = |v: &Option<String>| v.clone().unwrap_or_default();
        let fields = [
            self.timestamp.clone(),
            self.project_name.clone(),
            self.hostname.clone(),
            self.duration_secs.to_string(),
            self.cpu_energy_kwh.to_string(),
            self.gpu_energy_kwh.to_string(),
            self.ram_energy_kwh.to_string(),
            self.energy_kwh.to_string(),
            opt_f64(self.emissions_kg),
            opt_f64(self.emissions_factor_kg_per_kwh),
            opt_str(&self.emissions_factor_source),
            opt_str(&self.cloud_provider),
            opt_str(&self.cloud_region),
            opt_str(&self.country_iso_code),
            opt_str(&self.country_name),
            opt_str(&self.region),
        ];
        fields
            .iter()
            .map(|f| utils::escape_csv_field(f))
            .collect::<Vec<String>>()
            .join(",")
    }
}

/// An Exporter is what the tracker hands the record of a finished run to.
/// It could append it to a file, print it or send it elsewhere.
pub trait Exporter {
    fn export(&mut self, record: &EmissionsRecord) -> Result<(), TrackerError>;
    fn kind(&self) -> &str;
}

#[cfg(test)]
pub(crate) fn sample_record() -> EmissionsRecord {
    EmissionsRecord {
        timestamp: String::from("2020-05-14T10:12:03+00:00"),
        project_name: String::from("project_foo"),
        hostname: String::from("gpu-node-1"),
        duration_secs: 3.0,
        cpu_energy_kwh: 3.3e-5,
        gpu_energy_kwh: 4.8e-5,
        ram_energy_kwh: 5.0e-6,
        energy_kwh: 8.6e-5,
        emissions_kg: Some(1.5e-5),
        emissions_factor_kg_per_kwh: Some(0.1739),
        emissions_factor_source: Some(String::from("country_energy_mix")),
        cloud_provider: None,
        cloud_region: None,
        country_iso_code: Some(String::from("CAN")),
        country_name: Some(String::from("Canada")),
        region: Some(String::from("Ontario")),
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
