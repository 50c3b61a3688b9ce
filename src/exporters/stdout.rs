use crate::errors::TrackerError;
use crate::exporters::{EmissionsRecord, Exporter};
use colored::*;
use std::io::{self, Write};

/// An Exporter that displays the record of a run on the standard output of the terminal.
pub struct StdoutExporter {
    out: Box<dyn Write>,
}

impl StdoutExporter {
    pub fn new() -> StdoutExporter {
        StdoutExporter {
            out: Box::new(io::stdout()),
        }
    }

    /// Writes to `out` instead of the standard output.
    pub fn with_writer(out: Box<dyn Write>) -> StdoutExporter {
        StdoutExporter { out }
    }
}

impl Default for StdoutExporter {
    fn default() -> Self {
        StdoutExporter::new()
    }
}

/// Formats the human readable summary of a record.
pub fn format_record(record: &EmissionsRecord) -> String {
    let mut res = format!(
        "Project:\t{}\nDuration:\t{:.2} s\nEnergy:\t\t{:.6} kWh (cpu {:.6} | gpu {:.6} | ram {:.6})\n",
        record.project_name,
        record.duration_secs,
        record.energy_kwh,
        record.cpu_energy_kwh,
        record.gpu_energy_kwh,
        record.ram_energy_kwh,
    );
    let location = match (&record.cloud_provider, &record.cloud_region) {
        (Some(provider), Some(region)) => format!("{provider} {region}"),
        _ => [&record.country_name, &record.region]
            .iter()
            .filter_map(|v| v.as_deref())
            .collect::<Vec<&str>>()
            .join(", "),
    };
    if !location.is_empty() {
        res.push_str(&format!("Location:\t{location}\n"));
    }
    match record.emissions_kg {
        Some(kg) => res.push_str(&format!("Emissions:\t{kg:.6} kg CO2eq\n")),
        None => res.push_str(&format!(
            "Emissions:\t{}\n",
            "unknown (location couldn't be resolved)".bright_yellow()
        )),
    }
    res
}

impl Exporter for StdoutExporter {
    fn export(&mut self, record: &EmissionsRecord) -> Result<(), TrackerError> {
        writeln!(self.out, "{}", format_record(record))?;
        self.out.flush()?;
        Ok(())
    }

    fn kind(&self) -> &str {
        "stdout"
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
