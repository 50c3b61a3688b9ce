//! # config
//!
//! Run parameters of a tracker ([`TrackerConfig`]) and the location of
//! the resources it consumes ([`AppConfig`]).
use crate::errors::TrackerError;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MEASURE_POWER_SECS: f64 = 15.0;
pub const DEFAULT_PROJECT_NAME: &str = "co2-tracker";
pub const DEFAULT_GEO_JS_URL: &str = "https://get.geojs.io/v1/ip/geo.json";

// Note: clap::Args automatically generate Args for the fields of this struct,
// using the field's name as the argument's name, and the doc comment
// above the field as the argument's description.

/// Holds the parameters of one tracking run.
///
/// When using co2-tracker as a command-line application, such a struct will be
/// automatically populated by the clap library. If you're using it as
/// a library, start from [`TrackerConfig::default`] and set the fields you need.
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Interval between two power measurements, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_MEASURE_POWER_SECS)]
    pub measure_power_secs: f64,

    /// Don't append the emissions record to the output file
    #[arg(long = "no-save-to-file", action = clap::ArgAction::SetFalse)]
    pub save_to_file: bool,

    /// Directory holding the `<project_name>.emissions` file
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Name of the tracked project, used as the output file name
    #[arg(long, default_value = DEFAULT_PROJECT_NAME)]
    pub project_name: String,

    /// Don't query the network to find the location of this host
    #[arg(long)]
    pub offline: bool,

    /// Country of this host (ISO 3166 alpha-3 code or name), mandatory with --offline
    #[arg(long)]
    pub country: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            measure_power_secs: DEFAULT_MEASURE_POWER_SECS,
            save_to_file: true,
            output_dir: PathBuf::from("."),
            project_name: String::from(DEFAULT_PROJECT_NAME),
            offline: false,
            country: None,
        }
    }
}

impl TrackerConfig {
    /// Checks the constraints that can be verified without any collaborator.
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.measure_interval()?;
        if self.project_name.trim().is_empty() {
            return Err(TrackerError::Config(String::from(
                "project_name can't be empty",
            )));
        }
        if self.offline && self.country.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(TrackerError::Config(String::from(
                "a country is required when running offline",
            )));
        }
        Ok(())
    }

    /// Returns the sampling interval, refusing values a `Duration` can't hold.
    pub fn measure_interval(&self) -> Result<Duration, TrackerError> {
        let invalid = || {
            TrackerError::Config(format!(
                "measure_power_secs must be a positive number of seconds, got {}",
                self.measure_power_secs
            ))
        };
        if self.measure_power_secs.is_nan() || self.measure_power_secs <= 0.0 {
            return Err(invalid());
        }
        Duration::try_from_secs_f64(self.measure_power_secs).map_err(|_| invalid())
    }

    /// Path of the file records are appended to.
    pub fn emissions_file_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.emissions", self.project_name))
    }
}

/// Where the reference tables live and how to reach the geo-IP service.
///
/// A table path left to `None` means the copy of the table built into the
/// library is used, so a default configuration works wherever the binary runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub geo_js_url: String,
    pub geo_timeout: Duration,
    pub cloud_metadata_timeout: Duration,
    pub cloud_emissions_path: Option<PathBuf>,
    pub usa_emissions_data_path: Option<PathBuf>,
    pub global_energy_mix_data_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            geo_js_url: String::from(DEFAULT_GEO_JS_URL),
            geo_timeout: Duration::from_secs(5),
            cloud_metadata_timeout: Duration::from_secs(1),
            cloud_emissions_path: None,
            usa_emissions_data_path: None,
            global_energy_mix_data_path: None,
        }
    }
}

impl AppConfig {
    /// Builds a configuration whose tables are read from `data_dir`, laid
    /// out like the `data/` directory of the crate.
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> AppConfig {
        let data_dir = data_dir.as_ref();
        let private_infra = data_dir.join("private_infra").join("2016");
        AppConfig {
            cloud_emissions_path: Some(data_dir.join("cloud").join("impact.csv")),
            usa_emissions_data_path: Some(private_infra.join("us_emissions.json")),
            global_energy_mix_data_path: Some(private_infra.join("global_energy_mix.json")),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn interval_must_be_positive() {
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = TrackerConfig {
                measure_power_secs: secs,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
        }
    }

    #[test]
    fn interval_must_fit_a_duration() {
        let config = TrackerConfig {
            measure_power_secs: 1e20,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
        assert!(config.measure_interval().is_err());
    }

    #[test]
    fn interval_is_exact() {
        let config = TrackerConfig {
            measure_power_secs: 0.25,
            ..Default::default()
        };
        assert_eq!(config.measure_interval().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn offline_requires_country() {
        let mut config = TrackerConfig {
            offline: true,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TrackerError::Config(_))));
        config.country = Some(String::from("Canada"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn emissions_file_is_named_after_project() {
        let config = TrackerConfig {
            output_dir: PathBuf::from("/tmp/runs"),
            project_name: String::from("project_foo"),
            ..Default::default()
        };
        assert_eq!(
            config.emissions_file_path(),
            PathBuf::from("/tmp/runs/project_foo.emissions")
        );
    }

    #[test]
    fn default_app_config_uses_built_in_tables() {
        let app = AppConfig::default();
        assert_eq!(app.cloud_emissions_path, None);
        assert_eq!(app.usa_emissions_data_path, None);
        assert_eq!(app.global_energy_mix_data_path, None);
    }

    #[test]
    fn data_dir_overrides_every_table() {
        let app = AppConfig::with_data_dir("/opt/co2");
        assert_eq!(
            app.cloud_emissions_path,
            Some(PathBuf::from("/opt/co2/cloud/impact.csv"))
        );
        assert_eq!(
            app.global_energy_mix_data_path,
            Some(PathBuf::from("/opt/co2/private_infra/2016/global_energy_mix.json"))
        );
        assert_eq!(app.geo_timeout, AppConfig::default().geo_timeout);
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
