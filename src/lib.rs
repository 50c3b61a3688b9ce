//! Estimate the carbon footprint of a computation.
//!
//! A [Tracker] samples the power drawn by the CPU, the GPU and the RAM of
//! the host while a job runs, then converts the energy consumed into CO2
//! equivalent with the emissions factor of the cloud region or of the
//! country the host is in.
//!
//! ```no_run
//! use co2_tracker::{track_co2, TrackerConfig};
//!
//! let config = TrackerConfig {
//!     project_name: String::from("my_model"),
//!     ..Default::default()
//! };
//! let answer = track_co2(config, || 42).unwrap();
//! assert_eq!(answer, 42);
//! ```
#[macro_use]
extern crate log;
pub mod config;
pub mod emissions;
pub mod errors;
pub mod exporters;
pub mod location;
pub mod sensors;
pub mod tracker;

pub use config::{AppConfig, TrackerConfig};
pub use errors::TrackerError;
pub use tracker::{track_co2, track_co2_with, ScopedTracker, Tracker, TrackerState};

/// Returns the version of the crate.
pub fn crate_version() -> &'static str {
    clap::crate_version!()
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
