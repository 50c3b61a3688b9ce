use std::convert;
use std::io;
use std::{error::Error, fmt};

/// Errors surfaced by the tracker at its `start()`/`stop()` boundaries.
#[derive(Debug)]
pub enum TrackerError {
    /// Operation not allowed in the current lifecycle state.
    InvalidState(String),
    /// The tracker configuration can't be used as is.
    Config(String),
    /// No emissions factor for the resolved provider/region/country.
    RegionNotFound(String),
    /// The geo-IP lookup failed (network, timeout, payload).
    GeoLookup(String),
    IoError(io::Error),
    /// A reference table or payload couldn't be parsed.
    Parse(String),
    Sensor(SensorError),
}

impl Error for TrackerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrackerError::IoError(e) => Some(e),
            TrackerError::Sensor(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackerError::InvalidState(msg) => write!(f, "Invalid tracker state: {msg}"),
            TrackerError::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            TrackerError::RegionNotFound(key) => {
                write!(f, "No emissions factor found for region {key}")
            }
            TrackerError::GeoLookup(msg) => write!(f, "Geo-IP lookup failed: {msg}"),
            TrackerError::IoError(e) => write!(f, "I/O error: {e}"),
            TrackerError::Parse(msg) => write!(f, "Couldn't parse data: {msg}"),
            TrackerError::Sensor(e) => write!(f, "{e}"),
        }
    }
}

impl convert::From<io::Error> for TrackerError {
    fn from(error: io::Error) -> Self {
        TrackerError::IoError(error)
    }
}

impl convert::From<serde_json::Error> for TrackerError {
    fn from(error: serde_json::Error) -> Self {
        TrackerError::Parse(error.to_string())
    }
}

impl convert::From<isahc::Error> for TrackerError {
    fn from(error: isahc::Error) -> Self {
        TrackerError::GeoLookup(error.to_string())
    }
}

impl convert::From<SensorError> for TrackerError {
    fn from(error: SensorError) -> Self {
        TrackerError::Sensor(error)
    }
}

/// Errors raised by power reading backends.
#[derive(Debug)]
pub enum SensorError {
    IoError(io::Error),
    /// The backend isn't usable on this host.
    Unavailable(String),
    /// The backend produced something we can't read.
    Malformed(String),
}

impl Error for SensorError {}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorError::IoError(e) => write!(f, "Couldn't read from sensor: {e}"),
            SensorError::Unavailable(msg) => write!(f, "Sensor unavailable: {msg}"),
            SensorError::Malformed(msg) => write!(f, "Unexpected sensor output: {msg}"),
        }
    }
}

impl convert::From<io::Error> for SensorError {
    fn from(error: io::Error) -> Self {
        SensorError::IoError(error)
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
