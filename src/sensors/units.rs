use std::fmt;

// !!!!!!!!!!!!!!!!! Unit !!!!!!!!!!!!!!!!!!!!!!!
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    KiloWattHour,
    Joule,
    MilliJoule,
    MicroJoule,
    MegaWatt,
    KiloWatt,
    Watt,
    MilliWatt,
    MicroWatt,
}

const JOULES_PER_KWH: f64 = 3_600_000.0;

impl Unit {
    /// Converts `measure` from `source_unit` to `dest_unit`.
    /// Energy can't be converted to power (nor the other way around).
    pub fn to(measure: f64, source_unit: &Unit, dest_unit: &Unit) -> Result<f64, String> {
        match (source_unit.energy_in_joules(), dest_unit.energy_in_joules()) {
            (Some(source), Some(dest)) => return Ok(measure * source / dest),
            (None, None) => {}
            _ => {
                return Err(format!(
                    "Impossible conversion asked from {source_unit} to {dest_unit} (without time dimension)."
                ))
            }
        }
        match (source_unit.power_in_watts(), dest_unit.power_in_watts()) {
            (Some(source), Some(dest)) => Ok(measure * source / dest),
            _ => Err(format!(
                "Impossible conversion asked from {source_unit} to {dest_unit}."
            )),
        }
    }

    /// Converts an average power held for `seconds` into kilowatt-hours.
    pub fn watts_over_secs_to_kwh(watts: f64, seconds: f64) -> f64 {
        watts * seconds / JOULES_PER_KWH
    }

    fn energy_in_joules(&self) -> Option<f64> {
        match self {
            Unit::KiloWattHour => Some(JOULES_PER_KWH),
            Unit::Joule => Some(1.0),
            Unit::MilliJoule => Some(1e-3),
            Unit::MicroJoule => Some(1e-6),
            _ => None,
        }
    }

    fn power_in_watts(&self) -> Option<f64> {
        match self {
            Unit::MegaWatt => Some(1e6),
            Unit::KiloWatt => Some(1e3),
            Unit::Watt => Some(1.0),
            Unit::MilliWatt => Some(1e-3),
            Unit::MicroWatt => Some(1e-6),
            _ => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::KiloWattHour => write!(f, "KiloWattHours"),
            Unit::Joule => write!(f, "Joules"),
            Unit::MilliJoule => write!(f, "MilliJoules"),
            Unit::MicroJoule => write!(f, "MicroJoules"),
            Unit::MilliWatt => write!(f, "MilliWatts"),
            Unit::MicroWatt => write!(f, "MicroWatts"),
            Unit::Watt => write!(f, "Watts"),
            Unit::KiloWatt => write!(f, "KiloWatts"),
            Unit::MegaWatt => write!(f, "MegaWatts"),
        }
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
