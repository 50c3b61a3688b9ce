//! # emissions
//!
//! Emissions factors (kg of CO2 equivalent per kWh) read from the
//! reference tables shipped with the crate:
//!
//! * `cloud/impact.csv`: one line per cloud provider region, impact in g/kWh;
//! * `private_infra/2016/global_energy_mix.json`: electricity generation
//!   per source and per country, in TWh;
//! * `private_infra/2016/us_emissions.json`: emissions per US state, in lbs/MWh.
use crate::config::AppConfig;
use crate::errors::TrackerError;
use crate::location::{GeoMetadata, Location};
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

const BUILT_IN_CLOUD_IMPACTS: &str = include_str!("../data/cloud/impact.csv");
const BUILT_IN_ENERGY_MIX: &str =
    include_str!("../data/private_infra/2016/global_energy_mix.json");
const BUILT_IN_US_EMISSIONS: &str = include_str!("../data/private_infra/2016/us_emissions.json");

// source: https://github.com/responsibleproblemsolving/energy-usage#conversion-to-co2
pub const COAL_KG_PER_KWH: f64 = 0.995725971;
pub const PETROLEUM_KG_PER_KWH: f64 = 0.8166885263;
pub const NATURAL_GAS_KG_PER_KWH: f64 = 0.7438415916;

const KG_PER_LB: f64 = 0.453592;

/// Where an emissions factor comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorSource {
    CloudRegion,
    UsState,
    CountryEnergyMix,
}

impl fmt::Display for FactorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorSource::CloudRegion => write!(f, "cloud_region"),
            FactorSource::UsState => write!(f, "us_state"),
            FactorSource::CountryEnergyMix => write!(f, "country_energy_mix"),
        }
    }
}

/// Mass of CO2 equivalent emitted per kWh in a given region.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionsFactor {
    pub kg_per_kwh: f64,
    pub source: FactorSource,
    /// Key the factor was found under (`aws/us-east-1`, `USA/Virginia`, `CAN`...)
    pub region_key: String,
    pub country_iso_code: Option<String>,
    pub country_name: Option<String>,
}

impl EmissionsFactor {
    pub fn emissions_kg(&self, energy_kwh: f64) -> f64 {
        energy_kwh * self.kg_per_kwh
    }
}

#[derive(Debug, Clone)]
struct CloudRegionImpact {
    provider: String,
    region: String,
    /// g/kWh
    impact: f64,
    country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryEnergyMix {
    pub country_name: String,
    #[serde(default)]
    pub coal: f64,
    #[serde(default)]
    pub petroleum: f64,
    #[serde(default)]
    pub natural_gas: f64,
    #[serde(default)]
    pub low_carbon: f64,
    pub total: f64,
}

impl CountryEnergyMix {
    /// Weighted average of the fossil sources' factors, low carbon ones counting as zero.
    pub fn kg_per_kwh(&self) -> Option<f64> {
        if self.total <= 0.0 {
            return None;
        }
        Some(
            (self.coal * COAL_KG_PER_KWH
                + self.petroleum * PETROLEUM_KG_PER_KWH
                + self.natural_gas * NATURAL_GAS_KG_PER_KWH)
                / self.total,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UsStateEmissions {
    /// lbs/MWh
    emissions: f64,
}

/// Parses the cloud impact table.
fn parse_cloud_impacts(content: &str) -> Result<Vec<CloudRegionImpact>, TrackerError> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| TrackerError::Parse(String::from("empty cloud impact table")))?
        .split(',')
        .map(|c| c.trim())
        .collect();
    let column = |name: &str| {
        header
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| TrackerError::Parse(format!("cloud impact table lacks column {name}")))
    };
    let (provider, region, impact, country) = (
        column("provider")?,
        column("region")?,
        column("impact")?,
        column("country")?,
    );
    let mut res = vec![];
    for (n, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        let field = |i: usize| {
            fields.get(i).copied().ok_or_else(|| {
                TrackerError::Parse(format!("cloud impact table line {} is too short", n + 2))
            })
        };
        res.push(CloudRegionImpact {
            provider: String::from(field(provider)?),
            region: String::from(field(region)?),
            impact: field(impact)?.parse::<f64>().map_err(|_| {
                TrackerError::Parse(format!("bad impact on cloud impact table line {}", n + 2))
            })?,
            country: String::from(field(country)?),
        });
    }
    Ok(res)
}

/// Reference tables, each read on first use then kept for the life of the instance.
#[derive(Debug)]
pub struct EmissionsData {
    app: AppConfig,
    cloud_impacts: Option<Vec<CloudRegionImpact>>,
    energy_mix: Option<HashMap<String, CountryEnergyMix>>,
    us_emissions: Option<HashMap<String, UsStateEmissions>>,
}

/// Returns the content of the table at `path`, or the built-in one.
fn read_table(
    path: Option<&Path>,
    built_in: &'static str,
) -> Result<Cow<'static, str>, TrackerError> {
    match path {
        Some(path) => fs::read_to_string(path).map(Cow::Owned).map_err(|e| {
            error!("Couldn't read {}: {}", path.display(), e);
            TrackerError::IoError(e)
        }),
        None => Ok(Cow::Borrowed(built_in)),
    }
}

impl EmissionsData {
    pub fn new(app: AppConfig) -> EmissionsData {
        EmissionsData {
            app,
            cloud_impacts: None,
            energy_mix: None,
            us_emissions: None,
        }
    }

    fn cloud_impacts(&mut self) -> Result<&Vec<CloudRegionImpact>, TrackerError> {
        if self.cloud_impacts.is_none() {
            let content = read_table(
                self.app.cloud_emissions_path.as_deref(),
                BUILT_IN_CLOUD_IMPACTS,
            )?;
            self.cloud_impacts = Some(parse_cloud_impacts(&content)?);
        }
        Ok(self.cloud_impacts.get_or_insert_with(Vec::new))
    }

    fn energy_mix(&mut self) -> Result<&HashMap<String, CountryEnergyMix>, TrackerError> {
        if self.energy_mix.is_none() {
            let content = read_table(
                self.app.global_energy_mix_data_path.as_deref(),
                BUILT_IN_ENERGY_MIX,
            )?;
            self.energy_mix = Some(serde_json::from_str(&content)?);
        }
        Ok(self.energy_mix.get_or_insert_with(HashMap::new))
    }

    fn us_emissions(&mut self) -> Result<&HashMap<String, UsStateEmissions>, TrackerError> {
        if self.us_emissions.is_none() {
            let content = read_table(
                self.app.usa_emissions_data_path.as_deref(),
                BUILT_IN_US_EMISSIONS,
            )?;
            self.us_emissions = Some(serde_json::from_str(&content)?);
        }
        Ok(self.us_emissions.get_or_insert_with(HashMap::new))
    }

    /// Returns the factor of a cloud provider region.
    pub fn lookup_cloud_emissions_factor(
        &mut self,
        provider: &str,
        region: &str,
    ) -> Result<EmissionsFactor, TrackerError> {
        let key = format!("{provider}/{region}");
        let impact = self
            .cloud_impacts()?
            .iter()
            .find(|r| r.provider.eq_ignore_ascii_case(provider) && r.region == region)
            .cloned()
            .ok_or(TrackerError::RegionNotFound(key.clone()))?;
        Ok(EmissionsFactor {
            kg_per_kwh: impact.impact / 1000.0,
            source: FactorSource::CloudRegion,
            region_key: key,
            country_iso_code: None,
            country_name: Some(impact.country),
        })
    }

    /// Returns the alpha-3 code and the mix of a country given by code or by name.
    pub fn find_country(&mut self, country: &str) -> Result<Option<(String, CountryEnergyMix)>, TrackerError> {
        let country = country.trim();
        let mix = self.energy_mix()?;
        if let Some(found) = mix.get(&country.to_ascii_uppercase()) {
            return Ok(Some((country.to_ascii_uppercase(), found.clone())));
        }
        Ok(mix
            .iter()
            .find(|(_, m)| m.country_name.eq_ignore_ascii_case(country))
            .map(|(iso, m)| (iso.clone(), m.clone())))
    }

    /// Returns the factor of a country, from the share of each source in its energy mix.
    pub fn lookup_country_energy_mix(&mut self, country: &str) -> Result<EmissionsFactor, TrackerError> {
        let (iso, mix) = self
            .find_country(country)?
            .ok_or_else(|| TrackerError::RegionNotFound(String::from(country)))?;
        let kg_per_kwh = mix.kg_per_kwh().ok_or_else(|| {
            TrackerError::Parse(format!("energy mix of {iso} has no generation total"))
        })?;
        Ok(EmissionsFactor {
            kg_per_kwh,
            source: FactorSource::CountryEnergyMix,
            region_key: iso.clone(),
            country_iso_code: Some(iso),
            country_name: Some(mix.country_name),
        })
    }

    /// Returns the factor of a US state.
    pub fn lookup_us_state_emissions(&mut self, state: &str) -> Result<EmissionsFactor, TrackerError> {
        let lbs_per_mwh = self
            .us_emissions()?
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(state.trim()))
            .map(|(_, e)| e.emissions)
            .ok_or_else(|| TrackerError::RegionNotFound(format!("USA/{state}")))?;
        Ok(EmissionsFactor {
            // lbs/MWh and kg/kWh only differ by the mass unit
            kg_per_kwh: lbs_per_mwh * KG_PER_LB / 1000.0,
            source: FactorSource::UsState,
            region_key: format!("USA/{state}"),
            country_iso_code: Some(String::from("USA")),
            country_name: Some(String::from("United States")),
        })
    }

    fn lookup_private_infra(&mut self, geo: &GeoMetadata) -> Result<EmissionsFactor, TrackerError> {
        let country = geo
            .country_iso_code
            .as_deref()
            .or(geo.country_name.as_deref())
            .ok_or_else(|| TrackerError::RegionNotFound(String::from("unknown country")))?;
        if let (true, Some(state)) = (country.eq_ignore_ascii_case("USA"), geo.region.as_deref()) {
            match self.lookup_us_state_emissions(state) {
                Ok(factor) => return Ok(factor),
                Err(TrackerError::RegionNotFound(key)) => {
                    warn!("No emissions data for {}, falling back on country emissions", key);
                }
                Err(e) => return Err(e),
            }
        }
        match self.lookup_country_energy_mix(country) {
            // a code unknown to the table may still match by name
            Err(TrackerError::RegionNotFound(_)) if geo.country_name.is_some() && geo.country_iso_code.is_some() => {
                self.lookup_country_energy_mix(geo.country_name.as_deref().unwrap_or(country))
            }
            res => res,
        }
    }

    /// Returns the factor applying to a location. `Ok(None)` means the
    /// location is unknown and no emissions can be computed.
    pub fn resolve(&mut self, location: &Location) -> Result<Option<EmissionsFactor>, TrackerError> {
        let factor = match location {
            Location::Cloud(cloud) => match (cloud.provider.as_deref(), cloud.region.as_deref()) {
                (Some(provider), Some(region)) => self.lookup_cloud_emissions_factor(provider, region)?,
                _ => {
                    return Err(TrackerError::RegionNotFound(String::from(
                        "incomplete cloud metadata",
                    )))
                }
            },
            Location::Private(geo) => self.lookup_private_infra(geo)?,
            Location::Unknown => return Ok(None),
        };
        debug!(
            "Emissions factor for {}: {} kg/kWh ({})",
            factor.region_key, factor.kg_per_kwh, factor.source
        );
        Ok(Some(factor))
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
