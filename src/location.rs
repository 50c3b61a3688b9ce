//! # location
//!
//! Finds out where the computation runs: on a known cloud region (from the
//! DMI tables and the instance metadata service), in the country given by
//! the configuration when offline, or wherever the public IP address says
//! otherwise.
use crate::config::{AppConfig, TrackerConfig};
use crate::errors::TrackerError;
use crate::sensors::debug::CallCounter;
use isahc::{prelude::*, Request};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Provider and region exposed by the cloud host, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudMetadata {
    pub provider: Option<String>,
    pub region: Option<String>,
}

impl CloudMetadata {
    pub fn new(provider: &str, region: &str) -> CloudMetadata {
        CloudMetadata {
            provider: Some(String::from(provider)),
            region: Some(String::from(region)),
        }
    }

    /// Not running on a recognized cloud.
    pub fn none() -> CloudMetadata {
        CloudMetadata::default()
    }

    pub fn is_on_cloud(&self) -> bool {
        self.provider.is_some() && self.region.is_some()
    }
}

/// Physical location of a host that isn't on a known cloud.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GeoMetadata {
    /// ISO 3166 alpha-3 code
    #[serde(rename = "country_code3", default)]
    pub country_iso_code: Option<String>,
    #[serde(rename = "country", default)]
    pub country_name: Option<String>,
    /// State or province
    #[serde(default)]
    pub region: Option<String>,
}

impl GeoMetadata {
    /// Builds the metadata of a country given either as an alpha-3 code or as a name.
    pub fn from_country(country: &str) -> GeoMetadata {
        let country = country.trim();
        if country.len() == 3 && country.chars().all(|c| c.is_ascii_alphabetic()) {
            GeoMetadata {
                country_iso_code: Some(country.to_ascii_uppercase()),
                ..Default::default()
            }
        } else {
            GeoMetadata {
                country_name: Some(String::from(country)),
                ..Default::default()
            }
        }
    }
}

/// Where a run has been found to take place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Cloud(CloudMetadata),
    Private(GeoMetadata),
    /// The geo-IP lookup failed: emissions can't be computed.
    Unknown,
}

// !!!!!!!!!!!!!!!!! Cloud !!!!!!!!!!!!!!!!!!!!!!!
/// Reads the provider and region of the cloud instance running the process.
pub trait CloudProbe: Send {
    /// With `allow_network` false, only what the host exposes locally may be used.
    fn probe_cloud_metadata(&mut self, allow_network: bool) -> CloudMetadata;
}

/// Cloud providers listed in the cloud impact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudVendor {
    Aws,
    Gcp,
    Azure,
}

impl CloudVendor {
    /// Name of the provider in the cloud impact table.
    pub fn provider(&self) -> &'static str {
        match self {
            CloudVendor::Aws => "aws",
            CloudVendor::Gcp => "gcp",
            CloudVendor::Azure => "azure",
        }
    }

    fn region_variables(&self) -> &'static [&'static str] {
        match self {
            CloudVendor::Aws => &["AWS_REGION", "AWS_DEFAULT_REGION"],
            CloudVendor::Gcp => &["GOOGLE_CLOUD_REGION", "CLOUDSDK_COMPUTE_REGION"],
            CloudVendor::Azure => &["AZURE_REGION", "REGION_NAME"],
        }
    }

    /// AWS and Azure both serve their metadata on 169.254.169.254.
    fn is_link_local(&self) -> bool {
        !matches!(self, CloudVendor::Gcp)
    }
}

const DEFAULT_DMI_PATH: &str = "/sys/class/dmi/id";
const DMI_FIELDS: [&str; 5] = [
    "sys_vendor",
    "product_name",
    "bios_vendor",
    "bios_version",
    "chassis_asset_tag",
];
const AZURE_ASSET_TAG: &str = "7783-7084-3265-9085-8269-3286-77";

/// What the firmware (DMI) tables of the host tell about its vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorHint {
    Cloud(CloudVendor),
    /// The tables were read and name no cloud vendor.
    NotCloud,
    /// No table could be read.
    Unknown,
}

/// Finds the cloud vendor named by DMI field values.
pub fn vendor_from_dmi_fields(fields: &[String]) -> Option<CloudVendor> {
    let lowered: Vec<String> = fields.iter().map(|f| f.to_ascii_lowercase()).collect();
    if lowered.iter().any(|f| f.contains("amazon")) {
        Some(CloudVendor::Aws)
    } else if lowered.iter().any(|f| f.contains("google")) {
        Some(CloudVendor::Gcp)
    } else if fields.iter().any(|f| f.trim() == AZURE_ASSET_TAG) {
        // plain Hyper-V guests say "Microsoft Corporation" too
        Some(CloudVendor::Azure)
    } else {
        None
    }
}

/// Reads the DMI fields found in `dmi_dir`.
pub fn read_vendor_hint(dmi_dir: &Path) -> VendorHint {
    let fields: Vec<String> = DMI_FIELDS
        .iter()
        .filter_map(|name| fs::read_to_string(dmi_dir.join(name)).ok())
        .map(|value| String::from(value.trim()))
        .collect();
    if fields.is_empty() {
        return VendorHint::Unknown;
    }
    match vendor_from_dmi_fields(&fields) {
        Some(vendor) => VendorHint::Cloud(vendor),
        None => VendorHint::NotCloud,
    }
}

/// A CloudProbe using the DMI tables and the environment of the host, then
/// the instance metadata service of the vendor when the network is allowed.
///
/// On a host whose DMI tables name no cloud vendor, no request is made.
pub struct MetadataServiceProbe {
    timeout: Duration,
    dmi_dir: PathBuf,
    env: Option<HashMap<String, String>>,
}

const AWS_REGION_URL: &str = "http://169.254.169.254/latest/meta-data/placement/region";
const GCP_ZONE_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/zone";
const AZURE_LOCATION_URL: &str =
    "http://169.254.169.254/metadata/instance/compute/location?api-version=2021-02-01&format=text";

impl MetadataServiceProbe {
    pub fn new(timeout: Duration) -> MetadataServiceProbe {
        MetadataServiceProbe {
            timeout,
            dmi_dir: PathBuf::from(DEFAULT_DMI_PATH),
            env: None,
        }
    }

    /// Reads the DMI tables from `dmi_dir` and the variables from `env`
    /// instead of the host's.
    pub fn with_local_sources<P: AsRef<Path>>(
        timeout: Duration,
        dmi_dir: P,
        env: HashMap<String, String>,
    ) -> MetadataServiceProbe {
        MetadataServiceProbe {
            timeout,
            dmi_dir: dmi_dir.as_ref().to_path_buf(),
            env: Some(env),
        }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        let value = match &self.env {
            Some(env) => env.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn local_region(&self, vendor: CloudVendor) -> Option<String> {
        vendor
            .region_variables()
            .iter()
            .find_map(|name| self.env_var(name))
    }

    /// `Err` when the service couldn't be reached at all.
    fn get_text(
        &self,
        url: &str,
        header: Option<(&str, &str)>,
    ) -> Result<Option<String>, isahc::Error> {
        let mut builder = Request::get(url).timeout(self.timeout);
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        let request = match builder.body(()) {
            Ok(request) => request,
            Err(e) => {
                warn!("Couldn't build the request to {}: {}", url, e);
                return Ok(None);
            }
        };
        let mut response = request.send()?;
        if !response.status().is_success() {
            trace!("{} answered {}", url, response.status());
            return Ok(None);
        }
        Ok(response
            .text()
            .ok()
            .map(|t| String::from(t.trim()))
            .filter(|t| !t.is_empty()))
    }

    fn query_region(&self, vendor: CloudVendor) -> Result<Option<String>, isahc::Error> {
        match vendor {
            CloudVendor::Aws => self.get_text(AWS_REGION_URL, None),
            CloudVendor::Gcp => Ok(self
                .get_text(GCP_ZONE_URL, Some(("Metadata-Flavor", "Google")))?
                .and_then(|z| gcp_region_from_zone(&z))),
            CloudVendor::Azure => self.get_text(AZURE_LOCATION_URL, Some(("Metadata", "true"))),
        }
    }
}

/// Turns `projects/123/zones/europe-west1-b` into `europe-west1`.
fn gcp_region_from_zone(zone: &str) -> Option<String> {
    let zone = zone.rsplit('/').next()?;
    let (region, _) = zone.rsplit_once('-')?;
    if region.is_empty() {
        None
    } else {
        Some(String::from(region))
    }
}

impl CloudProbe for MetadataServiceProbe {
    fn probe_cloud_metadata(&mut self, allow_network: bool) -> CloudMetadata {
        let hint = read_vendor_hint(&self.dmi_dir);
        debug!("Cloud vendor hint: {:?}", hint);
        let candidates = match hint {
            VendorHint::Cloud(vendor) => {
                if let Some(region) = self.local_region(vendor) {
                    return CloudMetadata::new(vendor.provider(), &region);
                }
                vec![vendor]
            }
            VendorHint::NotCloud => return CloudMetadata::none(),
            VendorHint::Unknown => vec![CloudVendor::Aws, CloudVendor::Gcp, CloudVendor::Azure],
        };
        if !allow_network {
            debug!("Offline, instance metadata services not queried");
            return CloudMetadata::none();
        }
        let mut link_local_down = false;
        for vendor in candidates {
            if link_local_down && vendor.is_link_local() {
                continue;
            }
            match self.query_region(vendor) {
                Ok(Some(region)) => return CloudMetadata::new(vendor.provider(), &region),
                Ok(None) => {}
                Err(e) => {
                    trace!("{} metadata service unreachable: {}", vendor.provider(), e);
                    link_local_down |= vendor.is_link_local();
                }
            }
        }
        debug!("No cloud metadata service answered");
        CloudMetadata::none()
    }
}

/// A CloudProbe returning fixed metadata.
#[derive(Debug, Clone, Default)]
pub struct StaticCloudProbe {
    metadata: CloudMetadata,
    calls: CallCounter,
    networked_calls: CallCounter,
}

impl StaticCloudProbe {
    pub fn new(metadata: CloudMetadata) -> StaticCloudProbe {
        StaticCloudProbe {
            metadata,
            ..Default::default()
        }
    }

    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }

    /// Counts the calls that were allowed to use the network.
    pub fn networked_call_counter(&self) -> CallCounter {
        self.networked_calls.clone()
    }
}

impl CloudProbe for StaticCloudProbe {
    fn probe_cloud_metadata(&mut self, allow_network: bool) -> CloudMetadata {
        self.calls.incr();
        if allow_network {
            self.networked_calls.incr();
        }
        self.metadata.clone()
    }
}

// !!!!!!!!!!!!!!!!! Geo IP !!!!!!!!!!!!!!!!!!!!!!!
/// Resolves the location of the public IP address of the host.
pub trait GeoLocator: Send {
    fn lookup_geo_ip(&mut self) -> Result<GeoMetadata, TrackerError>;
}

/// A GeoLocator querying the GeoJS service.
pub struct GeoJsClient {
    url: String,
    timeout: Duration,
}

impl GeoJsClient {
    pub fn new(url: &str, timeout: Duration) -> GeoJsClient {
        GeoJsClient {
            url: String::from(url),
            timeout,
        }
    }
}

/// Parses a GeoJS `geo.json` payload.
pub fn parse_geo_js_response(body: &str) -> Result<GeoMetadata, TrackerError> {
    let geo: GeoMetadata = serde_json::from_str(body)?;
    if geo.country_iso_code.is_none() && geo.country_name.is_none() {
        return Err(TrackerError::GeoLookup(String::from(
            "response doesn't name any country",
        )));
    }
    Ok(geo)
}

impl GeoLocator for GeoJsClient {
    fn lookup_geo_ip(&mut self) -> Result<GeoMetadata, TrackerError> {
        let request = Request::get(self.url.as_str())
            .timeout(self.timeout)
            .body(())
            .map_err(|e| TrackerError::GeoLookup(e.to_string()))?;
        let mut response = request.send()?;
        if !response.status().is_success() {
            return Err(TrackerError::GeoLookup(format!(
                "{} answered {}",
                self.url,
                response.status()
            )));
        }
        let body = response.text()?;
        parse_geo_js_response(&body)
    }
}

/// A GeoLocator returning a fixed answer, or failing like a timed out request.
#[derive(Debug, Clone)]
pub struct StaticGeoLocator {
    response: Option<GeoMetadata>,
    calls: CallCounter,
}

impl StaticGeoLocator {
    pub fn new(response: GeoMetadata) -> StaticGeoLocator {
        StaticGeoLocator {
            response: Some(response),
            calls: CallCounter::default(),
        }
    }

    /// Every lookup fails as if the service never answered.
    pub fn timing_out() -> StaticGeoLocator {
        StaticGeoLocator {
            response: None,
            calls: CallCounter::default(),
        }
    }

    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl GeoLocator for StaticGeoLocator {
    fn lookup_geo_ip(&mut self) -> Result<GeoMetadata, TrackerError> {
        self.calls.incr();
        self.response
            .clone()
            .ok_or_else(|| TrackerError::GeoLookup(String::from("operation timed out")))
    }
}

/// What GeoJS answers for a host in Toronto.
pub fn geo_metadata_canada() -> GeoMetadata {
    GeoMetadata {
        country_iso_code: Some(String::from("CAN")),
        country_name: Some(String::from("Canada")),
        region: Some(String::from("Ontario")),
    }
}

// !!!!!!!!!!!!!!!!! Locator !!!!!!!!!!!!!!!!!!!!!!!
/// The collaborators used to find the location of a run.
pub struct Locator {
    pub cloud: Box<dyn CloudProbe>,
    pub geo: Box<dyn GeoLocator>,
}

impl Locator {
    pub fn new(cloud: Box<dyn CloudProbe>, geo: Box<dyn GeoLocator>) -> Locator {
        Locator { cloud, geo }
    }

    /// Real metadata services and geo-IP client.
    pub fn from_app_config(app: &AppConfig) -> Locator {
        Locator {
            cloud: Box::new(MetadataServiceProbe::new(app.cloud_metadata_timeout)),
            geo: Box::new(GeoJsClient::new(&app.geo_js_url, app.geo_timeout)),
        }
    }

    /// Finds where the run takes place: cloud first, then the configured
    /// country when offline, then the geo-IP lookup. Offline runs only
    /// look for cloud metadata the host exposes locally.
    ///
    /// Only a missing country in offline mode is an error: a failed lookup
    /// gives [Location::Unknown].
    pub fn resolve(&mut self, config: &TrackerConfig) -> Result<(CloudMetadata, Location), TrackerError> {
        let offline_country = if config.offline {
            let country = config
                .country
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| {
                    TrackerError::Config(String::from("a country is required when running offline"))
                })?;
            Some(country)
        } else {
            None
        };
        let cloud = self.cloud.probe_cloud_metadata(!config.offline);
        if cloud.is_on_cloud() {
            info!(
                "Running on cloud provider {:?} in region {:?}",
                cloud.provider, cloud.region
            );
            return Ok((cloud.clone(), Location::Cloud(cloud)));
        }
        if let Some(country) = offline_country {
            info!("Offline mode, using country {}", country);
            return Ok((cloud, Location::Private(GeoMetadata::from_country(country))));
        }
        match self.geo.lookup_geo_ip() {
            Ok(geo) => {
                info!(
                    "Located in {:?} ({:?}), region {:?}",
                    geo.country_name, geo.country_iso_code, geo.region
                );
                Ok((cloud, Location::Private(geo)))
            }
            Err(e) => {
                warn!("Couldn't locate this host, emissions won't be computed: {}", e);
                Ok((cloud, Location::Unknown))
            }
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
