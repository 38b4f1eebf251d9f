//! Country lookup for visitor IPs
//!
//! `GeoIpService` reads a MaxMind GeoLite2/GeoIP2 Country or City database.
//! Lookups never fail: anything unresolvable is `Country::Unknown`.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Reader};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Key used for visits whose origin could not be resolved
pub const UNKNOWN_COUNTRY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    /// English country name, or the ISO code when no name is available
    Known(String),
    Unknown,
}

impl Country {
    pub fn as_key(&self) -> &str {
        match self {
            Country::Known(name) => name,
            Country::Unknown => UNKNOWN_COUNTRY,
        }
    }
}

/// Capability resolving a client IP to its country
pub trait CountryResolver: Send + Sync {
    fn resolve_country(&self, ip: IpAddr) -> Country;
}

/// Resolver used when no GeoIP database is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeoIp;

impl CountryResolver for NoGeoIp {
    fn resolve_country(&self, _ip: IpAddr) -> Country {
        Country::Unknown
    }
}

/// GeoIP lookup service backed by a MaxMind MMDB file
#[derive(Clone)]
pub struct GeoIpService {
    reader: Arc<Reader<Vec<u8>>>,
}

impl GeoIpService {
    /// Open the Country or City database at `path`
    pub fn new(path: &str) -> Result<Self> {
        let reader = Reader::open_readfile(path)
            .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    fn lookup_country(&self, ip: IpAddr) -> Option<String> {
        let result = self.reader.lookup(ip).ok()?;
        // City databases are a superset of Country data, so this decodes either
        let country = result.decode::<geoip2::Country>().ok()??;

        country
            .country
            .names
            .english
            .or(country.country.iso_code)
            .map(|s| s.to_string())
    }
}

impl CountryResolver for GeoIpService {
    fn resolve_country(&self, ip: IpAddr) -> Country {
        if !is_public(ip) {
            return Country::Unknown;
        }

        match self.lookup_country(ip) {
            Some(name) if !name.is_empty() => Country::Known(name),
            _ => Country::Unknown,
        }
    }
}

fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}
