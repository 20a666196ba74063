//! Endpoint and endpoint-range parsing.
//!
//! A principal is registered against `<ipv4>:<portMin>-<portMax>` and a
//! caller is identified by `<ipv4>:<port>`. Both forms are validated here,
//! once, so the registry and resolver only ever see well-formed values.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{BrokerError, Result};

lazy_static! {
    static ref RANGE_PATTERN: Regex =
        Regex::new(r"^(\d+\.\d+\.\d+\.\d+):(\d+)-(\d+)$").expect("endpoint range pattern is valid");
}

/// An inclusive port range, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    /// Create a port range, rejecting `min > max`.
    pub fn new(min: u16, max: u16) -> Result<Self> {
        if min > max {
            return Err(BrokerError::malformed(format!(
                "port range start {} exceeds end {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// A range covering exactly one port.
    pub fn single(port: u16) -> Self {
        Self { min: port, max: port }
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports covered by the range.
    pub fn width(&self) -> u32 {
        u32::from(self.max) - u32::from(self.min) + 1
    }

    /// Check if the port lies within the range.
    pub fn contains(&self, port: u16) -> bool {
        self.min <= port && port <= self.max
    }

    /// Check if `other` is nested inside this range (equal ranges count).
    pub fn contains_range(&self, other: &PortRange) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// Check if `other` starts inside this range, ignoring where it ends.
    pub fn starts_within(&self, other: &PortRange) -> bool {
        self.contains(other.min)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// The address and port range a principal is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointRange {
    pub address: Ipv4Addr,
    pub ports: PortRange,
}

impl EndpointRange {
    pub fn new(address: Ipv4Addr, ports: PortRange) -> Self {
        Self { address, ports }
    }

    /// Check if the endpoint falls inside this range.
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        self.address == endpoint.address && self.ports.contains(endpoint.port)
    }
}

fn parse_port(raw: &str, which: &str, input: &str) -> Result<u16> {
    let value: u32 = raw.parse().map_err(|e| {
        BrokerError::malformed(format!("invalid port {} in {:?}: {}", which, input, e))
    })?;
    u16::try_from(value).map_err(|_| {
        BrokerError::malformed(format!(
            "port {} {} out of range in {:?}",
            which, value, input
        ))
    })
}

fn parse_address(raw: &str, input: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(raw).map_err(|_| {
        BrokerError::malformed(format!("invalid IPv4 address {:?} in {:?}", raw, input))
    })
}

impl FromStr for EndpointRange {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let captures = RANGE_PATTERN.captures(input).ok_or_else(|| {
            BrokerError::malformed(format!("not a valid principal ip-port range: {:?}", s))
        })?;

        let min = parse_port(&captures[2], "min", input)?;
        let max = parse_port(&captures[3], "max", input)?;
        let ports = PortRange::new(min, max)?;
        let address = parse_address(&captures[1], input)?;

        Ok(Self { address, ports })
    }
}

impl fmt::Display for EndpointRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.ports)
    }
}

impl Serialize for EndpointRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EndpointRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The `(address, port)` a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }
}

impl FromStr for Endpoint {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        let (address, port) = match input.split_once(':') {
            Some((address, port)) if !port.contains(':') => (address, port),
            _ => {
                return Err(BrokerError::malformed(format!(
                    "error parsing endpoint: {:?}",
                    s
                )))
            }
        };

        let address = parse_address(address, input)?;
        let port = port.parse::<u16>().map_err(|e| {
            BrokerError::malformed(format!("error parsing port in {:?}: {}", s, e))
        })?;

        Ok(Self { address, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
