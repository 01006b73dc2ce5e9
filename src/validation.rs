//! Validation of operator-supplied values.
//!
//! Everything the operator types ends up inside fail2ban configuration
//! files, so values are parsed into typed form and anything that could
//! break out of an INI value (newlines, section brackets) is rejected.

use anyhow::{bail, Result};
use ipnet::IpNet;
use serde::{Deserialize, Deserializer};
use std::net::IpAddr;

/// Validate an IP address string and return the parsed IpAddr.
///
/// # Examples
/// ```
/// use jailsmith::validation::validate_ip;
/// assert!(validate_ip("192.0.2.10").is_ok());
/// assert!(validate_ip("::1").is_ok());
/// assert!(validate_ip("invalid").is_err());
/// ```
pub fn validate_ip(ip_str: &str) -> Result<IpAddr> {
    ip_str
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", ip_str))
}

/// Validate an IP address or CIDR string and return the parsed IpNet.
///
/// A plain address becomes a /32 (IPv4) or /128 (IPv6) network.
///
/// # Examples
/// ```
/// use jailsmith::validation::validate_ip_or_cidr;
/// assert!(validate_ip_or_cidr("192.168.1.1").is_ok());
/// assert!(validate_ip_or_cidr("10.0.0.0/8").is_ok());
/// assert!(validate_ip_or_cidr("invalid").is_err());
/// ```
pub fn validate_ip_or_cidr(ip_str: &str) -> Result<IpNet> {
    let ip_str = ip_str.trim();
    if ip_str.contains('/') {
        ip_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid CIDR: {}", ip_str))
    } else {
        let ip: IpAddr = ip_str
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", ip_str))?;
        Ok(IpNet::from(ip))
    }
}

/// Parse a comma- or whitespace-separated list of addresses/CIDRs.
///
/// Duplicates are dropped, first occurrence wins. Empty input yields an
/// empty list.
///
/// # Examples
/// ```
/// use jailsmith::validation::parse_address_list;
/// let nets = parse_address_list("10.0.0.0/8, 192.0.2.1").unwrap();
/// assert_eq!(nets.len(), 2);
/// ```
pub fn parse_address_list(input: &str) -> Result<Vec<IpNet>> {
    let mut nets: Vec<IpNet> = Vec::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let net = validate_ip_or_cidr(token)?;
        if !nets.contains(&net) {
            nets.push(net);
        }
    }
    Ok(nets)
}

/// Minimal sanity check for a mail address written to `destemail`/`sender`.
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        bail!("Invalid email address '{}': missing '@'", email);
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        bail!("Invalid email address '{}'", email);
    }
    if !email.is_ascii() || email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        bail!("Invalid email address '{}': unexpected characters", email);
    }
    if !domain.contains('.') && domain != "localhost" {
        bail!("Invalid email address '{}': domain has no dot", email);
    }
    Ok(())
}

/// Jail names become section headers and file names in jail.d.
pub fn validate_jail_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        bail!("Invalid jail name '{}': must be 1-64 characters", name);
    }
    if name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        bail!(
            "Invalid jail name '{}': use letters, digits, '-', '_' or '.'",
            name
        );
    }
    Ok(())
}

/// serde helper: list of IPs/CIDRs where plain addresses are accepted.
pub(crate) fn deserialize_nets<'de, D>(deserializer: D) -> Result<Vec<IpNet>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(deserializer)?;
    let mut nets = Vec::with_capacity(raw.len());
    for entry in &raw {
        let net = validate_ip_or_cidr(entry).map_err(serde::de::Error::custom)?;
        if !nets.contains(&net) {
            nets.push(net);
        }
    }
    Ok(nets)
}
