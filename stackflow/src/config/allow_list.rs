//! Partner IP allow-list parsing.

use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use tracing::warn;

const CIDR_PATTERN: &str = r"^(?P<addr>\d{1,3}(?:\.\d{1,3}){3})(?:/(?P<mask>\d{1,2}))?$";

fn cidr_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(CIDR_PATTERN) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(error = %e, "CIDR pattern rejected, splitting entries by hand");
                None
            }
        })
        .as_ref()
}

/// Parses a comma-separated list of IPv4 addresses or CIDRs.
///
/// Blank entries are dropped, bare addresses become `/32`, malformed entries
/// are logged and dropped.
#[must_use]
pub fn parse_allow_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match normalize(entry) {
            Some(cidr) => Some(cidr),
            None => {
                warn!(entry = %entry, "Ignoring malformed allow-list entry");
                None
            }
        })
        .collect()
}

fn normalize(entry: &str) -> Option<String> {
    match cidr_pattern() {
        Some(pattern) => {
            let captures = pattern.captures(entry)?;
            cidr(
                captures.name("addr")?.as_str(),
                captures.name("mask").map(|m| m.as_str()),
            )
        }
        None => normalize_split(entry),
    }
}

fn normalize_split(entry: &str) -> Option<String> {
    match entry.split_once('/') {
        Some((addr, mask)) => cidr(addr, Some(mask)),
        None => cidr(entry, None),
    }
}

fn cidr(addr: &str, mask: Option<&str>) -> Option<String> {
    let addr: Ipv4Addr = addr.parse().ok()?;
    let mask = match mask {
        Some(mask) if (1..=2).contains(&mask.len()) && mask.bytes().all(|b| b.is_ascii_digit()) => {
            mask.parse::<u8>().ok().filter(|m| *m <= 32)?
        }
        Some(_) => return None,
        None => 32,
    };
    Some(format!("{addr}/{mask}"))
}
