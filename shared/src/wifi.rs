//! Wi-Fi access point list parser
//!
//! Parses the trailing parameters of a location command: each access point is
//! a MAC address (`hh:hh:hh:hh:hh:hh`, one or two hex digits per octet)
//! optionally followed by its RSSI in dBm. Parameters arrive as sent on the
//! command line: a MAC may be quoted, an RSSI may not.

use mac_address::MacAddress;

use crate::error::ApParseError;
use crate::field::str_to_int;
use crate::limits::{RSSI_MAX, RSSI_MIN};
use crate::model::{WifiAp, WifiApSet};

/// Parse access point parameters into a [`WifiApSet`]
///
/// `params` starts at the first MAC address. A parameter following a MAC is
/// taken as its RSSI when it is an unquoted integer; otherwise it is the next
/// MAC. At
/// least `min_count` access points are required. Any failure discards the
/// whole set.
pub fn parse_access_points<S: AsRef<str>>(
    params: &[S],
    min_count: usize,
) -> Result<WifiApSet, ApParseError> {
    let mut aps = Vec::new();
    // Upper bound: one access point per parameter
    aps.try_reserve_exact(params.len())
        .map_err(|_| ApParseError::AllocationFailed(params.len()))?;

    let mut idx = 0;
    while idx < params.len() {
        let index = aps.len() + 1;
        let text = unquote(params[idx].as_ref());
        let mac = parse_mac(text).ok_or_else(|| ApParseError::MalformedMac {
            index,
            text: text.to_string(),
        })?;
        idx += 1;

        let mut rssi = None;
        if let Some(value) = params.get(idx).and_then(|p| str_to_int(p.as_ref(), 10).ok()) {
            if value < i64::from(RSSI_MIN) || value > i64::from(RSSI_MAX) {
                return Err(ApParseError::RssiOutOfRange {
                    index,
                    value,
                    min: RSSI_MIN,
                    max: RSSI_MAX,
                });
            }
            // Range checked above
            rssi = Some(value as i8);
            idx += 1;
        }

        aps.push(WifiAp { mac, rssi });
    }

    if aps.len() < min_count {
        return Err(ApParseError::InsufficientAccessPoints {
            got: aps.len(),
            min: min_count,
        });
    }

    Ok(WifiApSet::from_vec(aps))
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}

/// Parse `hh:hh:hh:hh:hh:hh` with one or two hex digits per octet
pub fn parse_mac(text: &str) -> Option<MacAddress> {
    let mut octets = [0u8; 6];
    let mut parts = text.split(':');
    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(MacAddress::new(octets))
}
