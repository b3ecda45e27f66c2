//! Byte-level framing for the three message grammars in use on the wire:
//!
//! - request:  `Who's <S>?#<port>`
//! - response: `I'm <S>` or `I'm <S>#<port>`
//! - sync:     `<S>.<token>`
//!
//! A hand-rolled parser is preferred here over a regex (the original source
//! validates sync messages with `^S\.\d+$`): each parser checks the exact
//! prefix bytes and separator before attempting the decimal parse, so a
//! message for a different service name or a malformed payload is rejected
//! before any allocation beyond the initial split.

use crate::config::ServiceName;

const REQUEST_PREFIX: &str = "Who's ";
const REQUEST_SUFFIX: &str = "?";
const RESPONSE_PREFIX: &str = "I'm ";
const PORT_SEP: u8 = b'#';
const SYNC_SEP: u8 = b'.';

pub fn encode_request(service: &ServiceName, ephemeral_port: u16) -> Vec<u8> {
    format!(
        "{REQUEST_PREFIX}{}{REQUEST_SUFFIX}{}{}",
        service.as_str(),
        PORT_SEP as char,
        ephemeral_port
    )
    .into_bytes()
}

/// Returns the ephemeral reply port if `bytes` is a well-formed request
/// for `service`. The port must parse as a positive `u16`.
pub fn parse_request(service: &ServiceName, bytes: &[u8]) -> Option<u16> {
    let expected_prefix = format!("{REQUEST_PREFIX}{}{REQUEST_SUFFIX}", service.as_str());
    let sep = bytes.iter().position(|&b| b == PORT_SEP)?;
    let (prefix, rest) = bytes.split_at(sep);
    if prefix != expected_prefix.as_bytes() {
        return None;
    }
    let port_str = std::str::from_utf8(&rest[1..]).ok()?;
    let port: u32 = port_str.parse().ok()?;
    if port == 0 || port > u16::from(u16::MAX) as u32 {
        return None;
    }
    Some(port as u16)
}

pub fn encode_response(service: &ServiceName, port: Option<u16>) -> Vec<u8> {
    match port {
        Some(p) => format!("{RESPONSE_PREFIX}{}{}{p}", service.as_str(), PORT_SEP as char),
        None => format!("{RESPONSE_PREFIX}{}", service.as_str()),
    }
    .into_bytes()
}

/// Returns `Some(Some(port))` / `Some(None)` if `bytes` is a well-formed
/// response for `service`, `None` if the prefix does not match exactly.
/// A client only accepts a response whose prefix is `"I'm " || S` byte
/// for byte.
pub fn parse_response(service: &ServiceName, bytes: &[u8]) -> Option<Option<u16>> {
    let expected_prefix = format!("{RESPONSE_PREFIX}{}", service.as_str());
    let expected = expected_prefix.as_bytes();

    if let Some(sep) = bytes.iter().position(|&b| b == PORT_SEP) {
        let (prefix, rest) = bytes.split_at(sep);
        if prefix != expected {
            return None;
        }
        let port: u16 = std::str::from_utf8(&rest[1..]).ok()?.parse().ok()?;
        Some(Some(port))
    } else {
        if bytes != expected {
            return None;
        }
        Some(None)
    }
}

pub fn encode_sync(service: &ServiceName, token: u64) -> Vec<u8> {
    format!("{}{}{token}", service.as_str(), SYNC_SEP as char).into_bytes()
}

/// Parses a sync message, returning the sender's token if `bytes` carries
/// exactly `<service>.<non-negative integer>`.
pub fn parse_sync(service: &ServiceName, bytes: &[u8]) -> Option<u64> {
    let prefix = service.as_str().as_bytes();
    if bytes.len() <= prefix.len() + 1 {
        return None;
    }
    if &bytes[..prefix.len()] != prefix || bytes[prefix.len()] != SYNC_SEP {
        return None;
    }
    let token_str = std::str::from_utf8(&bytes[prefix.len() + 1..]).ok()?;
    // Require digits only: a byte-level stand-in for the source's `\d*`.
    if token_str.is_empty() || !token_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token_str.parse().ok()
}
