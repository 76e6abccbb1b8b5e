//! Address grammar check
//!
//! A pragmatic subset of RFC 5322 `addr-spec`: dot-atom local part and a
//! hostname with at least two labels. Quoted local parts and domain literals
//! are rejected.

use regex::Regex;
use std::sync::LazyLock;

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

#[allow(clippy::expect_used)]
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*",
        r"@",
        r"(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+",
        r"[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$",
    ))
    .expect("address pattern is a valid literal")
});

/// True if `address` is syntactically a deliverable address
pub fn is_valid_syntax(address: &str) -> bool {
    if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
        return false;
    }
    let Some((local, _)) = address.split_once('@') else {
        return false;
    };
    if local.len() > MAX_LOCAL_LEN {
        return false;
    }
    ADDRESS_RE.is_match(address)
}

/// Domain part of an address, lowercased. None if there is no single `@`.
pub fn domain_of(address: &str) -> Option<String> {
    let (_, domain) = address.split_once('@')?;
    if domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}
