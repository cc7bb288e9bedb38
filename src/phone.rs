//! Phone canonicalization for the call service.
//!
//! The call service only accepts `+`-prefixed numbers. Lead platform input is
//! Dutch-centric and arrives in whatever shape the form captured, so we
//! rewrite the common national and international-prefix forms to `+31…` and
//! fall back to prefixing `+` for anything else.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// Bare country code: `31` followed by digits.
static BARE_COUNTRY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^31[0-9]+$").expect("valid country code pattern"));

/// National trunk prefix: a single `0` followed by 9-10 digits.
static NATIONAL_TRUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0[0-9]{9,10}$").expect("valid trunk prefix pattern"));

const INTERNATIONAL_PREFIX: &str = "0031";
const COUNTRY_PREFIX: &str = "+31";

/// A phone number that is guaranteed to start with `+`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a raw phone value into `+`-prefixed wire format.
///
/// Returns `None` for absent input or input that is empty once whitespace,
/// hyphens and periods are removed.
pub fn normalize_phone(raw: Option<&str>) -> Option<NormalizedPhone> {
    let cleaned: String = raw?
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let mut phone = if let Some(rest) = cleaned.strip_prefix(INTERNATIONAL_PREFIX) {
        format!("{}{}", COUNTRY_PREFIX, rest)
    } else if BARE_COUNTRY_CODE.is_match(&cleaned) {
        format!("+{}", cleaned)
    } else if NATIONAL_TRUNK.is_match(&cleaned) {
        format!("{}{}", COUNTRY_PREFIX, &cleaned[1..])
    } else {
        cleaned
    };

    // Best effort: guarantees the prefix, not a dialable number
    if !phone.starts_with('+') {
        phone.insert(0, '+');
    }

    Some(NormalizedPhone(phone))
}

/// Whether libphonenumber considers the normalized number valid.
///
/// Used for diagnostics only; implausible numbers are still forwarded.
pub fn is_plausible(phone: &NormalizedPhone) -> bool {
    match phonenumber::parse(None, phone.as_str()) {
        Ok(number) => phonenumber::is_valid(&number),
        Err(e) => {
            tracing::debug!("Failed to parse phone '{}': {:?}", phone, e);
            false
        }
    }
}
