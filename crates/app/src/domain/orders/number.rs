//! Order Numbers
//!
//! Human-facing order identifiers of the form `ORD-YYYYMMDD-XXXXXXXX`, where the suffix is
//! eight random Crockford base32 characters.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use jiff::{Timestamp, tz::TimeZone};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PREFIX: &str = "ORD";
const SUFFIX_LEN: usize = 8;
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid order number `{0}`")]
pub struct InvalidOrderNumber(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generate a number dated with the UTC day of `now`.
    #[must_use]
    pub fn generate(now: Timestamp) -> Self {
        Self::generate_with(now, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(now: Timestamp, rng: &mut R) -> Self {
        let date = now.to_zoned(TimeZone::UTC).date();

        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();

        Self(format!(
            "{PREFIX}-{:04}{:02}{:02}-{suffix}",
            date.year(),
            date.month(),
            date.day()
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for OrderNumber {
    type Err = InvalidOrderNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidOrderNumber(s.to_string());

        let mut parts = s.split('-');

        let (Some(prefix), Some(date), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if prefix != PREFIX
            || date.len() != 8
            || !date.bytes().all(|byte| byte.is_ascii_digit())
            || suffix.len() != SUFFIX_LEN
            || !suffix.bytes().all(|byte| ALPHABET.contains(&byte))
        {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = InvalidOrderNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}
