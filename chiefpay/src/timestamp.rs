//! Timestamps that are either parsed or passed through.
//!
//! Every timestamp the merchant API sends is an ISO-8601 string. Depending on
//! the [`DateMode`] of the active profile the SDK either hands it back as a
//! [`DateTime<Utc>`] or leaves the original string untouched.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::profile::DateMode;

/// A timestamp field of a wire entity.
///
/// Deserialization always produces [`Timestamp::Iso`]; the decoder and the
/// HTTP client then call [`ResolveDates::resolve_dates`] with the profile's
/// [`DateMode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Timestamp {
    /// Parsed UTC date.
    Date(DateTime<Utc>),
    /// The string exactly as received.
    Iso(String),
}

impl Timestamp {
    /// Converts this timestamp according to `mode`.
    ///
    /// Strings that are not valid RFC 3339 stay as [`Timestamp::Iso`] even in
    /// [`DateMode::Parse`].
    #[must_use]
    pub fn resolve(self, mode: DateMode) -> Self {
        match (mode, self) {
            (DateMode::Parse, Self::Iso(s)) => match DateTime::parse_from_rfc3339(&s) {
                Ok(date) => Self::Date(date.with_timezone(&Utc)),
                Err(_) => Self::Iso(s),
            },
            (DateMode::Raw, Self::Date(date)) => Self::Iso(format_iso(&date)),
            (_, ts) => ts,
        }
    }

    /// Returns the date, parsing the string form on the fly.
    #[must_use]
    pub fn to_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(date) => Some(*date),
            Self::Iso(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date(date) => f.write_str(&format_iso(date)),
            Self::Iso(s) => f.write_str(s),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(date: DateTime<Utc>) -> Self {
        Self::Date(date)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::Iso)
    }
}

/// Formats a date the way the API does: RFC 3339, millisecond precision, `Z`.
#[must_use]
pub fn format_iso(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Entities whose timestamp fields follow the profile's [`DateMode`].
pub trait ResolveDates {
    /// Rewrites every timestamp field in place.
    fn resolve_dates(&mut self, mode: DateMode);
}

impl ResolveDates for Timestamp {
    fn resolve_dates(&mut self, mode: DateMode) {
        let ts = std::mem::replace(self, Self::Iso(String::new()));
        *self = ts.resolve(mode);
    }
}

impl<T: ResolveDates> ResolveDates for Vec<T> {
    fn resolve_dates(&mut self, mode: DateMode) {
        for item in self {
            item.resolve_dates(mode);
        }
    }
}

impl<T: ResolveDates> ResolveDates for Option<T> {
    fn resolve_dates(&mut self, mode: DateMode) {
        if let Some(item) = self {
            item.resolve_dates(mode);
        }
    }
}
