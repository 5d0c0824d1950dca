//! Deserializers for optional query string parameters.
//!
//! A parameter sent without a value, e.g. `?range=`, is treated the same as
//! a parameter that was not sent at all.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, de::Error as _};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;

    Ok(text.filter(|text| !text.trim().is_empty()))
}

/// Parse an optional query value with [FromStr], mapping an empty value to `None`.
///
/// Use together with `#[serde(default)]` so that a missing parameter is also `None`.
pub fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    non_empty(deserializer)?
        .map(|text| text.trim().parse().map_err(D::Error::custom))
        .transpose()
}

/// Parse an optional RFC 3339 timestamp, mapping an empty value to `None`.
pub fn optional_rfc3339<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    non_empty(deserializer)?
        .map(|text| OffsetDateTime::parse(text.trim(), &Rfc3339).map_err(D::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use time::{OffsetDateTime, macros::datetime};

    use super::{empty_as_none, optional_rfc3339};

    #[derive(Debug, Deserialize)]
    struct Params {
        #[serde(default, deserialize_with = "empty_as_none")]
        days: Option<u32>,
        #[serde(default, deserialize_with = "optional_rfc3339")]
        from: Option<OffsetDateTime>,
    }

    fn parse(query: &str) -> Result<Params, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(query)
    }

    #[test]
    fn empty_values_are_missing() {
        let params = parse("days=&from=").unwrap();

        assert_eq!(params.days, None);
        assert_eq!(params.from, None);
    }

    #[test]
    fn absent_values_are_missing() {
        let params = parse("").unwrap();

        assert_eq!(params.days, None);
        assert_eq!(params.from, None);
    }

    #[test]
    fn present_values_are_parsed() {
        let params = parse("days=14&from=2025-03-01T00%3A00%3A00%2B03%3A00").unwrap();

        assert_eq!(params.days, Some(14));
        assert_eq!(params.from, Some(datetime!(2025-03-01 00:00 +03:00)));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(parse("days=soon").is_err());
        assert!(parse("from=yesterday").is_err());
    }
}
