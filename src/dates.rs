//! Date handling for the API's range filters.
//!
//! ServiceTitan expects UTC timestamps shaped like `2024-01-15T05:00:00Z`.
//! Callers hand the facade calendar dates or datetimes expressed in the
//! account's configured time zone (or an already-formatted string), and
//! everything funnels through [`to_api_format`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{APIError, APIResult};

const API_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A date-range bound as the facade accepts it.
///
/// Calendar dates are taken as midnight in the account time zone, naive
/// datetimes are interpreted in the account time zone, and `Raw` strings are
/// sent to the API untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Utc(DateTime<Utc>),
    Raw(String),
}

impl From<NaiveDate> for DateInput {
    fn from(value: NaiveDate) -> Self {
        DateInput::Date(value)
    }
}

impl From<NaiveDateTime> for DateInput {
    fn from(value: NaiveDateTime) -> Self {
        DateInput::DateTime(value)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(value: DateTime<Utc>) -> Self {
        DateInput::Utc(value)
    }
}

impl From<&str> for DateInput {
    fn from(value: &str) -> Self {
        DateInput::Raw(value.to_string())
    }
}

impl From<String> for DateInput {
    fn from(value: String) -> Self {
        DateInput::Raw(value)
    }
}

/// Resolves the account's configured time zone name.
///
/// Accounts without a configured zone are treated as UTC.
///
/// # Errors
///
/// Returns [`APIError::UnknownTimeZone`] if the name is not in the IANA
/// database.
pub fn resolve_timezone(name: Option<&str>) -> APIResult<Tz> {
    match name {
        None => Ok(Tz::UTC),
        Some(name) => name
            .parse()
            .map_err(|_| APIError::UnknownTimeZone(name.to_string())),
    }
}

/// Formats a range bound for the API, converting through the account time
/// zone.
///
/// # Errors
///
/// Returns [`APIError::NonexistentLocalTime`] if the input falls in a local
/// time that does not exist in the zone (a DST gap).
pub fn to_api_format(input: &DateInput, timezone: Tz) -> APIResult<String> {
    let utc = match input {
        DateInput::Raw(preformatted) => return Ok(preformatted.clone()),
        DateInput::Date(date) => local_to_utc(date.and_time(NaiveTime::MIN), timezone)?,
        DateInput::DateTime(datetime) => local_to_utc(*datetime, timezone)?,
        DateInput::Utc(instant) => *instant,
    };
    Ok(utc.format(API_TIMESTAMP_FORMAT).to_string())
}

fn local_to_utc(local: NaiveDateTime, timezone: Tz) -> APIResult<DateTime<Utc>> {
    // An ambiguous local time (DST fall-back) maps to its first occurrence
    timezone
        .from_local_datetime(&local)
        .earliest()
        .map(|mapped| mapped.with_timezone(&Utc))
        .ok_or_else(|| APIError::NonexistentLocalTime(local.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_york() -> Tz {
        resolve_timezone(Some("America/New_York")).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_date_is_midnight_in_account_zone() {
        let input = DateInput::from(date(2024, 1, 15));
        assert_eq!(
            to_api_format(&input, new_york()).unwrap(),
            "2024-01-15T05:00:00Z"
        );
    }

    #[test]
    fn summer_dates_use_the_dst_offset() {
        let input = DateInput::from(date(2024, 7, 15));
        assert_eq!(
            to_api_format(&input, new_york()).unwrap(),
            "2024-07-15T04:00:00Z"
        );
    }

    #[test]
    fn naive_datetime_converts_from_account_zone() {
        let input = DateInput::from(date(2024, 1, 15).and_hms_opt(8, 30, 0).unwrap());
        assert_eq!(
            to_api_format(&input, new_york()).unwrap(),
            "2024-01-15T13:30:00Z"
        );
    }

    #[test]
    fn utc_instant_is_formatted_without_conversion() {
        let input = DateInput::from(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(
            to_api_format(&input, new_york()).unwrap(),
            "2024-03-01T12:00:00Z"
        );
    }

    #[test]
    fn preformatted_strings_pass_through() {
        let input = DateInput::from("2024-01-15T00:00:00Z");
        assert_eq!(
            to_api_format(&input, new_york()).unwrap(),
            "2024-01-15T00:00:00Z"
        );
    }

    #[test]
    fn dst_gap_is_an_error() {
        // 2:30am never happened on 2024-03-10 in New York
        let input = DateInput::from(date(2024, 3, 10).and_hms_opt(2, 30, 0).unwrap());
        assert!(matches!(
            to_api_format(&input, new_york()),
            Err(APIError::NonexistentLocalTime(_))
        ));
    }

    #[test]
    fn missing_timezone_defaults_to_utc() {
        assert_eq!(resolve_timezone(None).unwrap(), Tz::UTC);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert!(matches!(
            resolve_timezone(Some("Mars/Olympus_Mons")),
            Err(APIError::UnknownTimeZone(_))
        ));
    }
}
