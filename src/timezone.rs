use time::OffsetDateTime;
use time_tz::{OffsetDateTimeExt, Tz};

use crate::Error;

/// Look up a timezone by its canonical name, e.g. "Africa/Nairobi".
///
/// # Errors
/// Returns [Error::InvalidTimezoneError] if the timezone name is not known.
pub fn get_timezone(canonical_timezone: &str) -> Result<&'static Tz, Error> {
    time_tz::timezones::get_by_name(canonical_timezone).ok_or_else(|| {
        tracing::error!("Could not find the timezone {canonical_timezone}");
        Error::InvalidTimezoneError(canonical_timezone.to_owned())
    })
}

/// The current time in `timezone`.
pub fn local_now(timezone: &Tz) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_timezone(timezone)
}

/// The current time in the local timezone `canonical_timezone`, e.g. "Africa/Nairobi".
///
/// # Errors
/// Returns [Error::InvalidTimezoneError] if the timezone name is not known.
pub fn now_in_timezone(canonical_timezone: &str) -> Result<OffsetDateTime, Error> {
    get_timezone(canonical_timezone).map(local_now)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time_tz::OffsetDateTimeExt;

    use crate::Error;

    use super::{get_timezone, now_in_timezone};

    #[test]
    fn utc_has_zero_offset() {
        let now = now_in_timezone("Etc/UTC").expect("UTC should be a known timezone");

        assert!(now.offset().is_utc());
    }

    #[test]
    fn offset_follows_daylight_saving() {
        let london = get_timezone("Europe/London").unwrap();

        let winter = datetime!(2025-01-15 12:00 UTC).to_timezone(london);
        let summer = datetime!(2025-07-15 12:00 UTC).to_timezone(london);

        assert!(winter.offset().is_utc());
        assert_eq!(summer.offset().whole_hours(), 1);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let result = now_in_timezone("Middle/Earth");

        assert_eq!(
            result,
            Err(Error::InvalidTimezoneError("Middle/Earth".to_owned()))
        );
    }
}
