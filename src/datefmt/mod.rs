use serde::Serialize;
use thiserror::Error;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error("timestamp '{value}' is out of range after applying the local offset")]
    OutOfRange { value: String },

    #[error("time pattern '{pattern}' must end in _12 or _24")]
    InvalidClock { pattern: String },

    #[error("time pattern '{pattern}' is missing placeholder {placeholder}")]
    MissingTimePlaceholder {
        pattern: String,
        placeholder: &'static str,
    },

    #[error("date pattern '{pattern}' is missing placeholder {placeholder}")]
    MissingDatePlaceholder {
        pattern: String,
        placeholder: &'static str,
    },

    #[error("invalid utc offset of {minutes} minutes")]
    InvalidOffset { minutes: i32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Clock {
    H24,
    H12,
}

/// Renders API timestamps as `"<date> - <time>[ AM|PM]"` in the viewer's offset.
///
/// The time pattern looks like `#H:#M_24` or `#H:#M_12`, the date pattern must
/// contain `#D`, `#M` and `#Y`. Patterns are checked when the formatter is built.
#[derive(Clone, Debug)]
pub struct DateFormatter {
    clock: Clock,
    time_layout: String,
    date_layout: String,
    offset: UtcOffset,
}

impl DateFormatter {
    pub fn new(time_pattern: &str, date_pattern: &str) -> Result<Self, FormatError> {
        let (layout, clock) = time_pattern
            .rsplit_once('_')
            .ok_or_else(|| FormatError::InvalidClock {
                pattern: time_pattern.to_string(),
            })?;
        let clock = match clock {
            "24" => Clock::H24,
            "12" => Clock::H12,
            _ => {
                return Err(FormatError::InvalidClock {
                    pattern: time_pattern.to_string(),
                })
            }
        };
        for placeholder in ["#H", "#M"] {
            if !layout.contains(placeholder) {
                return Err(FormatError::MissingTimePlaceholder {
                    pattern: time_pattern.to_string(),
                    placeholder,
                });
            }
        }
        for placeholder in ["#D", "#M", "#Y"] {
            if !date_pattern.contains(placeholder) {
                return Err(FormatError::MissingDatePlaceholder {
                    pattern: date_pattern.to_string(),
                    placeholder,
                });
            }
        }
        Ok(Self {
            clock,
            time_layout: layout.to_string(),
            date_layout: date_pattern.to_string(),
            offset: UtcOffset::UTC,
        })
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_offset_minutes(self, minutes: i32) -> Result<Self, FormatError> {
        let offset = UtcOffset::from_whole_seconds(minutes.saturating_mul(60))
            .map_err(|_| FormatError::InvalidOffset { minutes })?;
        Ok(self.with_offset(offset))
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn format(&self, timestamp: &str) -> Result<String, FormatError> {
        let utc = parse_timestamp(timestamp)?;
        self.format_datetime(utc)
            .ok_or_else(|| FormatError::OutOfRange {
                value: timestamp.to_string(),
            })
    }

    /// Like [`format`](Self::format) but falls back to the raw value, for display paths.
    pub fn format_or_raw(&self, timestamp: &str) -> String {
        self.format(timestamp)
            .unwrap_or_else(|_| timestamp.to_string())
    }

    pub fn format_datetime(&self, utc: PrimitiveDateTime) -> Option<String> {
        let local = utc.checked_add(Duration::seconds(i64::from(self.offset.whole_seconds())))?;

        let (hour, suffix) = match self.clock {
            Clock::H24 => (local.hour(), ""),
            Clock::H12 => twelve_hour(local.hour()),
        };

        let date = self
            .date_layout
            .replacen("#D", &format!("{:02}", local.day()), 1)
            .replacen("#M", &format!("{:02}", u8::from(local.month())), 1)
            .replacen("#Y", &local.year().to_string(), 1);
        let time = self
            .time_layout
            .replacen("#H", &format!("{hour:02}"), 1)
            .replacen("#M", &format!("{:02}", local.minute()), 1);

        Some(format!("{date} - {time}{suffix}"))
    }
}

fn twelve_hour(hour: u8) -> (u8, &'static str) {
    let (hour, suffix) = if hour > 11 {
        (hour - 12, " PM")
    } else {
        (hour, " AM")
    };
    if hour == 0 {
        (12, suffix)
    } else {
        (hour, suffix)
    }
}

/// Parses `YYYY-MM-DD[ T]HH:MM[:SS[.f]]` with an optional `Z` / `+00:00` suffix as UTC.
pub fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime, FormatError> {
    let invalid = || FormatError::InvalidTimestamp {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let trimmed = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix("+00:00"))
        .unwrap_or(trimmed);
    let (date_part, time_part) = trimmed
        .split_once(|c: char| c == 'T' || c == ' ')
        .ok_or_else(invalid)?;

    let date = Date::parse(date_part, format_description!("[year]-[month]-[day]"))
        .map_err(|_| invalid())?;

    let time = Time::parse(
        time_part,
        format_description!("[hour]:[minute]:[second].[subsecond]"),
    )
    .or_else(|_| Time::parse(time_part, format_description!("[hour]:[minute]:[second]")))
    .or_else(|_| Time::parse(time_part, format_description!("[hour]:[minute]")))
    .map_err(|_| invalid())?;

    Ok(PrimitiveDateTime::new(date, time))
}

/// Current time in UTC, comparable with [`parse_timestamp`] results.
pub fn now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

/// Offset of the local machine, UTC when it cannot be determined.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn de() -> DateFormatter {
        DateFormatter::new("#H:#M_24", "#D.#M.#Y").unwrap()
    }

    fn en() -> DateFormatter {
        DateFormatter::new("#H:#M_12", "#M/#D/#Y").unwrap()
    }

    #[test]
    fn formats_24_hour_with_zero_padding() {
        assert_eq!(de().format("2017-06-02 08:05:00").unwrap(), "02.06.2017 - 08:05");
    }

    #[test]
    fn applies_local_offset() {
        let f = de().with_offset_minutes(120).unwrap();
        assert_eq!(f.format("2017-06-02T23:30:00").unwrap(), "03.06.2017 - 01:30");
        let f = de().with_offset_minutes(-300).unwrap();
        assert_eq!(f.format("2017-06-02 03:00").unwrap(), "01.06.2017 - 22:00");
    }

    #[test]
    fn twelve_hour_midnight_and_noon() {
        assert_eq!(en().format("2017-06-02 00:15:00").unwrap(), "06/02/2017 - 12:15 AM");
        assert_eq!(en().format("2017-06-02 12:15:00").unwrap(), "06/02/2017 - 12:15 PM");
        assert_eq!(en().format("2017-06-02 23:59:00").unwrap(), "06/02/2017 - 11:59 PM");
    }

    #[test]
    fn twelve_hour_never_yields_zero_or_thirteen() {
        for hour in 0u8..24 {
            let (h, _) = twelve_hour(hour);
            assert!((1..=12).contains(&h), "hour {hour} mapped to {h}");
        }
    }

    #[test]
    fn accepts_fractional_seconds_and_zulu() {
        assert_eq!(
            de().format("2017-06-02T08:05:09.123456Z").unwrap(),
            "02.06.2017 - 08:05"
        );
    }

    #[test]
    fn rejects_patterns_without_placeholders() {
        assert!(matches!(
            DateFormatter::new("#H:#M", "#D.#M.#Y"),
            Err(FormatError::InvalidClock { .. })
        ));
        assert!(matches!(
            DateFormatter::new("#H_24", "#D.#M.#Y"),
            Err(FormatError::MissingTimePlaceholder { placeholder: "#M", .. })
        ));
        assert!(matches!(
            DateFormatter::new("#H:#M_24", "#D.#M"),
            Err(FormatError::MissingDatePlaceholder { placeholder: "#Y", .. })
        ));
    }

    #[test]
    fn underscores_inside_the_time_layout_are_kept() {
        let f = DateFormatter::new("#H_#M_24", "#D.#M.#Y").unwrap();
        assert_eq!(f.format("2017-06-02 08:05:00").unwrap(), "02.06.2017 - 08_05");
        assert!(matches!(
            DateFormatter::new("#H_#M_13", "#D.#M.#Y"),
            Err(FormatError::InvalidClock { .. })
        ));
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(de().format("yesterday").is_err());
        assert_eq!(de().format_or_raw("yesterday"), "yesterday");
    }
}
