use time::{Date, Duration, Month, OffsetDateTime};

/// The next aligned `(starts_at, ends_at)` window following a closed
/// one. Calendar-month and minute periods align to their own boundary;
/// any other period string repeats the closed window's length.
///
/// Timezones are not modelled here (no tz database crate is in the
/// dependency stack); `alerts.timezone` is carried on the row but every
/// boundary is computed in UTC.
pub fn next_window(period: &str, starts_at: OffsetDateTime, ends_at: OffsetDateTime) -> (OffsetDateTime, OffsetDateTime) {
    match period {
        "monthly" => (ends_at, add_calendar_month(ends_at)),
        "minutely" => (ends_at, ends_at + Duration::minutes(1)),
        _ => {
            let span = ends_at - starts_at;
            (ends_at, ends_at + span)
        }
    }
}

fn add_calendar_month(at: OffsetDateTime) -> OffsetDateTime {
    let date = at.date();
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        other => (date.year(), other.next()),
    };
    let day = date.day().min(time::util::days_in_year_month(year, month));
    let next_date = Date::from_calendar_date(year, month, day).unwrap_or(date);
    next_date.with_time(at.time()).assume_offset(at.offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutely_advances_by_exactly_one_minute() {
        let start = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let end = start + Duration::minutes(1);
        let (next_start, next_end) = next_window("minutely", start, end);
        assert_eq!(next_start, end);
        assert_eq!(next_end, end + Duration::minutes(1));
    }

    #[test]
    fn monthly_rolls_over_into_the_next_year() {
        let start = Date::from_calendar_date(2026, Month::December, 1).unwrap().midnight().assume_utc();
        let end = Date::from_calendar_date(2027, Month::January, 1).unwrap().midnight().assume_utc();
        let (_, next_end) = next_window("monthly", start, end);
        assert_eq!(next_end.year(), 2027);
        assert_eq!(next_end.month(), Month::February);
    }

    #[test]
    fn custom_period_repeats_the_closed_window_length() {
        let start = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let end = start + Duration::hours(6);
        let (next_start, next_end) = next_window("custom", start, end);
        assert_eq!(next_start, end);
        assert_eq!(next_end - next_start, Duration::hours(6));
    }
}
