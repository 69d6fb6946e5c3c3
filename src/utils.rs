use crate::error::{LedgerReportError, Result};
use crate::schema::PeriodRange;
use chrono::{Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// Widens `period` by one month at the front, wrapping into the previous year when the
/// period starts in January.
///
/// Month-over-month deltas need a "previous month" for the first displayed month, so
/// callers fetch this extended window and hide the leading month from display.
pub fn extend_period_by_one_month(period: &PeriodRange) -> Result<PeriodRange> {
    period.validate()?;
    let start = period.start()?.previous();
    PeriodRange::from_keys(start, period.end()?)
}

/// Number of calendar days covered by `period`, first day of the start month through
/// the last day of the end month.
pub fn days_in_period(period: &PeriodRange) -> Result<i64> {
    period.validate()?;
    let invalid = || LedgerReportError::InvalidPeriod {
        year: period.start_year,
        month: period.start_month,
    };
    let first = NaiveDate::from_ymd_opt(period.start_year, period.start_month, 1)
        .ok_or_else(invalid)?;
    let last = last_day_of_month(period.end_year, period.end_month).ok_or_else(invalid)?;
    Ok((last - first).num_days() + 1)
}

/// `numerator / denominator * 100`, or 0 when the denominator is 0 or the result is not
/// finite.
pub fn safe_percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator * 100.0)
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn within_tolerance(value: f64, tolerance: f64) -> bool {
    value.abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_period_wraps_year() {
        let period = PeriodRange::new(2024, 1, 2024, 3).unwrap();
        let extended = extend_period_by_one_month(&period).unwrap();
        assert_eq!(extended, PeriodRange::new(2023, 12, 2024, 3).unwrap());

        let period = PeriodRange::new(2024, 6, 2024, 6).unwrap();
        let extended = extend_period_by_one_month(&period).unwrap();
        assert_eq!(extended.start_month, 5);
        assert_eq!(extended.start_year, 2024);
    }

    #[test]
    fn test_days_in_period() {
        let leap_feb = PeriodRange::new(2024, 2, 2024, 2).unwrap();
        assert_eq!(days_in_period(&leap_feb).unwrap(), 29);
        let year = PeriodRange::new(2023, 1, 2023, 12).unwrap();
        assert_eq!(days_in_period(&year).unwrap(), 365);
    }

    #[test]
    fn test_safe_percentage() {
        assert!((safe_percentage(650.0, 1000.0) - 65.0).abs() < 1e-9);
        assert_eq!(safe_percentage(650.0, 0.0), 0.0);
        assert_eq!(safe_percentage(f64::NAN, 10.0), 0.0);
    }
}
