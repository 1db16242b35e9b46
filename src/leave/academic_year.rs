use chrono::{Datelike, NaiveDate};

/// Academic-year label for a date, e.g. "2024-25". The year starts on
/// April 1st: Jan-Mar belong to the previous year's label.
pub fn academic_year_for(date: NaiveDate) -> String {
    let (start, end) = if date.month() < 4 {
        (date.year() - 1, date.year())
    } else {
        (date.year(), date.year() + 1)
    };
    format!("{}-{:02}", start, end % 100)
}

/// Resolve an optional caller-supplied year against the calendar.
pub fn resolve_academic_year(explicit: Option<String>, today: NaiveDate) -> String {
    explicit.unwrap_or_else(|| academic_year_for(today))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn april_starts_the_new_year() {
        let d = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert_eq!(academic_year_for(d), "2024-25");
    }

    #[test]
    fn march_still_belongs_to_the_previous_year() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        assert_eq!(academic_year_for(d), "2024-25");
    }

    #[test]
    fn century_boundary_keeps_two_digit_suffix() {
        let d = NaiveDate::from_ymd_opt(2099, 6, 15).unwrap();
        assert_eq!(academic_year_for(d), "2099-00");
    }

    #[test]
    fn explicit_year_wins_over_the_calendar() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            resolve_academic_year(Some("2023-24".into()), today),
            "2023-24"
        );
        assert_eq!(resolve_academic_year(None, today), "2024-25");
    }
}
