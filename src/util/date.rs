use std::cell::RefCell;

use chrono::Datelike;
pub use time::Date;
use time::{macros::format_description, Duration, Month, UtcOffset, Weekday};

pub type StaticDateFormat<'a> =
    &'static [time::format_description::BorrowedFormatItem<'a>];
pub type DynDateFormat = time::format_description::OwnedFormatItem;

pub const STANDARD_DATE_FORMAT: StaticDateFormat =
    format_description!("[year]-[month]-[day]");

/// Date formats accepted in trade/split/price files, in priority order.
/// Only the calendar date is kept; any time of day is discarded.
pub const TRADE_DATE_FORMATS: [(&str, StaticDateFormat); 8] = [
    // Broker activity exports, eg. "2023-01-05, 10:31:02"
    (
        "YYYY-MM-DD, hh:mm:ss",
        format_description!("[year]-[month]-[day], [hour]:[minute]:[second]"),
    ),
    (
        "YYYY-MM-DD hh:mm:ss",
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ),
    (
        "YYYY-MM-DDThh:mm:ss",
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ),
    ("YYYY-MM-DD", STANDARD_DATE_FORMAT),
    (
        "YYYY/MM/DD",
        format_description!("[year]/[month padding:none]/[day padding:none]"),
    ),
    (
        "DD/MM/YYYY",
        format_description!("[day padding:none]/[month padding:none]/[year]"),
    ),
    (
        "DD-Mon-YYYY",
        format_description!(
            "[day padding:none]-[month repr:short case_sensitive:false]-[year]"
        ),
    ),
    (
        "Mon DD, YYYY",
        format_description!(
            "[month repr:short case_sensitive:false] [day padding:none], [year]"
        ),
    ),
];

pub fn parse_standard_date(date_str: &str) -> Result<Date, time::error::Parse> {
    Date::parse(date_str, STANDARD_DATE_FORMAT)
}

pub fn parse_dyn_date_format(fmt: &str) -> Result<DynDateFormat, String> {
    // The documentation recommends version 2
    const VERSION: usize = 2;
    time::format_description::parse_owned::<VERSION>(fmt)
        .map_err(|e| format!("{}", e))
}

/// Parses a date using the user-provided format (if any) first, then each
/// of TRADE_DATE_FORMATS in order.
pub fn parse_trade_date(
    date_str: &str,
    user_fmt: &Option<DynDateFormat>,
) -> Result<Date, String> {
    let trimmed = date_str.trim();
    if let Some(fmt) = user_fmt {
        if let Ok(d) = Date::parse(trimmed, fmt) {
            return Ok(d);
        }
    }
    for (_, fmt) in TRADE_DATE_FORMATS.iter() {
        if let Ok(d) = Date::parse(trimmed, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "matched none of the accepted date formats ({})",
        TRADE_DATE_FORMATS
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<&str>>()
            .join("; ")
    ))
}

pub fn is_weekend(d: &Date) -> bool {
    matches!(d.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// Inclusive iterator over every calendar day from start to end.
pub fn days_inclusive(start: Date, end: Date) -> impl Iterator<Item = Date> {
    let n_days = if end < start { 0 } else { (end - start).whole_days() + 1 };
    (0..n_days).map(move |i| start.saturating_add(Duration::days(i)))
}

fn date_naive_to_date(dn: &chrono::NaiveDate) -> Date {
    // chrono dates are always valid calendar dates, so this cannot fail.
    Date::from_calendar_date(
        dn.year(),
        Month::December.nth_next(dn.month() as u8),
        dn.day() as u8,
    )
    .unwrap_or(Date::MIN)
}

thread_local! {
    static TODAYS_DATE_FOR_TEST_TL: RefCell<Date> = RefCell::new(Date::MIN);
}

pub fn set_todays_date_for_test(d: Date) {
    TODAYS_DATE_FOR_TEST_TL.with_borrow_mut(|d_| *d_ = d);
}

pub fn today_local() -> Date {
    let test_date: Date = TODAYS_DATE_FOR_TEST_TL.with_borrow(|d| *d);
    if test_date != Date::MIN {
        return test_date;
    }
    let now = chrono::offset::Local::now();
    date_naive_to_date(&now.date_naive())
}

// UtcOffset::current_local_offset refuses to run on Linux without the
// unsound feature, so go through chrono instead.
pub fn local_utc_offset() -> Result<UtcOffset, time::error::ComponentRange> {
    let now = chrono::offset::Local::now();
    let offset = now.offset();
    UtcOffset::from_whole_seconds(-1 * offset.utc_minus_local())
}

// Used by both unit and integration tests
pub mod pub_testlib {
    use time::{Date, Duration, Month};

    pub fn doy_date(year: u32, day: i64) -> Date {
        Date::from_calendar_date(year as i32, Month::January, 1)
            .unwrap()
            .saturating_add(Duration::days(day))
    }

    pub fn ymd(year: i32, month: u8, day: u8) -> Date {
        Date::from_calendar_date(year, Month::try_from(month).unwrap(), day)
            .unwrap()
    }
}
