//! Resolution of the Russian date formats found on the supported sites.
//!
//! Every function here returns either one resolved UTC timestamp or an
//! [`AdapterError::Date`]; nothing falls back to "now" or to a zero value.
//! Absolute dates are Moscow wall-clock times (UTC+3, no DST).

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::AdapterError;
use crate::utils::squash_whitespace;

static MINUTES_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*минут[уы]?\s+назад").unwrap());
static HOURS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*час(?:а|ов)?\s+назад").unwrap());
static DAYS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(?:день|дня|дней)\s+назад").unwrap());

fn moscow() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap()
}

/// Month number for the abbreviated forms used by investing.com ("янв.").
fn short_month(token: &str) -> Option<u32> {
    Some(match token {
        "янв." => 1,
        "февр." | "фев." => 2,
        "мар." | "марта" => 3,
        "апр." => 4,
        "мая" => 5,
        "июн." | "июня" => 6,
        "июл." | "июля" => 7,
        "авг." => 8,
        "сент." | "сен." => 9,
        "окт." => 10,
        "нояб." | "ноя." => 11,
        "дек." => 12,
        _ => return None,
    })
}

/// Month number for the genitive forms used by finmarket.ru ("января").
fn genitive_month(token: &str) -> Option<u32> {
    Some(match token {
        "января" => 1,
        "февраля" => 2,
        "марта" => 3,
        "апреля" => 4,
        "мая" => 5,
        "июня" => 6,
        "июля" => 7,
        "августа" => 8,
        "сентября" => 9,
        "октября" => 10,
        "ноября" => 11,
        "декабря" => 12,
        _ => return None,
    })
}

fn moscow_to_utc(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    moscow()
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolve "N минут/часов/дней назад" against `now`.
///
/// Returns `None` when the text is not a relative time.
pub fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let ago = |re: &Regex, unit: fn(i64) -> Option<Duration>| -> Option<DateTime<Utc>> {
        let amount: i64 = re.captures(text)?.get(1)?.as_str().parse().ok()?;
        now.checked_sub_signed(unit(amount)?)
    };

    ago(&*MINUTES_AGO, Duration::try_minutes)
        .or_else(|| ago(&*HOURS_AGO, Duration::try_hours))
        .or_else(|| ago(&*DAYS_AGO, Duration::try_days))
}

/// Parse "12 янв. 2024" as Moscow midnight.
pub fn parse_short_date(text: &str) -> Result<DateTime<Utc>, AdapterError> {
    let invalid = || AdapterError::Date(text.to_string());
    let cleaned = squash_whitespace(text);
    let parts: Vec<&str> = cleaned.split(' ').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(invalid());
    };

    let day: u32 = day.parse().map_err(|_| invalid())?;
    let month = short_month(month).ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;

    let midnight = NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    moscow_to_utc(date, midnight).ok_or_else(invalid)
}

/// Parse "2 января 2024 года 15:04" as Moscow time.
pub fn parse_long_date(text: &str) -> Result<DateTime<Utc>, AdapterError> {
    let invalid = || AdapterError::Date(text.to_string());
    let cleaned = squash_whitespace(text);
    let parts: Vec<&str> = cleaned
        .split(' ')
        .filter(|part| !matches!(*part, "года" | "г." | "г"))
        .collect();
    let [day, month, year, time] = parts.as_slice() else {
        return Err(invalid());
    };

    let day: u32 = day.parse().map_err(|_| invalid())?;
    let month = genitive_month(month).ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| invalid())?;

    moscow_to_utc(date, time).ok_or_else(invalid)
}

/// Parse an RFC 2822 timestamp such as `Mon, 02 Jan 2006 15:04:05 GMT`.
pub fn parse_rfc2822(text: &str) -> Result<DateTime<Utc>, AdapterError> {
    DateTime::parse_from_rfc2822(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AdapterError::Date(text.to_string()))
}

/// Resolve a listing timestamp that is either relative or a short date.
pub fn parse_listing_time(text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, AdapterError> {
    match parse_relative(text, now) {
        Some(ts) => Ok(ts),
        None => parse_short_date(text),
    }
}
