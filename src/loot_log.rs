use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;

pub const CURRENCY_ITEM_NAME: &str = "Yang";

const RECEIVE_MARKER: &str = "]: You receive ";
const FIELD_SEPARATOR: &str = "] [";
const LOG_DATE_FORMAT: &str = "%d/%m/%y";
const LOG_TIME_FORMAT: &str = "%H:%M:%S";
// Two-digit log years are always read as 20xx.
const LOG_CENTURY_BASE: i32 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LootEvent {
    pub timestamp: NaiveDateTime,
    pub quantity: u64,
    pub item_name: String,
}

impl LootEvent {
    pub fn is_currency(&self) -> bool {
        self.item_name == CURRENCY_ITEM_NAME
    }
}

impl fmt::Display for LootEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "[{}] [{}]: You receive {} {}.",
            self.timestamp.format(LOG_DATE_FORMAT),
            self.timestamp.format(LOG_TIME_FORMAT),
            self.quantity,
            self.item_name
        )
    }
}

/// Parses `[DD/MM/YY] [HH:MM:SS]: You receive <quantity> <item>.`; anything
/// else yields `None`.
pub fn parse_loot_line(line: &str) -> Option<LootEvent> {
    // The first line of the file may carry a byte order mark.
    let trimmed_line = line.trim_start_matches('\u{feff}').trim();
    if trimmed_line.is_empty() {
        return None;
    }

    let header = trimmed_line.strip_prefix('[')?;
    let (date_field, remainder) = header.split_once(FIELD_SEPARATOR)?;
    let (time_field, body) = remainder.split_once(RECEIVE_MARKER)?;
    let body = body.strip_suffix('.')?;
    let (quantity_field, item_name) = body.split_once(' ')?;

    let timestamp = parse_log_timestamp(date_field, time_field)?;
    let quantity = parse_quantity(quantity_field)?;
    if item_name.trim().is_empty() {
        return None;
    }

    Some(LootEvent {
        timestamp,
        quantity,
        item_name: item_name.to_string(),
    })
}

fn parse_log_timestamp(date_field: &str, time_field: &str) -> Option<NaiveDateTime> {
    let date = parse_log_date(date_field)?;
    let time = parse_log_time(time_field)?;
    Some(NaiveDateTime::new(date, time))
}

fn parse_log_date(date_field: &str) -> Option<NaiveDate> {
    let [day, month, year] = split_two_digit_fields(date_field, '/')?;
    NaiveDate::from_ymd_opt(LOG_CENTURY_BASE + year as i32, month, day)
}

fn parse_log_time(time_field: &str) -> Option<NaiveTime> {
    let [hour, minute, second] = split_two_digit_fields(time_field, ':')?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn split_two_digit_fields(value: &str, separator: char) -> Option<[u32; 3]> {
    let mut fields = value.split(separator);
    let first = parse_two_digit_field(fields.next()?)?;
    let second = parse_two_digit_field(fields.next()?)?;
    let third = parse_two_digit_field(fields.next()?)?;
    if fields.next().is_some() {
        return None;
    }

    Some([first, second, third])
}

fn parse_two_digit_field(value: &str) -> Option<u32> {
    if value.len() != 2 || !is_ascii_digits(value) {
        return None;
    }

    value.parse::<u32>().ok()
}

fn parse_quantity(value: &str) -> Option<u64> {
    if !is_ascii_digits(value) {
        return None;
    }

    value.parse::<u64>().ok()
}

fn is_ascii_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
}
