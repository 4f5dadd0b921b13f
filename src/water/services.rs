use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
    water::{
        dto::{MonthQuery, PeriodQuery, PeriodResponse, WaterPayload},
        repo_types::{NewWaterEntry, WaterChanges, WaterEntry},
    },
};

/// Slot 0 is unused, slots 1..=31 hold the day-of-month totals.
pub const MONTH_SLOTS: usize = 32;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[day].[month].[year]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

lazy_static! {
    static ref DATE_RE: Regex =
        Regex::new(r"^((0[1-9]|[1-2][0-9]|3[01])\.(0[1-9]|1[0-2])\.[0-9]{4})$").unwrap();
    static ref TIME_RE: Regex = Regex::new(r"^(?:2[0-4]|[01]?[0-9]):(?:[0-5][0-9])$").unwrap();
    static ref YEAR_RE: Regex = Regex::new(r"^(20[0-6][0-9]|2070)$").unwrap();
    static ref MONTH_RE: Regex = Regex::new(r"^(0[1-9]|1[0-2])$").unwrap();
    static ref DAY_RE: Regex = Regex::new(r"^(0[1-9]|[1-2][0-9]|3[01])$").unwrap();
    static ref LOOSE_DAY_RE: Regex = Regex::new(r"^(0?[1-9]|[12][0-9]|30|31)$").unwrap();
}

const YEAR_MSG: &str = "Year must be yyyy / Where yyyy: 2000-2070";
const MONTH_MSG: &str = "Month must be mm / Where mm: 01-12";
const DAY_MSG: &str = "Day must be dd / Where dd: 01-31";

/// Largest integer a client-side double holds exactly (2^53 - 1).
const MAX_SAFE_VALUE: i64 = 9_007_199_254_740_991;
const UNSAFE_VALUE_MSG: &str = "Value must be a safe number";

/// Server-local `(dd.mm.yyyy, HH:MM)` for entries that arrive without a timestamp.
pub fn local_now(offset: UtcOffset) -> (String, String) {
    let now = OffsetDateTime::now_utc().to_offset(offset);
    // Both descriptions only use components every OffsetDateTime has.
    let date = now.format(DATE_FORMAT).unwrap_or_default();
    let time = now.format(TIME_FORMAT).unwrap_or_default();
    (date, time)
}

fn parse_value(raw: &Value) -> Result<i64, Vec<&'static str>> {
    let integer = match raw {
        Value::Number(n) if n.is_f64() => None,
        Value::Number(n) => match n.as_i64() {
            Some(v) => Some(v),
            None => return Err(vec![UNSAFE_VALUE_MSG]),
        },
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    if let Some(v) = integer {
        return check_integer(v);
    }

    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(number) = number.filter(|n| n.is_finite()) else {
        return Err(vec!["Value must be a number"]);
    };
    if number.abs() > MAX_SAFE_VALUE as f64 {
        return Err(vec![UNSAFE_VALUE_MSG]);
    }
    let mut errors = Vec::new();
    if number <= 0.0 {
        errors.push("Value must be positive");
    }
    if number.fract() != 0.0 {
        errors.push("Value must be an integer");
    }
    if errors.is_empty() {
        Ok(number as i64)
    } else {
        Err(errors)
    }
}

fn check_integer(value: i64) -> Result<i64, Vec<&'static str>> {
    if value.unsigned_abs() > MAX_SAFE_VALUE as u64 {
        Err(vec![UNSAFE_VALUE_MSG])
    } else if value <= 0 {
        Err(vec!["Value must be positive"])
    } else {
        Ok(value)
    }
}

/// Checks every field and reports all problems at once.
pub(crate) fn validate_payload(
    payload: WaterPayload,
    value_required: bool,
) -> Result<WaterChanges, AppError> {
    let mut errors: Vec<&str> = Vec::new();

    let value = match &payload.value {
        Some(raw) => match parse_value(raw) {
            Ok(v) => Some(v),
            Err(mut e) => {
                errors.append(&mut e);
                None
            }
        },
        None if value_required => {
            errors.push("\"value\" is required");
            None
        }
        None => None,
    };
    if payload.date.as_deref().is_some_and(|d| !DATE_RE.is_match(d)) {
        errors.push("Date must be dd.mm.yyyy / Where dd: 01-31, mm: 01-12");
    }
    if payload.time.as_deref().is_some_and(|t| !TIME_RE.is_match(t)) {
        errors.push("Time must be hh:mm / Where hh: 00-24, mm: 00-59");
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(". ")));
    }
    Ok(WaterChanges {
        value,
        date: payload.date,
        time: payload.time,
    })
}

fn required_param<'a>(
    name: &str,
    raw: &'a Option<String>,
    re: &Regex,
    msg: &str,
) -> Result<&'a str, AppError> {
    let value = raw
        .as_deref()
        .ok_or_else(|| AppError::Validation(format!("\"{name}\" is required")))?;
    if re.is_match(value) {
        Ok(value)
    } else {
        Err(AppError::Validation(msg.into()))
    }
}

/// Substring looked up in stored dates: `dd.mm.yyyy` when a day is given, `mm.yyyy` otherwise.
pub(crate) fn period_pattern(year: &str, month: &str, day: Option<&str>) -> String {
    match day {
        Some(day) => format!("{day}.{month}.{year}"),
        None => format!("{month}.{year}"),
    }
}

pub(crate) fn validate_period_query(q: &PeriodQuery) -> Result<String, AppError> {
    let year = required_param("year", &q.year, &YEAR_RE, YEAR_MSG)?;
    let month = required_param("month", &q.month, &MONTH_RE, MONTH_MSG)?;
    let day = match q.day.as_deref() {
        Some(day) if DAY_RE.is_match(day) => Some(day),
        Some(_) => return Err(AppError::Validation(DAY_MSG.into())),
        None => None,
    };
    Ok(period_pattern(year, month, day))
}

/// Returns the exact `dd.mm.yyyy` to look up; a single-digit day is zero-padded.
pub(crate) fn validate_day_query(q: &PeriodQuery) -> Result<String, AppError> {
    let year = required_param("year", &q.year, &YEAR_RE, YEAR_MSG)?;
    let month = required_param("month", &q.month, &MONTH_RE, MONTH_MSG)?;
    let day = required_param("day", &q.day, &LOOSE_DAY_RE, DAY_MSG)?;
    Ok(format!("{day:0>2}.{month}.{year}"))
}

pub(crate) fn validate_month_query(q: &MonthQuery) -> Result<String, AppError> {
    let year = required_param("year", &q.year, &YEAR_RE, YEAR_MSG)?;
    let month = required_param("month", &q.month, &MONTH_RE, MONTH_MSG)?;
    Ok(period_pattern(year, month, None))
}

/// Adds every entry's value into the slot of its day-of-month.
pub(crate) fn sum_by_day(entries: &[WaterEntry]) -> Vec<i64> {
    let mut slots = vec![0i64; MONTH_SLOTS];
    for entry in entries {
        let day = entry
            .date
            .split('.')
            .next()
            .and_then(|d| d.parse::<usize>().ok());
        if let Some(slot) = day.and_then(|d| slots.get_mut(d)) {
            *slot = slot.saturating_add(entry.value);
        }
    }
    slots
}

/// Path ids that are not uuids are reported exactly like missing records.
fn parse_entry_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound)
}

pub async fn add_entry(
    state: &AppState,
    owner: Uuid,
    payload: WaterPayload,
) -> Result<WaterEntry, AppError> {
    let changes = validate_payload(payload, true)?;
    let value = changes
        .value
        .ok_or_else(|| AppError::Validation("\"value\" is required".into()))?;
    let (today, now) = local_now(state.config.local_offset);
    let entry = state
        .water
        .insert(NewWaterEntry {
            owner,
            value,
            date: changes.date.unwrap_or(today),
            time: changes.time.unwrap_or(now),
        })
        .await?;
    info!(entry_id = %entry.id, owner = %owner, value = entry.value, "water entry added");
    Ok(entry)
}

pub async fn update_entry(
    state: &AppState,
    owner: Uuid,
    raw_id: &str,
    payload: WaterPayload,
) -> Result<WaterEntry, AppError> {
    let changes = validate_payload(payload, false)?;
    let id = parse_entry_id(raw_id)?;
    let entry = state
        .water
        .update_owned(id, owner, &changes)
        .await?
        .ok_or(AppError::NotFound)?;
    debug!(entry_id = %entry.id, "water entry updated");
    Ok(entry)
}

pub async fn delete_entry(
    state: &AppState,
    owner: Uuid,
    raw_id: &str,
) -> Result<WaterEntry, AppError> {
    let id = parse_entry_id(raw_id)?;
    let entry = state
        .water
        .delete_owned(id, owner)
        .await?
        .ok_or(AppError::NotFound)?;
    debug!(entry_id = %entry.id, "water entry deleted");
    Ok(entry)
}

pub async fn query_by_period(
    state: &AppState,
    owner: Uuid,
    query: &PeriodQuery,
) -> Result<PeriodResponse, AppError> {
    let pattern = validate_period_query(query)?;
    let entries = state.water.find_by_date_pattern(owner, &pattern).await?;
    if entries.is_empty() {
        return Err(AppError::NotFound);
    }
    let total_value = entries
        .iter()
        .fold(0i64, |acc, e| acc.saturating_add(e.value));
    Ok(PeriodResponse {
        period_data: entries,
        total_value,
    })
}

pub async fn query_by_day(
    state: &AppState,
    owner: Uuid,
    query: &PeriodQuery,
) -> Result<Vec<WaterEntry>, AppError> {
    let date = validate_day_query(query)?;
    Ok(state.water.find_by_date(owner, &date).await?)
}

pub async fn query_by_month(
    state: &AppState,
    owner: Uuid,
    query: &MonthQuery,
) -> Result<Vec<i64>, AppError> {
    let pattern = validate_month_query(query)?;
    let entries = state.water.find_by_date_pattern(owner, &pattern).await?;
    Ok(sum_by_day(&entries))
}
