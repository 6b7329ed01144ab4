//! Client-side date filtering of call records by recording creation time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::error::DateParseError;
use crate::extract::RawRecord;

pub const RECORDINGS_KEY: &str = "Recordings";
pub const RECORDING_DATE_KEY: &str = "dateCreatedInUpdates";

/// Inclusive UTC time window. An open side accepts everything on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

impl DateRange {
    /// Parse optional bounds. A date-only `from` starts at midnight, a
    /// date-only `to` covers the whole day.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, DateParseError> {
        Ok(Self {
            from: from.map(|s| parse_bound(s, Bound::Start)).transpose()?,
            to: to.map(|s| parse_bound(s, Bound::End)).transpose()?,
        })
    }

    /// Window of `days` days ending at `reference`. `None`, `"today"` and
    /// `"now"` mean `now`; a date-only reference ends at the end of that day
    /// and the window starts `days` before its midnight.
    pub fn lookback(
        reference: Option<&str>,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, DateParseError> {
        let span = Duration::days(days);
        let reference = reference.map(str::trim);
        match reference {
            None => Ok(Self::ending_at(now, span)),
            Some(s) if s.eq_ignore_ascii_case("today") || s.eq_ignore_ascii_case("now") => {
                Ok(Self::ending_at(now, span))
            }
            Some(s) => {
                if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    let start = day_bound(date, Bound::Start, s)?;
                    let end = day_bound(date, Bound::End, s)?;
                    Ok(Self {
                        from: Some(start - span),
                        to: Some(end),
                    })
                } else {
                    Ok(Self::ending_at(parse_timestamp(s)?, span))
                }
            }
        }
    }

    fn ending_at(end: DateTime<Utc>, span: Duration) -> Self {
        Self {
            from: Some(end - span),
            to: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *at >= from) && self.to.map_or(true, |to| *at <= to)
    }

    /// Bounds as ISO 8601 strings with milliseconds and a `Z` suffix.
    pub fn query_bounds(&self) -> (Option<String>, Option<String>) {
        let fmt = |dt: DateTime<Utc>| dt.to_rfc3339_opts(SecondsFormat::Millis, true);
        (self.from.map(fmt), self.to.map(fmt))
    }
}

fn parse_bound(s: &str, bound: Bound) -> Result<DateTime<Utc>, DateParseError> {
    let s = s.trim();
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => day_bound(date, bound, s),
        Err(_) => parse_timestamp(s),
    }
}

fn day_bound(date: NaiveDate, bound: Bound, raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let naive = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_milli_opt(23, 59, 59, 999),
    }
    .ok_or_else(|| DateParseError::Unrecognised(raw.to_string()))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Parse an RFC 3339 timestamp (`Z` or offset) or a naive ISO timestamp, assumed UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DateParseError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(DateParseError::Unrecognised(s.to_string()))
}

/// Keep records with at least one recording inside `range`, narrowing each
/// kept record's recordings to the matching ones. Recordings with a missing
/// or unparseable date never match.
pub fn retain_recordings_in_range(records: Vec<RawRecord>, range: &DateRange) -> Vec<RawRecord> {
    let before = records.len();
    let kept: Vec<RawRecord> = records
        .into_iter()
        .filter_map(|mut record| {
            let matched: Vec<Value> = record
                .get(RECORDINGS_KEY)?
                .as_array()?
                .iter()
                .filter(|rec| {
                    rec.get(RECORDING_DATE_KEY)
                        .and_then(Value::as_str)
                        .and_then(|s| parse_timestamp(s).ok())
                        .is_some_and(|at| range.contains(&at))
                })
                .cloned()
                .collect();
            if matched.is_empty() {
                return None;
            }
            record
                .as_object_mut()?
                .insert(RECORDINGS_KEY.to_string(), Value::Array(matched));
            Some(record)
        })
        .collect();
    tracing::debug!(before, after = kept.len(), "Filtered records by recording date");
    kept
}
