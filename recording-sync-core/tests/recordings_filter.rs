use chrono::{TimeZone, Utc};
use recording_sync_core::error::DateParseError;
use recording_sync_core::recordings::{parse_timestamp, retain_recordings_in_range, DateRange};
use serde_json::json;

#[test]
fn date_only_bounds_cover_whole_days() {
    let range = DateRange::parse(Some("2025-10-01"), Some("2025-10-29")).unwrap();
    assert_eq!(range.from, Some(Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()));
    let (from, to) = range.query_bounds();
    assert_eq!(from.as_deref(), Some("2025-10-01T00:00:00.000Z"));
    assert_eq!(to.as_deref(), Some("2025-10-29T23:59:59.999Z"));
}

#[test]
fn timestamps_with_zone_are_normalised_to_utc() {
    let at = parse_timestamp("2025-10-01T18:30:00.000Z").unwrap();
    assert_eq!(at, Utc.with_ymd_and_hms(2025, 10, 1, 18, 30, 0).unwrap());

    let offset = parse_timestamp("2025-10-02T00:00:00+05:30").unwrap();
    assert_eq!(offset, at);

    let naive = parse_timestamp("2025-10-01T18:30:00").unwrap();
    assert_eq!(naive, at);
}

#[test]
fn unrecognised_bounds_are_rejected() {
    assert_eq!(
        DateRange::parse(Some("10/07/2025"), None),
        Err(DateParseError::Unrecognised("10/07/2025".into()))
    );
}

#[test]
fn open_range_contains_everything() {
    let range = DateRange::default();
    assert!(range.is_unbounded());
    assert!(range.contains(&Utc::now()));
    assert_eq!(range.query_bounds(), (None, None));
}

#[test]
fn lookback_from_date_reference_spans_days_before_that_day() {
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
    let range = DateRange::lookback(Some("2025-10-07"), 30, now).unwrap();
    let (from, to) = range.query_bounds();
    assert_eq!(from.as_deref(), Some("2025-09-07T00:00:00.000Z"));
    assert_eq!(to.as_deref(), Some("2025-10-07T23:59:59.999Z"));
}

#[test]
fn lookback_defaults_to_now() {
    let now = Utc.with_ymd_and_hms(2025, 10, 14, 9, 15, 0).unwrap();
    for reference in [None, Some("today"), Some("NOW")] {
        let range = DateRange::lookback(reference, 2, now).unwrap();
        assert_eq!(range.to, Some(now));
        assert_eq!(range.from, Some(Utc.with_ymd_and_hms(2025, 10, 12, 9, 15, 0).unwrap()));
    }
}

#[test]
fn retains_only_recordings_inside_range() {
    let records = vec![
        json!({
            "callId": "C1",
            "Recordings": [
                {"s3Url": "http://x/in.mp3", "dateCreatedInUpdates": "2025-10-05T10:00:00Z"},
                {"s3Url": "http://x/out.mp3", "dateCreatedInUpdates": "2025-11-05T10:00:00Z"},
                {"s3Url": "http://x/nodate.mp3"},
                {"s3Url": "http://x/bad.mp3", "dateCreatedInUpdates": "yesterday"}
            ]
        }),
        json!({
            "callId": "C2",
            "Recordings": [{"s3Url": "http://x/old.mp3", "dateCreatedInUpdates": "2024-01-01T00:00:00Z"}]
        }),
        json!({"callId": "C3"}),
    ];
    let range = DateRange::parse(Some("2025-10-01"), Some("2025-10-29")).unwrap();

    let kept = retain_recordings_in_range(records, &range);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0]["callId"], "C1");
    assert_eq!(
        kept[0]["Recordings"],
        json!([{"s3Url": "http://x/in.mp3", "dateCreatedInUpdates": "2025-10-05T10:00:00Z"}])
    );
}

#[test]
fn recording_on_the_last_day_is_inside() {
    let records = vec![json!({
        "callId": "C1",
        "Recordings": [{"s3Url": "u", "dateCreatedInUpdates": "2025-10-29T17:59:59.000Z"}]
    })];
    let range = DateRange::parse(None, Some("2025-10-29")).unwrap();
    assert_eq!(retain_recordings_in_range(records, &range).len(), 1);
}
