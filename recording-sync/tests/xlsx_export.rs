use recording_sync::xlsx::XlsxExporter;
use recording_sync_core::contract::SpreadsheetExporter;
use recording_sync_core::sheet::Sheet;
use serde_json::json;
use tempfile::tempdir;

fn records() -> Vec<serde_json::Map<String, serde_json::Value>> {
    vec![
        json!({"_id": "65f0", "source": "A", "s_id": "C1", "totalBeds": 40, "visitorsAllowed": true})
            .as_object()
            .cloned()
            .unwrap(),
        json!({"_id": null, "source": "A", "s_id": "C2", "amenities": ["wifi", "laundry"]})
            .as_object()
            .cloned()
            .unwrap(),
    ]
}

#[test]
fn writes_workbook_with_named_sheets() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("nested/out/matched.xlsx");
    let sheets = [
        Sheet::from_records("Matched_Entities", &records()),
        Sheet::from_records("MongoDB_Full_Docs", &[]),
    ];

    XlsxExporter::new().export(&path, &sheets).expect("export succeeds");

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"PK"), "xlsx is a zip container");
}

#[test]
fn oversized_transcription_does_not_abort_the_workbook() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("matched.xlsx");
    let transcription = "[00:00] Agent: hi ".repeat(2_000);
    let long_call = json!({"_id": "65f1", "s_id": "C9", "transcription": transcription})
        .as_object()
        .cloned()
        .unwrap();
    let sheets = [
        Sheet::from_records("Matched_Entities", &records()),
        Sheet::from_records("MongoDB_Full_Docs", &[long_call]),
    ];

    XlsxExporter::new()
        .export(&path, &sheets)
        .expect("oversized cells are truncated, not rejected");

    assert!(std::fs::read(&path).unwrap().starts_with(b"PK"));
}

#[test]
fn long_sheet_names_are_truncated() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("long.xlsx");
    let sheets = [Sheet::from_records(
        "A sheet name that is far longer than Excel allows",
        &records(),
    )];

    XlsxExporter::new().export(&path, &sheets).unwrap();
    assert!(path.exists());
}

#[test]
fn writing_into_a_file_path_fails() {
    let tmp = tempdir().unwrap();
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"plain file").unwrap();

    let result = XlsxExporter::new().export(&blocker.join("out.xlsx"), &[]);
    assert!(result.is_err());
}
