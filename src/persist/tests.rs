use super::*;
use chrono::{NaiveDate, TimeZone};
use tempfile::TempDir;

fn local_dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
    let naive = NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap();
    Local.from_local_datetime(&naive).single().unwrap()
}

#[test]
fn test_append_creates_day_folder_and_file() {
    let dir = TempDir::new().unwrap();
    let log = LocalLog::new(dir.path());
    let dt = local_dt(2025, 3, 15, 9, 5);

    let path = log.append(dt, "小美", "早安").unwrap();
    assert_eq!(
        path,
        dir.path().join("2025-03-15").join("2025-03-15_msg.txt")
    );
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "09:05 | 小美 | 早安\n");
}

#[test]
fn test_append_accumulates_lines_in_order() {
    let dir = TempDir::new().unwrap();
    let log = LocalLog::new(dir.path());
    let dt = local_dt(2025, 3, 15, 9, 5);

    log.append(dt, "Amy", "first").unwrap();
    let path = log.append(dt, "Bob", "second").unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "09:05 | Amy | first\n09:05 | Bob | second\n");
}

#[test]
fn test_append_splits_by_day() {
    let dir = TempDir::new().unwrap();
    let log = LocalLog::new(dir.path());

    log.append(local_dt(2025, 3, 15, 23, 59), "Amy", "tonight").unwrap();
    log.append(local_dt(2025, 3, 16, 0, 1), "Amy", "tomorrow").unwrap();

    assert!(dir.path().join("2025-03-15/2025-03-15_msg.txt").exists());
    assert!(dir.path().join("2025-03-16/2025-03-16_msg.txt").exists());
}

#[test]
fn test_append_keeps_multiline_text_on_one_line() {
    let dir = TempDir::new().unwrap();
    let log = LocalLog::new(dir.path());
    let dt = local_dt(2025, 3, 15, 12, 0);

    let path = log.append(dt, "Amy", "line one\nline two").unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 1);
}

#[test]
fn test_append_unwritable_root_is_persistence_error() {
    let log = LocalLog::new("/proc/definitely-not-writable");
    let err = log
        .append(local_dt(2025, 3, 15, 12, 0), "Amy", "hi")
        .unwrap_err();
    assert!(matches!(err, RelayError::Persistence(_)));
}
