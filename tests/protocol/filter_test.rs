//! Tests for log presentation filtering.

use scrape_supervisor::protocol::LogFilter;

#[test]
fn strips_python_logging_prefix() {
    let filter = LogFilter::new();
    assert_eq!(
        filter.apply("2024-03-01 10:15:42,123 - WARNING - Flood wait 30s"),
        Some("Flood wait 30s".to_string())
    );
}

#[test]
fn suppresses_speed_and_info_noise() {
    let filter = LogFilter::new();
    assert_eq!(filter.apply("Download Speed: 1.2 MB/s"), None);
    assert_eq!(filter.apply("Time Elapsed: 00:01:00"), None);
    assert_eq!(filter.apply("2024-03-01 10:15:42,123 - INFO - connected"), None);
}

#[test]
fn passes_ordinary_text_unchanged() {
    let filter = LogFilter::new();
    assert_eq!(
        filter.apply("Saved photo_001.jpg"),
        Some("Saved photo_001.jpg".to_string())
    );
}

#[test]
fn custom_suppression_list() {
    let filter = LogFilter::with_suppressed(vec!["DEBUG".to_string()]);
    assert_eq!(filter.apply("DEBUG tick"), None);
    assert_eq!(
        filter.apply("Download Speed: 3 MB/s"),
        Some("Download Speed: 3 MB/s".to_string())
    );
}
