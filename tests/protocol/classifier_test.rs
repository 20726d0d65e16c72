//! Tests for worker line classification.

use scrape_supervisor::protocol::{classify_line, Event, InputKind, LogLevel, LogRecord};

#[test]
fn needs_input_known_kinds() {
    let cases = [
        ("GUI_NEEDS_INPUT:PHONE", InputKind::Phone),
        ("GUI_NEEDS_INPUT:CODE", InputKind::Code),
        ("GUI_NEEDS_INPUT:PASSWORD", InputKind::Password),
    ];
    for (line, kind) in cases {
        assert_eq!(classify_line(line), Some(Event::InputRequest { kind }));
    }
}

#[test]
fn needs_input_unknown_kind_is_kept() {
    assert_eq!(
        classify_line("GUI_NEEDS_INPUT:EMAIL"),
        Some(Event::InputRequest {
            kind: InputKind::Unknown("EMAIL".to_string())
        })
    );
    assert_eq!(
        classify_line("GUI_NEEDS_INPUT:"),
        Some(Event::InputRequest {
            kind: InputKind::Unknown(String::new())
        })
    );
}

#[test]
fn auth_success_is_exact_match() {
    assert_eq!(classify_line("GUI_AUTH_SUCCESS"), Some(Event::AuthSuccess));
    assert_eq!(
        classify_line("GUI_AUTH_SUCCESS!"),
        Some(Event::PlainLine {
            text: "GUI_AUTH_SUCCESS!".to_string()
        })
    );
}

#[test]
fn auth_failed_carries_reason() {
    assert_eq!(
        classify_line("GUI_AUTH_FAILED:Invalid code: try again"),
        Some(Event::AuthFailure {
            reason: "Invalid code: try again".to_string()
        })
    );
    assert_eq!(
        classify_line("GUI_AUTH_FAILED:"),
        Some(Event::AuthFailure {
            reason: String::new()
        })
    );
}

#[test]
fn bytes_downloaded_parses_integer() {
    assert_eq!(
        classify_line("BYTES_DOWNLOADED:1048576"),
        Some(Event::ByteProgress { n: 1_048_576 })
    );
    assert_eq!(
        classify_line("BYTES_DOWNLOADED: 42 "),
        Some(Event::ByteProgress { n: 42 })
    );
}

#[test]
fn bytes_downloaded_malformed_is_dropped() {
    for line in [
        "BYTES_DOWNLOADED:",
        "BYTES_DOWNLOADED:abc",
        "BYTES_DOWNLOADED:-5",
        "BYTES_DOWNLOADED:1.5",
        "BYTES_DOWNLOADED:99999999999999999999999",
    ] {
        assert_eq!(classify_line(line), None, "line {line:?}");
    }
}

#[test]
fn blank_lines_produce_nothing() {
    for line in ["", " ", "\t", "\n", "\r\n", "   \t  "] {
        assert_eq!(classify_line(line), None, "line {line:?}");
    }
}

#[test]
fn sentinels_are_case_sensitive_and_anchored() {
    for line in [
        "gui_auth_success",
        "bytes_downloaded:10",
        " GUI_NEEDS_INPUT:CODE",
        "log: BYTES_DOWNLOADED:10",
    ] {
        assert_eq!(
            classify_line(line),
            Some(Event::PlainLine {
                text: line.to_string()
            }),
            "line {line:?}"
        );
    }
}

#[test]
fn classification_is_deterministic() {
    let lines = [
        "GUI_NEEDS_INPUT:CODE",
        "BYTES_DOWNLOADED:7",
        "hello",
        "BYTES_DOWNLOADED:x",
        "",
    ];
    let first: Vec<_> = lines.iter().map(|l| classify_line(l)).collect();
    let second: Vec<_> = lines.iter().rev().map(|l| classify_line(l)).collect();
    let second: Vec<_> = second.into_iter().rev().collect();
    assert_eq!(first, second);
}

#[test]
fn plain_line_surfaces_as_info_record() {
    let event = classify_line("Downloading video 3/10").unwrap();
    assert_eq!(
        event.log_record(),
        Some(LogRecord::new("Downloading video 3/10", LogLevel::Info))
    );
}

#[test]
fn byte_progress_has_no_log_record() {
    assert_eq!(Event::ByteProgress { n: 1 }.log_record(), None);
}

#[test]
fn completed_record_distinguishes_stop_from_crash() {
    let stopped = Event::Completed {
        exit_code: Some(143),
        stopped_by_user: true,
    };
    let crashed = Event::Completed {
        exit_code: Some(1),
        stopped_by_user: false,
    };
    assert_eq!(stopped.log_record().unwrap().level, LogLevel::Warning);
    let record = crashed.log_record().unwrap();
    assert_eq!(record.level, LogLevel::Error);
    assert!(record.text.contains("exit code: 1"));
}

#[test]
fn only_password_is_masked() {
    assert!(InputKind::Password.is_secret());
    assert!(!InputKind::Phone.is_secret());
    assert!(!InputKind::Code.is_secret());
    assert!(!InputKind::Unknown("TOKEN".into()).is_secret());
}
