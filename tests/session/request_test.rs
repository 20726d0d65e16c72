//! Tests for scrape request validation and worker arguments.

use std::ffi::OsString;
use std::path::Path;

use chrono::NaiveDate;
use scrape_supervisor::process::WorkerProgram;
use scrape_supervisor::session::{
    parse_date, transcription_command, DataType, ScrapeRequest, ValidationError,
};

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn request() -> ScrapeRequest {
    ScrapeRequest::new(
        vec!["alpha".to_string(), "beta".to_string()],
        vec![DataType::Videos, DataType::Images],
        vec![date("2024-01-01"), date("2024-03-01")],
        "/data/out",
    )
}

fn args(request: &ScrapeRequest) -> Vec<OsString> {
    request
        .to_command(&WorkerProgram::new("python3").arg("Scrapper_main.py"))
        .get_args()
        .to_vec()
}

#[test]
fn valid_request_passes() {
    tokio_test::assert_ok!(request().validate());
}

#[test]
fn empty_lists_are_named_in_order() {
    let mut req = request();
    req.groups = vec!["  ".to_string()];
    req.dates.clear();
    assert_eq!(
        req.validate(),
        Err(ValidationError::EmptyList { list: "groups" })
    );

    let mut req = request();
    req.data_types.clear();
    let err = req.validate().unwrap_err();
    assert_eq!(err, ValidationError::EmptyList { list: "data types" });
    assert!(err.to_string().contains("data types"));

    let mut req = request();
    req.dates.clear();
    assert_eq!(
        req.validate(),
        Err(ValidationError::EmptyList { list: "dates" })
    );
}

#[test]
fn worker_arguments_follow_contract() {
    let expected: Vec<OsString> = [
        "Scrapper_main.py",
        "--groups",
        "alpha,beta",
        "--datatypes",
        "Videos,Images",
        "--dates",
        "2024-03-01,2024-01-01",
        "--target_folder",
        "/data/out",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    assert_eq!(args(&request()), expected);
}

#[test]
fn duplicates_are_removed_from_arguments() {
    let mut req = request();
    req.data_types.push(DataType::Videos);
    req.dates.push(date("2024-03-01"));
    let args = args(&req);
    assert_eq!(args[4], OsString::from("Videos,Images"));
    assert_eq!(args[6], OsString::from("2024-03-01,2024-01-01"));
}

#[test]
fn data_type_parsing_is_case_insensitive() {
    assert_eq!("videos".parse::<DataType>(), Ok(DataType::Videos));
    assert_eq!(" LINKS ".parse::<DataType>(), Ok(DataType::Links));
    assert_eq!(
        "gifs".parse::<DataType>(),
        Err(ValidationError::UnknownDataType("gifs".to_string()))
    );
}

#[test]
fn dates_must_be_iso() {
    assert_eq!(date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    tokio_test::assert_err!(parse_date("29/02/2024"));
    tokio_test::assert_err!(parse_date("2023-02-29"));
}

#[test]
fn transcription_receives_folder() {
    let program = WorkerProgram::new("python3").arg("updated_video_transcription.py");
    let command = transcription_command(&program, Path::new("/data/out"));
    assert_eq!(
        command.get_args(),
        &[
            OsString::from("updated_video_transcription.py"),
            OsString::from("/data/out")
        ]
    );
}
