//! Scrape Supervisor - runs scraper, transcription and update workers and
//! relays their line protocol.

pub mod config;
pub mod display;
pub mod process;
pub mod protocol;
pub mod session;
