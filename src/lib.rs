#![forbid(unsafe_code)]

pub mod auth;
pub mod author;
pub mod browser;
pub mod chrome;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod formats;
pub mod logging;
pub mod scrape;
pub mod shelf;
pub mod snapshot;
pub mod status;
pub mod urls;
