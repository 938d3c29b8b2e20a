#![forbid(unsafe_code)]

pub mod check;
pub mod cli;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod fingerprint;
pub mod logging;
pub mod message;
pub mod monitor;
pub mod notify;
pub mod record;
pub mod schedule;
pub mod source;
pub mod state;
