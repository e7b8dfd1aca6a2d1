pub mod config;
pub mod deal;
pub mod report;
pub mod runner;
