//! Command line front end: offline gallery builds and one-off queries

pub mod client;
pub mod commands;
pub mod display;
