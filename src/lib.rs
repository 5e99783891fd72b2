pub mod api;
pub mod app;
pub mod browse;
pub mod cli;
pub mod compare;
pub mod config;
pub mod datefmt;
pub mod draft;
pub mod locale;
pub mod model;
pub mod output;
pub mod page;
pub mod poll;
pub mod stats;
pub mod table;
pub mod utils;

#[cfg(test)]
mod tests;
