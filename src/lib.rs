#![forbid(unsafe_code)]

pub mod config;
pub mod db;
pub mod utils;
