// src/lib.rs

//! Flogo Dot IO contribution crawler library

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod secrets;
pub mod source;
pub mod storage;
pub mod store;
pub mod utils;

#[cfg(feature = "lambda")]
pub mod handler;
