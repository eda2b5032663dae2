// src/lib.rs

//! vidcrawl: resumable short-video metadata crawler.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod table;
pub mod utils;
