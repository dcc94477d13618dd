// src/lib.rs

//! Carfax used-vehicle listing crawler library

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod services;
pub mod storage;
pub mod utils;
