//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod heikin_ashi;
pub mod scoring;
pub mod analysis;
pub mod ranking;
pub mod position;
pub mod portfolio;
pub mod strategy;
pub mod decision;
pub mod execution;
pub mod universe;
pub mod cycle;
pub mod error;
pub mod config_validation;
