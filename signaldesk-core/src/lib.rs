//! SignalDesk Core: market data access, indicator math, signal synthesis and scoring.
//!
//! This crate contains the analysis half of the dashboard:
//! - Domain types (quotes, candles, indicator sets, signals, scores, trades)
//! - Deterministic mock data for running without credentials
//! - TTL cache and FIFO request scheduler with a daily budget
//! - Market data client with per-symbol mock fallback
//! - RSI / EMA / SMA / MACD calculators
//! - Signal synthesizer with optional narrative enrichment
//! - Five-factor evaluation scorer

pub mod analysis;
pub mod clock;
pub mod data;
pub mod domain;
pub mod evaluation;
pub mod indicators;
pub mod rng;
