//! Solar and battery savings simulator.
//!
//! Replays a metered production and consumption history through a simulated
//! photovoltaic array, battery store, and time-of-use grid connection with a
//! net-metering credit ledger, and compares the bill against the same
//! history with neither solar nor storage.

pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod history;
pub mod io;
pub mod runner;
/// Clock, lookup tables, dispatcher, engine, and KPIs.
pub mod sim;
pub mod telemetry;
