pub mod client;
pub mod config;
pub mod control;
pub mod oscillator;
pub mod params;
pub mod persistence;
pub mod session;
pub mod status;
pub mod token_store;
