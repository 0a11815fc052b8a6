//! # MSP Override Library
//!
//! Override RC channels on a MultiWii Serial Protocol flight controller.
//!
//! This library provides the MSPv1/MSPv2 frame codec, serial, TCP, UDP and
//! Bluetooth transports, the identification handshake and the periodic
//! `SET_RAW_RC` / `RC` / status poll loop.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod msp;
pub mod telemetry;
pub mod transport;
