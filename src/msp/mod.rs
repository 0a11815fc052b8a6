//! # MSP Protocol Module
//!
//! Implementation of the MultiWii Serial Protocol used to talk to flight
//! controllers.
//!
//! This module handles:
//! - MSPv1 (`$M`) and MSPv2 (`$X`) frame encoding
//! - Frame reassembly from an arbitrarily chunked byte stream
//! - XOR and CRC8-DVB-S2 checksums
//! - RC override and status payloads

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
pub mod rc;
pub mod status;
