//! Courier message routing server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod delivery;
pub mod landing;
pub mod routes;
pub mod state;
pub mod uploads;
pub mod ws;
