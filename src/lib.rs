//! Goldberg - physics puzzle game
//!
//! The application layer: configuration loading and a headless level runner
//! on top of [`goldberg_core`].

pub mod config;
pub mod runner;
