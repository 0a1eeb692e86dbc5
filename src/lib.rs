//! Proxy-based temperature reconstruction.
//!
//! Loads proxy networks (tree rings, corals, ice cores, ...), reconstructs a
//! hemispheric temperature series by composite-plus-scale or
//! principal-component regression against an instrumental target, and
//! renders the resulting figures.

pub mod app;
pub mod cli;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod recon;
pub mod render;
pub mod state;
pub mod ui;
