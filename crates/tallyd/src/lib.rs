//! Tally light coordination daemon.
//!
//! Keeps a fleet of network tally lights consistent with a video switcher:
//! lights are discovered over mDNS, the switcher is followed over a
//! persistent websocket, and a reconciliation engine continuously pushes the
//! derived display state of every configured light to its device over HTTP.
//! A small HTTP API exposes the whole picture to a control panel and accepts
//! configuration changes.
//!
//! The engine is level-triggered: events only schedule a full
//! recompute-and-push pass, so a lost event is corrected by the next pass
//! rather than leaving a light wrong forever.

pub mod api;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod integrations;
pub mod monitor;
pub mod registry;
pub mod store;
pub mod tracker;
