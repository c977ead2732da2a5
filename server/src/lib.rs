//! `rtc-server`
//!
//! WebRTC transport core for remote browser streaming: one encoded audio and
//! one encoded video stream fanned out to independent per-viewer peer
//! connections.

pub mod config;
pub mod observability;
pub mod rtc;
pub mod session_store;
