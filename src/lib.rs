//! Rust library for controlling a CamillaDSP engine
//!
//! This library provides an async API for the websocket interface of a running
//! CamillaDSP process. It supports:
//!
//! - Processing state and stop reason
//! - Signal levels (RMS and peak, capture and playback) and signal range
//! - Volume and mute control
//! - Capture rate, rate adjust, buffer level and clipped samples
//! - Reading, uploading, validating and reloading the YAML config
//!
//! # Quick Start
//!
//! ```no_run
//! use camilladsp_client::CamillaClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Start CamillaDSP with the websocket server enabled: camilladsp -p1234 config.yml
//!     let mut client = CamillaClient::new();
//!     client.connect("127.0.0.1", 1234).await?;
//!
//!     if let Some(version) = client.version() {
//!         println!("CamillaDSP {}", version);
//!     }
//!
//!     let levels = client.get_playback_signal_rms().await?;
//!     println!("Playback RMS: {:?} dB", levels);
//!
//!     client.set_volume(-12.0).await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Client**: typed accessor per engine command
//! - **Connection**: websocket handling, one request in flight at a time
//! - **Protocol**: request frames and reply correlation
//! - **Tokens**: flat JSON tokenizer the reply decoders scan
//! - **Types**: domain types and the standard rate classifier

mod client;
mod config;
mod connection;
mod error;
mod extract;
mod protocol;
mod tokens;
mod types;

// Public exports
pub use client::CamillaClient;
pub use config::ClientOptions;
pub use error::{CamillaError, Result};
pub use protocol::{correlate, reply_command, Command, Reply, ReplyResult, Request};
pub use tokens::{tokenize, Token, TokenCursor, TokenError, TokenKind, DEFAULT_TOKEN_CAPACITY};
pub use types::{
    signal_range_to_db, Decibels, ProcessingState, StandardRate, StopReason,
    SupportedDeviceTypes, Version, SILENT_RANGE_DB,
};
