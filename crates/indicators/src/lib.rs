//! Lattice Indicators
//!
//! Representative indicator hubs for the Lattice streaming engine. Each
//! indicator contributes one conversion hook to the shared
//! cache/notify/rebuild engine in `lattice_stream`; the full formula
//! catalog lives outside this workspace.
//!
//! # Available Indicators
//! - SMA: Simple Moving Average (stateless window over the provider)
//! - EMA: Exponential Moving Average (running state with rollback)
//! - Donchian: price channel (rolling-window extremum trackers)

#![deny(clippy::all)]

pub mod donchian;
pub mod ema;
pub mod error;
pub mod sma;

// Re-export main types
pub use donchian::{donchian_hub, DonchianHub, DonchianKernel, DonchianResult};
pub use ema::{ema_hub, EmaHub, EmaKernel, EmaResult};
pub use error::IndicatorError;
pub use sma::{sma_hub, SmaHub, SmaKernel, SmaResult};
