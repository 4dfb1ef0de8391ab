//! Settlement and accounting core for a perpetual-futures venue.
//!
//! The engine converts per-account order intents and global price/version
//! updates into realized collateral changes, fees and funding payments while
//! keeping storage compact: instead of replaying every price update for every
//! account, global per-unit cumulative accumulators ([`Version`]) advance
//! once per settlement timestamp, and an account settles over an interval by
//! subtracting two accumulator snapshots and scaling by the position size it
//! held ([`Checkpoint::accumulate`]). Settlement is O(1) per account.
//!
//! Everything here is a pure state transition over immutable snapshots:
//! no I/O, no clocks, no partial mutation on failure. Oracle ingestion,
//! authorization, margining and persistence are external collaborators.

#![forbid(unsafe_code)]

pub mod accumulator;
pub mod checkpoint;
pub mod error;
pub mod fixed;
pub mod guarantee;
pub mod order;
pub mod position;
pub mod version;

pub use accumulator::Accumulator;
pub use checkpoint::{Checkpoint, CheckpointAccumulation, SettlementContext};
pub use error::{LedgerError, Result};
pub use fixed::Fixed6;
pub use guarantee::Guarantee;
pub use order::Order;
pub use position::Position;
pub use version::{
    MarketParameter, OracleVersion, PAccumulator, PControllerParameter, Version,
    VersionAccumulation,
};
