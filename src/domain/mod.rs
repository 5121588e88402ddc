//! Domain types for vault position sync and valuation.
//!
//! This module provides:
//! - Primitives: Chain, Address (lowercase-normalized), SnapshotDate
//! - The VaultPosition snapshot entity and transient provider records
//! - Big-integer share-to-asset conversion and valuation math

pub mod math;
pub mod position;
pub mod primitives;

pub use position::{RawPositionRecord, VaultPosition, VaultStaticData};
pub use primitives::{Address, Chain, ParseChainError, SnapshotDate};
