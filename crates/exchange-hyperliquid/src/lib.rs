pub mod account;
pub mod address;
pub mod client;
pub mod error;

pub use account::{ClearinghouseState, HyperliquidPositionSource, InfoRequest};
pub use address::checksum_address;
pub use client::{HyperliquidClient, HyperliquidClientConfig, HYPERLIQUID_MAINNET_URL};
pub use error::HyperliquidError;
