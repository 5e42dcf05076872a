//! Commodity-inspection marketplace core.
//!
//! Customers raise inspection enquiries, inspectors bid on them, and a
//! customer confirms one winning bid. Money is held in integer minor units
//! with a platform fee frozen at enquiry creation, so the two sides of the
//! market see asymmetric amounts derived from the same stored net ask.

pub mod bids;
pub mod confirmation;
pub mod domain;
pub mod enquiries;
mod error;
pub mod fees;
pub mod memory;
pub mod payments;
pub mod policy;
pub mod principal;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use error::MarketError;
pub use router::{marketplace_router, Marketplace};
