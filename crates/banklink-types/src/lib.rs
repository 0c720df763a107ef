//! Common types module for the banklink gateway system.
//!
//! This module defines the data model shared by every banklink crate: orders
//! and their payment status, the transient payment request/response shapes
//! exchanged with a bank, verification outcomes and the events the gateway
//! reports back to its host.

/// Gateway events reported to the observability collaborator.
pub mod events;
/// Order data and the order status state machine.
pub mod order;
/// Payment request, response and verification result types.
pub mod payment;
/// Secret string wrapper for key material and passphrases.
pub mod secret_string;
/// Storage namespaces.
pub mod storage;
/// Helper utilities.
pub mod utils;

pub use events::*;
pub use order::*;
pub use payment::*;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::current_timestamp;
