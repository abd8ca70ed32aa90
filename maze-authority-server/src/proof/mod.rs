//! Completion Proofs
//!
//! Signed receipts that bind a race completion (room, player, seed, time,
//! path hash) to this server. A holder of the shared secret can check them
//! later with [`ReceiptIssuer::verify`].

pub mod receipt;

pub use receipt::{ElapsedMs, IssuedReceipt, Receipt, ReceiptClaim, ReceiptError, ReceiptIssuer};
