//! Idempotency module
//!
//! Prevents duplicate application of mutating requests using the
//! client-supplied idempotency key stored on every transaction.

mod guard;

pub use guard::{IdempotencyCheck, IdempotencyGuard};
