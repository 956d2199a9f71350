//! Atomics that switch to loom's model-checked versions under the `loom`
//! feature. Only the CAS protocols checked by `tests/coordination_loom.rs`
//! go through here.

#[cfg(feature = "loom")]
pub use loom::sync::atomic::{AtomicU8, AtomicU32, Ordering};

#[cfg(not(feature = "loom"))]
pub use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

#[cfg(feature = "loom")]
pub use loom::sync::Arc;

#[cfg(not(feature = "loom"))]
pub use std::sync::Arc;

#[cfg(feature = "loom")]
pub use loom::thread;

#[cfg(not(feature = "loom"))]
pub use std::thread;
