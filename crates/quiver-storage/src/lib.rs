#![forbid(unsafe_code)]

//! Local storage primitives for quiver.
//!
//! [`CacheLayout`] maps bundle names to deterministic paths under a configured
//! cache root and enforces key safety (no separators, no `..`, no empty
//! names). [`write_atomic`] provides crash-safe whole-file writes via the
//! write-temp → rename pattern.

mod atomic;
mod error;
mod layout;

pub use crate::{
    atomic::{read_opt, write_atomic},
    error::{StorageError, StorageResult},
    layout::CacheLayout,
};
