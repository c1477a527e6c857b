#![forbid(unsafe_code)]

//! # quiver
//!
//! Retrieval, local caching, and in-memory materialization of named,
//! versioned binary bundles, plus the assets inside them.
//!
//! ## Model
//!
//! A remote origin publishes bundles under a directory URL, next to a
//! line-oriented index of `name,version,checksum` rows. [`BundleLoader`]
//! reconciles a locally persisted manifest against that index, then drives
//! each requested bundle through a three-state transport machine:
//! download → disk cache → in-memory materialization. Bundle bytes are
//! fetched at most once, cached across restarts, and decoded into a
//! [`Container`] at most once.
//!
//! Asset requests against one bundle are deduplicated per
//! `(selector, result kind)`: concurrent callers join the same operation and
//! each receives its own copy of the single extraction result. The
//! re-exported [`TaskScheduler`] bounds how many wrapped load tasks run at
//! once.
//!
//! ## Collaborators
//!
//! The engine stays format-agnostic: the embedder supplies a
//! [`Materializer`] that decodes bundle bytes into a [`Container`], and may
//! swap the HTTP transport for anything implementing `quiver_net::Net`.

mod config;
mod container;
mod error;
mod index;
mod loader;
mod manifest;
mod ops;
mod record;
pub mod testing;

pub use crate::{
    config::LoaderConfig,
    container::{Asset, Container, Materializer},
    error::{LoaderError, LoaderResult},
    index::{parse_index, IndexEntry},
    loader::{BundleLoader, DefaultLoader},
    ops::{OpKey, OpOutput, OpStatus, ResultKind},
    record::TransportStatus,
};

// Scheduler surface for embedders driving the task queue directly.
pub use quiver_tasks::{LoadTask, TaskScheduler, TaskStatus};
