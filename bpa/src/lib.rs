//! The bundle storage-and-forward cache and flow engine: memory pool,
//! routing table, flows/subqueues, custody acknowledgement tracking, and
//! the cache that ties them together behind a maintenance loop.
//!
//! Convergence-layer adapters, the application socket API, on-disk
//! storage backends, and the red-black tree / timer-wheel / mutex
//! primitives this engine is specified against are external
//! collaborators — see the crate [README](../README.md).

pub mod cache;
pub mod config;
pub mod custody;
pub mod error;
pub mod flow;
pub mod pool;
pub mod router;

pub use cache::Cache;
pub use config::{Config, CustodyWrapPolicy};
pub use error::{Diagnostics, Error};
pub use flow::{Deadline, EventKind, Flow, StateFlags};
pub use pool::{BlockId, BlockTag, BundleStore, MemStore, Pool};
pub use router::Router;
