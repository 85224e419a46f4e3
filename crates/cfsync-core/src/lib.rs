//! cfsync Core - Domain types, configuration and port definitions
//!
//! This crate holds everything the synchronization engine and its adapters
//! agree on:
//! - **Configuration** - YAML-backed [`config::Config`] with validation and a builder
//! - **Domain types** - [`domain::RelativeName`], [`domain::LocalEntry`],
//!   [`domain::RemoteEntry`] and the work items exchanged through the queues
//! - **Port definitions** - [`ports::ObjectStore`] and [`ports::IdentityProvider`],
//!   implemented by `cfsync-swift` and by in-memory fakes in tests
//!
//! # Architecture
//!
//! The domain module is pure data with no I/O. Ports are async traits whose
//! implementations live in adapter crates, so the engine can be exercised
//! without a network.

pub mod config;
pub mod domain;
pub mod ports;
