//! Healthbridge Core - Domain types, configuration and ports
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `HealthConnection`, `DailyMetricSnapshot`, `Capabilities`,
//!   `ProviderDescriptor`, `SyncResult`
//! - **Port definitions** - Traits for adapters: `IMetricsStore`, `ITaskScheduler`,
//!   `IIdentityProvider`, and the raw native health module surfaces behind
//!   `INativeModuleLoader`
//! - **Configuration** - YAML-backed typed settings with validation
//!
//! # Architecture
//!
//! The domain module contains pure data and invariants with no I/O.
//! Ports define trait interfaces that adapter crates implement: the bridge
//! crate consumes the native module ports, the cache crate implements the
//! metrics store, and the sync crate drives everything through them.

pub mod config;
pub mod domain;
pub mod ports;
