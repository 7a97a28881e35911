//! Abacus Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core of the test-taking
//! client:
//! - **Domain entities** - `TestDefinition`, `TestSession`, `PendingAnswer`
//! - **Port definitions** - Traits for adapters: `IExamApi`, `ISessionStore`,
//!   `INotificationService`, `INavigator`, `IReachability`
//! - **State machine** - Test session lifecycle (`SessionStatus`)
//! - **Configuration** - YAML-backed `Config`
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`abacus-cache` for durable storage, `abacus-api` for the REST API).
//! The session controller in `abacus-session` orchestrates domain entities
//! through these ports.

pub mod config;
pub mod domain;
pub mod ports;
