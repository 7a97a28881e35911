//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the session logic depends on, but whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IExamApi`] - Remote test-taking API (HTTP in `abacus-api`)
//! - [`IReachability`] - Cheap reachability probe feeding connectivity
//! - [`ISessionStore`] - Durable per-session state (`abacus-cache`)
//! - [`INotificationService`] - User-facing toasts
//! - [`INavigator`] - Leaving the test screen

pub mod exam_api;
pub mod navigation;
pub mod notification;
pub mod session_store;

pub use exam_api::{
    IExamApi, IReachability, RemainingDuration, RemoteAnswer, RemoteError, RemoteSessionStatus,
};
pub use navigation::{Destination, INavigator};
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use session_store::{ISessionStore, StorageError};
