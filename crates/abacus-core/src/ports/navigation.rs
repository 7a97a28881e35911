//! Navigation port (driven/secondary port)
//!
//! The session controller never renders anything. When an attempt ends it
//! asks the shell to move the student elsewhere through [`INavigator`].

use serde::{Deserialize, Serialize};

use crate::domain::SessionId;

/// Where the student should be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Results page of a submitted attempt
    Results(SessionId),
    /// Student dashboard (attempt ended without a result to show)
    Dashboard,
}

#[async_trait::async_trait]
pub trait INavigator: Send + Sync {
    async fn navigate(&self, destination: Destination) -> anyhow::Result<()>;
}
