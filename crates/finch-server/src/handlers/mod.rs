//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audit;
pub mod devices;
pub mod finance;
pub mod health;
pub mod notifications;
pub mod preferences;
pub mod sweeps;

// Re-export all handlers for use in router
pub use audit::*;
pub use devices::*;
pub use finance::*;
pub use health::*;
pub use notifications::*;
pub use preferences::*;
pub use sweeps::*;

use serde::Serialize;

use finch_core::models::Notification;
use finch_core::{FilterReason, Outcome};

/// Result of running a trigger through the engine
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FilterReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl From<Outcome> for ProcessResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Created(n) => Self {
                created: true,
                reason: None,
                notification: Some(*n),
            },
            Outcome::Filtered(reason) => Self {
                created: false,
                reason: Some(reason),
                notification: None,
            },
        }
    }
}
