//! Multi-step security setup state.

use super::SecurityFeature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    /// Waiting for on/off.
    Enable,
    /// Waiting for the violation action.
    Action,
}

/// An in-progress setup conversation for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSetup {
    pub chat_id: String,
    pub feature: SecurityFeature,
    pub step: SetupStep,
}

impl PendingSetup {
    pub fn new(chat_id: impl Into<String>, feature: SecurityFeature) -> Self {
        Self {
            chat_id: chat_id.into(),
            feature,
            step: SetupStep::Enable,
        }
    }
}
