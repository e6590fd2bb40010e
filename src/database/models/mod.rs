//! Data models.

mod bot;
mod chat;
mod device;
mod setup;

pub use bot::{BotSettings, Toggle};
pub use chat::{ChatSettings, Mode, SecurityFeature, ViolationAction};
pub use device::DeviceRecord;
pub use setup::{PendingSetup, SetupStep};
