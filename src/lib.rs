pub mod config;
pub mod error;
pub mod relay;

pub use error::RelayError;
pub use relay::types::{InboundMessage, MessageFormat, OutboundMessage};
pub use relay::{MessageReceived, Relay, RelayHandle, RelayTasks};
