//! Error taxonomy for mqguard.
//!
//! Configuration errors are fatal at startup. Payload errors never reach this
//! type at all — they become active alarms with a message, handled entirely
//! inside `crate::alarms`. Transport errors are confined to the task that hit
//! them (an MQTT client reconnects on its own; a session simply closes).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MqguardError>;

#[derive(Error, Debug)]
pub enum MqguardError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MqguardError {
    pub fn config(message: impl Into<String>) -> Self {
        MqguardError::Config(message.into())
    }
}
