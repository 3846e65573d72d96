use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient memory: {requested} bytes needs {needed} pages, {available} free")]
    AdmissionRejected {
        requested: usize,
        needed: usize,
        available: usize,
    },

    #[error("Channel {channel} unavailable: {reason}")]
    Channel { channel: String, reason: String },

    #[error("Malformed job record: {0}")]
    MalformedRecord(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedError {
    pub fn channel(channel: impl Into<String>, reason: impl ToString) -> Self {
        SchedError::Channel {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedError>;
