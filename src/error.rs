//! Error types for spidev operations

use std::io;
use thiserror::Error;

/// Every failure the tool can hit once arguments are resolved.
///
/// The display text names the step that failed. The OS error is only reachable
/// through `source()`, so printing the chain with `{:#}` shows it once.
#[derive(Debug, Error)]
pub enum SpiTestError {
    #[error("can't open device {path}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("can't set spi mode")]
    SetMode(#[source] io::Error),

    #[error("can't get spi mode")]
    GetMode(#[source] io::Error),

    #[error("can't set bits per word")]
    SetBitsPerWord(#[source] io::Error),

    #[error("can't get bits per word")]
    GetBitsPerWord(#[source] io::Error),

    #[error("can't set max speed hz")]
    SetMaxSpeed(#[source] io::Error),

    #[error("can't get max speed hz")]
    GetMaxSpeed(#[source] io::Error),

    #[error("can't send spi message")]
    Transfer(#[source] io::Error),

    /// The driver accepted the message but moved fewer bytes than asked.
    #[error("can't send spi message: transferred {actual} of {expected} bytes")]
    ShortTransfer { expected: usize, actual: usize },

    #[error("can't send spi message: no data to send (use -X)")]
    EmptyPayload,
}

impl SpiTestError {
    /// Short name of the step that failed, used in log lines.
    pub fn step(&self) -> &'static str {
        match self {
            SpiTestError::Open { .. } => "open",
            SpiTestError::SetMode(_) => "set mode",
            SpiTestError::GetMode(_) => "get mode",
            SpiTestError::SetBitsPerWord(_) => "set bits per word",
            SpiTestError::GetBitsPerWord(_) => "get bits per word",
            SpiTestError::SetMaxSpeed(_) => "set max speed",
            SpiTestError::GetMaxSpeed(_) => "get max speed",
            SpiTestError::Transfer(_)
            | SpiTestError::ShortTransfer { .. }
            | SpiTestError::EmptyPayload => "transfer",
        }
    }
}

pub type Result<T> = std::result::Result<T, SpiTestError>;
