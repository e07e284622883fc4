use crate::connection::RetryPolicy;
use crate::protocol::Telegram;
use std::time::Duration;

/// Reasons a received frame is rejected as corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("telegram has no domain byte - received={0:02X}")]
    Domain(u8),
    #[error("invalid checksum - calculated={calculated:02X} received={received:02X}")]
    CheckSum { calculated: u8, received: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fewer bytes than one telegram are buffered, try again later.
    #[error("not enough bytes for a telegram - available={available} required={required}")]
    InsufficientData { available: usize, required: usize },
    #[error("malformed telegram: {0}")]
    MalformedFrame(#[from] FrameError),
    /// A valid telegram exchanged between other bus members.
    #[error("ignoring telegram not for us: {0}")]
    WrongRecipient(Telegram),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot merge composite value - high={high:02X} low={low:02X}")]
    CompositeDecode { high: u8, low: u8 },
    #[error("not connected")]
    NotConnected,
    #[error("Value out of range")]
    RangeError,
    #[error("scheduler is shut down")]
    SchedulerShutdown,
}

impl Error {
    /// How long the receive loop pauses before the next attempt after this error.
    ///
    /// `None` means retry immediately.
    pub fn retry_delay(&self, policy: &RetryPolicy) -> Option<Duration> {
        match self {
            Error::InsufficientData { .. } => Some(policy.insufficient_data),
            Error::Io(_) | Error::NotConnected => Some(policy.transport_error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_by_kind() {
        let policy = RetryPolicy::default();
        let insufficient = Error::InsufficientData {
            available: 3,
            required: 6,
        };
        assert_eq!(
            insufficient.retry_delay(&policy),
            Some(Duration::from_millis(200))
        );

        let io = Error::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert_eq!(io.retry_delay(&policy), Some(Duration::from_millis(2000)));

        let malformed = Error::from(FrameError::Domain(0x42));
        assert_eq!(malformed.retry_delay(&policy), None);

        let wrong = Error::WrongRecipient(Telegram::new(0x11, 0x30, 0x29, 0x01));
        assert_eq!(wrong.retry_delay(&policy), None);
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            FrameError::CheckSum {
                calculated: 0x5A,
                received: 0x5B
            }
            .to_string(),
            "invalid checksum - calculated=5A received=5B"
        );
        assert_eq!(
            Error::from(FrameError::Domain(0x7)).to_string(),
            "malformed telegram: telegram has no domain byte - received=07"
        );
    }
}
