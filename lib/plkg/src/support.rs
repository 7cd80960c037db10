use std::fmt;
use std::io;

pub type PlkgResult<T> = Result<T, PlkgError>;

/// Pipeline-wide error plumbing. `Timeout` marks a missed deadline on a
/// public-channel wait and is recoverable by the surrounding stage; `Fatal`
/// surfaces to the session orchestrator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PlkgError {
    Timeout,
    Fatal(ErrorKind),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ErrorKind {
    SerialUnavailable(io::ErrorKind),
    MalformedFrame,
    InsufficientData,
    NoValidSubcarriers,
    InsufficientProfile,
    DecryptionFailure,
    ChannelClosed,
}

impl From<io::Error> for PlkgError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => PlkgError::Timeout,
            kind => PlkgError::Fatal(ErrorKind::SerialUnavailable(kind)),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::SerialUnavailable(kind) => write!(f, "serial unavailable ({:?})", kind),
            ErrorKind::MalformedFrame => write!(f, "malformed frame"),
            ErrorKind::InsufficientData => write!(f, "insufficient data"),
            ErrorKind::NoValidSubcarriers => write!(f, "no valid subcarriers"),
            ErrorKind::InsufficientProfile => write!(f, "insufficient profile"),
            ErrorKind::DecryptionFailure => write!(f, "decryption failure"),
            ErrorKind::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

/// The three parties of a key generation session.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Role {
    Initiator,
    Responder,
    Eavesdropper,
}

impl Role {
    /// Short name used in logs and report rows.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
            Role::Eavesdropper => "eavesdropper",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_folding() {
        let timeout: PlkgError = io::Error::from(io::ErrorKind::TimedOut).into();
        assert_eq!(timeout, PlkgError::Timeout);

        let lost: PlkgError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert_eq!(
            lost,
            PlkgError::Fatal(ErrorKind::SerialUnavailable(io::ErrorKind::BrokenPipe))
        );
    }
}
