use std::error;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub(crate) fn shared_buffer() -> Self {
        Self {
            kind: ErrorKind::SharedBuffer,
            msg: "mbuf is not exclusively owned".into(),
        }
    }

    pub(crate) fn insufficient_buffer<S: Into<String>>(msg: S) -> Self {
        Self {
            kind: ErrorKind::InsufficientBuffer,
            msg: msg.into(),
        }
    }

    pub(crate) fn unknown_payload() -> Self {
        Self {
            kind: ErrorKind::UnknownPayload,
            msg: "payload is neither ipv4 nor ipv6".into(),
        }
    }

    pub(crate) fn config_err<S: Into<String>>(msg: S) -> Self {
        Self {
            kind: ErrorKind::ConfigError,
            msg: msg.into(),
        }
    }

    pub(crate) fn service_err<S: Into<String>>(msg: S) -> Self {
        Self {
            kind: ErrorKind::ServiceError,
            msg: msg.into(),
        }
    }

    pub(crate) fn to_err<T>(self) -> Result<T> {
        Err(self)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::SharedBuffer => write!(f, "Shared buffer: {}.", self.msg),
            ErrorKind::InsufficientBuffer => write!(f, "Insufficient buffer: {}.", self.msg),
            ErrorKind::UnknownPayload => write!(f, "Unknown payload: {}.", self.msg),
            ErrorKind::ConfigError => write!(f, "Configuration error: {}.", self.msg),
            ErrorKind::ServiceError => write!(f, "Forwarding service error: {}.", self.msg),
        }
    }
}

impl error::Error for Error {}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// The mbuf is shared, indirect or segmented and must not be written in place.
    SharedBuffer,
    /// Not enough data or headroom to add or remove the shim header.
    InsufficientBuffer,
    /// The payload behind the shim is not recognizable ip.
    UnknownPayload,
    /// Malformed or out-of-range configuration.
    ConfigError,
    /// Queue, thread or launch failure.
    ServiceError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kind() {
        let e = Error::config_err("invalid core list '2,,3'");
        assert_eq!(e.kind(), ErrorKind::ConfigError);
        assert_eq!(e.to_string(), "Configuration error: invalid core list '2,,3'.");

        let e = Error::shared_buffer();
        assert_eq!(e.kind(), ErrorKind::SharedBuffer);
        assert!(e.to_string().starts_with("Shared buffer"));
    }
}
