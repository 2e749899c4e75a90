use std::{error::Error, fmt};

use thiserror::Error as ThisError;

const ERR_MSG_QUEUE_FULL: &str = "event queue is full";
const ERR_MSG_TRANSPORT_CLOSED: &str = "event transport is closed";
const ERR_MSG_TIMEOUT: &str = "operation timed out";
const ERR_MSG_CANCELLED: &str = "operation cancelled";

/// Why a send into a resource queue failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SendFailReason {
    Timeout,
    Cancelled,
    Full,
    Closed,
}

impl fmt::Display for SendFailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendFailReason::Timeout => write!(f, "{ERR_MSG_TIMEOUT}"),
            SendFailReason::Cancelled => write!(f, "{ERR_MSG_CANCELLED}"),
            SendFailReason::Full => write!(f, "{ERR_MSG_QUEUE_FULL}"),
            SendFailReason::Closed => write!(f, "{ERR_MSG_TRANSPORT_CLOSED}"),
        }
    }
}

/// Send failure carrying the undelivered value back to the caller.
#[derive(Debug)]
pub struct SendError<T> {
    pub value: Option<T>,
    pub reason: SendFailReason,
}

impl<T> SendError<T> {
    pub fn full(value: Option<T>) -> Self {
        Self {
            value,
            reason: SendFailReason::Full,
        }
    }

    pub fn closed(value: Option<T>) -> Self {
        Self {
            value,
            reason: SendFailReason::Closed,
        }
    }

    pub fn cancelled(value: Option<T>) -> Self {
        Self {
            value,
            reason: SendFailReason::Cancelled,
        }
    }

    pub fn timeout(value: Option<T>) -> Self {
        Self {
            value,
            reason: SendFailReason::Timeout,
        }
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl<T: fmt::Debug> Error for SendError<T> {}

#[derive(Debug)]
pub enum TryRecvError {
    Empty,
    Disconnected,
}

#[derive(Debug)]
pub enum RecvError {
    Timeout,
    Disconnected,
    Cancelled,
}

impl Error for RecvError {}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvError::Timeout => write!(f, "{ERR_MSG_TIMEOUT}"),
            RecvError::Disconnected => write!(f, "{ERR_MSG_TRANSPORT_CLOSED}"),
            RecvError::Cancelled => write!(f, "{ERR_MSG_CANCELLED}"),
        }
    }
}

/// Build-time interface errors. A builder that reports one of these never
/// produces a live [`crate::spec::PortSpec`].
#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum SpecError {
    #[error("interface exceeds the per-type port capacity ceiling")]
    Capacity,
    #[error("invalid port or binding declaration")]
    InvalidDeclaration,
}

/// Wiring errors, reported while a network is being assembled.
#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("unknown resource index {0}")]
    UnknownResource(usize),
    #[error("unknown block index {0}")]
    UnknownBlock(usize),
    #[error("unknown port `{0}`")]
    UnknownPort(String),
    #[error("data connection type mismatch on `{port}`")]
    TypeMismatch { port: String },
    #[error("data connections may not cross resource boundaries")]
    CrossResourceData,
    #[error("network is running; wiring is only permitted while stopped")]
    NetworkRunning,
}

/// Lifecycle errors surfaced to the device-level caller.
#[derive(Debug, ThisError)]
pub enum LifecycleError {
    #[error("a device instance is already running in this process")]
    AlreadyRunning,
    #[error("device has not been started")]
    NotStarted,
    #[error("resource {0} did not join within the shutdown deadline")]
    JoinTimeout(usize),
    #[error("failed to spawn resource thread: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// A runaway event chain hit the configured bound. Only the offending chain
/// is dropped; the resource keeps operating.
#[derive(Debug, Clone, Eq, PartialEq, ThisError)]
#[error("event chain exceeded {max} queued deliveries")]
pub struct ChainOverflow {
    pub max: usize,
}
