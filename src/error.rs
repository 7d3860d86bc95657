use thiserror::Error;

use crate::scenario::HandshakeState;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no signal named '{0}'")]
    UnknownSignal(String),
    #[error("port '{0}' declared twice")]
    DuplicatePort(String),
    #[error("width {0} not supported (1..=256 bits)")]
    UnsupportedWidth(u32),
    #[error("value needs {needed} bits but '{signal}' is {width} bits wide")]
    WidthMismatch {
        signal: String,
        width: u32,
        needed: u32,
    },
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
    #[error("'{0}' is driven by the device under test")]
    DrivenByDut(String),
    #[error("write to '{0}' during the read-only phase")]
    WriteInReadOnly(String),
    #[error("unknown time unit '{0}'")]
    UnknownTimeUnit(String),
    #[error("can't convert {time} {unit} to sim steps without rounding (precision 1e{precision})")]
    TimeRounding {
        time: u64,
        unit: String,
        precision: i8,
    },
    #[error("task was cancelled")]
    Cancelled,
    #[error("deadline reached at step {0} before the test finished")]
    DeadlineExceeded(u64),
    #[error("simulation stalled at step {0}: no pending events")]
    Stalled(u64),
    #[error("handshake can't go from {from:?} to {to:?}")]
    InvalidTransition {
        from: HandshakeState,
        to: HandshakeState,
    },
    #[error("stimulus already armed")]
    AlreadyArmed,
    #[error("stimulus not armed")]
    NotArmed,
    #[error("{0} operand must be non-zero")]
    ZeroOperand(&'static str),
    #[error("report: {0}")]
    Report(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
