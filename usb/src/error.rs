use oceanoptics_types::{CoefficientKind, InitialisationStep};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transfer timed out")]
    Timeout,

    #[error("Endpoint stalled")]
    Pipe,

    #[error("Device disconnected")]
    Disconnected,

    #[error("Device sent more data than requested")]
    Overflow,

    #[error("USB error: {0}")]
    Other(String),
}

#[cfg(feature = "libusb")]
impl From<rusb::Error> for TransportError {
    fn from(error: rusb::Error) -> Self {
        match error {
            rusb::Error::Timeout => TransportError::Timeout,
            rusb::Error::Pipe => TransportError::Pipe,
            rusb::Error::NoDevice => TransportError::Disconnected,
            rusb::Error::Overflow => TransportError::Overflow,
            other => TransportError::Other(other.to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Expected {expected} bytes, received {received}")]
    Length { expected: usize, received: usize },

    #[error("Bad start marker {0:#06x}")]
    StartMarker(u16),

    #[error("Bad end marker {0:#010x}")]
    EndMarker(u32),

    #[error("Expected echo {expected:#x}, received {received:#x}")]
    EchoMismatch { expected: u32, received: u32 },

    #[error("Device reported error code {0}")]
    DeviceStatus(u16),

    #[error("Device refused the message")]
    Nack,

    #[error("Unexpected value {value:#x} for {field}")]
    Field { field: &'static str, value: u32 },

    #[error("Reply doesn't match the command sent")]
    UnexpectedReply,

    #[error("Unreadable payload: {0:?}")]
    InvalidText(String),
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid frame: {0}")]
    FrameValidation(#[from] FrameError),

    #[error("Expected sync byte 0x69, received {0:#04x}")]
    Synchronization(u8),

    #[error("Malformed response from spectrometer")]
    MalformedResponse(#[from] std::io::Error),
}

impl CommandError {
    /// Transport failures may clear up on their own, framing problems never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No OceanOptics device was found")]
    DeviceNotFound,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Command failed: {0}")]
    Command(#[from] CommandError),

    #[error("Unsupported {kind} calibration, device reported {reported}, expected {expected}")]
    CalibrationMismatch {
        kind: CoefficientKind,
        reported: i64,
        expected: &'static str,
    },

    #[error("{step} failed after {attempts} attempts: {source}")]
    InitialisationFailure {
        step: InitialisationStep,
        attempts: u32,
        source: CommandError,
    },
}

#[cfg(feature = "libusb")]
impl From<rusb::Error> for ConnectError {
    fn from(error: rusb::Error) -> Self {
        match error {
            rusb::Error::NotFound | rusb::Error::NoDevice => ConnectError::DeviceNotFound,
            other => ConnectError::Transport(other.into()),
        }
    }
}
