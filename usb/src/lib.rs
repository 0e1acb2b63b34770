#[cfg(feature = "libusb")]
pub use rusb;

pub mod calibration;
pub mod codec;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod session;

mod device;

pub use device::base::{Direction, Endpoint, EndpointSet, TransferKind, Transport};
#[cfg(feature = "libusb")]
pub use device::{find_devices, RusbTransport};

pub use calibration::{CalibrationCoefficients, RawSpectrum};
pub use error::{CommandError, ConnectError, FrameError, TransportError};
pub use protocol::{DeviceState, ProtocolVariant, Sts, Usb2000Plus};
pub use session::{SpectrometerSession, StsSession, Usb2000PlusSession};

/// Endpoint layouts per model, for transports which aren't backed by libusb.
pub mod endpoints {
    pub use crate::device::base::{sts, usb2000};
}
