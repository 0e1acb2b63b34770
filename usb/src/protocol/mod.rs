//! The parts of bringing up and talking to a spectrometer which differ between models. A
//! session is generic over one of these, and everything model specific lives behind it.

use crate::calibration::{CalibrationCoefficients, RawSpectrum};
use crate::codec::Codec;
use crate::device::base::Transport;
use crate::dispatcher::Dispatcher;
use crate::error::{CommandError, ConnectError};
use oceanoptics_types::{DeviceInfo, DeviceModel, UsbSpeed};
use std::ops::Range;
use std::time::Duration;

pub mod sts;
pub mod usb2000;

pub use sts::Sts;
pub use usb2000::Usb2000Plus;

/// A dispatcher speaking the variant's wire format.
pub type Link<P, T> = Dispatcher<T, <P as ProtocolVariant>::Codec>;

/// Settings the device is known to be running with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceState {
    pub integration_time_us: u32,

    /// Always 0 on models without on-device averaging.
    pub scan_averages: u16,

    /// Only reported by the USB2000+.
    pub usb_speed: Option<UsbSpeed>,
}

pub trait ProtocolVariant: Sized {
    type Codec: Codec;

    const MODEL: DeviceModel;
    const DEFAULT_INTEGRATION_TIME_US: u32;

    fn codec() -> Self::Codec;

    /// Detector pixels which carry real signal, anything outside is dropped from a spectrum.
    fn pixel_range() -> Range<usize>;

    /// Puts the device in a known state right after the transport has been configured.
    fn prepare<T: Transport>(link: &mut Link<Self, T>) -> Result<(), CommandError>;

    fn detect_speed<T: Transport>(
        _link: &mut Link<Self, T>,
    ) -> Result<Option<UsbSpeed>, CommandError> {
        Ok(None)
    }

    /// Returns the integration time the device is running with after the change.
    fn write_integration_time<T: Transport>(
        link: &mut Link<Self, T>,
        time_us: u32,
    ) -> Result<u32, CommandError>;

    /// Returns the averaging now in effect, 0 if the model can't average.
    fn write_scan_averages<T: Transport>(
        _link: &mut Link<Self, T>,
        _averages: u16,
    ) -> Result<u16, CommandError> {
        Ok(0)
    }

    /// How long an acquisition takes before the device has data to hand over.
    fn acquisition_delay(state: &DeviceState) -> Duration;

    fn read_raw_spectrum<T: Transport>(
        link: &mut Link<Self, T>,
        delay: Duration,
    ) -> Result<RawSpectrum, CommandError>;

    fn load_calibration<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<CalibrationCoefficients, ConnectError>;

    fn read_device_info<T: Transport>(link: &mut Link<Self, T>)
        -> Result<DeviceInfo, CommandError>;

    /// Temperature in degrees Celsius.
    fn read_temperature<T: Transport>(link: &mut Link<Self, T>) -> Result<f64, CommandError>;
}
