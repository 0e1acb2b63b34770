use enum_map::Enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumCount, EnumIter};

pub const VID_OCEANOPTICS: u16 = 0x2457;
pub const PID_USB2000_PLUS: u16 = 0x101e;
pub const PID_STS: u16 = 0x4000;

#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceModel {
    #[strum(to_string = "USB2000+")]
    Usb2000Plus,
    #[strum(to_string = "STS")]
    Sts,
}

impl DeviceModel {
    pub fn vendor_id(&self) -> u16 {
        VID_OCEANOPTICS
    }

    pub fn product_id(&self) -> u16 {
        match self {
            DeviceModel::Usb2000Plus => PID_USB2000_PLUS,
            DeviceModel::Sts => PID_STS,
        }
    }

    pub fn from_ids(vendor_id: u16, product_id: u16) -> Option<Self> {
        if vendor_id != VID_OCEANOPTICS {
            return None;
        }
        match product_id {
            PID_USB2000_PLUS => Some(DeviceModel::Usb2000Plus),
            PID_STS => Some(DeviceModel::Sts),
            _ => None,
        }
    }

    /// Number of samples the detector hands back per spectrum.
    pub fn detector_pixels(&self) -> usize {
        match self {
            DeviceModel::Usb2000Plus => 2048,
            DeviceModel::Sts => 1024,
        }
    }
}

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UsbSpeed {
    FullSpeed,
    HighSpeed,
}

impl UsbSpeed {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(UsbSpeed::FullSpeed),
            0x80 => Some(UsbSpeed::HighSpeed),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            UsbSpeed::FullSpeed => 0x00,
            UsbSpeed::HighSpeed => 0x80,
        }
    }
}

// Logical purpose of an endpoint, independent of its address on a given model.
#[derive(Copy, Clone, Debug, Display, Enum, EnumIter, PartialEq, Eq)]
pub enum EndpointRole {
    CommandOut,
    CommandIn,
    SpectrumIn,
    AuxiliaryOut,
    AuxiliaryIn,
    Interrupt,
}

/// Calibration data whose reported shape is checked while connecting.
#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoefficientKind {
    Nonlinearity,
    Saturation,
}

/// Steps a session walks through before it is handed to the caller.
#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitialisationStep {
    Unopened,
    TransportConfigured,
    SpeedDetected,
    IntegrationTimeSet,
    FirstAcquisitionVerified,
    CalibrationLoaded,
    Ready,
}

/// A calibrated spectrum, one wavelength (nm) per corrected intensity.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spectrum {
    pub wavelengths: Vec<f64>,
    pub intensities: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.wavelengths
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    pub serial_number: String,
    pub hardware_version: Option<u8>,
    pub software_version: Option<u8>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionSettings {
    /// Timeout handed to every bulk transfer.
    pub timeout: Duration,

    /// Attempts allowed at each of the retried initialisation steps.
    pub init_attempts: u32,

    /// Integration time applied during start up, the model default when unset.
    pub integration_time_us: Option<u32>,

    /// On-device averaging applied during start up (STS only).
    pub scan_averages: u16,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            init_attempts: 10,
            integration_time_us: None,
            scan_averages: 10,
        }
    }
}
