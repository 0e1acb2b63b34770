use crate::calibration::{CalibrationCoefficients, RawSpectrum};
use crate::codec::{FramedCodec, FramedReply};
use crate::commands::{CoefficientTable, FramedCommand};
use crate::device::base::sts::COMMAND_IN;
use crate::device::base::Transport;
use crate::error::{CommandError, ConnectError, FrameError};
use crate::protocol::{DeviceState, Link, ProtocolVariant};
use log::debug;
use oceanoptics_types::{CoefficientKind, DeviceInfo, DeviceModel};
use std::ops::Range;
use std::time::Duration;

/// Number of nonlinearity coefficients this driver knows how to apply.
pub const NONLINEARITY_COEFFICIENTS: u8 = 8;

// Readout overhead added to every scan, on top of the integration time.
const SCAN_OVERHEAD_US: u64 = 100_000;

/// The STS and its framed message protocol.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sts;

impl Sts {
    fn request<T: Transport>(
        link: &mut Link<Self, T>,
        command: FramedCommand,
    ) -> Result<FramedReply, CommandError> {
        Ok(link.execute(command)?.into_reply())
    }

    fn request_byte<T: Transport>(
        link: &mut Link<Self, T>,
        command: FramedCommand,
    ) -> Result<u8, CommandError> {
        match Self::request(link, command)? {
            FramedReply::Byte(value) => Ok(value),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    fn request_text<T: Transport>(
        link: &mut Link<Self, T>,
        command: FramedCommand,
    ) -> Result<String, CommandError> {
        match Self::request(link, command)? {
            FramedReply::Text(text) => Ok(text),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    fn read_coefficients<T: Transport>(
        link: &mut Link<Self, T>,
        table: CoefficientTable,
        count: u8,
    ) -> Result<Vec<f64>, CommandError> {
        debug!("Reading {} {} coefficients", count, table);
        (0..count)
            .map(|index| -> Result<f64, CommandError> {
                let command = FramedCommand::GetCoefficient(table, index);
                match Self::request(link, command)? {
                    FramedReply::Float(value) => Ok(value as f64),
                    _ => Err(FrameError::UnexpectedReply.into()),
                }
            })
            .collect()
    }

    /// Detector and controller board temperatures, in that order.
    pub fn read_temperatures<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<Vec<f64>, CommandError> {
        match Self::request(link, FramedCommand::GetAllTemperatures)? {
            FramedReply::Floats(values) => Ok(values.into_iter().map(f64::from).collect()),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    pub fn read_irradiance_calibration<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<Vec<f32>, CommandError> {
        match Self::request(link, FramedCommand::GetIrradianceCalibration)? {
            FramedReply::Irradiance(values) => Ok(values),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }
}

impl ProtocolVariant for Sts {
    type Codec = FramedCodec;

    const MODEL: DeviceModel = DeviceModel::Sts;
    const DEFAULT_INTEGRATION_TIME_US: u32 = 10_000;

    fn codec() -> FramedCodec {
        FramedCodec::new()
    }

    fn pixel_range() -> Range<usize> {
        0..Self::MODEL.detector_pixels()
    }

    // Replies left over from an earlier session would otherwise be read as ours.
    fn prepare<T: Transport>(link: &mut Link<Self, T>) -> Result<(), CommandError> {
        link.drain(COMMAND_IN.address, COMMAND_IN.max_transfer);
        Ok(())
    }

    fn write_integration_time<T: Transport>(
        link: &mut Link<Self, T>,
        time_us: u32,
    ) -> Result<u32, CommandError> {
        link.execute(FramedCommand::SetIntegrationTime(time_us))?;
        Ok(time_us)
    }

    fn write_scan_averages<T: Transport>(
        link: &mut Link<Self, T>,
        averages: u16,
    ) -> Result<u16, CommandError> {
        link.execute(FramedCommand::SetScanAverages(averages))?;
        Ok(averages)
    }

    fn acquisition_delay(state: &DeviceState) -> Duration {
        let per_scan = state.integration_time_us as u64 + SCAN_OVERHEAD_US;
        Duration::from_micros(per_scan * state.scan_averages as u64)
    }

    fn read_raw_spectrum<T: Transport>(
        link: &mut Link<Self, T>,
        delay: Duration,
    ) -> Result<RawSpectrum, CommandError> {
        match link
            .execute_paced(FramedCommand::GetCorrectedSpectrum, delay)?
            .into_reply()
        {
            FramedReply::Spectrum(samples) => Ok(RawSpectrum::from_unsigned(&samples)),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    fn load_calibration<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<CalibrationCoefficients, ConnectError> {
        let mut wavelength = [0.0; 4];
        let values = Self::read_coefficients(link, CoefficientTable::Wavelength, 4)?;
        wavelength.copy_from_slice(&values);

        let count = Self::request_byte(
            link,
            FramedCommand::GetCoefficientCount(CoefficientTable::Nonlinearity),
        )?;
        if count != NONLINEARITY_COEFFICIENTS {
            return Err(ConnectError::CalibrationMismatch {
                kind: CoefficientKind::Nonlinearity,
                reported: count as i64,
                expected: "8",
            });
        }
        let nonlinearity = Self::read_coefficients(link, CoefficientTable::Nonlinearity, count)?;

        let count = Self::request_byte(
            link,
            FramedCommand::GetCoefficientCount(CoefficientTable::StrayLight),
        )?;
        let stray_light = Self::read_coefficients(link, CoefficientTable::StrayLight, count)?;

        Ok(CalibrationCoefficients {
            wavelength,
            nonlinearity,
            stray_light,
            saturation_factor: None,
        })
    }

    fn read_device_info<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<DeviceInfo, CommandError> {
        let hardware_version = Self::request_byte(link, FramedCommand::GetHardwareVersion)?;
        let software_version = Self::request_byte(link, FramedCommand::GetSoftwareVersion)?;

        let length = Self::request_byte(link, FramedCommand::GetSerialNumberLength)? as usize;
        let mut serial_number = Self::request_text(link, FramedCommand::GetSerialNumber)?;
        if length > 0 && serial_number.is_char_boundary(length) {
            serial_number.truncate(length);
        }

        Ok(DeviceInfo {
            serial_number,
            hardware_version: Some(hardware_version),
            software_version: Some(software_version),
        })
    }

    fn read_temperature<T: Transport>(link: &mut Link<Self, T>) -> Result<f64, CommandError> {
        Self::read_temperatures(link)?
            .first()
            .copied()
            .ok_or_else(|| {
                FrameError::Field {
                    field: "temperature count",
                    value: 0,
                }
                .into()
            })
    }
}
