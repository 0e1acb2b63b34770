use crate::calibration::{saturation_factor, CalibrationCoefficients, RawSpectrum};
use crate::codec::{LegacyCodec, LegacyReply, StatusReport};
use crate::commands::{
    LegacyCommand, SLOT_NONLINEARITY, SLOT_NONLINEARITY_ORDER, SLOT_SATURATION,
    SLOT_SERIAL_NUMBER, SLOT_WAVELENGTH,
};
use crate::device::base::Transport;
use crate::error::{CommandError, ConnectError, FrameError};
use crate::protocol::{DeviceState, Link, ProtocolVariant};
use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use oceanoptics_types::{CoefficientKind, DeviceInfo, DeviceModel, UsbSpeed};
use std::ops::Range;
use std::time::Duration;

/// The first pixels are optical black, and don't carry any signal.
const DARK_PIXELS: usize = 20;

/// Slack subtracted from the integration time before waiting on a spectrum. The value is
/// arbitrary, it only has to stay a little below the USB timeout.
const ACQUISITION_HEAD_START_US: u32 = 100_000;

/// PCB thermistor scale, degrees Celsius per ADC count.
pub const DEGREES_PER_COUNT: f64 = 0.003906;

/// Order of the nonlinearity polynomial this driver knows how to read.
pub const NONLINEARITY_ORDER: i64 = 7;

// The saturation level sits at byte 6 of the raw record (echo included).
const SATURATION_OFFSET: usize = 6;

/// The USB2000+ and its single byte command set.
#[derive(Copy, Clone, Debug, Default)]
pub struct Usb2000Plus;

impl Usb2000Plus {
    pub fn query_status<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<StatusReport, CommandError> {
        match link.execute(LegacyCommand::QueryStatus)?.into_reply() {
            LegacyReply::Status(status) => Ok(status),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    /// Reads an information slot as text, up to the first NUL.
    pub fn query_information<T: Transport>(
        link: &mut Link<Self, T>,
        slot: u8,
    ) -> Result<String, CommandError> {
        match link
            .execute(LegacyCommand::QueryInformation(slot))?
            .into_reply()
        {
            LegacyReply::Information(text) => Ok(text),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    pub fn read_register<T: Transport>(
        link: &mut Link<Self, T>,
        address: u8,
    ) -> Result<i16, CommandError> {
        match link.execute(LegacyCommand::ReadRegister(address))?.into_reply() {
            LegacyReply::Register(value) => Ok(value),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    fn query_number<T: Transport>(link: &mut Link<Self, T>, slot: u8) -> Result<f64, CommandError> {
        let text = Self::query_information(link, slot)?;
        text.trim()
            .parse()
            .map_err(|_| FrameError::InvalidText(text).into())
    }

    fn read_saturation_level<T: Transport>(link: &mut Link<Self, T>) -> Result<i16, CommandError> {
        let response = link.execute(LegacyCommand::QueryInformation(SLOT_SATURATION))?;
        let record = response.raw();
        if record.len() < SATURATION_OFFSET + 2 {
            return Err(FrameError::Length {
                expected: SATURATION_OFFSET + 2,
                received: record.len(),
            }
            .into());
        }
        Ok(LittleEndian::read_i16(
            &record[SATURATION_OFFSET..SATURATION_OFFSET + 2],
        ))
    }
}

impl ProtocolVariant for Usb2000Plus {
    type Codec = LegacyCodec;

    const MODEL: DeviceModel = DeviceModel::Usb2000Plus;
    const DEFAULT_INTEGRATION_TIME_US: u32 = 1000;

    fn codec() -> LegacyCodec {
        LegacyCodec::default()
    }

    fn pixel_range() -> Range<usize> {
        DARK_PIXELS..Self::MODEL.detector_pixels()
    }

    fn prepare<T: Transport>(link: &mut Link<Self, T>) -> Result<(), CommandError> {
        link.execute(LegacyCommand::Initialise)?;
        Ok(())
    }

    fn detect_speed<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<Option<UsbSpeed>, CommandError> {
        let status = Self::query_status(link)?;
        debug!("Device reports {:?}", status.usb_speed);
        link.codec_mut().set_usb_speed(status.usb_speed);
        Ok(Some(status.usb_speed))
    }

    fn write_integration_time<T: Transport>(
        link: &mut Link<Self, T>,
        time_us: u32,
    ) -> Result<u32, CommandError> {
        link.execute(LegacyCommand::SetIntegrationTime(time_us))?;
        let reported = Self::query_status(link)?.integration_time_us;
        if reported != time_us {
            debug!("Requested {}us integration, device runs {}us", time_us, reported);
        }
        Ok(reported)
    }

    fn acquisition_delay(state: &DeviceState) -> Duration {
        let remaining = state
            .integration_time_us
            .saturating_sub(ACQUISITION_HEAD_START_US);
        Duration::from_micros(remaining as u64)
    }

    fn read_raw_spectrum<T: Transport>(
        link: &mut Link<Self, T>,
        delay: Duration,
    ) -> Result<RawSpectrum, CommandError> {
        match link
            .execute_paced(LegacyCommand::RequestSpectrum, delay)?
            .into_reply()
        {
            LegacyReply::Spectrum(samples) => Ok(RawSpectrum::from_signed(&samples)),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }

    fn load_calibration<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<CalibrationCoefficients, ConnectError> {
        let mut wavelength = [0.0; 4];
        for (slot, coefficient) in (SLOT_WAVELENGTH..).zip(wavelength.iter_mut()) {
            *coefficient = Self::query_number(link, slot)?;
        }

        let order_text = Self::query_information(link, SLOT_NONLINEARITY_ORDER)?;
        let order: i64 = order_text
            .trim()
            .parse()
            .map_err(|_| CommandError::from(FrameError::InvalidText(order_text.clone())))?;
        if order != NONLINEARITY_ORDER {
            return Err(ConnectError::CalibrationMismatch {
                kind: CoefficientKind::Nonlinearity,
                reported: order,
                expected: "7",
            });
        }

        let mut nonlinearity = Vec::with_capacity(order as usize + 1);
        for slot in SLOT_NONLINEARITY..=SLOT_NONLINEARITY + order as u8 {
            nonlinearity.push(Self::query_number(link, slot)?);
        }

        let level = Self::read_saturation_level(link)?;
        let factor = saturation_factor(level).ok_or(ConnectError::CalibrationMismatch {
            kind: CoefficientKind::Saturation,
            reported: level as i64,
            expected: "a positive level",
        })?;
        debug!("Saturation level {}, scaling by {}", level, factor);

        Ok(CalibrationCoefficients {
            wavelength,
            nonlinearity,
            stray_light: Vec::new(),
            saturation_factor: Some(factor),
        })
    }

    fn read_device_info<T: Transport>(
        link: &mut Link<Self, T>,
    ) -> Result<DeviceInfo, CommandError> {
        Ok(DeviceInfo {
            serial_number: Self::query_information(link, SLOT_SERIAL_NUMBER)?,
            hardware_version: None,
            software_version: None,
        })
    }

    fn read_temperature<T: Transport>(link: &mut Link<Self, T>) -> Result<f64, CommandError> {
        match link.execute(LegacyCommand::ReadPcbTemperature)?.into_reply() {
            LegacyReply::PcbTemperature(adc) => Ok(adc as f64 * DEGREES_PER_COUNT),
            _ => Err(FrameError::UnexpectedReply.into()),
        }
    }
}
