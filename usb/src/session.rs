use crate::calibration::{CalibrationCoefficients, RawSpectrum};
use crate::codec::StatusReport;
use crate::device::base::{EndpointSet, Transport};
use crate::dispatcher::Dispatcher;
use crate::error::{CommandError, ConnectError};
use crate::protocol::{DeviceState, Link, ProtocolVariant, Sts, Usb2000Plus};
use crate::retry::{self, RetryError};
use log::{debug, info};
use oceanoptics_types::{
    DeviceInfo, DeviceModel, InitialisationStep, SessionSettings, Spectrum,
};
use std::marker::PhantomData;

pub type Usb2000PlusSession<T> = SpectrometerSession<Usb2000Plus, T>;
pub type StsSession<T> = SpectrometerSession<Sts, T>;

/// An initialised spectrometer. Holding one means the device answered every start up step,
/// and its calibration has been read.
pub struct SpectrometerSession<P: ProtocolVariant, T: Transport> {
    link: Link<P, T>,
    endpoints: EndpointSet,
    state: DeviceState,
    calibration: CalibrationCoefficients,
    info: DeviceInfo,
    _protocol: PhantomData<P>,
}

struct StepTracker {
    model: DeviceModel,
    step: InitialisationStep,
}

impl StepTracker {
    fn advance(&mut self, next: InitialisationStep) {
        debug!("{}: {} -> {}", self.model, self.step, next);
        self.step = next;
    }
}

// Runs one of the start up steps which are allowed to fail a few times, usually while the
// device is still settling after enumeration.
fn retried<R>(
    step: InitialisationStep,
    attempts: u32,
    mut operation: impl FnMut() -> Result<R, CommandError>,
) -> Result<R, ConnectError> {
    retry::bounded(
        &step.to_string(),
        attempts,
        CommandError::is_transient,
        |_| operation(),
    )
    .map_err(|error| match error {
        RetryError::Exhausted { attempts, last } => ConnectError::InitialisationFailure {
            step,
            attempts,
            source: last,
        },
        RetryError::Fatal(error) => ConnectError::Command(error),
    })
}

impl<P: ProtocolVariant, T: Transport> SpectrometerSession<P, T> {
    /// Brings the device behind `transport` up to a usable state. On failure the transport is
    /// dropped, which releases it.
    pub fn connect(mut transport: T, settings: &SessionSettings) -> Result<Self, ConnectError> {
        let mut tracker = StepTracker {
            model: P::MODEL,
            step: InitialisationStep::Unopened,
        };

        transport.configure()?;
        let mut link = Dispatcher::new(transport, P::codec());
        P::prepare(&mut link)?;
        tracker.advance(InitialisationStep::TransportConfigured);

        let attempts = settings.init_attempts;
        let usb_speed = retried(InitialisationStep::SpeedDetected, attempts, || {
            P::detect_speed(&mut link)
        })?;
        tracker.advance(InitialisationStep::SpeedDetected);

        let requested = settings
            .integration_time_us
            .unwrap_or(P::DEFAULT_INTEGRATION_TIME_US);
        let integration_time_us = P::write_integration_time(&mut link, requested)?;
        let scan_averages = P::write_scan_averages(&mut link, settings.scan_averages)?;
        let state = DeviceState {
            integration_time_us,
            scan_averages,
            usb_speed,
        };
        tracker.advance(InitialisationStep::IntegrationTimeSet);

        let delay = P::acquisition_delay(&state);
        let first = retried(
            InitialisationStep::FirstAcquisitionVerified,
            attempts,
            || P::read_raw_spectrum(&mut link, delay),
        )?;
        debug!("First acquisition returned {} samples", first.len());
        tracker.advance(InitialisationStep::FirstAcquisitionVerified);

        let calibration = P::load_calibration(&mut link)?;
        let info = P::read_device_info(&mut link)?;
        tracker.advance(InitialisationStep::CalibrationLoaded);

        tracker.advance(InitialisationStep::Ready);
        info!(
            "{} {} ready, integration time {}us",
            P::MODEL,
            info.serial_number,
            state.integration_time_us
        );

        Ok(Self {
            link,
            endpoints: EndpointSet::for_model(P::MODEL),
            state,
            calibration,
            info,
            _protocol: PhantomData,
        })
    }

    pub fn model(&self) -> DeviceModel {
        P::MODEL
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn calibration(&self) -> &CalibrationCoefficients {
        &self.calibration
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Without an argument this returns the current integration time, with one it is changed
    /// first. Either way the value returned is the one the device runs with.
    pub fn integration_time(&mut self, time_us: Option<u32>) -> Result<u32, CommandError> {
        if let Some(time_us) = time_us {
            self.state.integration_time_us = P::write_integration_time(&mut self.link, time_us)?;
        }
        Ok(self.state.integration_time_us)
    }

    /// Acquires a spectrum without any correction applied.
    pub fn acquire_raw_spectrum(&mut self) -> Result<RawSpectrum, CommandError> {
        let delay = P::acquisition_delay(&self.state);
        P::read_raw_spectrum(&mut self.link, delay)
    }

    pub fn acquire_spectrum(&mut self) -> Result<Spectrum, CommandError> {
        let raw = self.acquire_raw_spectrum()?;
        Ok(self.calibration.apply(&raw, P::pixel_range()))
    }

    pub fn device_temperature(&mut self) -> Result<f64, CommandError> {
        P::read_temperature(&mut self.link)
    }

    /// Ends the session, handing the transport back.
    pub fn into_transport(self) -> T {
        self.link.into_transport()
    }
}

#[cfg(feature = "libusb")]
impl<P: ProtocolVariant> SpectrometerSession<P, crate::RusbTransport> {
    /// Opens the first attached device of this model and initialises it.
    pub fn open(settings: &SessionSettings) -> Result<Self, ConnectError> {
        let transport = crate::RusbTransport::open_model(P::MODEL, settings.timeout)?;
        Self::connect(transport, settings)
    }
}

impl<T: Transport> SpectrometerSession<Usb2000Plus, T> {
    pub fn status(&mut self) -> Result<StatusReport, CommandError> {
        Usb2000Plus::query_status(&mut self.link)
    }

    pub fn read_register(&mut self, address: u8) -> Result<i16, CommandError> {
        Usb2000Plus::read_register(&mut self.link, address)
    }

    pub fn query_information(&mut self, slot: u8) -> Result<String, CommandError> {
        Usb2000Plus::query_information(&mut self.link, slot)
    }
}

impl<T: Transport> SpectrometerSession<Sts, T> {
    pub fn scan_averages(&self) -> u16 {
        self.state.scan_averages
    }

    pub fn set_scan_averages(&mut self, averages: u16) -> Result<u16, CommandError> {
        self.state.scan_averages = Sts::write_scan_averages(&mut self.link, averages)?;
        Ok(self.state.scan_averages)
    }

    /// Every board temperature, in degrees Celsius, detector first.
    pub fn temperatures(&mut self) -> Result<Vec<f64>, CommandError> {
        Sts::read_temperatures(&mut self.link)
    }

    pub fn stray_light_coefficients(&self) -> &[f64] {
        &self.calibration.stray_light
    }

    pub fn irradiance_calibration(&mut self) -> Result<Vec<f32>, CommandError> {
        Sts::read_irradiance_calibration(&mut self.link)
    }
}
