mod common;

use common::{legacy_sample, SimulatedUsb2000, NONLINEARITY, WAVELENGTH};
use oceanoptics_types::{
    CoefficientKind, DeviceModel, EndpointRole, InitialisationStep, SessionSettings, UsbSpeed,
};
use oceanoptics_usb::{CommandError, ConnectError, TransportError, Usb2000PlusSession};

fn connect(device: SimulatedUsb2000) -> Result<Usb2000PlusSession<SimulatedUsb2000>, ConnectError> {
    Usb2000PlusSession::connect(device, &SessionSettings::default())
}

fn polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .map(|(power, c)| c * x.powi(power as i32))
        .sum()
}

#[test]
fn initialises_with_defaults() -> anyhow::Result<()> {
    let session = connect(SimulatedUsb2000::new(UsbSpeed::HighSpeed))?;

    assert_eq!(session.model(), DeviceModel::Usb2000Plus);
    assert_eq!(session.state().integration_time_us, 1000);
    assert_eq!(session.state().usb_speed, Some(UsbSpeed::HighSpeed));
    assert_eq!(session.state().scan_averages, 0);
    assert_eq!(session.device_info().serial_number, "USB2+F01234");
    assert_eq!(session.device_info().hardware_version, None);
    assert_eq!(
        session.endpoints().address(EndpointRole::SpectrumIn),
        Some(0x82)
    );

    let calibration = session.calibration();
    assert_eq!(calibration.wavelength, WAVELENGTH);
    assert_eq!(calibration.nonlinearity, NONLINEARITY.to_vec());
    assert!(calibration.stray_light.is_empty());
    assert_eq!(calibration.saturation_factor, Some(65535.0 / 62000.0));

    let device = session.into_transport();
    assert!(device.configured);
    assert_eq!(device.written[0], (0x01, vec![0x01]));
    assert!(device
        .written
        .contains(&(0x01, vec![0x02, 0xe8, 0x03, 0x00, 0x00])));
    Ok(())
}

#[test]
fn status_retried_until_device_answers() -> anyhow::Result<()> {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.failing_status_queries = 9;

    let session = connect(device)?;
    assert_eq!(session.state().usb_speed, Some(UsbSpeed::HighSpeed));
    Ok(())
}

#[test]
fn status_gives_up_after_ten_attempts() {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.failing_status_queries = 10;
    let released = device.released.clone();

    match connect(device) {
        Err(ConnectError::InitialisationFailure {
            step,
            attempts,
            source,
        }) => {
            assert_eq!(step, InitialisationStep::SpeedDetected);
            assert_eq!(attempts, 10);
            assert!(matches!(
                source,
                CommandError::Transport(TransportError::Timeout)
            ));
        }
        Err(other) => panic!("Unexpected error {}", other),
        Ok(_) => panic!("Session should not have been created"),
    }
    assert!(released.get());
}

#[test]
fn first_acquisition_is_retried() -> anyhow::Result<()> {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.failing_spectra = 3;
    connect(device)?;

    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.failing_spectra = 10;
    assert!(matches!(
        connect(device),
        Err(ConnectError::InitialisationFailure {
            step: InitialisationStep::FirstAcquisitionVerified,
            attempts: 10,
            ..
        })
    ));
    Ok(())
}

#[test]
fn high_speed_spectrum_is_calibrated() -> anyhow::Result<()> {
    let mut session = connect(SimulatedUsb2000::new(UsbSpeed::HighSpeed))?;
    let spectrum = session.acquire_spectrum()?;

    assert_eq!(spectrum.len(), 2028);
    assert_eq!(spectrum.intensities.len(), 2028);

    let factor = 65535.0 / 62000.0;
    for (index, (wavelength, intensity)) in spectrum.points().enumerate() {
        let pixel = index + 20;
        let raw = legacy_sample(pixel) as f64;
        let expected_wavelength = polynomial(&WAVELENGTH, pixel as f64);
        let expected_intensity = raw / polynomial(&NONLINEARITY, raw) * factor;

        assert!((wavelength - expected_wavelength).abs() < 1e-6);
        assert!((intensity - expected_intensity).abs() < 1e-6);
    }

    let device = session.into_transport();
    let spectrum_reads: Vec<_> = device.reads.iter().filter(|r| r.0 == 0x82).collect();
    // Two acquisitions, each eight chunks plus the sync byte.
    assert_eq!(spectrum_reads.len(), 18);
    assert!(spectrum_reads[..8].iter().all(|r| r.1 == 512));
    Ok(())
}

#[test]
fn full_speed_spectrum_uses_small_chunks() -> anyhow::Result<()> {
    let mut session = connect(SimulatedUsb2000::new(UsbSpeed::FullSpeed))?;
    assert_eq!(session.state().usb_speed, Some(UsbSpeed::FullSpeed));
    assert_eq!(session.acquire_spectrum()?.len(), 2028);

    let device = session.into_transport();
    let chunks = device
        .reads
        .iter()
        .filter(|r| **r == (0x82, 64))
        .count();
    assert_eq!(chunks, 128);
    Ok(())
}

#[test]
fn raw_spectrum_keeps_dark_pixels() -> anyhow::Result<()> {
    let mut session = connect(SimulatedUsb2000::new(UsbSpeed::HighSpeed))?;
    let raw = session.acquire_raw_spectrum()?;
    assert_eq!(raw.len(), 2048);
    assert_eq!(raw.samples()[0], legacy_sample(0) as i32);
    Ok(())
}

#[test]
fn unsupported_nonlinearity_order() {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.slots.insert(0x0e, "5".to_string());

    match connect(device) {
        Err(ConnectError::CalibrationMismatch {
            kind, reported, ..
        }) => {
            assert_eq!(kind, CoefficientKind::Nonlinearity);
            assert_eq!(reported, 5);
        }
        Err(other) => panic!("Unexpected error {}", other),
        Ok(_) => panic!("Session should not have been created"),
    }
}

#[test]
fn zero_saturation_level_is_rejected() {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.saturation_level = 0;

    assert!(matches!(
        connect(device),
        Err(ConnectError::CalibrationMismatch {
            kind: CoefficientKind::Saturation,
            reported: 0,
            ..
        })
    ));
}

#[test]
fn temperature_is_scaled() -> anyhow::Result<()> {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.temperature_adc = 256;

    let mut session = connect(device)?;
    let temperature = session.device_temperature()?;
    assert!((temperature - 0.999936).abs() < 1e-9);
    Ok(())
}

#[test]
fn integration_time_follows_the_device() -> anyhow::Result<()> {
    let mut session = connect(SimulatedUsb2000::new(UsbSpeed::HighSpeed))?;

    assert_eq!(session.integration_time(None)?, 1000);
    assert_eq!(session.integration_time(Some(5000))?, 5000);
    assert_eq!(session.state().integration_time_us, 5000);
    assert_eq!(session.status()?.integration_time_us, 5000);

    let device = session.into_transport();
    let last_set = device
        .written
        .iter()
        .rev()
        .find(|(_, data)| data[0] == 0x02)
        .map(|(_, data)| data.clone());
    assert_eq!(last_set, Some(vec![0x02, 0x88, 0x13, 0x00, 0x00]));
    Ok(())
}

#[test]
fn configured_integration_time_is_applied() -> anyhow::Result<()> {
    let settings = SessionSettings {
        integration_time_us: Some(3000),
        ..SessionSettings::default()
    };
    let session = Usb2000PlusSession::connect(SimulatedUsb2000::new(UsbSpeed::HighSpeed), &settings)?;
    assert_eq!(session.state().integration_time_us, 3000);
    Ok(())
}

#[test]
fn registers_and_slots() -> anyhow::Result<()> {
    let mut device = SimulatedUsb2000::new(UsbSpeed::HighSpeed);
    device.registers.insert(0x48, -42);

    let mut session = connect(device)?;
    assert_eq!(session.read_register(0x48)?, -42);
    assert_eq!(session.query_information(0x00)?, "USB2+F01234");
    assert_eq!(session.query_information(0x01)?, WAVELENGTH[0].to_string());
    Ok(())
}
