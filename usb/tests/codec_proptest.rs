use oceanoptics_types::UsbSpeed;
use oceanoptics_usb::codec::{Codec, FramedCodec, LegacyCodec, StatusReport};
use oceanoptics_usb::commands::{FramedCommand, LegacyCommand};
use oceanoptics_usb::CalibrationCoefficients;
use proptest::prelude::*;

fn status(integration_time_us: u32, high_speed: bool) -> StatusReport {
    StatusReport {
        pixels: 2048,
        integration_time_us,
        lamp_enabled: false,
        trigger_mode: 0,
        acquisition_status: 0,
        packets_in_spectrum: 8,
        power_down: false,
        packets_in_endpoint: 0,
        usb_speed: if high_speed {
            UsbSpeed::HighSpeed
        } else {
            UsbSpeed::FullSpeed
        },
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn legacy_integration_time_survives_encoding(time_us in any::<u32>()) {
        let codec = LegacyCodec::default();
        let bytes = codec.encode(&LegacyCommand::SetIntegrationTime(time_us));
        prop_assert_eq!(bytes.len(), 5);

        let header = codec.decode_header(&bytes).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(header.lead, 0x02);
        prop_assert_eq!(header.argument_u32(), Some(time_us));
    }

    #[test]
    fn framed_integration_time_survives_encoding(time_us in any::<u32>()) {
        let codec = FramedCodec::new();
        let bytes = codec.encode(&FramedCommand::SetIntegrationTime(time_us));
        prop_assert_eq!(bytes.len(), 64);

        let header = codec.decode_header(&bytes).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(header.message_type, 0x0011_0010);
        prop_assert_eq!(header.immediate_length, 4);
        prop_assert_eq!(header.immediate_u32(), time_us);
    }

    #[test]
    fn status_reports_decode(time_us in any::<u32>(), high_speed in any::<bool>()) {
        let codec = LegacyCodec::default();
        let expected = status(time_us, high_speed);
        let response = codec
            .decode(&LegacyCommand::QueryStatus, &expected.to_bytes())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(response.raw().len(), 16);
        prop_assert_eq!(response.raw()[14], if high_speed { 0x80 } else { 0x00 });
        prop_assert_eq!(
            response.into_reply(),
            oceanoptics_usb::codec::LegacyReply::Status(expected)
        );
    }

    #[test]
    fn wavelength_matches_polynomial(
        c0 in 150.0f64..1100.0,
        c1 in -1.0f64..1.0,
        c2 in -1.0e-4f64..1.0e-4,
        c3 in -1.0e-7f64..1.0e-7,
        pixel in 0usize..2048,
    ) {
        let calibration = CalibrationCoefficients {
            wavelength: [c0, c1, c2, c3],
            nonlinearity: vec![],
            stray_light: vec![],
            saturation_factor: None,
        };
        let p = pixel as f64;
        let expected = c0 + c1 * p + c2 * p * p + c3 * p * p * p;
        prop_assert!((calibration.wavelength(pixel) - expected).abs() < 1e-6);
    }

    #[test]
    fn linearise_without_coefficients_is_identity(raw in 0.0f64..65535.0) {
        let calibration = CalibrationCoefficients {
            wavelength: [0.0; 4],
            nonlinearity: vec![],
            stray_light: vec![],
            saturation_factor: None,
        };
        prop_assert_eq!(calibration.linearise(raw), raw);
    }
}
