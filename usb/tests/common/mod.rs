#![allow(dead_code)]

// In-memory stand-ins for the two spectrometers, answering the way the hardware does.

use byteorder::{ByteOrder, LittleEndian};
use oceanoptics_types::UsbSpeed;
use oceanoptics_usb::codec::{Codec, FrameHeader, FramedCodec, MessageFlag, StatusReport};
use oceanoptics_usb::{Transport, TransportError};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub const WAVELENGTH: [f64; 4] = [339.7125, 0.3817, -1.58e-5, -2.1e-9];
pub const NONLINEARITY: [f64; 8] = [0.91, 1.2e-5, -3.4e-10, 2.0e-14, 0.0, 0.0, 0.0, 0.0];

pub const STS_WAVELENGTH: [f32; 4] = [337.5, 0.4668, -1.5e-5, -1.0e-9];
pub const STS_NONLINEARITY: [f32; 8] = [0.95, 9.0e-6, -1.0e-10, 0.0, 0.0, 0.0, 0.0, 0.0];
pub const STS_STRAY_LIGHT: [f32; 2] = [0.01, 0.002];
// Raw float slots of the temperature reply: detector, unused, controller.
pub const STS_TEMPERATURE_SLOTS: [f32; 3] = [24.5, -999.0, 29.0];

pub fn legacy_sample(pixel: usize) -> i16 {
    (100 + pixel % 1500) as i16
}

pub fn sts_sample(pixel: usize) -> u16 {
    (200 + pixel * 3) as u16
}

/// Set once the simulated device is dropped, the way a real handle releases its interface.
#[derive(Clone, Default)]
pub struct Released(Rc<Cell<bool>>);

impl Released {
    pub fn get(&self) -> bool {
        self.0.get()
    }
}

pub struct SimulatedUsb2000 {
    pub status: StatusReport,
    pub slots: HashMap<u8, String>,
    pub saturation_level: i16,
    pub temperature_adc: i16,
    pub registers: HashMap<u8, i16>,

    /// Status queries which time out before the device starts answering.
    pub failing_status_queries: u32,
    pub failing_spectra: u32,

    pub written: Vec<(u8, Vec<u8>)>,
    pub reads: Vec<(u8, usize)>,
    pub configured: bool,
    pub released: Released,

    replies: VecDeque<Result<Vec<u8>, TransportError>>,
    spectrum: VecDeque<u8>,
}

impl SimulatedUsb2000 {
    pub fn new(usb_speed: UsbSpeed) -> Self {
        let mut slots = HashMap::new();
        slots.insert(0x00, "USB2+F01234".to_string());
        for (index, value) in WAVELENGTH.iter().enumerate() {
            slots.insert(0x01 + index as u8, value.to_string());
        }
        for (index, value) in NONLINEARITY.iter().enumerate() {
            slots.insert(0x06 + index as u8, value.to_string());
        }
        slots.insert(0x0e, "7".to_string());

        Self {
            status: StatusReport {
                pixels: 2048,
                integration_time_us: 10_000,
                lamp_enabled: false,
                trigger_mode: 0,
                acquisition_status: 0,
                packets_in_spectrum: 8,
                power_down: false,
                packets_in_endpoint: 0,
                usb_speed,
            },
            slots,
            saturation_level: 62_000,
            temperature_adc: 6_400,
            registers: HashMap::new(),
            failing_status_queries: 0,
            failing_spectra: 0,
            written: Vec::new(),
            reads: Vec::new(),
            configured: false,
            released: Released::default(),
            replies: VecDeque::new(),
            spectrum: VecDeque::new(),
        }
    }

    fn information(&self, slot: u8) -> Vec<u8> {
        let mut reply = vec![0x05, slot];
        if slot == 0x11 {
            reply.extend_from_slice(&[0; 4]);
            reply.extend_from_slice(&self.saturation_level.to_le_bytes());
        } else if let Some(text) = self.slots.get(&slot) {
            reply.extend_from_slice(text.as_bytes());
        }
        reply.resize(17, 0);
        reply
    }

    fn respond(&mut self, request: &[u8]) {
        match request[0] {
            0x02 => self.status.integration_time_us = LittleEndian::read_u32(&request[1..5]),
            0x05 => {
                let reply = self.information(request[1]);
                self.replies.push_back(Ok(reply));
            }
            0x09 => {
                if self.failing_spectra > 0 {
                    self.failing_spectra -= 1;
                    return;
                }
                for pixel in 0..2048 {
                    self.spectrum
                        .extend(legacy_sample(pixel).to_le_bytes().iter().copied());
                }
                self.spectrum.push_back(0x69);
            }
            0x6b => {
                let value = self.registers.get(&request[1]).copied().unwrap_or(0);
                let mut reply = vec![request[1]];
                reply.extend_from_slice(&value.to_le_bytes());
                self.replies.push_back(Ok(reply));
            }
            0x6c => {
                let mut reply = vec![0x08];
                reply.extend_from_slice(&self.temperature_adc.to_le_bytes());
                self.replies.push_back(Ok(reply));
            }
            0xfe => {
                if self.failing_status_queries > 0 {
                    self.failing_status_queries -= 1;
                    self.replies.push_back(Err(TransportError::Timeout));
                } else {
                    let reply = self.status.to_bytes();
                    self.replies.push_back(Ok(reply));
                }
            }
            _ => {}
        }
    }
}

impl Drop for SimulatedUsb2000 {
    fn drop(&mut self) {
        self.released.0.set(true);
    }
}

impl Transport for SimulatedUsb2000 {
    fn configure(&mut self) -> Result<(), TransportError> {
        self.configured = true;
        Ok(())
    }

    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError> {
        self.written.push((endpoint, data.to_vec()));
        self.respond(data);
        Ok(data.len())
    }

    fn read(&mut self, endpoint: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        self.reads.push((endpoint, max_len));
        match endpoint {
            0x81 => self.replies.pop_front().unwrap_or(Err(TransportError::Timeout)),
            0x82 => {
                if self.spectrum.is_empty() {
                    return Err(TransportError::Timeout);
                }
                let length = max_len.min(self.spectrum.len());
                Ok(self.spectrum.drain(..length).collect())
            }
            _ => Err(TransportError::Pipe),
        }
    }
}

pub struct SimulatedSts {
    pub serial_number: String,
    pub hardware_version: u8,
    pub software_version: u8,
    pub nonlinearity_count: u8,

    /// Message type answered with a non-zero status, and the status to use.
    pub error_status: Option<(u32, u16)>,
    /// Replies of that type sent normally before the status kicks in.
    pub error_after: usize,
    /// Spectrum requests which go unanswered.
    pub failing_spectra: u32,

    pub integration_time_us: Option<u32>,
    pub scan_averages: Option<u16>,
    pub requests: Vec<FrameHeader>,
    pub configured: bool,
    pub released: Released,

    pending: VecDeque<u8>,
}

impl SimulatedSts {
    pub fn new() -> Self {
        Self {
            serial_number: "STS01234".to_string(),
            hardware_version: 3,
            software_version: 7,
            nonlinearity_count: 8,
            error_status: None,
            error_after: 0,
            failing_spectra: 0,
            integration_time_us: None,
            scan_averages: None,
            requests: Vec::new(),
            configured: false,
            released: Released::default(),
            pending: VecDeque::new(),
        }
    }

    /// Leaves bytes from an earlier exchange waiting on the command endpoint.
    pub fn with_stale_reply(mut self, length: usize) -> Self {
        self.pending.extend(std::iter::repeat(0xee).take(length));
        self
    }

    fn reply(&mut self, message_type: u32, immediate: &[u8], payload: &[u8]) {
        let mut header = FrameHeader::new(message_type).with_immediate(immediate);
        header.flags = MessageFlag::Response.into();
        if let Some((failing, status)) = self.error_status {
            if failing == message_type {
                if self.error_after == 0 {
                    header.status = status;
                } else {
                    self.error_after -= 1;
                }
            }
        }
        self.pending.extend(header.to_bytes(payload));
    }

    fn coefficient(&self, table: u32, index: usize) -> f32 {
        let values: &[f32] = match table {
            0x0018_0100 => &STS_WAVELENGTH,
            0x0018_1100 => &STS_NONLINEARITY,
            _ => &STS_STRAY_LIGHT,
        };
        values.get(index).copied().unwrap_or(0.0)
    }

    fn respond(&mut self, request: FrameHeader) {
        let message_type = request.message_type;
        match message_type {
            0x0000_0100 => {
                let serial = self.serial_number.clone();
                self.reply(message_type, serial.as_bytes(), &[]);
            }
            0x0000_0101 => {
                let length = self.serial_number.len() as u8;
                self.reply(message_type, &[length], &[]);
            }
            0x0000_0080 => self.reply(message_type, &[self.hardware_version], &[]),
            0x0000_0090 => self.reply(message_type, &[self.software_version], &[]),
            0x0011_0010 => self.integration_time_us = Some(request.immediate_u32()),
            0x0012_0010 => self.scan_averages = Some(request.immediate_u16()),
            0x0010_1000 => {
                if self.failing_spectra > 0 {
                    self.failing_spectra -= 1;
                    return;
                }
                let payload: Vec<u8> = (0..1024)
                    .flat_map(|pixel| sts_sample(pixel).to_le_bytes())
                    .collect();
                self.reply(message_type, &[], &payload);
            }
            0x0040_0002 => {
                let immediate: Vec<u8> = STS_TEMPERATURE_SLOTS
                    .iter()
                    .flat_map(|value| value.to_le_bytes())
                    .collect();
                self.reply(message_type, &immediate, &[]);
            }
            0x0018_1100 => {
                let count = self.nonlinearity_count;
                self.reply(message_type, &[count], &[]);
            }
            0x0018_3100 => self.reply(message_type, &[STS_STRAY_LIGHT.len() as u8], &[]),
            0x0018_0101 | 0x0018_1101 | 0x0018_3101 => {
                let value = self.coefficient(message_type & !0x01, request.immediate[0] as usize);
                self.reply(message_type, &value.to_le_bytes(), &[]);
            }
            0x0018_2001 => {
                let payload: Vec<u8> = (0..1024)
                    .flat_map(|index| (index as f32 * 0.5).to_le_bytes())
                    .collect();
                self.reply(message_type, &[], &payload);
            }
            _ => {}
        }
    }
}

impl Drop for SimulatedSts {
    fn drop(&mut self) {
        self.released.0.set(true);
    }
}

impl Transport for SimulatedSts {
    fn configure(&mut self) -> Result<(), TransportError> {
        self.configured = true;
        Ok(())
    }

    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError> {
        if endpoint != 0x01 {
            return Err(TransportError::Pipe);
        }
        let request = FramedCodec::new()
            .decode_header(data)
            .map_err(|error| TransportError::Other(error.to_string()))?;
        self.requests.push(request.clone());
        self.respond(request);
        Ok(data.len())
    }

    fn read(&mut self, endpoint: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        if endpoint != 0x81 {
            return Err(TransportError::Pipe);
        }
        if self.pending.is_empty() {
            return Err(TransportError::Timeout);
        }
        let length = max_len.min(self.pending.len());
        Ok(self.pending.drain(..length).collect())
    }
}
