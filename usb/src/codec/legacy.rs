use crate::codec::{Codec, ReadPlan, Response};
use crate::commands::LegacyCommand;
use crate::device::base::usb2000::{COMMAND_IN, COMMAND_OUT, SPECTRUM_IN};
use crate::error::{CommandError, FrameError};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use oceanoptics_types::UsbSpeed;
use std::io::Cursor;

/// Byte the USB2000+ sends once the last spectrum chunk has gone out.
pub const SPECTRUM_SYNC: u8 = 0x69;
pub const SPECTRUM_SAMPLES: usize = 2048;
const SPECTRUM_BYTES: usize = SPECTRUM_SAMPLES * 2;

const STATUS_LENGTH: usize = 16;
const REGISTER_LENGTH: usize = 3;

// The temperature reply leads with a success code rather than echoing the opcode.
const TEMPERATURE_OK: u8 = 0x08;

/// Leading byte (opcode, or echo in a reply) and whatever followed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyHeader {
    pub lead: u8,
    pub body: Vec<u8>,
}

impl LegacyHeader {
    pub fn argument_u32(&self) -> Option<u32> {
        if self.body.len() < 4 {
            return None;
        }
        Some(LittleEndian::read_u32(&self.body[..4]))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub pixels: u16,
    pub integration_time_us: u32,
    pub lamp_enabled: bool,
    pub trigger_mode: u8,
    pub acquisition_status: u8,
    pub packets_in_spectrum: u8,
    pub power_down: bool,
    pub packets_in_endpoint: u8,
    pub usb_speed: UsbSpeed,
}

impl StatusReport {
    fn parse(bytes: &[u8]) -> Result<Self, CommandError> {
        let mut cursor = Cursor::new(bytes);
        let pixels = cursor.read_u16::<LittleEndian>()?;
        let integration_time_us = cursor.read_u32::<LittleEndian>()?;
        let lamp_enabled = cursor.read_u8()? != 0;
        let trigger_mode = cursor.read_u8()?;
        let acquisition_status = cursor.read_u8()?;
        let packets_in_spectrum = cursor.read_u8()?;
        let power_down = cursor.read_u8()? != 0;
        let packets_in_endpoint = cursor.read_u8()?;

        // Two reserved bytes
        cursor.read_u16::<LittleEndian>()?;

        let speed_code = cursor.read_u8()?;
        let usb_speed = UsbSpeed::from_code(speed_code).ok_or(FrameError::Field {
            field: "usb speed",
            value: speed_code as u32,
        })?;

        Ok(Self {
            pixels,
            integration_time_us,
            lamp_enabled,
            trigger_mode,
            acquisition_status,
            packets_in_spectrum,
            power_down,
            packets_in_endpoint,
            usb_speed,
        })
    }

    /// Encodes the report the way the device sends it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0; STATUS_LENGTH];
        LittleEndian::write_u16(&mut bytes[0..2], self.pixels);
        LittleEndian::write_u32(&mut bytes[2..6], self.integration_time_us);
        bytes[6] = u8::from(self.lamp_enabled);
        bytes[7] = self.trigger_mode;
        bytes[8] = self.acquisition_status;
        bytes[9] = self.packets_in_spectrum;
        bytes[10] = u8::from(self.power_down);
        bytes[11] = self.packets_in_endpoint;
        bytes[14] = self.usb_speed.code();
        bytes
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LegacyReply {
    Empty,
    Status(StatusReport),
    Information(String),
    Register(i16),
    PcbTemperature(i16),
    Spectrum(Vec<i16>),
}

#[derive(Clone, Debug)]
pub struct LegacyCodec {
    usb_speed: UsbSpeed,
}

impl Default for LegacyCodec {
    fn default() -> Self {
        Self::new(UsbSpeed::FullSpeed)
    }
}

impl LegacyCodec {
    pub fn new(usb_speed: UsbSpeed) -> Self {
        Self { usb_speed }
    }

    pub fn usb_speed(&self) -> UsbSpeed {
        self.usb_speed
    }

    /// The speed decides how the spectrum is chunked, so this must follow the status query.
    pub fn set_usb_speed(&mut self, usb_speed: UsbSpeed) {
        self.usb_speed = usb_speed;
    }

    fn spectrum_plan(&self) -> ReadPlan {
        let (chunk_size, chunks) = match self.usb_speed {
            UsbSpeed::HighSpeed => (512, 8),
            UsbSpeed::FullSpeed => (64, 64),
        };
        ReadPlan {
            endpoint: SPECTRUM_IN.address,
            chunk_size,
            chunks,
            sync: Some(SPECTRUM_SYNC),
        }
    }
}

fn expect_length(bytes: &[u8], expected: usize) -> Result<(), FrameError> {
    if bytes.len() != expected {
        return Err(FrameError::Length {
            expected,
            received: bytes.len(),
        });
    }
    Ok(())
}

fn expect_echo(received: u8, expected: u8) -> Result<(), FrameError> {
    if received != expected {
        return Err(FrameError::EchoMismatch {
            expected: expected as u32,
            received: received as u32,
        });
    }
    Ok(())
}

impl Codec for LegacyCodec {
    type Command = LegacyCommand;
    type Header = LegacyHeader;
    type Reply = LegacyReply;

    fn command_endpoint(&self) -> u8 {
        COMMAND_OUT.address
    }

    fn encode(&self, command: &LegacyCommand) -> Vec<u8> {
        let mut data = Vec::with_capacity(5);
        data.push(command.opcode());
        match command {
            LegacyCommand::SetIntegrationTime(time_us) => {
                let mut argument = [0; 4];
                LittleEndian::write_u32(&mut argument, *time_us);
                data.extend_from_slice(&argument);
            }
            LegacyCommand::QueryInformation(value) | LegacyCommand::ReadRegister(value) => {
                data.push(*value);
            }
            _ => {}
        }
        data
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<LegacyHeader, CommandError> {
        let (lead, body) = bytes.split_first().ok_or(FrameError::Length {
            expected: 1,
            received: 0,
        })?;
        Ok(LegacyHeader {
            lead: *lead,
            body: body.to_vec(),
        })
    }

    fn response_length_bytes(&self, command: &LegacyCommand) -> usize {
        match command {
            LegacyCommand::Initialise | LegacyCommand::SetIntegrationTime(_) => 0,
            LegacyCommand::QueryInformation(_) => COMMAND_IN.max_transfer,
            LegacyCommand::RequestSpectrum => SPECTRUM_BYTES,
            LegacyCommand::ReadRegister(_) | LegacyCommand::ReadPcbTemperature => REGISTER_LENGTH,
            LegacyCommand::QueryStatus => STATUS_LENGTH,
        }
    }

    fn read_plan(&self, command: &LegacyCommand) -> Option<ReadPlan> {
        match command {
            LegacyCommand::Initialise | LegacyCommand::SetIntegrationTime(_) => None,
            LegacyCommand::RequestSpectrum => Some(self.spectrum_plan()),
            _ => Some(ReadPlan::single(COMMAND_IN.address, COMMAND_IN.max_transfer)),
        }
    }

    fn decode(
        &self,
        command: &LegacyCommand,
        bytes: &[u8],
    ) -> Result<Response<LegacyReply>, CommandError> {
        let reply = match command {
            LegacyCommand::Initialise | LegacyCommand::SetIntegrationTime(_) => LegacyReply::Empty,
            LegacyCommand::QueryInformation(slot) => {
                if bytes.len() < 2 {
                    return Err(FrameError::Length {
                        expected: 2,
                        received: bytes.len(),
                    }
                    .into());
                }
                let header = self.decode_header(bytes)?;
                expect_echo(header.lead, command.opcode())?;
                expect_echo(header.body[0], *slot)?;

                let text = &header.body[1..];
                let length = text.iter().position(|&c| c == 0).unwrap_or(text.len());
                LegacyReply::Information(String::from_utf8_lossy(&text[..length]).to_string())
            }
            LegacyCommand::ReadRegister(address) => {
                expect_length(bytes, REGISTER_LENGTH)?;
                let header = self.decode_header(bytes)?;
                expect_echo(header.lead, *address)?;
                LegacyReply::Register(LittleEndian::read_i16(&header.body))
            }
            LegacyCommand::ReadPcbTemperature => {
                expect_length(bytes, REGISTER_LENGTH)?;
                let header = self.decode_header(bytes)?;
                expect_echo(header.lead, TEMPERATURE_OK)?;
                LegacyReply::PcbTemperature(LittleEndian::read_i16(&header.body))
            }
            LegacyCommand::QueryStatus => {
                expect_length(bytes, STATUS_LENGTH)?;
                LegacyReply::Status(StatusReport::parse(bytes)?)
            }
            LegacyCommand::RequestSpectrum => {
                expect_length(bytes, SPECTRUM_BYTES)?;
                let mut samples = vec![0; SPECTRUM_SAMPLES];
                LittleEndian::read_i16_into(bytes, &mut samples);
                LegacyReply::Spectrum(samples)
            }
        };
        Ok(Response::new(bytes.to_vec(), reply))
    }
}
