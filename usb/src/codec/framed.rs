use crate::codec::{Codec, ReadPlan, Response};
use crate::commands::FramedCommand;
use crate::device::base::sts::{COMMAND_IN, COMMAND_OUT};
use crate::error::{CommandError, FrameError};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use enumset::{EnumSet, EnumSetType};
use std::io::{Cursor, Read};

pub const START_MARKER: u16 = 0xc0c1;
pub const END_MARKER: u32 = 0xc2c3_c4c5;
pub const PROTOCOL_VERSION: u16 = 0x0100;

pub const FRAME_LENGTH: usize = 64;
const HEADER_LENGTH: usize = 44;
const IMMEDIATE_LENGTH: usize = 16;
const CHECKSUM_LENGTH: usize = 16;
const FOOTER_LENGTH: usize = 4;

pub const SPECTRUM_SAMPLES: usize = 1024;
pub const IRRADIANCE_VALUES: usize = 1024;

// Float slots in the temperature reply's immediate data, slot 1 is unused.
const TEMPERATURE_DETECTOR: usize = 0;
const TEMPERATURE_CONTROLLER: usize = 2;

#[derive(EnumSetType, Debug)]
#[enumset(repr = "u16")]
pub enum MessageFlag {
    Response = 0,
    Ack = 1,
    AckRequested = 2,
    Nack = 3,
    Exception = 4,
    ProtocolDeprecated = 5,
}

/// Everything ahead of the (optional) extended payload.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameHeader {
    pub protocol_version: u16,
    pub flags: EnumSet<MessageFlag>,
    pub status: u16,
    pub message_type: u32,
    pub regarding: u32,
    pub checksum_type: u8,
    pub immediate_length: u8,
    pub immediate: [u8; IMMEDIATE_LENGTH],
    pub bytes_remaining: u32,
}

impl FrameHeader {
    pub fn new(message_type: u32) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            flags: EnumSet::empty(),
            status: 0,
            message_type,
            regarding: 0,
            checksum_type: 0,
            immediate_length: 0,
            immediate: [0; IMMEDIATE_LENGTH],
            bytes_remaining: (CHECKSUM_LENGTH + FOOTER_LENGTH) as u32,
        }
    }

    /// Stores up to sixteen bytes in the immediate region.
    pub fn with_immediate(mut self, data: &[u8]) -> Self {
        let length = data.len().min(IMMEDIATE_LENGTH);
        self.immediate = [0; IMMEDIATE_LENGTH];
        self.immediate[..length].copy_from_slice(&data[..length]);
        self.immediate_length = length as u8;
        self
    }

    pub fn immediate_data(&self) -> &[u8] {
        &self.immediate[..(self.immediate_length as usize).min(IMMEDIATE_LENGTH)]
    }

    pub fn immediate_u16(&self) -> u16 {
        LittleEndian::read_u16(&self.immediate[0..2])
    }

    pub fn immediate_u32(&self) -> u32 {
        LittleEndian::read_u32(&self.immediate[0..4])
    }

    pub fn immediate_f32(&self, index: usize) -> f32 {
        let offset = index * 4;
        LittleEndian::read_f32(&self.immediate[offset..offset + 4])
    }

    /// Serialises the frame, placing `payload` between the header and the checksum.
    pub fn to_bytes(&self, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0; FRAME_LENGTH + payload.len()];
        LittleEndian::write_u16(&mut frame[0..2], START_MARKER);
        LittleEndian::write_u16(&mut frame[2..4], self.protocol_version);
        LittleEndian::write_u16(&mut frame[4..6], self.flags.as_repr());
        LittleEndian::write_u16(&mut frame[6..8], self.status);
        LittleEndian::write_u32(&mut frame[8..12], self.message_type);
        LittleEndian::write_u32(&mut frame[12..16], self.regarding);
        frame[22] = self.checksum_type;
        frame[23] = self.immediate_length;
        frame[24..40].copy_from_slice(&self.immediate);

        let remaining = payload.len() + CHECKSUM_LENGTH + FOOTER_LENGTH;
        LittleEndian::write_u32(&mut frame[40..44], remaining as u32);
        frame[HEADER_LENGTH..HEADER_LENGTH + payload.len()].copy_from_slice(payload);

        let footer = frame.len() - FOOTER_LENGTH;
        LittleEndian::write_u32(&mut frame[footer..], END_MARKER);
        frame
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FramedReply {
    Empty,
    Text(String),
    Byte(u8),
    Float(f32),
    Floats(Vec<f32>),
    Spectrum(Vec<u16>),
    Irradiance(Vec<f32>),
}

#[derive(Clone, Debug, Default)]
pub struct FramedCodec;

impl FramedCodec {
    pub fn new() -> Self {
        Self
    }

    fn payload_length(command: &FramedCommand) -> usize {
        match command {
            FramedCommand::GetCorrectedSpectrum => SPECTRUM_SAMPLES * 2,
            FramedCommand::GetIrradianceCalibration => IRRADIANCE_VALUES * 4,
            _ => 0,
        }
    }
}

impl Codec for FramedCodec {
    type Command = FramedCommand;
    type Header = FrameHeader;
    type Reply = FramedReply;

    fn command_endpoint(&self) -> u8 {
        COMMAND_OUT.address
    }

    fn encode(&self, command: &FramedCommand) -> Vec<u8> {
        let header = FrameHeader::new(command.message_type());
        let header = match command {
            FramedCommand::SetIntegrationTime(time_us) => {
                let mut value = [0; 4];
                LittleEndian::write_u32(&mut value, *time_us);
                header.with_immediate(&value)
            }
            FramedCommand::SetScanAverages(averages) => {
                let mut value = [0; 2];
                LittleEndian::write_u16(&mut value, *averages);
                header.with_immediate(&value)
            }
            FramedCommand::GetCoefficient(_, index) => header.with_immediate(&[*index]),
            _ => header,
        };
        header.to_bytes(&[])
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<FrameHeader, CommandError> {
        if bytes.len() < FRAME_LENGTH {
            return Err(FrameError::Length {
                expected: FRAME_LENGTH,
                received: bytes.len(),
            }
            .into());
        }

        let mut cursor = Cursor::new(bytes);
        let start = cursor.read_u16::<LittleEndian>()?;
        if start != START_MARKER {
            return Err(FrameError::StartMarker(start).into());
        }

        let protocol_version = cursor.read_u16::<LittleEndian>()?;
        let flags = EnumSet::from_repr_truncated(cursor.read_u16::<LittleEndian>()?);
        let status = cursor.read_u16::<LittleEndian>()?;
        let message_type = cursor.read_u32::<LittleEndian>()?;
        let regarding = cursor.read_u32::<LittleEndian>()?;

        let mut reserved = [0; 6];
        cursor.read_exact(&mut reserved)?;

        let checksum_type = cursor.read_u8()?;
        let immediate_length = cursor.read_u8()?;
        let mut immediate = [0; IMMEDIATE_LENGTH];
        cursor.read_exact(&mut immediate)?;
        let bytes_remaining = cursor.read_u32::<LittleEndian>()?;

        Ok(FrameHeader {
            protocol_version,
            flags,
            status,
            message_type,
            regarding,
            checksum_type,
            immediate_length,
            immediate,
            bytes_remaining,
        })
    }

    fn response_length_bytes(&self, command: &FramedCommand) -> usize {
        if !command.expects_reply() {
            return 0;
        }
        FRAME_LENGTH + Self::payload_length(command)
    }

    fn read_plan(&self, command: &FramedCommand) -> Option<ReadPlan> {
        if !command.expects_reply() {
            return None;
        }
        Some(ReadPlan {
            endpoint: COMMAND_IN.address,
            chunk_size: COMMAND_IN.max_transfer,
            chunks: self.response_length_bytes(command) / COMMAND_IN.max_transfer,
            sync: None,
        })
    }

    fn decode(
        &self,
        command: &FramedCommand,
        bytes: &[u8],
    ) -> Result<Response<FramedReply>, CommandError> {
        if !command.expects_reply() {
            return Ok(Response::new(bytes.to_vec(), FramedReply::Empty));
        }

        let expected = self.response_length_bytes(command);
        if bytes.len() != expected {
            return Err(FrameError::Length {
                expected,
                received: bytes.len(),
            }
            .into());
        }

        let header = self.decode_header(bytes)?;
        let end = LittleEndian::read_u32(&bytes[bytes.len() - FOOTER_LENGTH..]);
        if end != END_MARKER {
            return Err(FrameError::EndMarker(end).into());
        }
        if header.status != 0 {
            return Err(FrameError::DeviceStatus(header.status).into());
        }
        if header.flags.contains(MessageFlag::Nack) {
            return Err(FrameError::Nack.into());
        }
        if header.message_type != command.message_type() {
            return Err(FrameError::EchoMismatch {
                expected: command.message_type(),
                received: header.message_type,
            }
            .into());
        }

        let payload = &bytes[HEADER_LENGTH..HEADER_LENGTH + Self::payload_length(command)];
        let reply = match command {
            FramedCommand::SetIntegrationTime(_) | FramedCommand::SetScanAverages(_) => {
                FramedReply::Empty
            }
            FramedCommand::GetSerialNumber => {
                let text: Vec<u8> = header.immediate.iter().copied().filter(|&c| c != 0).collect();
                FramedReply::Text(String::from_utf8_lossy(&text).to_string())
            }
            FramedCommand::GetSerialNumberLength
            | FramedCommand::GetHardwareVersion
            | FramedCommand::GetSoftwareVersion
            | FramedCommand::GetCoefficientCount(_) => FramedReply::Byte(header.immediate[0]),
            FramedCommand::GetCoefficient(_, _) => FramedReply::Float(header.immediate_f32(0)),
            // Fixed slots, the length byte isn't reliable for this reply.
            FramedCommand::GetAllTemperatures => FramedReply::Floats(vec![
                header.immediate_f32(TEMPERATURE_DETECTOR),
                header.immediate_f32(TEMPERATURE_CONTROLLER),
            ]),
            FramedCommand::GetCorrectedSpectrum => {
                let mut samples = vec![0; SPECTRUM_SAMPLES];
                LittleEndian::read_u16_into(payload, &mut samples);
                FramedReply::Spectrum(samples)
            }
            FramedCommand::GetIrradianceCalibration => {
                let mut values = vec![0.0; IRRADIANCE_VALUES];
                LittleEndian::read_f32_into(payload, &mut values);
                FramedReply::Irradiance(values)
            }
        };
        Ok(Response::new(bytes.to_vec(), reply))
    }
}
