// Commands understood by the USB2000+ (single byte opcodes) and the STS (typed frames).

use strum::{Display, EnumIter};

/// Information slot holding the serial number.
pub const SLOT_SERIAL_NUMBER: u8 = 0x00;
/// First of the four wavelength calibration slots (1..=4).
pub const SLOT_WAVELENGTH: u8 = 0x01;
/// First of the eight nonlinearity correction slots (6..=13).
pub const SLOT_NONLINEARITY: u8 = 0x06;
/// Slot holding the order of the nonlinearity polynomial.
pub const SLOT_NONLINEARITY_ORDER: u8 = 0x0e;
/// Raw record carrying the detector saturation level at offset 6.
pub const SLOT_SATURATION: u8 = 0x11;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LegacyCommand {
    Initialise,
    SetIntegrationTime(u32),
    QueryInformation(u8),
    RequestSpectrum,
    ReadRegister(u8),
    ReadPcbTemperature,
    QueryStatus,
}

impl LegacyCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            LegacyCommand::Initialise => 0x01,
            LegacyCommand::SetIntegrationTime(_) => 0x02,
            LegacyCommand::QueryInformation(_) => 0x05,
            LegacyCommand::RequestSpectrum => 0x09,
            LegacyCommand::ReadRegister(_) => 0x6b,
            LegacyCommand::ReadPcbTemperature => 0x6c,
            LegacyCommand::QueryStatus => 0xfe,
        }
    }
}

#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq)]
pub enum CoefficientTable {
    #[strum(to_string = "wavelength")]
    Wavelength,
    #[strum(to_string = "nonlinearity")]
    Nonlinearity,
    #[strum(to_string = "stray light")]
    StrayLight,
}

impl CoefficientTable {
    fn base(&self) -> u32 {
        match self {
            CoefficientTable::Wavelength => 0x0018_0100,
            CoefficientTable::Nonlinearity => 0x0018_1100,
            CoefficientTable::StrayLight => 0x0018_3100,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramedCommand {
    GetSerialNumber,
    GetSerialNumberLength,
    GetHardwareVersion,
    GetSoftwareVersion,
    SetIntegrationTime(u32),
    SetScanAverages(u16),
    GetCorrectedSpectrum,
    GetAllTemperatures,
    GetCoefficientCount(CoefficientTable),
    GetCoefficient(CoefficientTable, u8),
    GetIrradianceCalibration,
}

impl FramedCommand {
    pub fn message_type(&self) -> u32 {
        match self {
            FramedCommand::GetSerialNumber => 0x0000_0100,
            FramedCommand::GetSerialNumberLength => 0x0000_0101,
            FramedCommand::GetHardwareVersion => 0x0000_0080,
            FramedCommand::GetSoftwareVersion => 0x0000_0090,
            FramedCommand::SetIntegrationTime(_) => 0x0011_0010,
            FramedCommand::SetScanAverages(_) => 0x0012_0010,
            FramedCommand::GetCorrectedSpectrum => 0x0010_1000,
            FramedCommand::GetAllTemperatures => 0x0040_0002,
            FramedCommand::GetCoefficientCount(table) => table.base(),
            FramedCommand::GetCoefficient(table, _) => table.base() | 0x01,
            FramedCommand::GetIrradianceCalibration => 0x0018_2001,
        }
    }

    /// Setters aren't acknowledged, the device silently applies them.
    pub fn expects_reply(&self) -> bool {
        !matches!(
            self,
            FramedCommand::SetIntegrationTime(_) | FramedCommand::SetScanAverages(_)
        )
    }
}
