use crate::error::TransportError;
use enum_map::{enum_map, EnumMap};
use oceanoptics_types::{DeviceModel, EndpointRole};

// Anything which can move bytes to and from a spectrometer. The session owns its transport
// exclusively, so implementations don't need to worry about concurrent access.
pub trait Transport {
    /// Select the configuration and claim whatever interfaces are required.
    fn configure(&mut self) -> Result<(), TransportError>;

    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError>;

    /// Read a single transfer of at most `max_len` bytes.
    fn read(&mut self, endpoint: u8, max_len: usize) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn configure(&mut self) -> Result<(), TransportError> {
        (**self).configure()
    }

    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(endpoint, data)
    }

    fn read(&mut self, endpoint: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(endpoint, max_len)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferKind {
    Bulk,
    Interrupt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub address: u8,
    pub direction: Direction,
    pub kind: TransferKind,
    pub max_transfer: usize,
}

impl Endpoint {
    pub const fn bulk_out(address: u8, max_transfer: usize) -> Self {
        Self {
            address,
            direction: Direction::Out,
            kind: TransferKind::Bulk,
            max_transfer,
        }
    }

    pub const fn bulk_in(address: u8, max_transfer: usize) -> Self {
        Self {
            address,
            direction: Direction::In,
            kind: TransferKind::Bulk,
            max_transfer,
        }
    }
}

// Endpoint addresses and sizes are taken from the OEM data sheets, they never change at runtime.
pub mod usb2000 {
    use super::Endpoint;

    pub const COMMAND_OUT: Endpoint = Endpoint::bulk_out(0x01, 64);
    pub const COMMAND_IN: Endpoint = Endpoint::bulk_in(0x81, 64);
    pub const SPECTRUM_IN: Endpoint = Endpoint::bulk_in(0x82, 512);
    pub const AUXILIARY_IN: Endpoint = Endpoint::bulk_in(0x86, 512);
}

pub mod sts {
    use super::{Direction, Endpoint, TransferKind};

    pub const COMMAND_OUT: Endpoint = Endpoint::bulk_out(0x01, 64);

    // Spectra are returned over the command endpoint as well
    pub const COMMAND_IN: Endpoint = Endpoint::bulk_in(0x81, 64);
    pub const AUXILIARY_OUT: Endpoint = Endpoint::bulk_out(0x02, 64);
    pub const AUXILIARY_IN: Endpoint = Endpoint::bulk_in(0x82, 64);
    pub const INTERRUPT: Endpoint = Endpoint {
        address: 0x83,
        direction: Direction::In,
        kind: TransferKind::Interrupt,
        max_transfer: 64,
    };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSet {
    endpoints: EnumMap<EndpointRole, Option<Endpoint>>,
}

impl EndpointSet {
    pub fn for_model(model: DeviceModel) -> Self {
        let endpoints = match model {
            DeviceModel::Usb2000Plus => enum_map! {
                EndpointRole::CommandOut => Some(usb2000::COMMAND_OUT),
                EndpointRole::CommandIn => Some(usb2000::COMMAND_IN),
                EndpointRole::SpectrumIn => Some(usb2000::SPECTRUM_IN),
                EndpointRole::AuxiliaryIn => Some(usb2000::AUXILIARY_IN),
                EndpointRole::AuxiliaryOut => None,
                EndpointRole::Interrupt => None,
            },
            DeviceModel::Sts => enum_map! {
                EndpointRole::CommandOut => Some(sts::COMMAND_OUT),
                EndpointRole::CommandIn => Some(sts::COMMAND_IN),
                EndpointRole::SpectrumIn => Some(sts::COMMAND_IN),
                EndpointRole::AuxiliaryOut => Some(sts::AUXILIARY_OUT),
                EndpointRole::AuxiliaryIn => Some(sts::AUXILIARY_IN),
                EndpointRole::Interrupt => Some(sts::INTERRUPT),
            },
        };
        Self { endpoints }
    }

    pub fn get(&self, role: EndpointRole) -> Option<&Endpoint> {
        self.endpoints[role].as_ref()
    }

    pub fn address(&self, role: EndpointRole) -> Option<u8> {
        self.get(role).map(|endpoint| endpoint.address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EndpointRole, &Endpoint)> {
        self.endpoints
            .iter()
            .filter_map(|(role, endpoint)| endpoint.as_ref().map(|e| (role, e)))
    }
}
