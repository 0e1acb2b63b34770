use crate::device::base::Transport;
use crate::error::{ConnectError, TransportError};
use log::{debug, info, warn};
use oceanoptics_types::DeviceModel;
use rusb::{Device, DeviceHandle, GlobalContext};
use std::time::Duration;

// The spectrometers expose everything on interface 0 of configuration 1.
const CONFIGURATION: u8 = 1;
const INTERFACE: u8 = 0;

pub struct RusbTransport {
    handle: DeviceHandle<GlobalContext>,
    device: Device<GlobalContext>,
    timeout: Duration,
    interface_claimed: bool,
}

impl RusbTransport {
    fn find_device(
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Device<GlobalContext>, ConnectError> {
        if let Ok(devices) = rusb::devices() {
            for usb_device in devices.iter() {
                if let Ok(descriptor) = usb_device.device_descriptor() {
                    if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id
                    {
                        return Ok(usb_device);
                    }
                }
            }
        }
        Err(ConnectError::DeviceNotFound)
    }

    /// Opens the first device matching the ids, additional matches are ignored.
    pub fn open(vendor_id: u16, product_id: u16, timeout: Duration) -> Result<Self, ConnectError> {
        let device = Self::find_device(vendor_id, product_id)?;
        let handle = device.open()?;

        info!(
            "Connected to possible spectrometer {:04x}:{:04x} at {:?}",
            vendor_id, product_id, device
        );

        Ok(Self {
            handle,
            device,
            timeout,
            interface_claimed: false,
        })
    }

    pub fn open_model(model: DeviceModel, timeout: Duration) -> Result<Self, ConnectError> {
        Self::open(model.vendor_id(), model.product_id(), timeout)
    }
}

// Busy means the configuration is already active and held by a driver, which is what we want.
fn check_configuration(result: rusb::Result<()>) -> Result<(), TransportError> {
    match result {
        Ok(()) => {
            debug!("Set Active Config: {}", CONFIGURATION);
            Ok(())
        }
        Err(rusb::Error::Busy) => {
            warn!("Configuration {} is busy, keeping it", CONFIGURATION);
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}

impl Transport for RusbTransport {
    fn configure(&mut self) -> Result<(), TransportError> {
        check_configuration(self.handle.set_active_configuration(CONFIGURATION))?;

        // Not every platform supports detaching, this is fine to fail.
        let _ = self.handle.set_auto_detach_kernel_driver(true);
        self.handle.claim_interface(INTERFACE)?;
        self.interface_claimed = true;
        Ok(())
    }

    fn write(&mut self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.handle.write_bulk(endpoint, data, self.timeout)?)
    }

    fn read(&mut self, endpoint: u8, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0; max_len];
        let length = self.handle.read_bulk(endpoint, &mut buf, self.timeout)?;
        buf.truncate(length);
        Ok(buf)
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        if self.interface_claimed {
            if let Err(error) = self.handle.release_interface(INTERFACE) {
                warn!("Unable to release {:?}: {}", self.device, error);
            }
        }
    }
}

pub fn find_devices() -> Vec<DeviceModel> {
    let mut found_devices: Vec<DeviceModel> = Vec::new();

    if let Ok(devices) = rusb::devices() {
        for device in devices.iter() {
            if let Ok(descriptor) = device.device_descriptor() {
                if let Some(model) =
                    DeviceModel::from_ids(descriptor.vendor_id(), descriptor.product_id())
                {
                    found_devices.push(model);
                }
            }
        }
    }

    found_devices
}
