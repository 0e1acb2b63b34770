pub mod base;

cfg_if::cfg_if! {
    if #[cfg(feature = "libusb")] {
        // With libusb available we can talk to real hardware.
        mod libusb;
        pub use crate::device::libusb::device::RusbTransport;
        use oceanoptics_types::DeviceModel;

        pub fn find_devices() -> Vec<DeviceModel> {
            libusb::device::find_devices()
        }
    }
}
