//! Device search parameters

use std::fmt;
use std::sync::Arc;

use crate::backend::{DeviceInfo, UsbBackend};

/// Which backend a device search uses
#[derive(Clone, Default)]
pub enum BackendChoice {
    /// The context's memoized backend, built from the library lookup
    #[default]
    Default,
    /// A caller-supplied backend
    Explicit(Arc<dyn UsbBackend>),
    /// No bundled lookup at all; the binding's own libusb is used
    System,
}

impl fmt::Debug for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Default => write!(f, "Default"),
            BackendChoice::Explicit(backend) => write!(f, "Explicit({})", backend.name()),
            BackendChoice::System => write!(f, "System"),
        }
    }
}

/// Device match criteria; unset fields match anything
///
/// # Example
/// ```
/// use locator::DeviceFilter;
///
/// let filter = DeviceFilter::all().vendor(0x1d50).product(0x6018);
/// assert!(filter.find_all);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub bus_number: Option<u8>,
    pub address: Option<u8>,
    pub class: Option<u8>,
    /// Return every match instead of the first one
    pub find_all: bool,
}

impl DeviceFilter {
    /// Match the first device
    pub fn first() -> Self {
        Self::default()
    }

    /// Match every device
    pub fn all() -> Self {
        Self {
            find_all: true,
            ..Self::default()
        }
    }

    pub fn vendor(mut self, vendor_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn product(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn bus(mut self, bus_number: u8) -> Self {
        self.bus_number = Some(bus_number);
        self
    }

    pub fn address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    pub fn class(mut self, class: u8) -> Self {
        self.class = Some(class);
        self
    }

    pub fn matches(&self, device: &DeviceInfo) -> bool {
        self.vendor_id.is_none_or(|v| v == device.vendor_id)
            && self.product_id.is_none_or(|p| p == device.product_id)
            && self.bus_number.is_none_or(|b| b == device.bus_number)
            && self.address.is_none_or(|a| a == device.address)
            && self.class.is_none_or(|c| c == device.class)
    }

    /// Keep matching devices, at most one unless `find_all` is set
    pub fn apply(&self, devices: Vec<DeviceInfo>) -> Vec<DeviceInfo> {
        let matching = devices.into_iter().filter(|d| self.matches(d));
        if self.find_all {
            matching.collect()
        } else {
            matching.take(1).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(bus: u8, address: u8, vid: u16, pid: u16) -> DeviceInfo {
        DeviceInfo {
            bus_number: bus,
            address,
            vendor_id: vid,
            product_id: pid,
            class: 0,
            subclass: 0,
            protocol: 0,
            usb_version: 0x0200,
        }
    }

    fn sample() -> Vec<DeviceInfo> {
        vec![
            device(1, 1, 0x1d6b, 0x0002),
            device(1, 4, 0x1d50, 0x6018),
            device(2, 3, 0x1d50, 0x6089),
        ]
    }

    #[test]
    fn test_first_vs_all() {
        assert_eq!(DeviceFilter::first().apply(sample()).len(), 1);
        assert_eq!(DeviceFilter::all().apply(sample()).len(), 3);
    }

    #[test]
    fn test_vendor_product() {
        let found = DeviceFilter::all().vendor(0x1d50).apply(sample());
        assert_eq!(found.len(), 2);

        let found = DeviceFilter::first().vendor(0x1d50).apply(sample());
        assert_eq!(found, vec![device(1, 4, 0x1d50, 0x6018)]);

        let found = DeviceFilter::all()
            .vendor(0x1d50)
            .product(0x6089)
            .apply(sample());
        assert_eq!(found, vec![device(2, 3, 0x1d50, 0x6089)]);
    }

    #[test]
    fn test_bus_address_class() {
        assert_eq!(DeviceFilter::all().bus(2).apply(sample()).len(), 1);
        assert_eq!(DeviceFilter::all().bus(1).address(4).apply(sample()).len(), 1);
        assert!(DeviceFilter::all().class(9).apply(sample()).is_empty());
    }
}
