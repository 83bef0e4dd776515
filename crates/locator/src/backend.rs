//! USB backends
//!
//! A backend enumerates the devices visible through one libusb instance.
//! [`DynamicBackend`] loads a libusb found at run time (bundled or from the
//! system search); [`SystemBackend`] uses the libusb rusb was linked against
//! and never consults the bundled package.

use libloading::Library;
use serde::Serialize;
use std::ffi::{c_int, c_void};
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::{debug, warn};

use crate::error::{LocatorError, Result};

/// Library names tried, in order, when constructing a libusb-1.0 backend
pub const LIBUSB1_CANDIDATES: &[&str] = &["usb-1.0", "libusb-1.0", "usb"];

/// Where a library path came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LibrarySource {
    /// Shipped inside the package directory
    Bundled(PathBuf),
    /// Found by the operating system library search
    System(PathBuf),
}

impl LibrarySource {
    pub fn path(&self) -> &Path {
        match self {
            LibrarySource::Bundled(path) | LibrarySource::System(path) => path,
        }
    }

    pub fn is_bundled(&self) -> bool {
        matches!(self, LibrarySource::Bundled(_))
    }
}

impl fmt::Display for LibrarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibrarySource::Bundled(path) => write!(f, "{} (bundled)", path.display()),
            LibrarySource::System(path) => write!(f, "{} (system)", path.display()),
        }
    }
}

/// Summary of one USB device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    /// bcdUSB, e.g. 0x0200 for USB 2.0
    pub usb_version: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus {:03} Device {:03}: ID {:04x}:{:04x} class {:#04x} USB {:x}.{:02x}",
            self.bus_number,
            self.address,
            self.vendor_id,
            self.product_id,
            self.class,
            self.usb_version >> 8,
            self.usb_version & 0xff
        )
    }
}

/// A source of USB device listings
pub trait UsbBackend: Send + Sync + fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Enumerate currently attached devices
    fn devices(&self) -> Result<Vec<DeviceInfo>>;
}

/// libusb_device_descriptor
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
#[allow(dead_code)]
struct RawDeviceDescriptor {
    b_length: u8,
    b_descriptor_type: u8,
    bcd_usb: u16,
    b_device_class: u8,
    b_device_sub_class: u8,
    b_device_protocol: u8,
    b_max_packet_size0: u8,
    id_vendor: u16,
    id_product: u16,
    bcd_device: u16,
    i_manufacturer: u8,
    i_product: u8,
    i_serial_number: u8,
    b_num_configurations: u8,
}

type LibusbInit = unsafe extern "system" fn(*mut *mut c_void) -> c_int;
type LibusbExit = unsafe extern "system" fn(*mut c_void);
type LibusbGetDeviceList = unsafe extern "system" fn(*mut c_void, *mut *mut *mut c_void) -> isize;
type LibusbFreeDeviceList = unsafe extern "system" fn(*mut *mut c_void, c_int);
type LibusbGetDeviceDescriptor =
    unsafe extern "system" fn(*mut c_void, *mut RawDeviceDescriptor) -> c_int;
type LibusbGetU8 = unsafe extern "system" fn(*mut c_void) -> u8;

/// Entry points resolved from the loaded library
#[derive(Clone, Copy)]
struct LibusbApi {
    init: LibusbInit,
    exit: LibusbExit,
    get_device_list: LibusbGetDeviceList,
    free_device_list: LibusbFreeDeviceList,
    get_device_descriptor: LibusbGetDeviceDescriptor,
    get_bus_number: LibusbGetU8,
    get_device_address: LibusbGetU8,
}

/// Backend over a libusb loaded from a path at run time
pub struct DynamicBackend {
    api: LibusbApi,
    source: LibrarySource,
    // Keeps the function pointers in `api` valid
    _library: Library,
}

impl DynamicBackend {
    /// Load libusb from `source` and resolve the entry points it needs
    pub fn load(source: &LibrarySource) -> Result<Self> {
        let path = source.path();
        debug!("Loading libusb from {}", source);

        // SAFETY: loading runs the library's initializers; libusb has none
        // with preconditions.
        let library = unsafe { Library::new(path) }.map_err(|e| LocatorError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;

        let api = LibusbApi {
            init: symbol(&library, path, "libusb_init")?,
            exit: symbol(&library, path, "libusb_exit")?,
            get_device_list: symbol(&library, path, "libusb_get_device_list")?,
            free_device_list: symbol(&library, path, "libusb_free_device_list")?,
            get_device_descriptor: symbol(&library, path, "libusb_get_device_descriptor")?,
            get_bus_number: symbol(&library, path, "libusb_get_bus_number")?,
            get_device_address: symbol(&library, path, "libusb_get_device_address")?,
        };

        Ok(Self {
            api,
            source: source.clone(),
            _library: library,
        })
    }

    pub fn source(&self) -> &LibrarySource {
        &self.source
    }

    fn enumerate(&self, context: *mut c_void) -> Result<Vec<DeviceInfo>> {
        let mut list: *mut *mut c_void = ptr::null_mut();
        // SAFETY: `context` came from a successful libusb_init.
        let count = unsafe { (self.api.get_device_list)(context, &mut list) };
        if count < 0 {
            return Err(LocatorError::Libusb {
                call: "libusb_get_device_list",
                code: count as i32,
            });
        }

        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count as usize {
            // SAFETY: libusb returned `count` entries followed by a NULL.
            let device = unsafe { *list.add(index) };
            if device.is_null() {
                break;
            }

            let mut raw = RawDeviceDescriptor::default();
            // SAFETY: `device` is a live entry of `list`; `raw` matches the
            // C descriptor layout.
            let rc = unsafe { (self.api.get_device_descriptor)(device, &mut raw) };
            if rc < 0 {
                warn!("libusb_get_device_descriptor failed with {}", rc);
                continue;
            }

            // SAFETY: as above.
            let (bus_number, address) = unsafe {
                (
                    (self.api.get_bus_number)(device),
                    (self.api.get_device_address)(device),
                )
            };

            devices.push(DeviceInfo {
                bus_number,
                address,
                vendor_id: raw.id_vendor,
                product_id: raw.id_product,
                class: raw.b_device_class,
                subclass: raw.b_device_sub_class,
                protocol: raw.b_device_protocol,
                usb_version: raw.bcd_usb,
            });
        }

        // SAFETY: `list` came from libusb_get_device_list and is freed once.
        unsafe { (self.api.free_device_list)(list, 1) };
        Ok(devices)
    }
}

fn symbol<T: Copy>(library: &Library, path: &Path, name: &'static str) -> Result<T> {
    let mut symbol_name = name.as_bytes().to_vec();
    symbol_name.push(0);
    // SAFETY: every `T` used here is the documented libusb signature.
    unsafe { library.get::<T>(&symbol_name) }
        .map(|s| *s)
        .map_err(|e| LocatorError::Symbol {
            symbol: name,
            path: path.to_path_buf(),
            source: e,
        })
}

impl fmt::Debug for DynamicBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicBackend")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl UsbBackend for DynamicBackend {
    fn name(&self) -> &str {
        "libusb1"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut context: *mut c_void = ptr::null_mut();
        // SAFETY: libusb_init writes a context pointer on success.
        let rc = unsafe { (self.api.init)(&mut context) };
        if rc < 0 {
            return Err(LocatorError::Libusb {
                call: "libusb_init",
                code: rc,
            });
        }

        let result = self.enumerate(context);
        // SAFETY: `context` is released exactly once, after enumeration.
        unsafe { (self.api.exit)(context) };
        result
    }
}

/// Backend over the libusb rusb links against
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBackend;

impl UsbBackend for SystemBackend {
    fn name(&self) -> &str {
        "system"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        use rusb::UsbContext;

        let context = rusb::Context::new()?;
        let list = context.devices()?;

        let mut devices = Vec::with_capacity(list.len());
        for device in list.iter() {
            match device.device_descriptor() {
                Ok(desc) => {
                    let version = desc.usb_version();
                    devices.push(DeviceInfo {
                        bus_number: device.bus_number(),
                        address: device.address(),
                        vendor_id: desc.vendor_id(),
                        product_id: desc.product_id(),
                        class: desc.class_code(),
                        subclass: desc.sub_class_code(),
                        protocol: desc.protocol_code(),
                        usb_version: (u16::from(version.major()) << 8)
                            | (u16::from(version.minor()) << 4)
                            | u16::from(version.sub_minor()),
                    });
                }
                Err(e) => warn!(
                    "Failed to read descriptor for bus {} device {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                ),
            }
        }
        Ok(devices)
    }
}
