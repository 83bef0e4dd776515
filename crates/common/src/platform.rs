//! Platform descriptor
//!
//! Every platform-dependent decision in the workspace (which toolchain builds
//! libusb, what the shared library is called, whether the `lib` prefix is
//! accepted during lookup) is answered by a [`Platform`]. It is resolved once
//! and passed explicitly, so the build and lookup logic can be exercised for
//! every platform on any host.

use std::fmt;

/// File stem of the libusb shared library on every platform
pub const LIBRARY_STEM: &str = "libusb-1.0";

/// Operating system family
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
    /// Any other OS, named as in the target triple or `std::env::consts::OS`
    Other(String),
}

impl Os {
    fn from_name(name: &str) -> Self {
        match name {
            "linux" => Os::Linux,
            "macos" | "darwin" => Os::MacOs,
            "windows" => Os::Windows,
            other => Os::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Linux => write!(f, "linux"),
            Os::MacOs => write!(f, "macos"),
            Os::Windows => write!(f, "windows"),
            Os::Other(name) => write!(f, "{}", name),
        }
    }
}

/// External toolchain used to build the native library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolchainKind {
    /// bootstrap.sh, configure, make
    Autotools,
    /// Visual Studio project file build
    MsBuild,
}

/// Immutable description of the platform being built for or running on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: String,
    pub pointer_width: u32,
    pub toolchain: ToolchainKind,
}

impl Platform {
    /// Describe the platform this binary was compiled for
    pub fn host() -> Self {
        let os = Os::from_name(std::env::consts::OS);
        let pointer_width = if cfg!(target_pointer_width = "64") {
            64
        } else if cfg!(target_pointer_width = "16") {
            16
        } else {
            32
        };
        let toolchain = if os == Os::Windows && cfg!(target_env = "msvc") {
            ToolchainKind::MsBuild
        } else {
            ToolchainKind::Autotools
        };

        Self {
            os,
            arch: std::env::consts::ARCH.to_string(),
            pointer_width,
            toolchain,
        }
    }

    /// Describe a platform from a Rust target triple
    ///
    /// Only the architecture, OS and environment components are inspected.
    /// `*-windows-msvc` selects the project-file build, every other triple
    /// (including `*-windows-gnu`) selects autotools.
    ///
    /// # Example
    /// ```
    /// use common::{Os, Platform, ToolchainKind};
    ///
    /// let platform = Platform::from_target_triple("aarch64-apple-darwin").unwrap();
    /// assert_eq!(platform.os, Os::MacOs);
    /// assert_eq!(platform.toolchain, ToolchainKind::Autotools);
    /// assert_eq!(platform.shared_library_suffix(), ".dylib");
    /// ```
    pub fn from_target_triple(triple: &str) -> crate::Result<Self> {
        let parts: Vec<&str> = triple.split('-').collect();
        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(crate::Error::Platform(format!(
                "Invalid target triple '{}'",
                triple
            )));
        }

        let arch = parts[0].to_string();
        let os = if triple.contains("-linux") {
            Os::Linux
        } else if triple.contains("-darwin") || triple.contains("-macos") {
            Os::MacOs
        } else if triple.contains("-windows") {
            Os::Windows
        } else {
            // arch-vendor-os[-env]; two-part triples carry the OS second
            let os_part = if parts.len() >= 3 { parts[2] } else { parts[1] };
            Os::from_name(os_part)
        };
        let toolchain = if os == Os::Windows && triple.ends_with("-msvc") {
            ToolchainKind::MsBuild
        } else {
            ToolchainKind::Autotools
        };
        let pointer_width = if arch.contains("64") { 64 } else { 32 };

        Ok(Self {
            os,
            arch,
            pointer_width,
            toolchain,
        })
    }

    /// Shared library file extension, including the leading dot
    pub fn shared_library_suffix(&self) -> &'static str {
        match self.os {
            Os::MacOs => ".dylib",
            Os::Windows => ".dll",
            Os::Linux | Os::Other(_) => ".so",
        }
    }

    /// File name of the libusb shared library produced on this platform
    pub fn library_file_name(&self) -> String {
        format!("{}{}", LIBRARY_STEM, self.shared_library_suffix())
    }

    /// Whether lookups also accept `lib` + candidate
    ///
    /// Only Linux callers ask for `usb-1.0` while the file is `libusb-1.0.so`.
    pub fn accepts_lib_prefix(&self) -> bool {
        self.os == Os::Linux
    }

    /// MSBuild `Platform` property for this pointer width
    pub fn msbuild_platform(&self) -> &'static str {
        if self.pointer_width == 64 { "x64" } else { "Win32" }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{} ({}-bit, {:?})",
            self.arch, self.os, self.pointer_width, self.toolchain
        )
    }
}
