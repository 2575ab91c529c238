//! Host platform detection.

use std::fmt;

/// Operating system family of the build host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    Darwin,
    Windows,
    Unknown,
}

impl HostOs {
    /// Classify an OS name as reported by `std::env::consts::OS`.
    pub fn from_os_name(name: &str) -> Self {
        match name {
            "linux" => HostOs::Linux,
            "macos" | "darwin" => HostOs::Darwin,
            "windows" => HostOs::Windows,
            _ => HostOs::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Linux => "linux",
            HostOs::Darwin => "darwin",
            HostOs::Windows => "windows",
            HostOs::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized machine architecture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    X86,
    Aarch64,
    Arm64,
    /// Anything else, kept as reported
    Other(String),
}

impl Arch {
    /// Normalize a machine string for the given OS.
    ///
    /// 64-bit ARM is `arm64` on darwin and `aarch64` elsewhere.
    pub fn normalize(machine: &str, os: HostOs) -> Self {
        match machine.to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Arch::X64,
            "i386" | "i686" | "x86" => Arch::X86,
            "aarch64" | "arm64" => {
                if os == HostOs::Darwin {
                    Arch::Arm64
                } else {
                    Arch::Aarch64
                }
            }
            _ => Arch::Other(machine.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Arch::X64 => "x64",
            Arch::X86 => "x86",
            Arch::Aarch64 => "aarch64",
            Arch::Arm64 => "arm64",
            Arch::Other(s) => s,
        }
    }

    /// Machine name as used in wheel platform tags.
    pub fn wheel_machine(&self) -> &str {
        match self {
            Arch::X64 => "x86_64",
            Arch::X86 => "i686",
            Arch::Aarch64 => "aarch64",
            Arch::Arm64 => "arm64",
            Arch::Other(s) => s,
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The build host: OS and architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: HostOs,
    pub arch: Arch,
}

impl HostPlatform {
    pub fn new(os: HostOs, arch: Arch) -> Self {
        HostPlatform { os, arch }
    }

    /// Detect the platform this binary is running on.
    pub fn detect() -> Self {
        let os = HostOs::from_os_name(std::env::consts::OS);
        let arch = Arch::normalize(std::env::consts::ARCH, os);
        HostPlatform { os, arch }
    }

    /// Short identifier such as `linux-x64`.
    pub fn tag(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}
