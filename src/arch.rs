// src/arch.rs

//! Target architecture classes
//!
//! Wrapper modules for architecture-variant units carry the architecture in
//! their file name. The generated package's build script compares that name
//! against cargo's `CARGO_CFG_TARGET_ARCH`, so the names here follow Rust's
//! `target_arch` spelling.

use serde::{Deserialize, Serialize};

/// Machine word size of an architecture class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WordSize {
    Bits32,
    Bits64,
}

/// Architecture classes the wrapped package supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    /// x86_64 / AMD64
    X86_64,
    /// AArch64 / ARM64
    Aarch64,
    /// 32-bit x86
    X86,
    /// 32-bit ARM
    Arm,
}

impl Arch {
    /// Every supported architecture class, in output order
    pub const ALL: [Arch; 4] = [Arch::X86_64, Arch::Aarch64, Arch::X86, Arch::Arm];

    /// Name as cargo reports it in `CARGO_CFG_TARGET_ARCH`
    pub fn name(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::X86 => "x86",
            Self::Arm => "arm",
        }
    }

    pub fn word_size(&self) -> WordSize {
        match self {
            Self::X86_64 | Self::Aarch64 => WordSize::Bits64,
            Self::X86 | Self::Arm => WordSize::Bits32,
        }
    }

    /// Parse from string, accepting the common toolchain and distro aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            "x86" | "i386" | "i686" | "386" => Some(Self::X86),
            "arm" | "armv7" => Some(Self::Arm),
            _ => None,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
