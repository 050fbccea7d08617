use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// CPU architecture variants a stack can be assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
  X86_32,
  X86_64,
  Armv7b,
  Armv7l,
  Armv7lhf,
  Armv8l64,
  Armv8b64,
  Ppc64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown architecture: {0}")]
pub struct UnknownArch(pub String);

impl Arch {
  pub const ALL: [Arch; 8] = [
    Arch::X86_32,
    Arch::X86_64,
    Arch::Armv7b,
    Arch::Armv7l,
    Arch::Armv7lhf,
    Arch::Armv8l64,
    Arch::Armv8b64,
    Arch::Ppc64,
  ];

  /// Detect the host CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86" => Some(Self::X86_32),
      "x86_64" => Some(Self::X86_64),
      "arm" => Some(Self::Armv7lhf),
      "aarch64" => Some(Self::Armv8l64),
      "powerpc64" => Some(Self::Ppc64),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_32 => "x86_32",
      Self::X86_64 => "x86_64",
      Self::Armv7b => "armv7b",
      Self::Armv7l => "armv7l",
      Self::Armv7lhf => "armv7lhf",
      Self::Armv8l64 => "armv8l64",
      Self::Armv8b64 => "armv8b64",
      Self::Ppc64 => "ppc64",
    }
  }

  /// CPU field of a GNU target triple.
  pub fn cpu(&self) -> &'static str {
    match self {
      Self::X86_32 => "i686",
      other => other.as_str(),
    }
  }

  /// ABI suffix of a GNU target triple.
  pub fn abi(&self) -> &'static str {
    match self {
      Self::Armv7b | Self::Armv7l | Self::Armv7lhf | Self::Armv8l64 | Self::Armv8b64 => "eabi",
      _ => "",
    }
  }

  /// Returns `<cpu>-<vendor>-linux-gnu<abi>`.
  pub fn target_triple(&self, vendor: &str) -> String {
    format!("{}-{}-linux-gnu{}", self.cpu(), vendor, self.abi())
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = UnknownArch;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|arch| arch.as_str() == s)
      .ok_or_else(|| UnknownArch(s.to_string()))
  }
}
