//! Platform normalization and matching
//!
//! Architecture aliases (`x86_64`, `aarch64`, ...) are normalized to their
//! OCI names before comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target platform of an image or build step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variant: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: String::new(),
        }
    }

    /// Platform of the running host
    pub fn host() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH).normalize()
    }

    /// Legacy records carry neither OS nor architecture
    pub fn is_unset(&self) -> bool {
        self.os.is_empty() && self.architecture.is_empty()
    }

    /// Canonical OCI form of this platform
    pub fn normalize(&self) -> Self {
        let os = self.os.to_lowercase();
        let arch = self.architecture.to_lowercase();
        let variant = self.variant.to_lowercase();

        let (architecture, variant) = match arch.as_str() {
            "x86_64" | "x86-64" | "amd64" => ("amd64".to_string(), variant),
            "i386" | "i686" | "x86" => ("386".to_string(), variant),
            "aarch64" | "arm64" => {
                let variant = if variant == "v8" { String::new() } else { variant };
                ("arm64".to_string(), variant)
            }
            "armhf" => ("arm".to_string(), "v7".to_string()),
            "armel" => ("arm".to_string(), "v6".to_string()),
            "arm" if variant.is_empty() => ("arm".to_string(), "v7".to_string()),
            _ => (arch, variant),
        };

        Self {
            os,
            architecture,
            variant,
        }
    }

    /// Whether an image for `candidate` can serve a build for `self`.
    ///
    /// A variant is only compared when both sides declare one.
    pub fn matches(&self, candidate: &Platform) -> bool {
        let want = self.normalize();
        let have = candidate.normalize();

        if want.os != have.os || want.architecture != have.architecture {
            return false;
        }
        want.variant.is_empty() || have.variant.is_empty() || want.variant == have.variant
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if !self.variant.is_empty() {
            write!(f, "/{}", self.variant)?;
        }
        Ok(())
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Parse `os/arch[/variant]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Self::new(*os, *arch)),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: variant.to_string(),
            }),
            _ => Err(format!("invalid platform '{}': expected os/arch[/variant]", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize() {
        assert!(Platform::new("linux", "amd64").matches(&Platform::new("linux", "x86_64")));
        assert!(Platform::new("Linux", "aarch64").matches(&Platform::new("linux", "arm64")));
        assert!(!Platform::new("linux", "amd64").matches(&Platform::new("linux", "arm64")));
        assert!(!Platform::new("linux", "amd64").matches(&Platform::new("windows", "amd64")));
    }

    #[test]
    fn variant_compared_only_when_both_set() {
        let v7: Platform = "linux/arm/v7".parse().unwrap();
        let v6: Platform = "linux/arm/v6".parse().unwrap();
        assert!(!v7.matches(&v6));

        let arm64: Platform = "linux/arm64".parse().unwrap();
        let arm64_v8: Platform = "linux/arm64/v8".parse().unwrap();
        assert!(arm64.matches(&arm64_v8));
    }

    #[test]
    fn parse_and_display() {
        let p: Platform = "linux/arm/v7".parse().unwrap();
        assert_eq!(p.to_string(), "linux/arm/v7");
        assert!("linux".parse::<Platform>().is_err());
        assert!("/amd64".parse::<Platform>().is_err());
    }

    #[test]
    fn unset_platform() {
        assert!(Platform::default().is_unset());
        assert!(!Platform::host().is_unset());
    }
}
