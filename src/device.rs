//! Device preference and resolution policy
//!
//! The user's `--gpu`/`--cpu` flags are folded into a [`DevicePreference`]
//! exactly once at parse time; [`resolve`] turns that preference plus the
//! locally available hardware into a single [`ResolvedDevice`]. Capability
//! probing sits behind [`CapabilityProbe`] so the policy can be tested
//! without real hardware.

use std::fmt;
use std::process::Command;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("cannot specify both --gpu and --cpu")]
    ConflictingFlags,
}

/// User-requested device, derived once from the `--gpu`/`--cpu` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    Auto,
    ForceAccelerator,
    ForceCpu,
}

impl DevicePreference {
    /// Fold the two boolean flags into a preference.
    ///
    /// Both flags set is a user authoring error and must abort before any
    /// pipeline work starts.
    pub fn from_flags(gpu: bool, cpu: bool) -> Result<Self, DeviceError> {
        match (gpu, cpu) {
            (true, true) => Err(DeviceError::ConflictingFlags),
            (true, false) => Ok(Self::ForceAccelerator),
            (false, true) => Ok(Self::ForceCpu),
            (false, false) => Ok(Self::Auto),
        }
    }
}

/// Snapshot of the accelerators visible to this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityReport {
    pub cuda_available: bool,
    pub cuda_device_name: Option<String>,
    pub metal_available: bool,
}

/// Source of hardware capability information.
pub trait CapabilityProbe {
    fn query(&self) -> CapabilityReport;
}

/// Probe backed by candle's backend availability checks.
///
/// A build without the `cuda`/`metal` features reports no accelerator,
/// which is the honest answer: the binary could not use one anyway.
pub struct CandleProbe;

impl CapabilityProbe for CandleProbe {
    fn query(&self) -> CapabilityReport {
        let cuda_available = candle_core::utils::cuda_is_available();
        let cuda_device_name = if cuda_available {
            nvidia_device_name()
        } else {
            None
        };
        CapabilityReport {
            cuda_available,
            cuda_device_name,
            metal_available: candle_core::utils::metal_is_available(),
        }
    }
}

/// Ask nvidia-smi for the first GPU's marketing name.
fn nvidia_device_name() -> Option<String> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .ok()?;
    let text = String::from_utf8(output.stdout).ok()?;
    let name = text.lines().next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// The execution target a pipeline runs on. Produced once per process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedDevice {
    Cpu,
    Cuda { name: Option<String> },
    Metal,
}

impl ResolvedDevice {
    /// Map the resolved target onto a candle device.
    pub fn to_candle(&self) -> candle_core::Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda { .. } => candle_core::Device::new_cuda(0),
            Self::Metal => candle_core::Device::new_metal(0),
        }
    }
}

impl fmt::Display for ResolvedDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda { name: Some(name) } => write!(f, "CUDA GPU ({name})"),
            Self::Cuda { name: None } => write!(f, "CUDA GPU"),
            Self::Metal => write!(f, "Apple Silicon GPU (Metal)"),
        }
    }
}

/// Outcome of device resolution.
///
/// `fallback` carries the single warning emitted when a forced
/// accelerator is unavailable; degradation to CPU is routine, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub device: ResolvedDevice,
    pub fallback: Option<String>,
}

/// Apply the selection policy: CUDA first, then Metal, then CPU.
pub fn resolve(preference: DevicePreference, caps: &CapabilityReport) -> Resolution {
    match preference {
        DevicePreference::ForceAccelerator => {
            if caps.cuda_available {
                Resolution {
                    device: ResolvedDevice::Cuda {
                        name: caps.cuda_device_name.clone(),
                    },
                    fallback: None,
                }
            } else if caps.metal_available {
                Resolution {
                    device: ResolvedDevice::Metal,
                    fallback: None,
                }
            } else {
                Resolution {
                    device: ResolvedDevice::Cpu,
                    fallback: Some(
                        "GPU requested but no compatible GPU found, using CPU instead".to_string(),
                    ),
                }
            }
        }
        DevicePreference::ForceCpu => Resolution {
            device: ResolvedDevice::Cpu,
            fallback: None,
        },
        DevicePreference::Auto => Resolution {
            device: auto_detect(caps),
            fallback: None,
        },
    }
}

/// Pick the best available device with no forcing and no warning.
pub fn auto_detect(caps: &CapabilityReport) -> ResolvedDevice {
    if caps.cuda_available {
        ResolvedDevice::Cuda {
            name: caps.cuda_device_name.clone(),
        }
    } else if caps.metal_available {
        ResolvedDevice::Metal
    } else {
        ResolvedDevice::Cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_both_flags_when_from_flags_then_conflict() {
        assert!(DevicePreference::from_flags(true, true).is_err());
    }

    #[test]
    fn given_no_flags_when_from_flags_then_auto() {
        assert_eq!(
            DevicePreference::from_flags(false, false).unwrap(),
            DevicePreference::Auto
        );
    }

    #[test]
    fn given_cpu_build_when_candle_probe_then_no_accelerator_claimed() {
        // Without the cuda/metal features this must report nothing.
        if cfg!(not(any(feature = "cuda", feature = "metal"))) {
            let caps = CandleProbe.query();
            assert!(!caps.cuda_available);
            assert!(!caps.metal_available);
        }
    }
}
