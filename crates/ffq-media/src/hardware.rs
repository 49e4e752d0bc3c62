//! Hardware encoder capability detection.
//!
//! Runs once per process and is cached; the selected capability is advisory
//! and only surfaced in results. Platform probe order: macOS checks
//! VideoToolbox; Linux checks NVIDIA, Intel QSV, AMD AMF, then generic
//! VAAPI; Windows checks NVIDIA, QSV, AMF. Anything else (or no match)
//! falls back to software encoders.

use std::process::Command;
use std::sync::Mutex;

/// Available hardware acceleration families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelKind {
    None,
    Nvenc,
    Qsv,
    Amf,
    Vaapi,
    VideoToolbox,
}

impl AccelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccelKind::None => "none",
            AccelKind::Nvenc => "nvenc",
            AccelKind::Qsv => "qsv",
            AccelKind::Amf => "amf",
            AccelKind::Vaapi => "vaapi",
            AccelKind::VideoToolbox => "videotoolbox",
        }
    }
}

/// Detected encoder capability.
#[derive(Debug, Clone)]
pub struct HardwareCapabilities {
    pub accel: AccelKind,
    /// FFmpeg encoder name for H.264.
    pub h264_encoder: &'static str,
    /// FFmpeg encoder name for HEVC.
    pub hevc_encoder: &'static str,
    /// Extra ffmpeg args for device selection (e.g. VAAPI render node).
    pub device_args: Vec<String>,
}

impl HardwareCapabilities {
    fn software() -> Self {
        Self {
            accel: AccelKind::None,
            h264_encoder: "libx264",
            hevc_encoder: "libx265",
            device_args: Vec::new(),
        }
    }
}

static DETECTED: Mutex<Option<HardwareCapabilities>> = Mutex::new(None);

/// Detect hardware acceleration. The first call probes; later calls return
/// the cached result.
pub fn detect_hardware() -> HardwareCapabilities {
    let mut cache = DETECTED.lock().expect("hardware cache poisoned");
    if let Some(caps) = cache.as_ref() {
        return caps.clone();
    }
    let caps = probe_platform();
    *cache = Some(caps.clone());
    caps
}

/// Clear the cached detection so the next call re-probes. Test hook.
#[cfg(test)]
pub(crate) fn reset_detection() {
    *DETECTED.lock().expect("hardware cache poisoned") = None;
}

fn probe_platform() -> HardwareCapabilities {
    if cfg!(target_os = "macos") {
        if encoder_present("h264_videotoolbox") {
            return HardwareCapabilities {
                accel: AccelKind::VideoToolbox,
                h264_encoder: "h264_videotoolbox",
                hevc_encoder: "hevc_videotoolbox",
                device_args: Vec::new(),
            };
        }
    } else if cfg!(target_os = "linux") {
        if check_nvidia() {
            return HardwareCapabilities {
                accel: AccelKind::Nvenc,
                h264_encoder: "h264_nvenc",
                hevc_encoder: "hevc_nvenc",
                device_args: Vec::new(),
            };
        }
        if check_qsv() {
            return HardwareCapabilities {
                accel: AccelKind::Qsv,
                h264_encoder: "h264_qsv",
                hevc_encoder: "hevc_qsv",
                device_args: Vec::new(),
            };
        }
        if encoder_present("h264_amf") {
            return HardwareCapabilities {
                accel: AccelKind::Amf,
                h264_encoder: "h264_amf",
                hevc_encoder: "hevc_amf",
                device_args: Vec::new(),
            };
        }
        if check_vaapi() {
            return HardwareCapabilities {
                accel: AccelKind::Vaapi,
                h264_encoder: "h264_vaapi",
                hevc_encoder: "hevc_vaapi",
                device_args: vec![
                    "-vaapi_device".to_string(),
                    "/dev/dri/renderD128".to_string(),
                ],
            };
        }
    } else if cfg!(target_os = "windows") {
        if check_nvidia() {
            return HardwareCapabilities {
                accel: AccelKind::Nvenc,
                h264_encoder: "h264_nvenc",
                hevc_encoder: "hevc_nvenc",
                device_args: Vec::new(),
            };
        }
        if encoder_present("h264_qsv") {
            return HardwareCapabilities {
                accel: AccelKind::Qsv,
                h264_encoder: "h264_qsv",
                hevc_encoder: "hevc_qsv",
                device_args: Vec::new(),
            };
        }
        if encoder_present("h264_amf") {
            return HardwareCapabilities {
                accel: AccelKind::Amf,
                h264_encoder: "h264_amf",
                hevc_encoder: "hevc_amf",
                device_args: Vec::new(),
            };
        }
    }

    HardwareCapabilities::software()
}

fn check_nvidia() -> bool {
    let listed = Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .map(|out| out.status.success() && String::from_utf8_lossy(&out.stdout).contains("GPU"))
        .unwrap_or(false);
    listed && encoder_present("h264_nvenc")
}

fn check_qsv() -> bool {
    if !render_node_present() {
        return false;
    }
    encoder_present("h264_qsv")
}

fn check_vaapi() -> bool {
    std::path::Path::new("/dev/dri/renderD128").exists() && encoder_present("h264_vaapi")
}

fn render_node_present() -> bool {
    std::fs::read_dir("/dev/dri")
        .map(|entries| {
            entries
                .flatten()
                .any(|e| e.file_name().to_string_lossy().starts_with("renderD"))
        })
        .unwrap_or(false)
}

/// Scan the tool's encoder listing for a known encoder name.
fn encoder_present(encoder: &str) -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|out| out.status.success() && String::from_utf8_lossy(&out.stdout).contains(encoder))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_tags() {
        assert_eq!(AccelKind::None.as_str(), "none");
        assert_eq!(AccelKind::Nvenc.as_str(), "nvenc");
        assert_eq!(AccelKind::VideoToolbox.as_str(), "videotoolbox");
    }

    #[test]
    fn software_fallback_names() {
        let caps = HardwareCapabilities::software();
        assert_eq!(caps.accel, AccelKind::None);
        assert_eq!(caps.h264_encoder, "libx264");
        assert_eq!(caps.hevc_encoder, "libx265");
        assert!(caps.device_args.is_empty());
    }

    #[test]
    fn detection_is_cached_and_resettable() {
        reset_detection();
        let first = detect_hardware();
        let second = detect_hardware();
        assert_eq!(first.accel, second.accel);
        reset_detection();
        let third = detect_hardware();
        assert_eq!(first.accel, third.accel);
    }
}
