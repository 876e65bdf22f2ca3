//! ScreenReel device enumeration contracts.
//!
//! Cross-platform display/window/audio-device data structures and the
//! inventory trait the recording session uses to resolve a requested target
//! id to a concrete device, without coupling to a concrete OS backend.

use screenreel_common::error::RecorderResult;
use serde::{Deserialize, Serialize};
use std::sync::Once;

/// Information about a connected display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScreenInfo {
    /// Stable display identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Position in the virtual desktop (pixels).
    pub x: i32,
    pub y: i32,
    /// Scale factor (for example 1.0, 1.25, 2.0).
    pub scale_factor: f64,
    /// Whether this display is primary.
    pub primary: bool,
}

impl ScreenInfo {
    /// Logical resolution (physical / scale).
    pub fn logical_width(&self) -> u32 {
        (self.width as f64 / self.scale_factor) as u32
    }

    pub fn logical_height(&self) -> u32 {
        (self.height as f64 / self.scale_factor) as u32
    }
}

/// Window placement in the virtual desktop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Information about a capturable window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    /// Stable window identifier.
    pub id: String,
    pub title: Option<String>,
    pub app_name: Option<String>,
    pub app_bundle_id: Option<String>,
    pub is_active: bool,
    pub is_on_screen: bool,
    /// Stacking layer; 0 is the normal window layer.
    pub layer: i32,
    pub frame: Bounds,
}

/// Information about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputInfo {
    pub id: String,
    pub name: String,
}

/// Information about an external capture device (phone, capture card).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDeviceInfo {
    pub id: String,
    pub name: String,
}

/// Resolves target identifiers to concrete displays/windows/devices.
///
/// Implementations wrap the platform's enumeration APIs. Enumeration
/// failures caused by a denied capture permission surface as
/// `RecorderError::NoPermissions`.
#[async_trait::async_trait]
pub trait DeviceInventory: Send + Sync {
    /// Connected displays, primary first where the platform reports one.
    async fn screens(&self) -> RecorderResult<Vec<ScreenInfo>>;

    /// Capturable windows.
    async fn windows(&self) -> RecorderResult<Vec<WindowInfo>>;

    /// Audio input devices (built-in and external microphones).
    fn audio_inputs(&self) -> Vec<AudioInputInfo>;

    /// External capture devices. Callers invoke `enable_capture_devices`
    /// before the first enumeration.
    fn external_devices(&self) -> Vec<ExternalDeviceInfo>;

    /// Channel count of the given audio input, or None if the device is not
    /// connected.
    fn microphone_channels(&self, device_id: &str) -> Option<u32>;

    /// Enable process-wide discovery of external capture devices.
    /// Explicit and idempotent; safe to call repeatedly.
    fn enable_capture_devices(&self);

    /// Whether the process holds screen capture permissions.
    async fn has_permissions(&self) -> bool {
        self.screens().await.is_ok()
    }
}

/// One-shot guard for process-wide enablement side effects.
///
/// Backends use this to make `enable_capture_devices` idempotent: the
/// closure runs on the first call only.
pub struct DeviceEnablement {
    once: Once,
}

impl DeviceEnablement {
    pub const fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Run `enable` if it has not run yet in this process.
    pub fn ensure(&self, enable: impl FnOnce()) {
        self.once.call_once(|| {
            tracing::debug!("Enabling external capture devices");
            enable();
        });
    }
}

impl Default for DeviceEnablement {
    fn default() -> Self {
        Self::new()
    }
}
