//! Video codec selection and container format negotiation.
//!
//! The container file type is decided up front from the destination's
//! extension, rejecting codec/extension combinations the target format
//! cannot carry. This runs during start() validation, before any writer
//! or capture source is touched.

use screenreel_common::error::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Supported video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    #[serde(rename = "h264")]
    H264,
    #[serde(rename = "hevc")]
    Hevc,
    #[serde(rename = "proRes422")]
    ProRes422,
    #[serde(rename = "proRes4444")]
    ProRes4444,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::ProRes422 => "proRes422",
            Self::ProRes4444 => "proRes4444",
        }
    }

    /// ProRes variants are only representable in QuickTime containers.
    pub fn is_pro_res(&self) -> bool {
        matches!(self, Self::ProRes422 | Self::ProRes4444)
    }
}

impl FromStr for VideoCodec {
    type Err = RecorderError;

    fn from_str(raw: &str) -> RecorderResult<Self> {
        match raw {
            "h264" => Ok(Self::H264),
            "hevc" => Ok(Self::Hevc),
            "proRes422" => Ok(Self::ProRes422),
            "proRes4444" => Ok(Self::ProRes4444),
            other => Err(RecorderError::UnsupportedCodec(other.to_string())),
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output container file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Mov,
    M4v,
    M4a,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::M4v => "m4v",
            Self::M4a => "m4a",
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::M4a)
    }
}

/// Resolve the container format from the destination's extension.
///
/// Audio-only recordings accept only `.m4a`. Video-capable recordings
/// accept `.mp4`, `.mov` and `.m4v`; ProRes codecs are rejected for
/// everything but `.mov`.
pub fn resolve_container_format(
    destination: &Path,
    audio_only: bool,
    codec: VideoCodec,
) -> RecorderResult<ContainerFormat> {
    let extension = destination
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if audio_only {
        return match extension.as_str() {
            "m4a" => Ok(ContainerFormat::M4a),
            _ => Err(RecorderError::UnsupportedFileExtension {
                extension,
                audio_only: true,
            }),
        };
    }

    match extension.as_str() {
        "mp4" => {
            if codec.is_pro_res() {
                return Err(RecorderError::InvalidCodecForExtension {
                    extension,
                    codec: codec.as_str().to_string(),
                });
            }
            Ok(ContainerFormat::Mp4)
        }
        "mov" => Ok(ContainerFormat::Mov),
        "m4v" => {
            if codec.is_pro_res() {
                return Err(RecorderError::InvalidCodecForExtension {
                    extension,
                    codec: codec.as_str().to_string(),
                });
            }
            Ok(ContainerFormat::M4v)
        }
        _ => Err(RecorderError::UnsupportedFileExtension {
            extension,
            audio_only: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dest(name: &str) -> PathBuf {
        PathBuf::from("/tmp").join(name)
    }

    #[test]
    fn codec_round_trips_through_str() {
        for codec in [
            VideoCodec::H264,
            VideoCodec::Hevc,
            VideoCodec::ProRes422,
            VideoCodec::ProRes4444,
        ] {
            assert_eq!(codec.as_str().parse::<VideoCodec>().unwrap(), codec);
        }
        assert!(matches!(
            "av1".parse::<VideoCodec>(),
            Err(RecorderError::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn audio_only_accepts_m4a_only() {
        assert_eq!(
            resolve_container_format(&dest("out.m4a"), true, VideoCodec::H264).unwrap(),
            ContainerFormat::M4a
        );
        assert!(matches!(
            resolve_container_format(&dest("out.mp4"), true, VideoCodec::H264),
            Err(RecorderError::UnsupportedFileExtension {
                audio_only: true,
                ..
            })
        ));
    }

    #[test]
    fn video_target_rejects_m4a() {
        assert!(matches!(
            resolve_container_format(&dest("out.m4a"), false, VideoCodec::H264),
            Err(RecorderError::UnsupportedFileExtension {
                audio_only: false,
                ..
            })
        ));
    }

    #[test]
    fn pro_res_requires_quicktime_container() {
        assert!(matches!(
            resolve_container_format(&dest("out.mp4"), false, VideoCodec::ProRes4444),
            Err(RecorderError::InvalidCodecForExtension { .. })
        ));
        assert!(matches!(
            resolve_container_format(&dest("out.m4v"), false, VideoCodec::ProRes422),
            Err(RecorderError::InvalidCodecForExtension { .. })
        ));
        assert_eq!(
            resolve_container_format(&dest("out.mov"), false, VideoCodec::ProRes4444).unwrap(),
            ContainerFormat::Mov
        );
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(
            resolve_container_format(&dest("out.MP4"), false, VideoCodec::H264).unwrap(),
            ContainerFormat::Mp4
        );
    }

    #[test]
    fn missing_extension_is_unsupported() {
        assert!(matches!(
            resolve_container_format(&dest("out"), false, VideoCodec::H264),
            Err(RecorderError::UnsupportedFileExtension { extension, .. }) if extension.is_empty()
        ));
    }
}
