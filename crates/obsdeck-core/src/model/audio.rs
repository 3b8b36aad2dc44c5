use serde::Serialize;

/// A mixer channel. `volume` is the linear multiplier, kept in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioChannel {
    pub name: String,
    pub volume: f64,
    pub muted: bool,
}

impl AudioChannel {
    pub fn new(name: impl Into<String>, volume: f64, muted: bool) -> Self {
        Self {
            name: name.into(),
            volume: clamp_volume(volume),
            muted,
        }
    }
}

/// Any OBS input, audio or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputInfo {
    pub name: String,
    pub kind: String,
}

impl InputInfo {
    /// Inputs whose kind mentions `audio` or `capture` are mixer channels.
    pub fn is_audio_candidate(&self) -> bool {
        let kind = self.kind.to_lowercase();
        kind.contains("audio") || kind.contains("capture")
    }
}

pub(crate) fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_clamped() {
        assert!((AudioChannel::new("a", 1.7, false).volume - 1.0).abs() < f64::EPSILON);
        assert!(AudioChannel::new("a", -0.2, false).volume.abs() < f64::EPSILON);
        assert!(AudioChannel::new("a", f64::NAN, false).volume.abs() < f64::EPSILON);
    }

    #[test]
    fn audio_candidates_by_kind() {
        let input = |kind: &str| InputInfo {
            name: "x".into(),
            kind: kind.into(),
        };
        assert!(input("wasapi_input_capture").is_audio_candidate());
        assert!(input("coreaudio_output_capture").is_audio_candidate());
        assert!(input("ffmpeg_source_audio").is_audio_candidate());
        assert!(!input("text_gdiplus_v2").is_audio_candidate());
        assert!(!input("image_source").is_audio_candidate());
    }
}
