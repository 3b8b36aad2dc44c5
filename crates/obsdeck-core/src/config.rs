// ── Runtime session settings ──
//
// Timing, automation rules and presets for a `Session`. Built by the
// CLI (via obsdeck-config) and handed in -- core never reads files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The exclusive audio pair and the scene-name fragments that pick a side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusiveAudio {
    pub channel_a: String,
    pub channel_b: String,
    /// Case-insensitive fragments of a program scene name that select A.
    #[serde(default)]
    pub prefer_a: Vec<String>,
    /// Case-insensitive fragments of a program scene name that select B.
    #[serde(default)]
    pub prefer_b: Vec<String>,
}

impl Default for ExclusiveAudio {
    fn default() -> Self {
        Self {
            channel_a: "Audio Mesa Blackmagic".into(),
            channel_b: "Audio Mesa Som".into(),
            prefer_a: vec!["móvel".into(), "movel".into()],
            prefer_b: vec!["principal".into(), "mesa".into()],
        }
    }
}

impl ExclusiveAudio {
    /// The other half of the pair, if `channel` belongs to it.
    pub fn partner(&self, channel: &str) -> Option<&str> {
        if channel == self.channel_a {
            Some(&self.channel_b)
        } else if channel == self.channel_b {
            Some(&self.channel_a)
        } else {
            None
        }
    }

    /// Which channel should be live for a program scene. A is checked first.
    pub fn channel_for_scene(&self, scene_name: &str) -> Option<&str> {
        let scene = scene_name.to_lowercase();
        let hit = |fragments: &[String]| {
            fragments
                .iter()
                .any(|f| !f.is_empty() && scene.contains(&f.to_lowercase()))
        };
        if hit(&self.prefer_a) {
            Some(&self.channel_a)
        } else if hit(&self.prefer_b) {
            Some(&self.channel_b)
        } else {
            None
        }
    }
}

/// Scene names the macros cut to. Matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneRoles {
    pub opening: String,
    pub closing: String,
    pub panic: String,
}

impl Default for SceneRoles {
    fn default() -> Self {
        Self {
            opening: "Abertura".into(),
            closing: "Final".into(),
            panic: "Cena de Pânico".into(),
        }
    }
}

/// One channel adjustment inside an audio preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSetting {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl ChannelSetting {
    fn new(channel: &str, volume: Option<f64>, muted: Option<bool>) -> Self {
        Self {
            channel: channel.to_owned(),
            volume,
            muted,
        }
    }
}

/// A named mix applied channel by channel, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioPreset {
    #[serde(default)]
    pub channels: Vec<ChannelSetting>,
}

/// The stock `worship`, `sermon` and `service` mixes, built around the
/// pair's desk channel (B).
pub fn builtin_presets(exclusive: &ExclusiveAudio) -> BTreeMap<String, AudioPreset> {
    let desk = exclusive.channel_b.as_str();
    let preacher = "Mic Pregador";
    let mut presets = BTreeMap::new();
    presets.insert(
        "worship".to_owned(),
        AudioPreset {
            channels: vec![
                ChannelSetting::new(desk, Some(0.9), Some(false)),
                ChannelSetting::new(preacher, None, Some(true)),
            ],
        },
    );
    presets.insert(
        "sermon".to_owned(),
        AudioPreset {
            channels: vec![
                ChannelSetting::new(desk, Some(0.5), Some(false)),
                ChannelSetting::new(preacher, Some(1.0), Some(false)),
            ],
        },
    );
    presets.insert(
        "service".to_owned(),
        AudioPreset {
            channels: vec![ChannelSetting::new(desk, Some(0.8), Some(false))],
        },
    );
    presets
}

/// Everything a `Session` needs besides the connector.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Health poll period while connected.
    pub heartbeat_interval: Duration,
    /// Consecutive failed polls that count as a dropped link.
    pub heartbeat_failure_threshold: u32,
    /// Delay before the first retry after an unexpected drop.
    pub first_retry_delay: Duration,
    /// Delay between subsequent failed retries.
    pub retry_delay: Duration,
    /// Pause between the closing scene and stopping outputs.
    pub end_grace: Duration,
    /// Entries kept in the log feed.
    pub log_capacity: usize,
    /// `None` disables the exclusive-audio rule entirely.
    pub exclusive_audio: Option<ExclusiveAudio>,
    pub scene_roles: SceneRoles,
    pub audio_presets: BTreeMap<String, AudioPreset>,
    /// Vendor that receives PTZ requests.
    pub ptz_vendor: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let exclusive = ExclusiveAudio::default();
        let audio_presets = builtin_presets(&exclusive);
        Self {
            heartbeat_interval: Duration::from_secs(1),
            heartbeat_failure_threshold: 3,
            first_retry_delay: Duration::from_secs(2),
            retry_delay: Duration::from_secs(5),
            end_grace: Duration::from_secs(5),
            log_capacity: 50,
            exclusive_audio: Some(exclusive),
            scene_roles: SceneRoles::default(),
            audio_presets,
            ptz_vendor: "obs-ptz".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_fragments_pick_channel() {
        let ex = ExclusiveAudio::default();
        assert_eq!(ex.channel_for_scene("Câmera Móvel 1"), Some("Audio Mesa Blackmagic"));
        assert_eq!(ex.channel_for_scene("camera MOVEL"), Some("Audio Mesa Blackmagic"));
        assert_eq!(ex.channel_for_scene("Principal"), Some("Audio Mesa Som"));
        assert_eq!(ex.channel_for_scene("Plano da Mesa"), Some("Audio Mesa Som"));
        assert_eq!(ex.channel_for_scene("Abertura"), None);
    }

    #[test]
    fn partner_is_symmetric() {
        let ex = ExclusiveAudio::default();
        assert_eq!(ex.partner("Audio Mesa Som"), Some("Audio Mesa Blackmagic"));
        assert_eq!(ex.partner("Audio Mesa Blackmagic"), Some("Audio Mesa Som"));
        assert_eq!(ex.partner("Mic Pregador"), None);
    }

    #[test]
    fn defaults_ship_three_presets() {
        let settings = SessionSettings::default();
        let names: Vec<_> = settings.audio_presets.keys().cloned().collect();
        assert_eq!(names, ["sermon", "service", "worship"]);
        assert_eq!(settings.heartbeat_failure_threshold, 3);
        assert_eq!(settings.log_capacity, 50);
    }
}
