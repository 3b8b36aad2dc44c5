//! Typed push notifications from the remote engine.
//!
//! Only the events the state synchronizer reacts to get their own
//! variant; anything else is surfaced as [`RemoteEvent::Other`] so
//! nothing the server sends is silently dropped.

use serde::Deserialize;
use serde_json::Value;

/// A decoded obs-websocket event.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    CurrentProgramSceneChanged { scene_name: String },
    CurrentPreviewSceneChanged { scene_name: String },
    SceneListChanged,
    InputMuteStateChanged { input_name: String, muted: bool },
    InputVolumeChanged { input_name: String, volume_mul: f64 },
    InputCreated { input_name: String, input_kind: String },
    InputRemoved { input_name: String },
    InputNameChanged { old_name: String, new_name: String },
    CurrentSceneTransitionChanged { transition_name: String },
    CurrentSceneTransitionDurationChanged { duration_ms: u32 },
    StreamStateChanged { active: bool },
    RecordStateChanged { active: bool },
    StudioModeStateChanged { enabled: bool },
    ExitStarted,
    Other { event_type: String, data: Value },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneNamed {
    scene_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputMute {
    input_name: String,
    input_muted: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputVolume {
    input_name: String,
    input_volume_mul: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputCreated {
    input_name: String,
    #[serde(default)]
    input_kind: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputNamed {
    input_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputRenamed {
    old_input_name: String,
    input_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransitionNamed {
    transition_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransitionDuration {
    transition_duration: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputState {
    output_active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudioMode {
    studio_mode_enabled: bool,
}

impl RemoteEvent {
    /// Decode an event from its `eventType` and `eventData`.
    ///
    /// A known event type whose payload does not match the expected shape
    /// degrades to [`RemoteEvent::Other`] rather than failing.
    pub fn decode(event_type: &str, data: Option<Value>) -> Self {
        let data = data.unwrap_or(Value::Null);
        match Self::decode_known(event_type, &data) {
            Some(event) => event,
            None => Self::Other {
                event_type: event_type.to_owned(),
                data,
            },
        }
    }

    fn decode_known(event_type: &str, data: &Value) -> Option<Self> {
        fn parse<T: for<'de> Deserialize<'de>>(data: &Value) -> Option<T> {
            T::deserialize(data).ok()
        }

        let event = match event_type {
            "CurrentProgramSceneChanged" => Self::CurrentProgramSceneChanged {
                scene_name: parse::<SceneNamed>(data)?.scene_name,
            },
            "CurrentPreviewSceneChanged" => Self::CurrentPreviewSceneChanged {
                scene_name: parse::<SceneNamed>(data)?.scene_name,
            },
            "SceneListChanged" => Self::SceneListChanged,
            "InputMuteStateChanged" => {
                let p = parse::<InputMute>(data)?;
                Self::InputMuteStateChanged {
                    input_name: p.input_name,
                    muted: p.input_muted,
                }
            }
            "InputVolumeChanged" => {
                let p = parse::<InputVolume>(data)?;
                Self::InputVolumeChanged {
                    input_name: p.input_name,
                    volume_mul: p.input_volume_mul,
                }
            }
            "InputCreated" => {
                let p = parse::<InputCreated>(data)?;
                Self::InputCreated {
                    input_name: p.input_name,
                    input_kind: p.input_kind,
                }
            }
            "InputRemoved" => Self::InputRemoved {
                input_name: parse::<InputNamed>(data)?.input_name,
            },
            "InputNameChanged" => {
                let p = parse::<InputRenamed>(data)?;
                Self::InputNameChanged {
                    old_name: p.old_input_name,
                    new_name: p.input_name,
                }
            }
            "CurrentSceneTransitionChanged" => Self::CurrentSceneTransitionChanged {
                transition_name: parse::<TransitionNamed>(data)?.transition_name,
            },
            "CurrentSceneTransitionDurationChanged" => {
                Self::CurrentSceneTransitionDurationChanged {
                    duration_ms: parse::<TransitionDuration>(data)?.transition_duration,
                }
            }
            "StreamStateChanged" => Self::StreamStateChanged {
                active: parse::<OutputState>(data)?.output_active,
            },
            "RecordStateChanged" => Self::RecordStateChanged {
                active: parse::<OutputState>(data)?.output_active,
            },
            "StudioModeStateChanged" => Self::StudioModeStateChanged {
                enabled: parse::<StudioMode>(data)?.studio_mode_enabled,
            },
            "ExitStarted" => Self::ExitStarted,
            _ => return None,
        };
        Some(event)
    }

    /// The obs-websocket `eventType` name.
    pub fn event_type(&self) -> &str {
        match self {
            Self::CurrentProgramSceneChanged { .. } => "CurrentProgramSceneChanged",
            Self::CurrentPreviewSceneChanged { .. } => "CurrentPreviewSceneChanged",
            Self::SceneListChanged => "SceneListChanged",
            Self::InputMuteStateChanged { .. } => "InputMuteStateChanged",
            Self::InputVolumeChanged { .. } => "InputVolumeChanged",
            Self::InputCreated { .. } => "InputCreated",
            Self::InputRemoved { .. } => "InputRemoved",
            Self::InputNameChanged { .. } => "InputNameChanged",
            Self::CurrentSceneTransitionChanged { .. } => "CurrentSceneTransitionChanged",
            Self::CurrentSceneTransitionDurationChanged { .. } => {
                "CurrentSceneTransitionDurationChanged"
            }
            Self::StreamStateChanged { .. } => "StreamStateChanged",
            Self::RecordStateChanged { .. } => "RecordStateChanged",
            Self::StudioModeStateChanged { .. } => "StudioModeStateChanged",
            Self::ExitStarted => "ExitStarted",
            Self::Other { event_type, .. } => event_type,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_program_scene_change() {
        let event = RemoteEvent::decode(
            "CurrentProgramSceneChanged",
            Some(json!({ "sceneName": "Principal", "sceneUuid": "x" })),
        );
        assert_eq!(
            event,
            RemoteEvent::CurrentProgramSceneChanged {
                scene_name: "Principal".into()
            }
        );
    }

    #[test]
    fn decode_mute_and_volume() {
        assert_eq!(
            RemoteEvent::decode(
                "InputMuteStateChanged",
                Some(json!({ "inputName": "Mic", "inputMuted": true })),
            ),
            RemoteEvent::InputMuteStateChanged {
                input_name: "Mic".into(),
                muted: true
            }
        );
        assert_eq!(
            RemoteEvent::decode(
                "InputVolumeChanged",
                Some(json!({ "inputName": "Mic", "inputVolumeMul": 0.5, "inputVolumeDb": -6.0 })),
            ),
            RemoteEvent::InputVolumeChanged {
                input_name: "Mic".into(),
                volume_mul: 0.5
            }
        );
    }

    #[test]
    fn decode_output_states() {
        let stream = RemoteEvent::decode(
            "StreamStateChanged",
            Some(json!({ "outputActive": true, "outputState": "OBS_WEBSOCKET_OUTPUT_STARTED" })),
        );
        assert_eq!(stream, RemoteEvent::StreamStateChanged { active: true });
        assert_eq!(stream.event_type(), "StreamStateChanged");
    }

    #[test]
    fn scene_list_ignores_payload() {
        let event = RemoteEvent::decode("SceneListChanged", Some(json!({ "scenes": [] })));
        assert_eq!(event, RemoteEvent::SceneListChanged);
    }

    #[test]
    fn unknown_event_is_preserved() {
        let event = RemoteEvent::decode("VendorEvent", Some(json!({ "vendorName": "obs-ptz" })));
        match event {
            RemoteEvent::Other { event_type, data } => {
                assert_eq!(event_type, "VendorEvent");
                assert_eq!(data["vendorName"], "obs-ptz");
            }
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn malformed_known_event_degrades_to_other() {
        let event = RemoteEvent::decode("InputMuteStateChanged", Some(json!({ "inputName": 3 })));
        assert!(matches!(event, RemoteEvent::Other { .. }));
        assert_eq!(event.event_type(), "InputMuteStateChanged");
    }
}
