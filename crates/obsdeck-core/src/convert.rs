// ── Response → domain conversions ──
//
// Turns obs-websocket response payloads into model types. Each decoder
// names the request it belongs to so a malformed reply reports where
// it came from.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{InputInfo, Scene};

fn decode<T: DeserializeOwned>(request_type: &str, value: &Value) -> Result<T, CoreError> {
    T::deserialize(value).map_err(|e| CoreError::invalid(request_type, e.to_string()))
}

// ── Scenes ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSceneList {
    #[serde(default)]
    current_program_scene_name: Option<String>,
    #[serde(default)]
    current_preview_scene_name: Option<String>,
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScene {
    scene_name: String,
    #[serde(default)]
    scene_index: u32,
}

#[derive(Debug, PartialEq)]
pub(crate) struct SceneList {
    pub scenes: Vec<Scene>,
    pub program: Option<String>,
    pub preview: Option<String>,
}

/// `GetSceneList`. OBS lists scenes bottom-up; the catalog is top-down.
pub(crate) fn scene_list(value: &Value) -> Result<SceneList, CoreError> {
    let raw: RawSceneList = decode("GetSceneList", value)?;
    let scenes = raw
        .scenes
        .into_iter()
        .rev()
        .map(|s| Scene {
            name: s.scene_name,
            index: s.scene_index,
        })
        .collect();
    Ok(SceneList {
        scenes,
        program: raw.current_program_scene_name,
        preview: raw.current_preview_scene_name,
    })
}

// ── Inputs ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInputList {
    inputs: Vec<RawInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInput {
    input_name: String,
    #[serde(default)]
    input_kind: Option<String>,
    #[serde(default)]
    unversioned_input_kind: Option<String>,
}

/// `GetInputList`.
pub(crate) fn input_list(value: &Value) -> Result<Vec<InputInfo>, CoreError> {
    let raw: RawInputList = decode("GetInputList", value)?;
    Ok(raw
        .inputs
        .into_iter()
        .map(|i| InputInfo {
            name: i.input_name,
            kind: i
                .unversioned_input_kind
                .or(i.input_kind)
                .unwrap_or_default(),
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVolume {
    input_volume_mul: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMute {
    input_muted: bool,
}

/// `GetInputVolume` → linear multiplier.
pub(crate) fn input_volume(value: &Value) -> Result<f64, CoreError> {
    decode::<RawVolume>("GetInputVolume", value).map(|v| v.input_volume_mul)
}

/// `GetInputMute`.
pub(crate) fn input_mute(value: &Value) -> Result<bool, CoreError> {
    decode::<RawMute>("GetInputMute", value).map(|v| v.input_muted)
}

// ── Transitions ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransitionList {
    #[serde(default)]
    current_scene_transition_name: Option<String>,
    transitions: Vec<RawTransition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransition {
    transition_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCurrentTransition {
    #[serde(default)]
    transition_duration: Option<u32>,
}

/// `GetSceneTransitionList` → (active, available).
pub(crate) fn transition_list(value: &Value) -> Result<(String, BTreeSet<String>), CoreError> {
    let raw: RawTransitionList = decode("GetSceneTransitionList", value)?;
    let available = raw
        .transitions
        .into_iter()
        .map(|t| t.transition_name)
        .collect();
    Ok((raw.current_scene_transition_name.unwrap_or_default(), available))
}

/// `GetCurrentSceneTransition` → duration. Fixed-length transitions report none.
pub(crate) fn transition_duration(value: &Value) -> Result<Option<u32>, CoreError> {
    decode::<RawCurrentTransition>("GetCurrentSceneTransition", value).map(|t| t.transition_duration)
}

// ── Studio mode ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudioMode {
    studio_mode_enabled: bool,
}

/// `GetStudioModeEnabled`.
pub(crate) fn studio_mode(value: &Value) -> Result<bool, CoreError> {
    decode::<RawStudioMode>("GetStudioModeEnabled", value).map(|s| s.studio_mode_enabled)
}

// ── Outputs & stats ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOutputStatus {
    output_active: bool,
    #[serde(default)]
    output_duration: u64,
    #[serde(default)]
    output_bytes: u64,
}

/// One reading of `GetStreamStatus` / `GetRecordStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputSample {
    pub active: bool,
    pub elapsed: Duration,
    pub bytes: u64,
}

pub(crate) fn output_status(request_type: &str, value: &Value) -> Result<OutputSample, CoreError> {
    let raw: RawOutputStatus = decode(request_type, value)?;
    Ok(OutputSample {
        active: raw.output_active,
        elapsed: Duration::from_millis(raw.output_duration),
        bytes: raw.output_bytes,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStats {
    #[serde(default)]
    cpu_usage: f64,
    /// Megabytes.
    #[serde(default)]
    memory_usage: f64,
    #[serde(default)]
    active_fps: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EngineStats {
    pub cpu_percent: f64,
    pub memory_bytes: u64,
    pub fps: f64,
}

/// `GetStats`.
pub(crate) fn stats(value: &Value) -> Result<EngineStats, CoreError> {
    let raw: RawStats = decode("GetStats", value)?;
    Ok(EngineStats {
        cpu_percent: raw.cpu_usage,
        memory_bytes: megabytes_to_bytes(raw.memory_usage),
        fps: raw.active_fps,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn megabytes_to_bytes(mb: f64) -> u64 {
    if mb.is_finite() && mb > 0.0 {
        (mb * 1024.0 * 1024.0).round() as u64
    } else {
        0
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideoSettings {
    output_width: u32,
    output_height: u32,
}

/// `GetVideoSettings` → `"WxH"`.
pub(crate) fn resolution(value: &Value) -> Result<String, CoreError> {
    let raw: RawVideoSettings = decode("GetVideoSettings", value)?;
    Ok(format!("{}x{}", raw.output_width, raw.output_height))
}

/// Bits per second between two `outputBytes` readings.
///
/// A counter that went backwards (output restarted) yields 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub(crate) fn bitrate_bps(prev_bytes: u64, bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if bytes < prev_bytes || secs <= 0.0 {
        return 0;
    }
    ((bytes - prev_bytes) as f64 * 8.0 / secs).round() as u64
}

// ── Single-field responses ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSceneItemId {
    scene_item_id: i64,
}

/// `GetSceneItemId`.
pub(crate) fn scene_item_id(value: &Value) -> Result<i64, CoreError> {
    decode::<RawSceneItemId>("GetSceneItemId", value).map(|r| r.scene_item_id)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScreenshot {
    image_data: String,
}

/// `GetSourceScreenshot` → data URI.
pub(crate) fn screenshot(value: &Value) -> Result<String, CoreError> {
    decode::<RawScreenshot>("GetSourceScreenshot", value).map(|r| r.image_data)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn scene_list_is_reversed_into_display_order() {
        let list = scene_list(&json!({
            "currentProgramSceneName": "Principal",
            "currentPreviewSceneName": null,
            "scenes": [
                { "sceneName": "Final", "sceneIndex": 0, "sceneUuid": "a" },
                { "sceneName": "Principal", "sceneIndex": 1, "sceneUuid": "b" },
                { "sceneName": "Abertura", "sceneIndex": 2, "sceneUuid": "c" }
            ]
        }))
        .unwrap();
        let names: Vec<_> = list.scenes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Abertura", "Principal", "Final"]);
        assert_eq!(list.scenes[0].index, 2);
        assert_eq!(list.program.as_deref(), Some("Principal"));
        assert_eq!(list.preview, None);
    }

    #[test]
    fn malformed_scene_list_names_request() {
        let err = scene_list(&json!({ "scenes": "nope" })).unwrap_err();
        assert!(err.to_string().contains("GetSceneList"));
    }

    #[test]
    fn input_kind_prefers_unversioned() {
        let inputs = input_list(&json!({
            "inputs": [
                { "inputName": "Mic", "inputKind": "wasapi_input_capture", "unversionedInputKind": "wasapi_input_capture" },
                { "inputName": "Letreiro", "inputKind": "text_gdiplus_v3", "unversionedInputKind": "text_gdiplus" },
                { "inputName": "Bare" }
            ]
        }))
        .unwrap();
        assert_eq!(inputs[1].kind, "text_gdiplus");
        assert_eq!(inputs[2].kind, "");
    }

    #[test]
    fn stats_convert_megabytes() {
        let s = stats(&json!({ "cpuUsage": 12.5, "memoryUsage": 2.0, "activeFps": 29.97 })).unwrap();
        assert_eq!(s.memory_bytes, 2 * 1024 * 1024);
        assert!((s.fps - 29.97).abs() < 1e-9);
    }

    #[test]
    fn output_status_reads_duration() {
        let sample = output_status(
            "GetStreamStatus",
            &json!({ "outputActive": true, "outputDuration": 61_500, "outputBytes": 1000 }),
        )
        .unwrap();
        assert!(sample.active);
        assert_eq!(sample.elapsed, Duration::from_millis(61_500));
    }

    #[test]
    fn bitrate_from_byte_delta() {
        assert_eq!(bitrate_bps(1_000, 126_000, Duration::from_secs(1)), 1_000_000);
        assert_eq!(bitrate_bps(5_000, 100, Duration::from_secs(1)), 0);
        assert_eq!(bitrate_bps(0, 100, Duration::ZERO), 0);
    }

    #[test]
    fn transition_duration_may_be_absent() {
        assert_eq!(transition_duration(&json!({ "transitionName": "Cut", "transitionDuration": null })).unwrap(), None);
        assert_eq!(transition_duration(&json!({ "transitionDuration": 300 })).unwrap(), Some(300));
    }

    #[test]
    fn resolution_formats_output_size() {
        let r = resolution(&json!({ "outputWidth": 1920, "outputHeight": 1080, "baseWidth": 1920 })).unwrap();
        assert_eq!(r, "1920x1080");
    }
}
