use std::path::PathBuf;
use std::time::Duration;

use camface_core::{ARCFACE_MODEL_FILE, DEFAULT_TOLERANCE, SCRFD_MODEL_FILE};

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Where passport photos are written (created on first capture).
    pub output_dir: PathBuf,
    /// Where `saved_face.jpg` / `loaded_face.jpg` are written.
    pub reference_dir: PathBuf,
    /// Where the file surface writes live/preview/badge images.
    pub preview_dir: PathBuf,
    /// Write `live.jpg` every N frames.
    pub preview_every: u32,
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    /// Maximum cosine distance for a match.
    pub match_tolerance: f32,
    /// TrueType font for labels; system fonts are searched when unset.
    pub font_path: Option<PathBuf>,
    /// Overrides the app's detection interval.
    pub detect_interval: Option<u32>,
    /// Overrides the app's detection downscale factor.
    pub downscale: Option<u32>,
}

impl Config {
    /// Load configuration from `CAMFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = var("CAMFACE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(camface_core::default_model_dir);

        Self {
            camera_device: var("CAMFACE_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir,
            output_dir: env_path(&var, "CAMFACE_OUTPUT_DIR", "captured_passport_faces"),
            reference_dir: env_path(&var, "CAMFACE_REFERENCE_DIR", "."),
            preview_dir: env_path(&var, "CAMFACE_PREVIEW_DIR", "camface-preview"),
            preview_every: env_parse(&var, "CAMFACE_PREVIEW_EVERY").unwrap_or(10),
            tick_ms: env_parse(&var, "CAMFACE_TICK_MS").filter(|&ms| ms > 0).unwrap_or(30),
            match_tolerance: env_parse(&var, "CAMFACE_MATCH_TOLERANCE")
                .unwrap_or(DEFAULT_TOLERANCE),
            font_path: var("CAMFACE_FONT_PATH").filter(|p| !p.is_empty()).map(PathBuf::from),
            detect_interval: env_parse(&var, "CAMFACE_DETECT_INTERVAL"),
            downscale: env_parse(&var, "CAMFACE_DOWNSCALE"),
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir.join(SCRFD_MODEL_FILE).to_string_lossy().into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir.join(ARCFACE_MODEL_FILE).to_string_lossy().into_owned()
    }
}

fn env_path(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> PathBuf {
    PathBuf::from(var(key).unwrap_or_else(|| default.to_string()))
}

fn env_parse<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[("CAMFACE_MODEL_DIR", "/opt/models")]);
        assert_eq!(c.camera_device, "/dev/video0");
        assert_eq!(c.output_dir, PathBuf::from("captured_passport_faces"));
        assert_eq!(c.preview_every, 10);
        assert_eq!(c.tick_period(), Duration::from_millis(30));
        assert_eq!(c.match_tolerance, 0.6);
        assert!(c.font_path.is_none() && c.detect_interval.is_none() && c.downscale.is_none());
        assert_eq!(c.scrfd_model_path(), "/opt/models/det_10g.onnx");
        assert_eq!(c.arcface_model_path(), "/opt/models/w600k_r50.onnx");
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("CAMFACE_CAMERA_DEVICE", "/dev/video2"),
            ("CAMFACE_TICK_MS", "50"),
            ("CAMFACE_MATCH_TOLERANCE", "0.45"),
            ("CAMFACE_DETECT_INTERVAL", "3"),
            ("CAMFACE_FONT_PATH", "/fonts/a.ttf"),
        ]);
        assert_eq!(c.camera_device, "/dev/video2");
        assert_eq!(c.tick_ms, 50);
        assert_eq!(c.match_tolerance, 0.45);
        assert_eq!(c.detect_interval, Some(3));
        assert_eq!(c.font_path, Some(PathBuf::from("/fonts/a.ttf")));
    }

    #[test]
    fn test_bad_values_fall_back() {
        let c = config(&[
            ("CAMFACE_TICK_MS", "0"),
            ("CAMFACE_PREVIEW_EVERY", "often"),
            ("CAMFACE_DOWNSCALE", "x"),
        ]);
        assert_eq!(c.tick_ms, 30);
        assert_eq!(c.preview_every, 10);
        assert_eq!(c.downscale, None);
    }
}
