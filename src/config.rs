use std::{path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::pipeline::recognizer::palm::PalmDetectorConfig;

const ENV_CAMERA: &str = "FINGER_COUNTER_CAMERA";
const ENV_RESOLUTION: &str = "FINGER_COUNTER_RESOLUTION";
const ENV_MAX_HANDS: &str = "FINGER_COUNTER_MAX_HANDS";
const ENV_MIN_DETECTION: &str = "FINGER_COUNTER_MIN_DETECTION";
const ENV_MIN_LANDMARK: &str = "FINGER_COUNTER_MIN_LANDMARK";
const ENV_MODEL_DIR: &str = "FINGER_COUNTER_MODEL_DIR";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Parse {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{var}={value} is out of range: {reason}")]
    OutOfRange {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Clone, Debug)]
pub struct CounterConfig {
    pub camera_index: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub max_hands: usize,
    pub min_detection_confidence: f32,
    pub min_landmark_confidence: f32,
    pub model_dir: PathBuf,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_width: 1280,
            frame_height: 720,
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_landmark_confidence: 0.5,
            model_dir: PathBuf::from("models"),
        }
    }
}

impl CounterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Applies overrides from `lookup` on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_CAMERA) {
            config.camera_index = parse(ENV_CAMERA, &value, "camera index")?;
        }

        if let Some(value) = lookup(ENV_RESOLUTION) {
            let (width, height) = parse_resolution(&value)?;
            config.frame_width = width;
            config.frame_height = height;
        }

        if let Some(value) = lookup(ENV_MAX_HANDS) {
            let max_hands: usize = parse(ENV_MAX_HANDS, &value, "hand count")?;
            if max_hands == 0 {
                return Err(ConfigError::OutOfRange {
                    var: ENV_MAX_HANDS,
                    value,
                    reason: "at least one hand must be tracked",
                });
            }
            config.max_hands = max_hands;
        }

        if let Some(value) = lookup(ENV_MIN_DETECTION) {
            config.min_detection_confidence = parse_confidence(ENV_MIN_DETECTION, value)?;
        }

        if let Some(value) = lookup(ENV_MIN_LANDMARK) {
            config.min_landmark_confidence = parse_confidence(ENV_MIN_LANDMARK, value)?;
        }

        if let Some(value) = lookup(ENV_MODEL_DIR) {
            config.model_dir = PathBuf::from(value);
        }

        Ok(config)
    }

    pub fn palm_detector(&self) -> PalmDetectorConfig {
        PalmDetectorConfig {
            score_threshold: self.min_detection_confidence,
            ..PalmDetectorConfig::default()
        }
    }
}

fn parse<T: FromStr>(
    var: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        var,
        value: value.to_string(),
        expected,
    })
}

fn parse_confidence(var: &'static str, value: String) -> Result<f32, ConfigError> {
    let confidence: f32 = parse(var, &value, "confidence")?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ConfigError::OutOfRange {
            var,
            value,
            reason: "confidence must be within [0, 1]",
        });
    }
    Ok(confidence)
}

fn parse_resolution(value: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::Parse {
        var: ENV_RESOLUTION,
        value: value.to_string(),
        expected: "resolution (WIDTHxHEIGHT)",
    };

    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(ConfigError::OutOfRange {
            var: ENV_RESOLUTION,
            value: value.to_string(),
            reason: "width and height must be positive",
        });
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CounterConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CounterConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_without_overrides() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.camera_index, 0);
        assert_eq!((config.frame_width, config.frame_height), (1280, 720));
        assert_eq!(config.max_hands, 2);
        assert_eq!(config.min_detection_confidence, 0.5);
        assert_eq!(config.min_landmark_confidence, 0.5);
        assert_eq!(config.model_dir, PathBuf::from("models"));
    }

    #[test]
    fn applies_overrides() {
        let config = config_from(&[
            (ENV_CAMERA, "2"),
            (ENV_RESOLUTION, "640x480"),
            (ENV_MAX_HANDS, "1"),
            (ENV_MIN_DETECTION, "0.7"),
            (ENV_MIN_LANDMARK, " 0.25 "),
            (ENV_MODEL_DIR, "/tmp/models"),
        ])
        .unwrap();

        assert_eq!(config.camera_index, 2);
        assert_eq!((config.frame_width, config.frame_height), (640, 480));
        assert_eq!(config.max_hands, 1);
        assert_eq!(config.min_detection_confidence, 0.7);
        assert_eq!(config.min_landmark_confidence, 0.25);
        assert_eq!(config.model_dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.palm_detector().score_threshold, 0.7);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config_from(&[(ENV_CAMERA, "front")]),
            Err(ConfigError::Parse { var: ENV_CAMERA, .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_RESOLUTION, "1280-720")]),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_RESOLUTION, "0x720")]),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_MAX_HANDS, "0")]),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            config_from(&[(ENV_MIN_LANDMARK, "1.5")]),
            Err(ConfigError::OutOfRange { var: ENV_MIN_LANDMARK, .. })
        ));
    }

    #[test]
    fn error_names_the_variable() {
        let err = config_from(&[(ENV_MAX_HANDS, "many")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "FINGER_COUNTER_MAX_HANDS=\"many\" is not a valid hand count"
        );
    }
}
