//! Runtime configuration from environment variables.
//!
//! See the [crate-level docs](crate) for the list of supported variables.

use std::{
    env::{self, VarError},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};

use crate::{image::JpegBackend, webcam::WebcamOptions};

const ENV_VAR_MODEL_DIR: &str = "HANDSIGN_MODEL_DIR";
const ENV_VAR_LITE_MODELS: &str = "HANDSIGN_LITE_MODELS";
const ENV_VAR_WEBCAM_INDEX: &str = "HANDSIGN_WEBCAM_INDEX";
const ENV_VAR_WEBCAM_NAME: &str = "HANDSIGN_WEBCAM_NAME";
const ENV_VAR_JPEG_BACKEND: &str = "HANDSIGN_JPEG_BACKEND";

const DEFAULT_MODEL_DIR: &str = "3rdparty/onnx";

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    model_dir: PathBuf,
    lite_models: bool,
    webcam_index: u32,
    webcam_name: Option<String>,
    jpeg_backend: JpegBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            lite_models: false,
            webcam_index: 0,
            webcam_name: None,
            jpeg_backend: JpegBackend::default(),
        }
    }
}

impl Settings {
    /// Reads the settings from the process environment.
    ///
    /// Unset variables use their defaults. Set but invalid variables are an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(e @ VarError::NotUnicode(_)) => Err(e).context(format!("invalid `{name}`")),
        })
    }

    fn from_lookup<F>(mut lookup: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> anyhow::Result<Option<String>>,
    {
        let mut settings = Self::default();

        if let Some(dir) = lookup(ENV_VAR_MODEL_DIR)? {
            settings.model_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_VAR_LITE_MODELS)? {
            settings.lite_models = parse_flag(&value)
                .with_context(|| format!("invalid `{ENV_VAR_LITE_MODELS}`"))?;
        }
        if let Some(value) = lookup(ENV_VAR_WEBCAM_INDEX)? {
            settings.webcam_index = value
                .trim()
                .parse()
                .with_context(|| format!("invalid `{ENV_VAR_WEBCAM_INDEX}` '{value}'"))?;
        }
        if let Some(name) = lookup(ENV_VAR_WEBCAM_NAME)? {
            log::debug!("webcam override: `{ENV_VAR_WEBCAM_NAME}` is set to '{name}'");
            settings.webcam_name = Some(name);
        }
        if let Some(value) = lookup(ENV_VAR_JPEG_BACKEND)? {
            settings.jpeg_backend = value
                .parse()
                .with_context(|| format!("invalid `{ENV_VAR_JPEG_BACKEND}`"))?;
        }

        Ok(settings)
    }

    /// Directory containing the ONNX network files.
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Whether the lite variants of the palm detection and hand landmark networks are used.
    pub fn lite_models(&self) -> bool {
        self.lite_models
    }

    pub fn jpeg_backend(&self) -> JpegBackend {
        self.jpeg_backend
    }

    /// Returns the options used to open the webcam.
    pub fn webcam_options(&self) -> WebcamOptions {
        let options = WebcamOptions::default()
            .index(self.webcam_index)
            .jpeg_backend(self.jpeg_backend);
        match &self.webcam_name {
            Some(name) => options.name(name.clone()),
            None => options,
        }
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "" | "0" | "false" => Ok(false),
        other => bail!("expected `1`, `true`, `0` or `false`, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Settings::from_lookup(|name| Ok(vars.get(name).cloned()))
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.model_dir(), Path::new("3rdparty/onnx"));
        assert!(!s.lite_models());
        assert_eq!(s.jpeg_backend(), JpegBackend::ZuneJpeg);
    }

    #[test]
    fn overrides() {
        let s = settings(&[
            ("HANDSIGN_MODEL_DIR", "/opt/models"),
            ("HANDSIGN_LITE_MODELS", "true"),
            ("HANDSIGN_WEBCAM_INDEX", "2"),
            ("HANDSIGN_WEBCAM_NAME", "HD Pro Webcam C920"),
            ("HANDSIGN_JPEG_BACKEND", "jpeg-decoder"),
        ])
        .unwrap();
        assert_eq!(s.model_dir(), Path::new("/opt/models"));
        assert!(s.lite_models());
        assert_eq!(s.webcam_index, 2);
        assert_eq!(s.webcam_name.as_deref(), Some("HD Pro Webcam C920"));
        assert_eq!(s.jpeg_backend(), JpegBackend::JpegDecoder);
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(settings(&[("HANDSIGN_LITE_MODELS", "yes")]).is_err());
        assert!(settings(&[("HANDSIGN_WEBCAM_INDEX", "-1")]).is_err());
        assert!(settings(&[("HANDSIGN_WEBCAM_INDEX", "front")]).is_err());
        assert!(settings(&[("HANDSIGN_JPEG_BACKEND", "mozjpeg")]).is_err());

        let err = settings(&[("HANDSIGN_WEBCAM_INDEX", "x")]).unwrap_err();
        assert!(format!("{err:#}").contains("HANDSIGN_WEBCAM_INDEX"), "{err:#}");
    }

    #[test]
    fn flags() {
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag(" true ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(parse_flag("on").is_err());
    }
}
