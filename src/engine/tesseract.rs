//! Tesseract backend via `leptess`.
//!
//! Enabled with the `tesseract` feature; requires the system tesseract and
//! leptonica libraries at build time. Language initialization recreates the
//! underlying `LepTess` instance, which is why pooled reuse matters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use leptess::{LepTess, Variable};
use serde_json::json;
use tracing::{info, warn};

use crate::engine::{
    EngineCapabilities, EngineProvider, Recognition, RecognizeOptions, TextEngine,
};
use crate::error::OcrError;

/// Provider producing Tesseract-backed engines.
pub struct TesseractProvider {
    datapath: Option<String>,
}

impl TesseractProvider {
    /// Use the system default tessdata location.
    pub fn new() -> Self {
        Self { datapath: None }
    }

    /// Use a specific tessdata directory.
    pub fn with_datapath(datapath: impl Into<String>) -> Self {
        Self {
            datapath: Some(datapath.into()),
        }
    }
}

impl Default for TesseractProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl EngineProvider for TesseractProvider {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            language_init: true,
            set_parameters: true,
            recognize: true,
            standalone_recognize: false,
        }
    }

    async fn create_engine(&self) -> Result<Box<dyn TextEngine>, OcrError> {
        Ok(Box::new(TesseractEngine {
            datapath: self.datapath.clone(),
            inner: None,
        }))
    }
}

/// One Tesseract session. `inner` is `None` until the first language load.
struct TesseractEngine {
    datapath: Option<String>,
    inner: Option<LepTess>,
}

impl TesseractEngine {
    fn inner_mut(&mut self) -> Result<&mut LepTess, OcrError> {
        self.inner.as_mut().ok_or_else(|| {
            OcrError::EngineFailure("tesseract engine has no language initialized".to_string())
        })
    }
}

#[async_trait(?Send)]
impl TextEngine for TesseractEngine {
    async fn init_language(&mut self, language: &str) -> Result<(), OcrError> {
        info!(language, "loading tesseract language model");
        let tess = LepTess::new(self.datapath.as_deref(), language).map_err(|err| {
            OcrError::EngineFailure(format!("tesseract init failed for '{language}': {err}"))
        })?;
        self.inner = Some(tess);
        Ok(())
    }

    async fn set_parameters(
        &mut self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), OcrError> {
        let tess = self.inner_mut()?;
        for (name, value) in parameters {
            let Some(variable) = known_variable(name) else {
                warn!(name = %name, "skipping unknown tesseract parameter");
                continue;
            };
            tess.set_variable(variable, value).map_err(|err| {
                OcrError::EngineFailure(format!("failed to set parameter '{name}': {err}"))
            })?;
        }
        Ok(())
    }

    async fn recognize(
        &mut self,
        image: &[u8],
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        let tess = self.inner_mut()?;

        tess.set_image_from_mem(image)
            .map_err(|err| OcrError::EngineFailure(format!("cannot decode image: {err}")))?;

        if let Some(rect) = options.rectangle {
            tess.set_rectangle(
                rect.left as i32,
                rect.top as i32,
                rect.width as i32,
                rect.height as i32,
            );
        }

        let text = tess
            .get_utf8_text()
            .map_err(|err| OcrError::EngineFailure(format!("recognition failed: {err}")))?;
        let confidence = tess.mean_text_conf();

        Ok(Recognition {
            text,
            metadata: json!({ "confidence": confidence }),
        })
    }

    async fn shutdown(&mut self) -> Result<(), OcrError> {
        // Dropping LepTess tears down the underlying TessBaseAPI.
        self.inner = None;
        Ok(())
    }
}

/// Map a wire parameter name to the tesseract variable it controls.
fn known_variable(name: &str) -> Option<Variable> {
    match name {
        "tessedit_char_whitelist" => Some(Variable::TesseditCharWhitelist),
        "tessedit_char_blacklist" => Some(Variable::TesseditCharBlacklist),
        "tessedit_pageseg_mode" => Some(Variable::TesseditPagesegMode),
        "user_defined_dpi" => Some(Variable::UserDefinedDpi),
        "user_words_file" => Some(Variable::UserWordsFile),
        "user_patterns_file" => Some(Variable::UserPatternsFile),
        _ => None,
    }
}
