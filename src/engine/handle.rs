//! Managed engine instance with its language state.

use std::collections::BTreeMap;

use tracing::debug;

use crate::engine::{EngineCapabilities, Recognition, RecognizeOptions, TextEngine};
use crate::error::OcrError;

/// One pooled engine instance together with the language it is currently
/// initialized for.
///
/// A handle is exclusively owned by at most one in-flight request at a time;
/// the pool enforces that by moving the handle out of its slot while it is
/// checked out. Only the pool and its guards mutate a handle.
pub struct EngineHandle {
    engine: Box<dyn TextEngine>,
    language: Option<String>,
    capabilities: EngineCapabilities,
}

impl EngineHandle {
    pub fn new(engine: Box<dyn TextEngine>, capabilities: EngineCapabilities) -> Self {
        Self {
            engine,
            language: None,
            capabilities,
        }
    }

    /// Language this handle last initialized successfully, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    /// Make sure the engine speaks `language`.
    ///
    /// Already-matching handles skip the expensive model load. Engine builds
    /// without a language loader are fixed to whatever language they first
    /// received; later requests for a different language proceed as-is.
    pub async fn ensure_language(&mut self, language: &str) -> Result<(), OcrError> {
        if self.language.as_deref() == Some(language) {
            return Ok(());
        }

        if !self.capabilities.language_init {
            if self.language.is_none() {
                self.language = Some(language.to_string());
            }
            return Ok(());
        }

        debug!(language, "initializing engine language");
        self.engine.init_language(language).await?;
        self.language = Some(language.to_string());
        Ok(())
    }

    /// Apply engine parameters, skipping silently when the build does not
    /// support runtime configuration.
    pub async fn apply_parameters(
        &mut self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), OcrError> {
        if !self.capabilities.set_parameters || parameters.is_empty() {
            return Ok(());
        }
        self.engine.set_parameters(parameters).await
    }

    /// Run recognition on this handle's engine instance.
    pub async fn recognize(
        &mut self,
        image: &[u8],
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        if !self.capabilities.recognize {
            return Err(OcrError::CapabilityMissing(
                "engine instance exposes no recognize operation".to_string(),
            ));
        }
        self.engine.recognize(image, options).await
    }

    /// Terminate the underlying engine.
    pub async fn shutdown(&mut self) -> Result<(), OcrError> {
        self.engine.shutdown().await
    }
}
