//! Engine abstraction layer.
//!
//! The pool never talks to a concrete OCR library; it goes through
//! [`TextEngine`] instances produced by an [`EngineProvider`]. Which
//! lifecycle operations a given engine build supports is probed once at
//! construction time and recorded as [`EngineCapabilities`], so the rest of
//! the pipeline branches on flags rather than inspecting the engine.

pub mod handle;
#[cfg(feature = "tesseract")]
pub mod tesseract;

pub use handle::EngineHandle;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Rectangle;
use crate::error::OcrError;

/// Lifecycle operations a particular engine build exposes.
///
/// Recorded when the provider is constructed. Engines missing optional
/// operations degrade gracefully instead of failing outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCapabilities {
    /// The engine can load and initialize a language model after creation.
    pub language_init: bool,
    /// The engine accepts runtime parameter configuration.
    pub set_parameters: bool,
    /// Engine instances expose a direct recognize operation.
    pub recognize: bool,
    /// The engine library exposes a standalone recognize function usable
    /// as a fallback when instances do not.
    pub standalone_recognize: bool,
}

impl EngineCapabilities {
    /// A fully featured engine build.
    pub fn full() -> Self {
        Self {
            language_init: true,
            set_parameters: true,
            recognize: true,
            standalone_recognize: true,
        }
    }
}

/// Options for one recognition invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecognizeOptions {
    /// Restrict recognition to a sub-region; `None` means the whole image.
    pub rectangle: Option<Rectangle>,
}

/// Recognized text plus engine-native metadata.
///
/// The metadata (confidences, bounding boxes, whatever the engine emits) is
/// passed through verbatim; the pipeline never restructures it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub metadata: Value,
}

/// One OCR engine process or session.
///
/// All futures are `?Send`: the pipeline runs on a current-thread runtime
/// and engine internals are frequently not thread-safe.
#[async_trait(?Send)]
pub trait TextEngine {
    /// Load and initialize the model for `language`.
    async fn init_language(&mut self, language: &str) -> Result<(), OcrError>;

    /// Apply engine parameters by name.
    async fn set_parameters(
        &mut self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), OcrError>;

    /// Recognize text in an encoded image buffer.
    async fn recognize(
        &mut self,
        image: &[u8],
        options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError>;

    /// Terminate the engine, releasing its resources.
    async fn shutdown(&mut self) -> Result<(), OcrError>;
}

/// Factory for engine instances, one per deployed node.
#[async_trait(?Send)]
pub trait EngineProvider {
    /// Capability flags for engines this provider creates.
    fn capabilities(&self) -> EngineCapabilities;

    /// Construct one engine instance. Expensive; the pool reuses instances
    /// across requests.
    async fn create_engine(&self) -> Result<Box<dyn TextEngine>, OcrError>;

    /// Library-level recognize fallback for builds whose instances lack a
    /// direct recognize operation.
    async fn recognize_standalone(
        &self,
        _image: &[u8],
        _language: &str,
        _parameters: &BTreeMap<String, String>,
        _options: &RecognizeOptions,
    ) -> Result<Recognition, OcrError> {
        Err(OcrError::CapabilityMissing(
            "engine library exposes no standalone recognize function".to_string(),
        ))
    }
}
