//! flow-ocr - pooled image-to-text pipeline for flow-automation hosts
//!
//! Embeds as a plugin node: the host hands over an image reference (URL,
//! data URL, file path, raw bytes, or a wire-encoded byte array) plus an
//! optional request configuration, and gets back recognized text with
//! engine-native confidence metadata.
//!
//! The engineering core is the bounded [`pool::WorkerPool`] that manages the
//! lifecycle of expensive, language-bound OCR engine instances under
//! concurrent, variable-configuration load. Concrete engines plug in through
//! the [`engine::EngineProvider`] / [`engine::TextEngine`] traits; a
//! Tesseract backend ships behind the `tesseract` feature.
//!
//! Everything runs on single-threaded cooperative concurrency: futures are
//! `?Send` and the crate is designed for a tokio current-thread runtime or
//! `LocalSet`. Concurrency comes from interleaving in-flight requests at
//! suspension points, not parallel threads.

pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod session;
pub mod source;
pub mod status;

use std::rc::Rc;

pub use config::{NodeDefaults, Rectangle, RequestOverrides};
pub use engine::{
    EngineCapabilities, EngineHandle, EngineProvider, Recognition, RecognizeOptions, TextEngine,
};
pub use error::OcrError;
pub use pool::{PoolGuard, WorkerPool, MAX_POOL_SIZE, MIN_POOL_SIZE};
pub use session::OcrNode;
pub use source::ImageSource;
pub use status::{NodeStatus, StatusSink};

#[cfg(feature = "tesseract")]
pub use engine::tesseract::TesseractProvider;

/// Factory the host invokes once per deployed node instance.
///
/// The host owns the node's lifecycle: it calls this at deploy time and
/// [`OcrNode::close`] when the node is removed from the flow.
pub fn create_node(defaults: NodeDefaults, provider: Rc<dyn EngineProvider>) -> OcrNode {
    OcrNode::new(defaults, provider)
}
