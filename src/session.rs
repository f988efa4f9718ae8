//! Per-request recognition orchestration.
//!
//! [`OcrNode`] is one deployed node instance: its defaults, its engine
//! provider, and its worker pool. Each call to [`OcrNode::recognize`] is one
//! recognition session — merge configuration, normalize the input, size the
//! pool, acquire a handle, recognize under a timeout, release.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::{EffectiveConfig, NodeDefaults, RequestOverrides};
use crate::engine::{EngineProvider, Recognition, RecognizeOptions};
use crate::error::OcrError;
use crate::pool::{PoolGuard, WorkerPool};
use crate::source::ImageSource;
use crate::status::{NodeStatus, StatusSink};

/// One deployed image-to-text node.
pub struct OcrNode {
    defaults: NodeDefaults,
    provider: Rc<dyn EngineProvider>,
    pool: Rc<WorkerPool>,
    http: reqwest::Client,
    status: Option<Rc<dyn StatusSink>>,
}

impl OcrNode {
    pub fn new(defaults: NodeDefaults, provider: Rc<dyn EngineProvider>) -> Self {
        let pool = Rc::new(WorkerPool::new(Rc::clone(&provider)));
        Self {
            defaults,
            provider,
            pool,
            http: reqwest::Client::new(),
            status: None,
        }
    }

    /// Attach a status sink for host UI badges.
    pub fn with_status_sink(mut self, sink: Rc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// The node's worker pool.
    pub fn pool(&self) -> &Rc<WorkerPool> {
        &self.pool
    }

    /// Run one recognition request.
    ///
    /// Returns the recognized text with engine-native metadata, or a single
    /// [`OcrError`] describing the failure. The engine handle is released on
    /// every path, including timeout.
    pub async fn recognize(
        &self,
        source: ImageSource,
        overrides: &RequestOverrides,
    ) -> Result<Recognition, OcrError> {
        let result = self.run(source, overrides).await;
        match &result {
            Ok(recognition) => {
                debug!(chars = recognition.text.len(), "recognition complete");
                self.emit(NodeStatus::Done);
            }
            Err(err) => {
                warn!(%err, "recognition failed");
                self.emit(NodeStatus::Failed);
            }
        }
        result
    }

    /// Shut the node down, terminating every pooled engine.
    ///
    /// Invoked by the host when the node is removed from the flow; not meant
    /// to race against in-flight requests.
    pub async fn close(&self) {
        self.pool.destroy().await;
    }

    async fn run(
        &self,
        source: ImageSource,
        overrides: &RequestOverrides,
    ) -> Result<Recognition, OcrError> {
        let config = self.defaults.merge(overrides)?;

        // Normalization happens before any pool interaction; a bad source
        // never acquires a handle.
        self.emit(NodeStatus::Downloading);
        let image = source.resolve(&self.http).await?;

        self.pool.ensure_size(config.pool_size).await?;

        self.emit(NodeStatus::Recognizing(config.language.clone()));
        let mut guard = Rc::clone(&self.pool).acquire(&config.language).await?;

        // Parameters are applied before recognition is invoked on the same
        // handle, outside the recognition timeout.
        guard.apply_parameters(&config.parameters).await?;

        let outcome = self.recognize_on(&mut guard, &image, &config).await;
        guard.release();
        outcome
    }

    async fn recognize_on(
        &self,
        guard: &mut PoolGuard,
        image: &[u8],
        config: &EffectiveConfig,
    ) -> Result<Recognition, OcrError> {
        let capabilities = guard.capabilities();
        let options = RecognizeOptions {
            rectangle: config.rectangle,
        };

        let recognition = async {
            if capabilities.recognize {
                guard.recognize(image, &options).await
            } else if capabilities.standalone_recognize {
                debug!("engine instance lacks recognize; using library-level fallback");
                self.provider
                    .recognize_standalone(image, &config.language, &config.parameters, &options)
                    .await
            } else {
                Err(OcrError::CapabilityMissing(
                    "engine build exposes no recognize entry point".to_string(),
                ))
            }
        };

        match config.timeout {
            Some(limit) => match tokio::time::timeout(limit, recognition).await {
                Ok(result) => result,
                // The pending recognition is abandoned from the caller's
                // perspective; the engine-level call is not guaranteed to be
                // cancelled. The handle still goes back to the pool.
                Err(_) => Err(OcrError::Timeout {
                    ms: limit.as_millis() as u64,
                }),
            },
            None => recognition.await,
        }
    }

    fn emit(&self, status: NodeStatus) {
        debug!(status = %status, "node status");
        if let Some(sink) = &self.status {
            sink.status(&status);
        }
    }
}
