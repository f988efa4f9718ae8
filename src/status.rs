//! Lifecycle status notices for the hosting flow editor.
//!
//! The host may surface these on the node's UI badge. The sink is optional
//! and purely observational: a node without one behaves identically.

use std::fmt;

/// Coarse lifecycle notice emitted while a request is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// Fetching or reading the image source.
    Downloading,
    /// Recognition in progress for the given language.
    Recognizing(String),
    /// The request finished successfully.
    Done,
    /// The request failed.
    Failed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Downloading => write!(f, "downloading"),
            NodeStatus::Recognizing(language) => write!(f, "recognizing ({language})"),
            NodeStatus::Done => write!(f, "done"),
            NodeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Receiver for status notices, implemented by the host collaborator.
pub trait StatusSink {
    fn status(&self, status: &NodeStatus);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(NodeStatus::Downloading.to_string(), "downloading");
        assert_eq!(
            NodeStatus::Recognizing("eng".into()).to_string(),
            "recognizing (eng)"
        );
        assert_eq!(NodeStatus::Done.to_string(), "done");
        assert_eq!(NodeStatus::Failed.to_string(), "failed");
    }
}
