use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Progress events emitted while indexing one commit. Ordering is monotonic
/// per commit: `Started` first, then interleaved file/chunk events in file
/// order, then exactly one of `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        commit_sha: String,
    },
    FilesListed {
        total: usize,
        reused: usize,
        to_parse: usize,
    },
    GrammarsInstalling {
        languages: Vec<String>,
    },
    FileParsed {
        path: String,
        index: usize,
        total: usize,
        chunks: usize,
    },
    ChunksEmbedded {
        count: usize,
    },
    ChunksStored {
        count: usize,
    },
    Completed {
        chunk_count: u64,
    },
    Failed {
        message: String,
    },
}

/// Observer callback for progress events. The CLI plugs an indicatif bar in
/// here; tests collect events into a Vec.
pub type ProgressObserver = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Observer that discards all events.
pub fn noop_observer() -> ProgressObserver {
    Arc::new(|_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags() {
        let event = ProgressEvent::FilesListed {
            total: 10,
            reused: 4,
            to_parse: 6,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"files_listed\""));
        assert!(json.contains("\"to_parse\":6"));
    }
}
