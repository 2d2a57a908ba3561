use std::collections::VecDeque;

use serde_json::json;
use tokio::sync::Mutex;

use crate::archive::{ArchiveProvider, ArchiveSnapshot};
use crate::errors::{CatalogError, Result};

/// Mock archive provider for testing purposes.
///
/// Serves queued snapshots in order; an empty queue behaves like an
/// unreachable archive.
pub struct MockArchiveProvider {
    snapshots: Mutex<VecDeque<ArchiveSnapshot>>,
}

impl MockArchiveProvider {
    pub fn with_snapshots(snapshots: Vec<ArchiveSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
        }
    }

    pub fn failing() -> Self {
        Self::with_snapshots(vec![])
    }
}

impl ArchiveProvider for MockArchiveProvider {
    async fn fetch_snapshot(
        &self,
        _url_override: Option<&str>,
        _timeout: Option<u64>,
    ) -> Result<ArchiveSnapshot> {
        match self.snapshots.lock().await.pop_front() {
            Some(snapshot) => Ok(snapshot),
            None => Err(CatalogError::archive_unreachable(
                "Mock archive has no snapshot queued",
            )),
        }
    }
}

/// A two-registry snapshot: "go" with three catalog entries (one of them a
/// plain bookmark without a repository) and "python" with one.
pub fn sample_snapshot() -> ArchiveSnapshot {
    let go = json!({
        "metadata": {
            "title": "Awesome Go",
            "description": "A curated list of Go frameworks and libraries",
            "source": "avelino/enhansome-go"
        },
        "items": [
            {
                "title": "Web Frameworks",
                "items": [
                    {
                        "title": "Gin",
                        "description": "HTTP web framework",
                        "repo_info": {
                            "owner": "gin-gonic",
                            "name": "gin",
                            "stars": 50000,
                            "language": "Go",
                            "last_commit": "2025-05-01T00:00:00Z",
                            "archived": false,
                            "description": "HTTP web framework written in Go"
                        }
                    },
                    {
                        "title": "Echo",
                        "description": "Minimalist web framework",
                        "repo_info": {
                            "owner": "labstack",
                            "name": "echo",
                            "stars": 8000,
                            "language": "Go",
                            "archived": false
                        }
                    },
                    {
                        "title": "Further reading",
                        "description": "A bookmark without a repository"
                    }
                ]
            }
        ]
    });

    let python = json!({
        "metadata": {
            "title": "Awesome Python",
            "source": "enhansome-python"
        },
        "items": [
            {
                "title": "Web Frameworks",
                "items": [
                    {
                        "title": "Django",
                        "description": "The web framework for perfectionists",
                        "repo_info": {
                            "owner": "django",
                            "name": "django",
                            "stars": 20000,
                            "language": "Python",
                            "archived": false
                        }
                    }
                ]
            }
        ]
    });

    ArchiveSnapshot {
        registries: [
            ("avelino/enhansome-go".to_string(), go),
            ("enhansome-python".to_string(), python),
        ]
        .into_iter()
        .collect(),
    }
}
