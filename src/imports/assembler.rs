use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unknown upload id")]
    NotFound,
}

/// What a chunk append produced: either the session is still open, or
/// the final chunk closed it and the full payload is handed back.
#[derive(Debug)]
pub enum ChunkOutcome {
    Partial { upload_id: Uuid },
    Complete { upload_id: Uuid, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct UploadSession {
    buffer: Vec<u8>,
    chunks_received: u64,
}

/// Reassembles a chunked CSV upload before the import job sees it.
///
/// Chunks are appended in the order the client sends them; nothing is
/// reordered or deduplicated, so an out-of-order client produces a
/// corrupt file. Each session has a single sequential writer.
#[derive(Debug, Default)]
pub struct UploadSessions {
    sessions: Mutex<HashMap<Uuid, UploadSession>>,
}

impl UploadSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk. A missing `upload_id` opens a fresh session;
    /// an id nobody allocated is `NotFound`. When `is_last` is set the
    /// session is consumed and its bytes returned — a first chunk that
    /// is also the last is a complete single-shot upload.
    pub async fn append_chunk(
        &self,
        upload_id: Option<Uuid>,
        bytes: &[u8],
        is_last: bool,
    ) -> Result<ChunkOutcome, UploadError> {
        let mut sessions = self.sessions.lock().await;

        let id = match upload_id {
            Some(id) => {
                if !sessions.contains_key(&id) {
                    return Err(UploadError::NotFound);
                }
                id
            }
            None => {
                let id = Uuid::new_v4();
                sessions.insert(id, UploadSession::default());
                id
            }
        };

        if let Some(session) = sessions.get_mut(&id) {
            session.buffer.extend_from_slice(bytes);
            session.chunks_received += 1;
        }

        if is_last {
            let session = sessions.remove(&id).unwrap_or_default();
            tracing::debug!(
                upload_id = %id,
                chunks = session.chunks_received,
                bytes = session.buffer.len(),
                "upload assembled"
            );
            return Ok(ChunkOutcome::Complete {
                upload_id: id,
                data: session.buffer,
            });
        }

        Ok(ChunkOutcome::Partial { upload_id: id })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn chunks_assemble_in_submission_order() {
        let sessions = UploadSessions::new();

        let ChunkOutcome::Partial { upload_id } =
            sessions.append_chunk(None, b"a", false).await.unwrap()
        else {
            unreachable!("first chunk is not final");
        };
        let second = sessions
            .append_chunk(Some(upload_id), b"b", false)
            .await
            .unwrap();
        assert!(matches!(second, ChunkOutcome::Partial { .. }));

        let ChunkOutcome::Complete {
            upload_id: final_id,
            data,
        } = sessions
            .append_chunk(Some(upload_id), b"c", true)
            .await
            .unwrap()
        else {
            unreachable!("final chunk closes the session");
        };

        assert_eq!(final_id, upload_id);
        assert_eq!(data, b"abc");
    }

    #[tokio::test]
    async fn final_chunk_destroys_the_session() {
        let sessions = UploadSessions::new();

        let ChunkOutcome::Complete { upload_id, data } =
            sessions.append_chunk(None, b"whole", true).await.unwrap()
        else {
            unreachable!("single-shot upload completes immediately");
        };
        assert_eq!(data, b"whole");

        let err = sessions
            .append_chunk(Some(upload_id), b"late", false)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotFound));
    }

    #[tokio::test]
    async fn unknown_upload_id_is_rejected() {
        let sessions = UploadSessions::new();
        let err = sessions
            .append_chunk(Some(Uuid::new_v4()), b"x", false)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotFound));
    }
}
