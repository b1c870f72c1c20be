use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A failed upload parked for retry. `analysis_id` is what makes the
/// eventual retry safe: the server recognizes it and will not double-write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingUpload {
    pub analysis_id: Uuid,
    #[serde(with = "audio_bytes")]
    pub audio: Vec<u8>,
    pub analysis_json: serde_json::Value,
    pub latency_ms: Option<i32>,
    pub progress_id: Option<i32>,
    pub retry_count: u32,
}

mod audio_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Items that retried twice and failed again; surfaced to the user as
/// permanently failed and dropped from the queue.
pub const MAX_RETRIES: u32 = 2;

const MAX_ITEMS: usize = 10;
const MAX_TOTAL_BYTES: usize = 10 * 1024 * 1024;

/// Bounded FIFO of failed uploads, mirroring the browser-side pending
/// store: at most 10 items and 10 MB total, oldest evicted first, fully
/// serializable so it survives a page reload.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UploadQueue {
    items: Vec<PendingUpload>,
}

#[derive(Debug, PartialEq)]
pub enum EnqueueResult {
    Stored,
    /// Stored, but the oldest entries were evicted to make room.
    StoredWithEviction(usize),
    /// The single item exceeds the total budget and cannot be stored.
    TooLarge,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn total_bytes(&self) -> usize {
        self.items.iter().map(|i| i.audio.len()).sum()
    }

    /// Park a failed upload. Duplicate analysis ids collapse onto the
    /// existing entry.
    pub fn enqueue(&mut self, item: PendingUpload) -> EnqueueResult {
        if item.audio.len() > MAX_TOTAL_BYTES {
            return EnqueueResult::TooLarge;
        }
        if self.items.iter().any(|i| i.analysis_id == item.analysis_id) {
            return EnqueueResult::Stored;
        }

        let mut evicted = 0;
        self.items.push(item);
        while self.items.len() > MAX_ITEMS || self.total_bytes() > MAX_TOTAL_BYTES {
            self.items.remove(0);
            evicted += 1;
        }

        if evicted > 0 {
            EnqueueResult::StoredWithEviction(evicted)
        } else {
            EnqueueResult::Stored
        }
    }

    /// Drain the queue in order, feeding each item to `retry`. Successful
    /// items are dropped; failures increment retry_count and either go back
    /// to the queue or, at the retry ceiling, are returned as permanently
    /// failed.
    pub async fn drain_with<F, Fut>(&mut self, mut retry: F) -> Vec<PendingUpload>
    where
        F: FnMut(PendingUpload) -> Fut,
        Fut: std::future::Future<Output = Result<(), ()>>,
    {
        let pending = std::mem::take(&mut self.items);
        let mut permanently_failed = Vec::new();

        for mut item in pending {
            match retry(item.clone()).await {
                Ok(()) => {}
                Err(()) => {
                    item.retry_count += 1;
                    if item.retry_count >= MAX_RETRIES {
                        permanently_failed.push(item);
                    } else {
                        self.items.push(item);
                    }
                }
            }
        }

        permanently_failed
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}
