//! Scripted remote operation

use async_trait::async_trait;
use resman_core::{RecordId, RemoteError, RemoteOperation, ResourceRecord};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return the payload unchanged
    Echo,
    /// Return the payload with `id` written into it
    Assign(RecordId),
    /// Return this record
    Record(ResourceRecord),
    /// Return no body
    Empty,
    /// Reject
    Fail(RemoteError),
}

/// Remote operation replaying scripted responses
///
/// Responses are consumed in order; once the script runs out every call gets
/// the fallback (echo by default). Clones share the script and call log, so a
/// test can hand one clone to the engine and inspect the other.
///
/// # Examples
///
/// ```rust,no_run
/// use resman_core::RemoteError;
/// use resman_test_utils::MockRemote;
///
/// let remote = MockRemote::new()
///     .then_fail(RemoteError::timeout("slow"))
///     .then_assign(7);
/// ```
#[derive(Clone, Default)]
pub struct MockRemote {
    behavior: Arc<Mutex<MockBehavior>>,
}

#[derive(Debug)]
struct MockBehavior {
    script: VecDeque<MockResponse>,
    fallback: MockResponse,
    delay: Duration,
    payloads: Vec<ResourceRecord>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            fallback: MockResponse::Echo,
            delay: Duration::ZERO,
            payloads: Vec::new(),
        }
    }
}

impl MockRemote {
    /// Create a mock that echoes every payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that always rejects with `error`
    pub fn failing(error: RemoteError) -> Self {
        Self::new().otherwise(MockResponse::Fail(error))
    }

    /// Queue a response
    pub fn then(self, response: MockResponse) -> Self {
        self.behavior.lock().unwrap().script.push_back(response);
        self
    }

    pub fn then_fail(self, error: RemoteError) -> Self {
        self.then(MockResponse::Fail(error))
    }

    pub fn then_assign(self, id: impl Into<RecordId>) -> Self {
        self.then(MockResponse::Assign(id.into()))
    }

    pub fn then_record(self, record: ResourceRecord) -> Self {
        self.then(MockResponse::Record(record))
    }

    /// Response used once the script is exhausted
    pub fn otherwise(self, response: MockResponse) -> Self {
        self.behavior.lock().unwrap().fallback = response;
        self
    }

    /// Wait `delay` before answering each call
    pub fn with_delay(self, delay: Duration) -> Self {
        self.behavior.lock().unwrap().delay = delay;
        self
    }

    /// Number of calls received
    pub fn call_count(&self) -> usize {
        self.behavior.lock().unwrap().payloads.len()
    }

    /// Payloads received, in call order
    pub fn payloads(&self) -> Vec<ResourceRecord> {
        self.behavior.lock().unwrap().payloads.clone()
    }
}

#[async_trait]
impl RemoteOperation for MockRemote {
    async fn call(&self, payload: &ResourceRecord) -> Result<Option<ResourceRecord>, RemoteError> {
        let (response, delay) = {
            let mut behavior = self.behavior.lock().unwrap();
            behavior.payloads.push(payload.clone());
            let response = behavior
                .script
                .pop_front()
                .unwrap_or_else(|| behavior.fallback.clone());
            (response, behavior.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match response {
            MockResponse::Echo => Ok(Some(payload.clone())),
            MockResponse::Assign(id) => Ok(Some(payload.clone().with_id(&id))),
            MockResponse::Record(record) => Ok(Some(record)),
            MockResponse::Empty => Ok(None),
            MockResponse::Fail(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let remote = MockRemote::new()
            .then_fail(RemoteError::timeout("slow"))
            .then_assign(7);
        let payload = ResourceRecord::new().with("name", "X");

        assert!(remote.call(&payload).await.is_err());
        let record = remote.call(&payload).await.unwrap().unwrap();
        assert_eq!(record.id(), Some(RecordId::Num(7)));
        assert_eq!(remote.call(&payload).await.unwrap(), Some(payload.clone()));
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_log() {
        let remote = MockRemote::failing(RemoteError::permission("no"));
        let handle = remote.clone();

        let _ = remote.call(&ResourceRecord::new()).await;
        assert_eq!(handle.call_count(), 1);
    }
}
