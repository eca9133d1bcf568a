use std::time::Duration;

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::knowledge::KnowledgeBackend;
use crate::responder::SmartResponder;

pub struct HandlerState<B: KnowledgeBackend> {
    pub responder: SmartResponder<B>,

    /// Budget for one `POST /v1/responses` request.
    pub request_timeout: Duration,
}

impl<B: KnowledgeBackend> Clone for HandlerState<B> {
    fn clone(&self) -> Self {
        Self {
            responder: self.responder.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<B: KnowledgeBackend> HandlerState<B> {
    pub fn new(responder: SmartResponder<B>) -> Self {
        Self {
            responder,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
