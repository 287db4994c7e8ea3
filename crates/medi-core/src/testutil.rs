//! Test utilities: mock implementations of the external-service traits.
//!
//! Handwritten mocks for dependency injection in unit and integration
//! tests. All mocks use `Arc<Mutex<_>>` so tests can inspect recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use crate::error::AppError;
use crate::traits::{Completion, CompletionRequest, IdentityVerifier, TextGenerator};
use crate::user::VerifiedIdentity;

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

/// Mock generator that replays queued responses and records requests.
#[derive(Clone, Default)]
pub struct MockGenerator {
    /// Each call pops the first element. If empty, echoes the last user message.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockGenerator {
    pub fn new(text: &str) -> Self {
        Self::with_responses(vec![Ok(text.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TextGenerator for MockGenerator {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<Completion, AppError>> {
        let echo = request
            .messages
            .last()
            .map(|m| format!("echo: {}", m.content))
            .unwrap_or_default();
        self.requests.lock().unwrap().push(request);

        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(echo)
            } else {
                responses.remove(0)
            }
        };
        Box::pin(async move {
            next.map(|text| Completion {
                text,
                model: "mock-model".to_string(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// MockVerifier
// ---------------------------------------------------------------------------

/// Mock identity verifier with a fixed token table.
#[derive(Clone, Default)]
pub struct MockVerifier {
    identities: Arc<Mutex<HashMap<String, VerifiedIdentity>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as proof of a verified identity with this uid and email.
    pub fn with_identity(self, token: &str, uid: &str, email: &str) -> Self {
        self.identities.lock().unwrap().insert(
            token.to_string(),
            VerifiedIdentity {
                uid: uid.to_string(),
                email: Some(email.to_string()),
                display_name: None,
                email_verified: true,
            },
        );
        self
    }

    /// Number of verification calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl IdentityVerifier for MockVerifier {
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<VerifiedIdentity, AppError>> {
        self.calls.lock().unwrap().push(token.to_string());
        let found = self.identities.lock().unwrap().get(token).cloned();
        Box::pin(async move {
            found.ok_or_else(|| AppError::Unauthorized("invalid identity token".into()))
        })
    }
}
