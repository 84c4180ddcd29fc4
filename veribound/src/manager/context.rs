//! Shared verification state
//!
//! One mutex-guarded context holds the registered class models and the
//! queue of verifications awaiting dispatch. Callers enqueue under the
//! lock and then wait on their completion slot outside it, so a slow
//! solver run never blocks registration or further enqueues.

use std::collections::HashMap;

use crate::error::{Result, VeriboundError};
use crate::model::ClassModel;
use crate::verifier::VerificationResult;

/// Where a finished verification is delivered
pub enum CompletionSlot {
    Blocking(std::sync::mpsc::SyncSender<Result<VerificationResult>>),
    Async(tokio::sync::oneshot::Sender<Result<VerificationResult>>),
}

impl CompletionSlot {
    /// Deliver the outcome; a caller that gave up waiting is ignored.
    pub fn complete(self, outcome: Result<VerificationResult>) {
        match self {
            Self::Blocking(tx) => {
                let _ = tx.try_send(outcome);
            }
            Self::Async(tx) => {
                let _ = tx.send(outcome);
            }
        }
    }
}

/// One queued verification
pub struct PendingVerification {
    pub request_id: u64,
    pub class_name: String,
    pub model: ClassModel,
    pub slot: CompletionSlot,
}

/// Models and pending requests behind the manager's lock
#[derive(Default)]
pub struct VerificationContext {
    models: HashMap<String, ClassModel>,
    pending: Vec<PendingVerification>,
    next_request_id: u64,
}

impl VerificationContext {
    /// Register or replace a class model under its own name.
    pub fn update_model(&mut self, model: ClassModel) {
        self.models.insert(model.name().to_string(), model);
    }

    pub fn model(&self, name: &str) -> Option<&ClassModel> {
        self.models.get(name)
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Evict every class not named in `present`; returns the evicted
    /// names. An empty list clears the context entirely.
    pub fn remove_missing(&mut self, present: &[String]) -> Vec<String> {
        let mut removed: Vec<String> = self
            .models
            .keys()
            .filter(|name| !present.contains(name))
            .cloned()
            .collect();
        removed.sort();
        for name in &removed {
            self.models.remove(name);
        }
        removed
    }

    /// Queue a verification of a registered class. The model is
    /// snapshotted at enqueue time; later updates do not affect requests
    /// already queued.
    pub fn enqueue(&mut self, class_name: &str, slot: CompletionSlot) -> Result<u64> {
        let model = self
            .models
            .get(class_name)
            .cloned()
            .ok_or_else(|| VeriboundError::UnknownClass(class_name.to_string()))?;
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.push(PendingVerification {
            request_id,
            class_name: class_name.to_string(),
            model,
            slot,
        });
        Ok(request_id)
    }

    pub fn take_pending(&mut self) -> Vec<PendingVerification> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
