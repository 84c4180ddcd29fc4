//! Wire messages exchanged between host and worker
//!
//! Replies carry the request id they answer, so the host matches them by
//! correlation rather than arrival order.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::TransportError;
use crate::model::ClassModel;
use crate::verifier::VerificationResult;

/// One class to verify, with its per-request bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub id: u64,
    pub model: ClassModel,
    pub max_depth: usize,
    pub max_duration_ms: u64,
}

/// All requests pending at dispatch time, sent as one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBatch {
    pub requests: Vec<VerifyRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplyOutcome {
    Result(VerificationResult),
    /// The worker could not verify at all (solver missing, bad model)
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReply {
    pub id: u64,
    pub outcome: ReplyOutcome,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(value).map_err(|e| TransportError::Codec(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(bytes).map_err(|e| TransportError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassModelBuilder;

    #[test]
    fn test_request_roundtrip() {
        let model = ClassModelBuilder::new("C").unwrap().build();
        let batch = RequestBatch {
            requests: vec![VerifyRequest {
                id: 7,
                model,
                max_depth: 3,
                max_duration_ms: 1000,
            }],
        };
        let bytes = encode(&batch).unwrap();
        let back: RequestBatch = decode(&bytes).unwrap();
        assert_eq!(back.requests.len(), 1);
        assert_eq!(back.requests[0].id, 7);
        assert_eq!(back.requests[0].model.name(), "C");
    }

    #[test]
    fn test_reply_roundtrip() {
        let reply = VerifyReply {
            id: 9,
            outcome: ReplyOutcome::Result(VerificationResult::Success),
        };
        let bytes = encode(&reply).unwrap();
        let back: VerifyReply = decode(&bytes).unwrap();
        assert_eq!(back.id, 9);
        assert!(matches!(
            back.outcome,
            ReplyOutcome::Result(VerificationResult::Success)
        ));
    }

    #[test]
    fn test_garbage_decodes_to_codec_error() {
        let err = decode::<VerifyReply>(b"not json").unwrap_err();
        assert!(matches!(err, TransportError::Codec(_)));
        assert!(!err.is_fatal());
    }
}
