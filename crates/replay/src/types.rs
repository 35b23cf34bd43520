//! Data types for self-play game records and validated training samples.

use serde::{Deserialize, Serialize};

/// Number of feature planes in an encoded board state.
pub const STATE_PLANES: usize = 10;

/// Side length of the (square) board.
pub const BOARD_SIDE: usize = 6;

/// Total scalar components in one encoded state (10 planes × 6 × 6).
pub const STATE_LEN: usize = STATE_PLANES * BOARD_SIDE * BOARD_SIDE;

/// Size of the fixed action space the policy distribution covers.
pub const POLICY_LEN: usize = 188;

/// One game record as emitted by the self-play engine.
///
/// This is the wire form: a flat 360-element state encoding, a
/// 188-element move-probability target, and the game outcome from the
/// acting player's perspective. Use [`crate::codec::decode_line`] to
/// turn a serialized record into a validated [`Sample`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    /// Flattened board state (row-major over planes, rows, columns).
    pub state: Vec<f32>,
    /// Search-derived move probabilities over the fixed action space.
    pub policy: Vec<f32>,
    /// Game outcome in [-1, 1].
    pub value: f32,
}

/// Why a record was rejected by the codec.
///
/// Rejections are per-record and recoverable: callers count them by
/// [`kind`](RejectReason::kind) and keep reading the stream.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    /// A required key (`state`, `policy`, or `value`) is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// The line is not a well-formed record (bad JSON, non-numeric array).
    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),
    /// `state` or `policy` has the wrong number of components.
    #[error("wrong shape for `{field}`: expected {expected} values, got {got}")]
    WrongShape {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    /// The policy components sum to zero or less, so no distribution
    /// can be recovered by renormalization.
    #[error("policy sum {0} is not positive")]
    NonPositivePolicySum(f64),
    /// The value target falls outside the closed interval [-1, 1].
    #[error("value {0} outside [-1, 1]")]
    ValueOutOfRange(f64),
}

impl RejectReason {
    /// Stable short name for counting rejections by category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing-field",
            Self::MalformedEncoding(_) => "malformed-encoding",
            Self::WrongShape { .. } => "wrong-shape",
            Self::NonPositivePolicySum(_) => "non-positive-policy-sum",
            Self::ValueOutOfRange(_) => "value-out-of-range",
        }
    }
}

/// A validated, immutable training example.
///
/// Invariants held by construction: the state has exactly [`STATE_LEN`]
/// components, the policy has exactly [`POLICY_LEN`] non-negative
/// components summing to 1 (within float rounding), and the value lies
/// in [-1, 1]. Fields are private so no caller can break them after
/// acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    state: Vec<f32>,
    policy: Vec<f32>,
    value: f32,
}

impl Sample {
    /// Build a sample from parts that are already known to be valid.
    ///
    /// This is the fast reload path used by the corpus container reader,
    /// which stores only codec-accepted data and therefore skips
    /// re-validation. Lengths are still checked in debug builds.
    pub fn from_trusted_parts(state: Vec<f32>, policy: Vec<f32>, value: f32) -> Self {
        debug_assert_eq!(state.len(), STATE_LEN);
        debug_assert_eq!(policy.len(), POLICY_LEN);
        Self { state, policy, value }
    }

    /// Flattened board state, length [`STATE_LEN`].
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    /// Normalized move-probability target, length [`POLICY_LEN`].
    pub fn policy(&self) -> &[f32] {
        &self.policy
    }

    /// Game outcome in [-1, 1].
    pub fn value(&self) -> f32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_constants() {
        assert_eq!(STATE_LEN, 360);
        assert_eq!(STATE_PLANES * BOARD_SIDE * BOARD_SIDE, STATE_LEN);
        assert_eq!(POLICY_LEN, 188);
    }

    #[test]
    fn test_reject_reason_kinds() {
        assert_eq!(RejectReason::MissingField("state").kind(), "missing-field");
        assert_eq!(
            RejectReason::MalformedEncoding("not json".into()).kind(),
            "malformed-encoding"
        );
        assert_eq!(
            RejectReason::WrongShape { field: "policy", expected: 188, got: 3 }.kind(),
            "wrong-shape"
        );
        assert_eq!(RejectReason::NonPositivePolicySum(0.0).kind(), "non-positive-policy-sum");
        assert_eq!(RejectReason::ValueOutOfRange(2.0).kind(), "value-out-of-range");
    }

    #[test]
    fn test_reject_reason_messages() {
        let err = RejectReason::WrongShape { field: "state", expected: 360, got: 12 };
        assert_eq!(err.to_string(), "wrong shape for `state`: expected 360 values, got 12");
        assert_eq!(
            RejectReason::ValueOutOfRange(1.5).to_string(),
            "value 1.5 outside [-1, 1]"
        );
    }

    #[test]
    fn test_game_record_serde_roundtrip() {
        let record = GameRecord {
            state: vec![0.5; STATE_LEN],
            policy: vec![1.0 / POLICY_LEN as f32; POLICY_LEN],
            value: -1.0,
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: GameRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state.len(), STATE_LEN);
        assert_eq!(parsed.policy.len(), POLICY_LEN);
        assert_eq!(parsed.value, -1.0);
    }

    #[test]
    fn test_sample_accessors() {
        let sample = Sample::from_trusted_parts(
            vec![0.0; STATE_LEN],
            vec![1.0 / POLICY_LEN as f32; POLICY_LEN],
            0.5,
        );
        assert_eq!(sample.state().len(), STATE_LEN);
        assert_eq!(sample.policy().len(), POLICY_LEN);
        assert_eq!(sample.value(), 0.5);
    }
}
