//! Decodes one serialized game record into a validated [`Sample`].
//!
//! Every check except policy renormalization is a hard per-record
//! rejection. Renormalization is the single place the codec silently
//! corrects input: a policy whose sum drifted off 1 (search engines
//! accumulate float error) is rescaled as long as the sum is positive.

use crate::types::{RejectReason, Sample, POLICY_LEN, STATE_LEN};

/// How far `sum(policy)` may drift from 1 before renormalization kicks in.
pub const POLICY_SUM_TOLERANCE: f64 = 1e-5;

/// Wire form with every key optional, so a missing key is
/// distinguishable from a line that is not valid JSON at all.
#[derive(serde::Deserialize)]
struct RawRecord {
    #[serde(default)]
    state: Option<Vec<f64>>,
    #[serde(default)]
    policy: Option<Vec<f64>>,
    #[serde(default)]
    value: Option<f64>,
}

/// Decode and validate a single newline-delimited record.
///
/// Returns the accepted [`Sample`] or the [`RejectReason`] explaining
/// why the record was dropped. Rejections are expected during normal
/// operation; the caller counts them and moves on to the next line.
pub fn decode_line(line: &str) -> Result<Sample, RejectReason> {
    let raw: RawRecord = serde_json::from_str(line)
        .map_err(|e| RejectReason::MalformedEncoding(e.to_string()))?;

    let state = raw.state.ok_or(RejectReason::MissingField("state"))?;
    let policy = raw.policy.ok_or(RejectReason::MissingField("policy"))?;
    let value = raw.value.ok_or(RejectReason::MissingField("value"))?;

    if state.len() != STATE_LEN {
        return Err(RejectReason::WrongShape {
            field: "state",
            expected: STATE_LEN,
            got: state.len(),
        });
    }
    if policy.len() != POLICY_LEN {
        return Err(RejectReason::WrongShape {
            field: "policy",
            expected: POLICY_LEN,
            got: policy.len(),
        });
    }

    let sum: f64 = policy.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(RejectReason::NonPositivePolicySum(sum));
    }
    let policy: Vec<f64> = if (sum - 1.0).abs() > POLICY_SUM_TOLERANCE {
        policy.into_iter().map(|p| p / sum).collect()
    } else {
        policy
    };

    if !(-1.0..=1.0).contains(&value) {
        return Err(RejectReason::ValueOutOfRange(value));
    }

    Ok(Sample::from_trusted_parts(
        state.into_iter().map(|v| v as f32).collect(),
        policy.into_iter().map(|p| p as f32).collect(),
        value as f32,
    ))
}
