//! Record decoding and Parquet I/O for self-play training data.
//!
//! Provides the wire-record codec (one JSONL line in, a validated sample
//! or a counted rejection out) and the fast-reload Parquet container
//! used to persist an already-validated corpus.

pub mod codec;
pub mod reader;
pub mod types;
pub mod writer;

pub use codec::{decode_line, POLICY_SUM_TOLERANCE};
pub use reader::SampleReader;
pub use types::{
    GameRecord, RejectReason, Sample, BOARD_SIDE, POLICY_LEN, STATE_LEN, STATE_PLANES,
};
pub use writer::SampleWriter;
