use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollOp {
    Barrier,
    Broadcast,
    Gather,
    Scatter,
    AllGather,
    AllToAll,
    Reduce,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    // toward the root
    Up,
    // away from the root
    Down,
    // straight to the root, bypassing the tree
    Direct,
}

/// Identifies one tree step; checked by the receiver against what it expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepHeader {
    pub op: CollOp,
    pub phase: Phase,
    pub level: u32,
}

impl StepHeader {
    pub fn new(op: CollOp, phase: Phase, level: usize) -> Self {
        StepHeader {
            op,
            phase,
            level: level as u32,
        }
    }
}

/// A peer did not behave as the current tree step requires.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("Expected {expected:?} from rank {peer}, received {found:?}")]
    UnexpectedStep {
        peer: usize,
        expected: StepHeader,
        found: StepHeader,
    },
    #[error("Expected {expected} items from rank {peer} at {step:?}, received {found}")]
    UnexpectedLength {
        peer: usize,
        step: StepHeader,
        expected: usize,
        found: usize,
    },
}

impl StepHeader {
    pub fn check(
        &self,
        peer: usize,
        found: StepHeader,
        expected_len: usize,
        found_len: usize,
    ) -> Result<(), ProtocolViolation> {
        if found != *self {
            return Err(ProtocolViolation::UnexpectedStep {
                peer,
                expected: *self,
                found,
            });
        }
        if found_len != expected_len {
            return Err(ProtocolViolation::UnexpectedLength {
                peer,
                step: *self,
                expected: expected_len,
                found: found_len,
            });
        }
        Ok(())
    }
}

pub fn encode<T: Serialize>(header: StepHeader, items: &[T]) -> Result<Bytes, bincode::Error> {
    let encoded = bincode::serialize(&(header, items))?;
    Ok(Bytes::from(encoded))
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<(StepHeader, Vec<T>), bincode::Error> {
    bincode::deserialize(payload)
}
