use crate::error::Error;

/// Tagged result of a side-effecting sub-step.
///
/// Collaborators report what happened; the pipeline controller decides per
/// step whether a `HardFailure` aborts the run or is absorbed as a no-op.
#[derive(Debug, Clone)]
pub enum StepOutcome<T> {
    Success(T),
    NoOpSkipped { reason: String },
    HardFailure(Error),
}

impl<T> StepOutcome<T> {
    pub fn no_op(reason: impl Into<String>) -> Self {
        StepOutcome::NoOpSkipped {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_op_carries_its_reason() {
        let outcome = StepOutcome::<()>::no_op("clean");
        match outcome {
            StepOutcome::NoOpSkipped { reason } => assert_eq!(reason, "clean"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
