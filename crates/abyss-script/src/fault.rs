//! Runtime faults raised while a script executes.
use abyss_core::ExceptionInfo;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    DivideByZero,
    NullReference,
    IndexOutOfRange,
    KeyNotFound,
    Type,
    Overflow,
    Argument,
    CapacityExceeded,
    /// Raised by `throw`
    Script,
    /// Wall clock, step budget, or cancellation
    Timeout,
}

impl FaultKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FaultKind::DivideByZero => "DivideByZeroError",
            FaultKind::NullReference => "NullReferenceError",
            FaultKind::IndexOutOfRange => "IndexOutOfRangeError",
            FaultKind::KeyNotFound => "KeyNotFoundError",
            FaultKind::Type => "TypeError",
            FaultKind::Overflow => "OverflowError",
            FaultKind::Argument => "ArgumentError",
            FaultKind::CapacityExceeded => "CapacityExceededError",
            FaultKind::Script => "ScriptError",
            FaultKind::Timeout => "TimeoutError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {}", .kind.type_name(), .message)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

pub type FaultResult<T> = Result<T, Fault>;

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::Type, message)
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::Argument, message)
    }

    pub fn divide_by_zero() -> Self {
        Fault::new(FaultKind::DivideByZero, "Attempted to divide by zero.")
    }

    pub fn null_reference() -> Self {
        Fault::new(
            FaultKind::NullReference,
            "Object reference not set to an instance of an object.",
        )
    }

    pub fn index_out_of_range() -> Self {
        Fault::new(
            FaultKind::IndexOutOfRange,
            "Index was outside the bounds of the array.",
        )
    }

    pub fn key_not_found(key: &str) -> Self {
        Fault::new(
            FaultKind::KeyNotFound,
            format!("The given key '{}' was not present in the dictionary.", key),
        )
    }

    pub fn overflow() -> Self {
        Fault::new(
            FaultKind::Overflow,
            "Arithmetic operation resulted in an overflow.",
        )
    }

    pub fn capacity(limit: usize) -> Self {
        Fault::new(
            FaultKind::CapacityExceeded,
            format!("Collection size exceeds the limit of {} elements.", limit),
        )
    }

    pub fn nesting(limit: usize) -> Self {
        Fault::new(
            FaultKind::CapacityExceeded,
            format!("Collection nesting exceeds the limit of {} levels.", limit),
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Fault::new(FaultKind::Timeout, message)
    }
}

impl From<Fault> for ExceptionInfo {
    fn from(fault: Fault) -> Self {
        ExceptionInfo::new(fault.kind.type_name(), fault.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_to_exception() {
        let info: ExceptionInfo = Fault::divide_by_zero().into();
        assert_eq!(info.type_name, "DivideByZeroError");
        assert_eq!(info.to_string(), "DivideByZeroError: Attempted to divide by zero.");
    }

    #[test]
    fn test_display_names_type() {
        let fault = Fault::key_not_found("k");
        assert_eq!(
            fault.to_string(),
            "KeyNotFoundError: The given key 'k' was not present in the dictionary."
        );
    }
}
