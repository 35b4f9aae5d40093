//! Stable diagnostic ids produced by the compile stage.

pub const SYNTAX_ERROR: &str = "SC1001";
pub const BAD_ESCAPE: &str = "SC1009";
pub const CONSTANT_TOO_LARGE: &str = "SC1021";
pub const TOO_DEEPLY_NESTED: &str = "SC8078";

pub const UNKNOWN_NAME: &str = "SC0103";
pub const DUPLICATE_LOCAL: &str = "SC0128";
pub const TYPE_MISMATCH: &str = "SC0029";
pub const NULL_TO_VALUE_TYPE: &str = "SC0037";
pub const WRONG_ARITY: &str = "SC1501";
pub const NO_ENCLOSING_LOOP: &str = "SC0139";
pub const NOT_INVOCABLE: &str = "SC0149";
pub const HELPER_AS_VALUE: &str = "SC0428";
pub const ASSIGN_TO_HELPER: &str = "SC1656";

pub const HIDES_HELPER: &str = "SC0136";
pub const UNUSED_LOCAL: &str = "SC0168";
pub const UNREACHABLE: &str = "SC0162";
