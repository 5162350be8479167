pub mod kind;
pub mod spans;

pub const TARGET_NAME: &str = "scope_guard";
