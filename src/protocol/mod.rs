pub mod command;
pub mod message;

/// requests longer than this are rejected before parsing
pub const MAX_REQUEST_LEN: usize = 64 * 1024;
