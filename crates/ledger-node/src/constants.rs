pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_PEER_TIMEOUT_SECS: u64 = 5;
/// Fields a submitted transaction must carry with a non-empty value.
pub const DEFAULT_REQUIRED_FIELDS: [&str; 2] = ["author", "content"];
