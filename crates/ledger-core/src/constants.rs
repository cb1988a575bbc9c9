/// Length of a lowercase hex SHA-256 digest, the most leading zeros a hash can have.
pub const HASH_HEX_SIZE: usize = 64;
/// Leading `'0'` hex characters a block hash needs to be accepted.
pub const DIFFICULTY: usize = 2;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
