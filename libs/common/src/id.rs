use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = callboard_common::id::prefixed_ulid("sck");
/// assert!(id.starts_with("sck_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const USER: &str = "usr";
    pub const SOCKET: &str = "sck";
    pub const REQUEST: &str = "req";
    pub const REHEARSAL: &str = "reh";
    pub const SHOW: &str = "shw";
}
