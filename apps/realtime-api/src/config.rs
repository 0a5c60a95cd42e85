/// Realtime service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    /// Shared secret the handshake tokens are signed with.
    pub handshake_secret: String,
    /// Lifetime of a freshly issued handshake token, in seconds.
    pub handshake_ttl_secs: u64,
    /// Shared secret expected by the `POST /events` bridge ingress.
    pub bridge_token: String,
    /// Path the bridge ingress is mounted at.
    pub bridge_event_path: String,
    /// Base URL of the membership directory (room-access lookups).
    pub directory_url: String,
    /// Optional bearer token for directory requests.
    pub directory_token: Option<String>,
}

/// Default handshake token lifetime (seconds).
pub const DEFAULT_HANDSHAKE_TTL_SECS: u64 = 300;

/// Candidate environment variables for the handshake secret, checked in order.
/// Older deployments exported the secret under the legacy names.
const HANDSHAKE_SECRET_VARS: &[&str] = &[
    "CALLBOARD_HANDSHAKE_SECRET",
    "REALTIME_HANDSHAKE_SECRET",
    "SOCKET_HANDSHAKE_SECRET",
];

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4010),
            handshake_secret: handshake_secret_from_env(),
            handshake_ttl_secs: std::env::var("HANDSHAKE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_HANDSHAKE_TTL_SECS),
            bridge_token: required_var("BRIDGE_TOKEN"),
            bridge_event_path: std::env::var("BRIDGE_EVENT_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "/events".to_string()),
            directory_url: required_var("DIRECTORY_URL"),
            directory_token: std::env::var("DIRECTORY_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

fn handshake_secret_from_env() -> String {
    for name in HANDSHAKE_SECRET_VARS {
        if let Ok(value) = std::env::var(name) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    panic!("one of {HANDSHAKE_SECRET_VARS:?} env vars is required");
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
