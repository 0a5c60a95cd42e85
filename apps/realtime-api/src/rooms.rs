//! Room address grammar.
//!
//! Rooms are plain strings with a structural taxonomy: `global`,
//! `user_<id>`, `rehearsal_<id>`, `show_<id>`. Ids are opaque: the address
//! is split only on the keyword prefix, so ids may themselves contain
//! underscores. Anything else is an application-defined room handled by the
//! permissive default rule.

use std::fmt;

pub const GLOBAL: &str = "global";

/// Room joined by onboarding-dashboard clients; `onboarding_dashboard_update`
/// bridge events are delivered here.
pub const ONBOARDING_DASHBOARD: &str = "onboarding_dashboard";

/// Room joined by server-analytics clients; `server_analytics_update`
/// bridge events are delivered here.
pub const SERVER_ANALYTICS: &str = "server_analytics";

const USER_PREFIX: &str = "user_";
const REHEARSAL_PREFIX: &str = "rehearsal_";
const SHOW_PREFIX: &str = "show_";

/// A parsed room address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Global,
    User(String),
    Rehearsal(String),
    Show(String),
    /// Unrecognized prefix, kept verbatim.
    Other(String),
}

impl Room {
    pub fn parse(name: &str) -> Room {
        if name == GLOBAL {
            Room::Global
        } else if let Some(id) = name.strip_prefix(USER_PREFIX) {
            Room::User(id.to_string())
        } else if let Some(id) = name.strip_prefix(REHEARSAL_PREFIX) {
            Room::Rehearsal(id.to_string())
        } else if let Some(id) = name.strip_prefix(SHOW_PREFIX) {
            Room::Show(id.to_string())
        } else {
            Room::Other(name.to_string())
        }
    }

    /// The address of a user's private room.
    pub fn user(user_id: &str) -> String {
        format!("{USER_PREFIX}{user_id}")
    }

    /// The address of a rehearsal's room.
    pub fn rehearsal(rehearsal_id: &str) -> String {
        format!("{REHEARSAL_PREFIX}{rehearsal_id}")
    }

    /// The address of a show's room.
    pub fn show(show_id: &str) -> String {
        format!("{SHOW_PREFIX}{show_id}")
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Global => f.write_str(GLOBAL),
            Room::User(id) => write!(f, "{USER_PREFIX}{id}"),
            Room::Rehearsal(id) => write!(f, "{REHEARSAL_PREFIX}{id}"),
            Room::Show(id) => write!(f, "{SHOW_PREFIX}{id}"),
            Room::Other(name) => f.write_str(name),
        }
    }
}
