use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The fixed set of caller roles. Stored roles and token claims are free text,
/// so every comparison goes through [`normalize_role`] first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Customer,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }

    /// Parses any casing or alias ("BUYER", " Seller ", "administrator").
    pub fn parse(raw: &str) -> Option<Role> {
        match normalize_role(raw).as_str() {
            "customer" => Some(Role::Customer),
            "seller" => Some(Role::Seller),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of a role string: trimmed, lower case, aliases folded.
pub fn normalize_role(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "buyer" => "customer".to_string(),
        "administrator" => "admin".to_string(),
        _ => lowered,
    }
}

/// Membership test shared by the edge guard and the API guard.
///
/// Both sides are normalized, so `"SELLER"` is a member of `["seller"]` and
/// `"seller"` is a member of `["Seller"]`.
pub fn role_permitted<R: AsRef<str>>(role: &str, allowed: &[R]) -> bool {
    let role = normalize_role(role);
    allowed
        .iter()
        .any(|candidate| normalize_role(candidate.as_ref()) == role)
}
