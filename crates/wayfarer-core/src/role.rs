// User roles (closed set)

use serde::{Deserialize, Serialize};

/// Role drawn from a fixed set. Stored in the database as the kebab-case
/// string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    Regular,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regular" => Some(Role::Regular),
            "guide" => Some(Role::Guide),
            "lead-guide" => Some(Role::LeadGuide),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for role in [Role::Regular, Role::Guide, Role::LeadGuide, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&Role::LeadGuide).unwrap();
        assert_eq!(json, "\"lead-guide\"");
        let role: Role = serde_json::from_str("\"lead-guide\"").unwrap();
        assert_eq!(role, Role::LeadGuide);
    }

    #[test]
    fn test_default_is_regular() {
        assert_eq!(Role::default(), Role::Regular);
    }
}
