use serde::{Deserialize, Serialize};

/// Staff role. Admins see everything; dieticians only their own clients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "dietitian")]
    Dietician,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Dietician => "dietician",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "dietician" | "dietitian" => Some(Role::Dietician),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT payload of a staff session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // staff id
    pub role: Role,
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_accepts_both_spellings() {
        assert_eq!(Role::parse("dietitian"), Some(Role::Dietician));
        assert_eq!(Role::parse(" Dietician "), Some(Role::Dietician));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("client"), None);

        let r: Role = serde_json::from_str("\"dietitian\"").unwrap();
        assert_eq!(r, Role::Dietician);
        assert_eq!(serde_json::to_string(&Role::Dietician).unwrap(), "\"dietician\"");
    }
}
