//! Authentication Models
//! Mission: Define identities, role-shaped profiles, token claims and sessions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four user kinds of the dashboard.
///
/// This is the only place where role strings are interpreted. Everything
/// downstream (route mapping, comparisons, storage) goes through the enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Teacher, Role::Student, Role::Parent];

    /// Canonical wire/storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
            Role::Parent => "PARENT",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Root of this role's section of the dashboard.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Teacher => "/teacher",
            Role::Student => "/student",
            Role::Parent => "/parent",
        }
    }

    /// Matches a leading path segment ("teacher", "Teacher", ...) to a role section.
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.dashboard_path()[1..].eq_ignore_ascii_case(segment))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication record (one per user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminProfile {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub name: String,
    pub surname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub name: String,
    pub surname: String,
    pub grade: Option<u8>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentProfile {
    pub name: String,
    pub surname: String,
    pub phone: Option<String>,
}

/// Display data for an identity. The variant is selected by the identity's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Admin(AdminProfile),
    Teacher(TeacherProfile),
    Student(StudentProfile),
    Parent(ParentProfile),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Admin(_) => Role::Admin,
            Profile::Teacher(_) => Role::Teacher,
            Profile::Student(_) => Role::Student,
            Profile::Parent(_) => Role::Parent,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Profile::Admin(p) => &p.name,
            Profile::Teacher(p) => &p.name,
            Profile::Student(p) => &p.name,
            Profile::Parent(p) => &p.name,
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // identity id
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Server-tracked refresh token grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub user_agent: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub is_valid: bool,
    pub last_used: i64,
}

/// Non-authoritative copy of the identity kept in a client-readable cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl UserContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// User as returned by the API. Has no secret field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedUser {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

impl SanitizedUser {
    pub fn new(user: &User, profile: Option<Profile>) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            profile,
        }
    }
}

/// Login request body. Fields are optional so a missing one maps to a 400.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: SanitizedUser,
    pub expires_in: i64, // seconds until the access token expires
}

/// Optional body for clients that cannot hold cookies
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: SanitizedUser,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::Teacher).unwrap();
        assert_eq!(json, r#""TEACHER""#);

        let parent: Role = serde_json::from_str(r#""PARENT""#).unwrap();
        assert_eq!(parent, Role::Parent);
    }

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Student"), Some(Role::Student));
        assert_eq!(Role::parse(" PARENT "), Some(Role::Parent));
        assert_eq!(Role::parse("trader"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_role_routes() {
        assert_eq!(Role::Admin.dashboard_path(), "/admin");
        assert_eq!(Role::Teacher.dashboard_path(), "/teacher");
        assert_eq!(Role::Student.dashboard_path(), "/student");
        assert_eq!(Role::Parent.dashboard_path(), "/parent");

        assert_eq!(Role::from_segment("teacher"), Some(Role::Teacher));
        assert_eq!(Role::from_segment("TEACHER"), Some(Role::Teacher));
        assert_eq!(Role::from_segment("teachers"), None);
        assert_eq!(Role::from_segment(""), None);
    }

    #[test]
    fn test_profile_role_matches_variant() {
        let profile = Profile::Student(StudentProfile {
            name: "Ada".to_string(),
            surname: "Lovelace".to_string(),
            grade: Some(7),
            class_name: Some("7B".to_string()),
        });
        assert_eq!(profile.role(), Role::Student);
        assert_eq!(profile.display_name(), "Ada");

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["kind"], "student");
        assert_eq!(json["className"], "7B");
    }

    #[test]
    fn test_user_never_serializes_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "mrs.smith".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            role: Role::Teacher,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("secret"));

        let sanitized = serde_json::to_string(&SanitizedUser::new(&user, None)).unwrap();
        assert!(!sanitized.contains("password"));
    }
}
