use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 來源端的查詢範圍
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Programs,
    ModulesOf(String),
    MembersOf(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Programs => write!(f, "programs"),
            Scope::ModulesOf(id) => write!(f, "modules-of:{}", id),
            Scope::MembersOf(id) => write!(f, "members-of:{}", id),
        }
    }
}

/// Evento sends ids as numbers or strings depending on the endpoint.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A key that exists counts as present, even with a `null` value.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nummer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bezeichnung: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

impl Program {
    pub fn code(&self) -> &str {
        self.nummer.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nummer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bezeichnung: Option<String>,
}

impl Module {
    pub fn code(&self) -> &str {
        self.nummer.as_deref().unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.bezeichnung.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Member {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mail: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vorname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nachname: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub rolle: Option<serde_json::Value>,
}

impl Member {
    /// Mail address, if the source delivered a non-empty one.
    pub fn email(&self) -> Option<&str> {
        self.mail.as_deref().filter(|m| !m.trim().is_empty())
    }

    pub fn identity(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|u| !u.is_empty())
    }

    pub fn has_role_marker(&self) -> bool {
        self.rolle.is_some()
    }
}

/// 目標系統中的課程
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    #[serde(default)]
    pub shortname: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub idnumber: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCourse {
    pub fullname: String,
    pub shortname: String,
    pub idnumber: String,
    pub category: i64,
}

/// 目標系統中的帳號
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub idnumber: String,
}

/// Marker password for accounts whose credentials live at the identity provider.
pub const PASSWORD_NOT_CACHED: &str = "not cached";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccount {
    pub auth: String,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub idnumber: String,
    pub confirmed: bool,
    pub interests: String,
    pub timecreated: i64,
    pub local_host: bool,
    pub password: String,
}

/// Post-create steps the target store needs for a usable account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountSetup {
    Preferences,
    Interests,
    Bounces,
    ForumTracking,
    ProfileFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub shortname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolmentInstance {
    pub id: i64,
    pub course_id: i64,
    /// enrol plugin name, e.g. `manual`
    pub method: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrolRequest {
    pub instance_id: i64,
    pub course_id: i64,
    pub account_id: i64,
    pub role_id: i64,
    pub time_start: i64,
    pub time_end: Option<i64>,
    pub recover_grades: bool,
}
