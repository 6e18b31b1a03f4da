use crate::config::toml_config::TargetConfig;
use crate::domain::model::{
    Account, AccountSetup, Course, EnrolRequest, EnrolmentInstance, NewAccount, NewCourse, Role,
};
use crate::domain::ports::TargetStore;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Moodle REST web service (`webservice/rest/server.php`)
pub struct MoodleClient {
    client: Client,
    endpoint: String,
    token: String,
    enabled_plugins: Vec<String>,
    tagging_enabled: bool,
    roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct WsException {
    exception: String,
    #[serde(default)]
    errorcode: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct CourseList {
    #[serde(default)]
    courses: Vec<Course>,
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(default)]
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    id: i64,
    courseid: i64,
    #[serde(rename = "type")]
    method: String,
    #[serde(default)]
    status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    id: i64,
}

/// The web service reports instance status as bool, number or text.
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64() == Some(1),
        serde_json::Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    }
}

impl MoodleClient {
    pub fn new(config: &TargetConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        let mut roles: Vec<Role> = config
            .roles
            .iter()
            .map(|(shortname, id)| Role {
                id: *id,
                shortname: shortname.clone(),
            })
            .collect();
        roles.sort_by_key(|r| r.id);

        Ok(Self {
            client: builder.build()?,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
            enabled_plugins: config.enabled_plugins.clone(),
            tagging_enabled: config.tagging_enabled,
            roles,
        })
    }

    async fn call(&self, function: &str, params: &[(String, String)]) -> Result<serde_json::Value> {
        tracing::debug!("🔧 Calling {}", function);

        let mut form = vec![
            ("wstoken".to_string(), self.token.clone()),
            ("wsfunction".to_string(), function.to_string()),
            ("moodlewsrestformat".to_string(), "json".to_string()),
        ];
        form.extend_from_slice(params);

        let response = self.client.post(&self.endpoint).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::TargetError {
                function: function.to_string(),
                errorcode: status.as_u16().to_string(),
                message: body,
            });
        }

        // void functions answer with an empty body or "null"
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        if value.get("exception").is_some() {
            let exception: WsException = serde_json::from_value(value)?;
            tracing::debug!("Web service exception {}: {}", exception.exception, exception.message);
            return Err(SyncError::TargetError {
                function: function.to_string(),
                errorcode: exception.errorcode,
                message: exception.message,
            });
        }

        Ok(value)
    }

    async fn course_by_field(&self, field: &str, value: &str) -> Result<Option<Course>> {
        let params = vec![
            ("field".to_string(), field.to_string()),
            ("value".to_string(), value.to_string()),
        ];
        let reply = self.call("core_course_get_courses_by_field", &params).await?;
        let list: CourseList = serde_json::from_value(reply)?;

        // an empty value would match every course without that field
        Ok(list.courses.into_iter().find(|c| match field {
            "idnumber" => c.idnumber == value,
            "shortname" => c.shortname == value,
            _ => true,
        }))
    }

    async fn user_by_field(&self, field: &str, value: &str) -> Result<Option<Account>> {
        let params = vec![
            ("field".to_string(), field.to_string()),
            ("values[0]".to_string(), value.to_string()),
        ];
        let reply = self.call("core_user_get_users_by_field", &params).await?;
        let users: Vec<Account> = serde_json::from_value(reply)?;
        Ok(users.into_iter().next())
    }

    async fn set_preferences(&self, id: i64, preferences: &[(&str, &str)]) -> Result<()> {
        let mut params = Vec::new();
        for (i, (name, value)) in preferences.iter().enumerate() {
            params.push((format!("preferences[{}][name]", i), name.to_string()));
            params.push((format!("preferences[{}][value]", i), value.to_string()));
            params.push((format!("preferences[{}][userid]", i), id.to_string()));
        }
        self.call("core_user_set_user_preferences", &params).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetStore for MoodleClient {
    async fn course_by_idnumber(&self, idnumber: &str) -> Result<Option<Course>> {
        self.course_by_field("idnumber", idnumber).await
    }

    async fn course_by_shortname(&self, shortname: &str) -> Result<Option<Course>> {
        self.course_by_field("shortname", shortname).await
    }

    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let params = vec![
            ("courses[0][fullname]".to_string(), course.fullname.clone()),
            ("courses[0][shortname]".to_string(), course.shortname.clone()),
            ("courses[0][categoryid]".to_string(), course.category.to_string()),
            ("courses[0][idnumber]".to_string(), course.idnumber.clone()),
        ];
        let reply = self.call("core_course_create_courses", &params).await?;
        let created: Vec<Created> = serde_json::from_value(reply)?;

        let id = created.first().map(|c| c.id).unwrap_or(0);
        if id <= 0 {
            return Err(SyncError::TargetError {
                function: "core_course_create_courses".to_string(),
                errorcode: "nocourseid".to_string(),
                message: format!("no id returned for {}", course.idnumber),
            });
        }

        Ok(Course {
            id,
            shortname: course.shortname.clone(),
            fullname: course.fullname.clone(),
            idnumber: course.idnumber.clone(),
        })
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.user_by_field("username", username).await
    }

    async fn account_by_id(&self, id: i64) -> Result<Option<Account>> {
        self.user_by_field("id", &id.to_string()).await
    }

    async fn create_account(&self, account: &NewAccount) -> Result<i64> {
        let params = vec![
            ("users[0][auth]".to_string(), account.auth.clone()),
            ("users[0][username]".to_string(), account.username.clone()),
            ("users[0][password]".to_string(), account.password.clone()),
            ("users[0][email]".to_string(), account.email.clone()),
            ("users[0][firstname]".to_string(), account.firstname.clone()),
            ("users[0][lastname]".to_string(), account.lastname.clone()),
            ("users[0][idnumber]".to_string(), account.idnumber.clone()),
        ];
        let reply = self.call("core_user_create_users", &params).await?;
        let created: Vec<Created> = serde_json::from_value(reply)?;
        Ok(created.first().map(|c| c.id).unwrap_or(0))
    }

    async fn setup_account(&self, id: i64, step: AccountSetup, _account: &NewAccount) -> Result<()> {
        match step {
            AccountSetup::Preferences => {
                self.set_preferences(id, &[("auth_forcepasswordchange", "0")]).await
            }
            AccountSetup::Bounces => {
                self.set_preferences(id, &[("email_bounce_count", "0"), ("email_send_count", "0")])
                    .await
            }
            // core_user_create_users already stores these
            AccountSetup::Interests | AccountSetup::ForumTracking | AccountSetup::ProfileFields => {
                tracing::debug!("{:?} for user {} handled by the web service", step, id);
                Ok(())
            }
        }
    }

    async fn notify_account_created(&self, id: i64) -> Result<()> {
        // user_created fires inside core_user_create_users
        tracing::debug!("user_created event for {} raised by the web service", id);
        Ok(())
    }

    fn tagging_enabled(&self) -> bool {
        self.tagging_enabled
    }

    async fn enrolment_instances(&self, course_id: i64) -> Result<Vec<EnrolmentInstance>> {
        let params = vec![("courseid".to_string(), course_id.to_string())];
        let reply = self.call("core_enrol_get_course_enrolment_methods", &params).await?;
        let raw: Vec<RawInstance> = serde_json::from_value(reply)?;

        Ok(raw
            .into_iter()
            .map(|r| EnrolmentInstance {
                id: r.id,
                course_id: r.courseid,
                method: r.method,
                enabled: is_truthy(&r.status),
            })
            .collect())
    }

    async fn enabled_enrol_plugins(&self, _course_id: i64) -> Result<Vec<String>> {
        // site settings are not exposed through the web service
        Ok(self.enabled_plugins.clone())
    }

    async fn allow_enrol(&self, instance: &EnrolmentInstance) -> Result<bool> {
        Ok(instance.enabled)
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.clone())
    }

    async fn enrolled_account_ids(&self, course_id: i64) -> Result<Vec<i64>> {
        let params = vec![
            ("courseid".to_string(), course_id.to_string()),
            ("options[0][name]".to_string(), "userfields".to_string()),
            ("options[0][value]".to_string(), "id".to_string()),
        ];
        let reply = self.call("core_enrol_get_enrolled_users", &params).await?;
        let roster: Vec<RosterEntry> = serde_json::from_value(reply)?;
        Ok(roster.into_iter().map(|u| u.id).collect())
    }

    async fn enrol(&self, request: &EnrolRequest) -> Result<()> {
        let mut params = vec![
            ("enrolments[0][roleid]".to_string(), request.role_id.to_string()),
            ("enrolments[0][userid]".to_string(), request.account_id.to_string()),
            ("enrolments[0][courseid]".to_string(), request.course_id.to_string()),
            ("enrolments[0][timestart]".to_string(), request.time_start.to_string()),
        ];
        if let Some(time_end) = request.time_end {
            params.push(("enrolments[0][timeend]".to_string(), time_end.to_string()));
        }
        self.call("enrol_manual_enrol_users", &params).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&serde_json::json!(true)));
        assert!(is_truthy(&serde_json::json!("true")));
        assert!(is_truthy(&serde_json::json!(1)));
        assert!(!is_truthy(&serde_json::json!("0")));
        assert!(!is_truthy(&serde_json::Value::Null));
    }

    #[test]
    fn test_roles_sorted_by_id() {
        let config = crate::config::toml_config::SyncConfig::from_toml_str(
            r#"
[source]
endpoint = "http://localhost/evento"

[target]
endpoint = "http://localhost/moodle"
token = "t"
"#,
        )
        .unwrap();
        let client = MoodleClient::new(&config.target).unwrap();
        assert_eq!(client.roles.first().map(|r| r.shortname.as_str()), Some("manager"));
        assert_eq!(client.roles.len(), 8);
    }
}
