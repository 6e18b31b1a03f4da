use evento_sync::config::toml_config::{SyncConfig, TargetConfig};
use evento_sync::core::TargetStore;
use evento_sync::domain::model::{EnrolRequest, NewAccount, NewCourse, PASSWORD_NOT_CACHED};
use evento_sync::{MoodleClient, SyncError};
use httpmock::prelude::*;

const REST_PATH: &str = "/webservice/rest/server.php";

fn target_config(server: &MockServer) -> TargetConfig {
    let content = format!(
        r#"
[source]
endpoint = "http://localhost/evento"

[target]
endpoint = "{}"
token = "test-token"
timeout_seconds = 5
"#,
        server.url(REST_PATH)
    );
    SyncConfig::from_toml_str(&content).unwrap().target
}

fn client(server: &MockServer) -> MoodleClient {
    MoodleClient::new(&target_config(server)).unwrap()
}

#[tokio::test]
async fn test_course_lookup_by_idnumber() -> anyhow::Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path(REST_PATH)
            .body_contains("wstoken=test-token")
            .body_contains("wsfunction=core_course_get_courses_by_field")
            .body_contains("field=idnumber")
            .body_contains("value=M1");
        then.status(200).json_body(serde_json::json!({
            "courses": [
                {"id": 12, "shortname": "M1", "fullname": "Modul 1", "idnumber": "M1", "format": "topics"}
            ],
            "warnings": []
        }));
    });

    let course = client(&server).course_by_idnumber("M1").await?;

    api_mock.assert();
    let course = course.expect("course should be found");
    assert_eq!(course.id, 12);
    assert_eq!(course.fullname, "Modul 1");
    Ok(())
}

#[tokio::test]
async fn test_course_lookup_ignores_other_idnumbers() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(REST_PATH);
        then.status(200).json_body(serde_json::json!({
            "courses": [{"id": 3, "shortname": "X", "fullname": "X", "idnumber": ""}]
        }));
    });

    assert!(client(&server).course_by_idnumber("M1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_exception_reply_is_target_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(REST_PATH);
        then.status(200).json_body(serde_json::json!({
            "exception": "webservice_access_exception",
            "errorcode": "accessexception",
            "message": "Access control exception"
        }));
    });

    let result = client(&server).account_by_username("u1").await;
    match result {
        Err(SyncError::TargetError {
            function, errorcode, ..
        }) => {
            assert_eq!(function, "core_user_get_users_by_field");
            assert_eq!(errorcode, "accessexception");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_course_without_id_fails() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(REST_PATH)
            .body_contains("wsfunction=core_course_create_courses");
        then.status(200).json_body(serde_json::json!([]));
    });

    let course = NewCourse {
        fullname: "Modul 1".to_string(),
        shortname: "M1".to_string(),
        idnumber: "M1".to_string(),
        category: 1,
    };
    let result = client(&server).create_course(&course).await;
    assert!(matches!(result, Err(SyncError::TargetError { errorcode, .. }) if errorcode == "nocourseid"));
}

#[tokio::test]
async fn test_create_account_returns_new_id() -> anyhow::Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path(REST_PATH)
            .body_contains("wsfunction=core_user_create_users")
            .body_contains("users%5B0%5D%5Busername%5D=u-77")
            .body_contains("users%5B0%5D%5Bauth%5D=shibboleth");
        then.status(200)
            .json_body(serde_json::json!([{"id": 4711, "username": "u-77"}]));
    });

    let account = NewAccount {
        auth: "shibboleth".to_string(),
        username: "u-77".to_string(),
        email: "u77@example.org".to_string(),
        firstname: "Anna".to_string(),
        lastname: "Muster".to_string(),
        idnumber: "77".to_string(),
        confirmed: true,
        interests: String::new(),
        timecreated: 0,
        local_host: true,
        password: PASSWORD_NOT_CACHED.to_string(),
    };
    let id = client(&server).create_account(&account).await?;

    api_mock.assert();
    assert_eq!(id, 4711);
    Ok(())
}

#[tokio::test]
async fn test_enrolment_instances_parse_status() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(REST_PATH)
            .body_contains("wsfunction=core_enrol_get_course_enrolment_methods")
            .body_contains("courseid=12");
        then.status(200).json_body(serde_json::json!([
            {"id": 120, "courseid": 12, "type": "manual", "name": "Manual", "status": "true"},
            {"id": 121, "courseid": 12, "type": "self", "name": "Self", "status": false}
        ]));
    });

    let instances = client(&server).enrolment_instances(12).await?;

    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].method, "manual");
    assert!(instances[0].enabled);
    assert!(!instances[1].enabled);
    Ok(())
}

#[tokio::test]
async fn test_enrolled_account_ids() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(REST_PATH)
            .body_contains("wsfunction=core_enrol_get_enrolled_users");
        then.status(200)
            .json_body(serde_json::json!([{"id": 5}, {"id": 9, "fullname": "B"}]));
    });

    assert_eq!(client(&server).enrolled_account_ids(12).await?, vec![5, 9]);
    Ok(())
}

#[tokio::test]
async fn test_enrol_sends_manual_enrolment() -> anyhow::Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path(REST_PATH)
            .body_contains("wsfunction=enrol_manual_enrol_users")
            .body_contains("enrolments%5B0%5D%5Broleid%5D=5")
            .body_contains("enrolments%5B0%5D%5Buserid%5D=4711")
            .body_contains("enrolments%5B0%5D%5Bcourseid%5D=12")
            .body_contains("enrolments%5B0%5D%5Btimestart%5D=1726437600");
        then.status(200).body("null");
    });

    let request = EnrolRequest {
        instance_id: 120,
        course_id: 12,
        account_id: 4711,
        role_id: 5,
        time_start: 1_726_437_600,
        time_end: None,
        recover_grades: false,
    };
    client(&server).enrol(&request).await?;

    api_mock.assert();
    Ok(())
}

#[tokio::test]
async fn test_roles_and_plugins_come_from_config() -> anyhow::Result<()> {
    let server = MockServer::start();
    let store = client(&server);

    let roles = store.roles().await?;
    assert!(roles.iter().any(|r| r.shortname == "student" && r.id == 5));
    assert_eq!(store.enabled_enrol_plugins(12).await?, vec!["manual".to_string()]);
    assert!(!store.tagging_enabled());
    Ok(())
}
