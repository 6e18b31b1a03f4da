use crate::domain::model::{
    Account, AccountSetup, Course, EnrolRequest, EnrolmentInstance, NewAccount, NewCourse, Role,
    Scope,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 學籍系統 (Evento) 的讀取介面
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Raw records for a scope. An empty payload is an empty list.
    async fn fetch(&self, scope: &Scope) -> Result<Vec<serde_json::Value>>;
}

/// 學習平台 (Moodle) 的查詢與寫入介面
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn course_by_idnumber(&self, idnumber: &str) -> Result<Option<Course>>;
    async fn course_by_shortname(&self, shortname: &str) -> Result<Option<Course>>;
    async fn create_course(&self, course: &NewCourse) -> Result<Course>;

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>>;
    async fn account_by_id(&self, id: i64) -> Result<Option<Account>>;
    /// Returns the new account id; non-positive means the store refused.
    async fn create_account(&self, account: &NewAccount) -> Result<i64>;
    async fn setup_account(&self, id: i64, step: AccountSetup, account: &NewAccount)
        -> Result<()>;
    async fn notify_account_created(&self, id: i64) -> Result<()>;
    fn tagging_enabled(&self) -> bool;

    async fn enrolment_instances(&self, course_id: i64) -> Result<Vec<EnrolmentInstance>>;
    /// Enrol plugins the store currently allows for the course.
    async fn enabled_enrol_plugins(&self, course_id: i64) -> Result<Vec<String>>;
    async fn allow_enrol(&self, instance: &EnrolmentInstance) -> Result<bool>;
    async fn roles(&self) -> Result<Vec<Role>>;
    async fn enrolled_account_ids(&self, course_id: i64) -> Result<Vec<i64>>;
    async fn enrol(&self, request: &EnrolRequest) -> Result<()>;
}
