use crate::domain::model::{
    Account, AccountSetup, Course, EnrolRequest, EnrolmentInstance, NewAccount, NewCourse, Role,
};
use crate::domain::ports::TargetStore;
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Contents of a [`MemoryStore`] plus a journal of every write.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub courses: Vec<Course>,
    pub accounts: Vec<Account>,
    pub instances: Vec<EnrolmentInstance>,
    pub enabled_plugins: Vec<String>,
    pub forbidden_courses: HashSet<i64>,
    pub roles: Vec<Role>,
    pub roster: HashMap<i64, Vec<i64>>,
    pub refused_usernames: HashSet<String>,
    pub tagging_enabled: bool,
    pub reject_course_creates: bool,
    pub reject_account_setup: bool,

    pub created_courses: Vec<NewCourse>,
    pub created_accounts: Vec<NewAccount>,
    pub setup_steps: Vec<(i64, AccountSetup)>,
    pub notified_accounts: Vec<i64>,
    pub roster_fetches: Vec<i64>,
    pub enrolments: Vec<EnrolRequest>,
}

impl MemoryState {
    /// Empty store with the `manual` plugin enabled and stock role ids.
    pub fn new() -> Self {
        Self {
            enabled_plugins: vec!["manual".to_string()],
            roles: vec![
                Role {
                    id: 3,
                    shortname: "editingteacher".to_string(),
                },
                Role {
                    id: 5,
                    shortname: "student".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    /// Adds a course with an enabled manual enrolment instance (id = course id * 10).
    pub fn with_course(mut self, id: i64, shortname: &str, idnumber: &str) -> Self {
        self.courses.push(Course {
            id,
            shortname: shortname.to_string(),
            fullname: shortname.to_string(),
            idnumber: idnumber.to_string(),
        });
        self.instances.push(EnrolmentInstance {
            id: id * 10,
            course_id: id,
            method: "manual".to_string(),
            enabled: true,
        });
        self
    }

    pub fn with_account(mut self, id: i64, username: &str) -> Self {
        self.accounts.push(Account {
            id,
            username: username.to_string(),
            email: format!("{}@example.org", username),
            firstname: String::new(),
            lastname: String::new(),
            idnumber: String::new(),
        });
        self
    }

    pub fn with_enrolled(mut self, course_id: i64, account_id: i64) -> Self {
        self.roster.entry(course_id).or_default().push(account_id);
        self
    }

    pub fn without_instances(mut self, course_id: i64) -> Self {
        self.instances.retain(|i| i.course_id != course_id);
        self
    }

    pub fn with_disabled_plugin(mut self, plugin: &str) -> Self {
        self.enabled_plugins.retain(|p| p != plugin);
        self
    }

    pub fn with_forbidden_course(mut self, course_id: i64) -> Self {
        self.forbidden_courses.insert(course_id);
        self
    }

    pub fn with_refused_username(mut self, username: &str) -> Self {
        self.refused_usernames.insert(username.to_string());
        self
    }

    pub fn with_tagging(mut self) -> Self {
        self.tagging_enabled = true;
        self
    }

    pub fn with_failing_course_create(mut self) -> Self {
        self.reject_course_creates = true;
        self
    }

    pub fn with_failing_account_setup(mut self) -> Self {
        self.reject_account_setup = true;
        self
    }

    fn next_course_id(&self) -> i64 {
        self.courses.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }

    fn next_account_id(&self) -> i64 {
        self.accounts.iter().map(|a| a.id).max().unwrap_or(100) + 1
    }
}

/// 記憶體內的目標系統，測試用
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    tagging_enabled: bool,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            tagging_enabled: state.tagging_enabled,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn course_by_idnumber(&self, idnumber: &str) -> Result<Option<Course>> {
        let state = self.state.lock().await;
        Ok(state
            .courses
            .iter()
            .find(|c| !c.idnumber.is_empty() && c.idnumber == idnumber)
            .cloned())
    }

    async fn course_by_shortname(&self, shortname: &str) -> Result<Option<Course>> {
        let state = self.state.lock().await;
        Ok(state.courses.iter().find(|c| c.shortname == shortname).cloned())
    }

    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let mut state = self.state.lock().await;
        if state.reject_course_creates {
            return Err(SyncError::TargetError {
                function: "create_course".to_string(),
                errorcode: "shortnametaken".to_string(),
                message: format!("course {} was refused", course.shortname),
            });
        }
        let id = state.next_course_id();
        let created = Course {
            id,
            shortname: course.shortname.clone(),
            fullname: course.fullname.clone(),
            idnumber: course.idnumber.clone(),
        };
        state.courses.push(created.clone());
        state.instances.push(EnrolmentInstance {
            id: id * 10,
            course_id: id,
            method: "manual".to_string(),
            enabled: true,
        });
        state.created_courses.push(course.clone());
        Ok(created)
    }

    async fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.iter().find(|a| a.username == username).cloned())
    }

    async fn account_by_id(&self, id: i64) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<i64> {
        let mut state = self.state.lock().await;
        state.created_accounts.push(account.clone());
        if state.refused_usernames.contains(&account.username) {
            return Ok(0);
        }

        let id = state.next_account_id();
        state.accounts.push(Account {
            id,
            username: account.username.clone(),
            email: account.email.clone(),
            firstname: account.firstname.clone(),
            lastname: account.lastname.clone(),
            idnumber: account.idnumber.clone(),
        });
        Ok(id)
    }

    async fn setup_account(&self, id: i64, step: AccountSetup, _account: &NewAccount) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.reject_account_setup {
            return Err(SyncError::TargetError {
                function: "setup_account".to_string(),
                errorcode: "invaliduser".to_string(),
                message: format!("{:?} failed for user {}", step, id),
            });
        }
        state.setup_steps.push((id, step));
        Ok(())
    }

    async fn notify_account_created(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.notified_accounts.push(id);
        Ok(())
    }

    fn tagging_enabled(&self) -> bool {
        self.tagging_enabled
    }

    async fn enrolment_instances(&self, course_id: i64) -> Result<Vec<EnrolmentInstance>> {
        let state = self.state.lock().await;
        Ok(state
            .instances
            .iter()
            .filter(|i| i.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn enabled_enrol_plugins(&self, _course_id: i64) -> Result<Vec<String>> {
        Ok(self.state.lock().await.enabled_plugins.clone())
    }

    async fn allow_enrol(&self, instance: &EnrolmentInstance) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(instance.enabled && !state.forbidden_courses.contains(&instance.course_id))
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        Ok(self.state.lock().await.roles.clone())
    }

    async fn enrolled_account_ids(&self, course_id: i64) -> Result<Vec<i64>> {
        let mut state = self.state.lock().await;
        state.roster_fetches.push(course_id);
        Ok(state.roster.get(&course_id).cloned().unwrap_or_default())
    }

    async fn enrol(&self, request: &EnrolRequest) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.courses.iter().any(|c| c.id == request.course_id) {
            return Err(SyncError::TargetError {
                function: "enrol".to_string(),
                errorcode: "invalidcourseid".to_string(),
                message: format!("course {} does not exist", request.course_id),
            });
        }
        state.enrolments.push(request.clone());
        state
            .roster
            .entry(request.course_id)
            .or_default()
            .push(request.account_id);
        Ok(())
    }
}
