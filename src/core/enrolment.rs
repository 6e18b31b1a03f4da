use crate::core::report::SyncStats;
use crate::domain::model::{Account, Course, EnrolRequest, EnrolmentInstance};
use crate::domain::ports::TargetStore;
use crate::utils::error::{Result, SyncError};
use chrono::{DateTime, Local, TimeZone};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_ROLE: &str = "student";
pub const TEACHER_ROLE: &str = "editingteacher";

/// Midnight of the day `now` falls on, in `now`'s time zone.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .map(|start| start.timestamp())
        .unwrap_or_else(|| now.timestamp())
}

/// 單一模組與角色的選課機制與名單快照
#[derive(Debug, Clone)]
pub struct EnrolmentContext {
    pub instance: EnrolmentInstance,
    pub plugin: String,
    pub role_id: i64,
    pub role_name: String,
    pub time_start: i64,
    pub members: HashSet<i64>,
}

impl EnrolmentContext {
    /// Runs the policy checks and takes one roster snapshot.
    pub async fn build<T: TargetStore + ?Sized>(
        store: &T,
        course: &Course,
        method: &str,
        role: &str,
        time_start: i64,
    ) -> Result<Self> {
        let instance = store
            .enrolment_instances(course.id)
            .await?
            .into_iter()
            .find(|i| i.method == method)
            .ok_or_else(|| SyncError::NoEnrolmentInstance {
                course_id: course.id,
                method: method.to_string(),
            })?;

        let enabled = store.enabled_enrol_plugins(course.id).await?;
        if !enabled.iter().any(|p| *p == instance.method) {
            return Err(SyncError::EnrolmentPluginDisabled {
                course_id: course.id,
                plugin: instance.method.clone(),
            });
        }

        if !store.allow_enrol(&instance).await? {
            return Err(SyncError::EnrolmentForbidden {
                course_id: course.id,
            });
        }

        let role_name = if role.is_empty() { DEFAULT_ROLE } else { role };
        let role_id = store
            .roles()
            .await?
            .into_iter()
            .find(|r| r.shortname == role_name)
            .map(|r| r.id)
            .ok_or_else(|| SyncError::UnknownRole {
                role: role_name.to_string(),
            })?;

        let members: HashSet<i64> = store.enrolled_account_ids(course.id).await?.into_iter().collect();
        tracing::debug!("Course {} has {} enrolled users", course.id, members.len());

        Ok(Self {
            plugin: instance.method.clone(),
            instance,
            role_id,
            role_name: role_name.to_string(),
            time_start,
            members,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrolmentStatus {
    AlreadyEnrolled,
    NotEnrolled,
}

/// Per-run enrolment decisions. Contexts are keyed by (module code, role);
/// a failed build is remembered so the module stays without enrolment.
#[derive(Debug)]
pub struct EnrolmentEngine {
    method: String,
    time_start: i64,
    contexts: HashMap<(String, String), Option<EnrolmentContext>>,
    enrolled: HashSet<(String, i64)>,
}

impl EnrolmentEngine {
    pub fn new(method: impl Into<String>) -> Self {
        Self::with_time_start(method, start_of_day(&Local::now()))
    }

    pub fn with_time_start(method: impl Into<String>, time_start: i64) -> Self {
        Self {
            method: method.into(),
            time_start,
            contexts: HashMap::new(),
            enrolled: HashSet::new(),
        }
    }

    pub fn context(&self, module: &str, role: &str) -> Option<&EnrolmentContext> {
        self.contexts
            .get(&(module.to_string(), role.to_string()))
            .and_then(Option::as_ref)
    }

    async fn ensure_context<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        module: &str,
        course: Option<&Course>,
        role: &str,
    ) {
        let key = (module.to_string(), role.to_string());
        if self.contexts.contains_key(&key) {
            return;
        }

        let context = match course {
            None => {
                tracing::debug!("Module {} has no course loaded, enrolment skipped", module);
                None
            }
            Some(course) => {
                tracing::debug!("Initialising enrolment for {} as {}", module, role);
                match EnrolmentContext::build(store, course, &self.method, role, self.time_start)
                    .await
                {
                    Ok(context) => Some(context),
                    Err(e) => {
                        tracing::debug!("No enrolment for module {}: {}", module, e);
                        None
                    }
                }
            }
        };
        self.contexts.insert(key, context);
    }

    pub async fn check<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        module: &str,
        course: Option<&Course>,
        account: Option<&Account>,
        role: &str,
    ) -> EnrolmentStatus {
        self.ensure_context(store, module, course, role).await;

        let Some(account) = account else {
            return EnrolmentStatus::NotEnrolled;
        };

        let in_snapshot = self
            .context(module, role)
            .is_some_and(|c| c.members.contains(&account.id));
        if in_snapshot || self.enrolled.contains(&(module.to_string(), account.id)) {
            tracing::debug!("User {} is already enrolled in {}", account.id, module);
            return EnrolmentStatus::AlreadyEnrolled;
        }
        EnrolmentStatus::NotEnrolled
    }

    /// Issues the enrol call unless the pair was handled before.
    /// `Ok(false)` means the module has no enrolment capability.
    pub async fn enrol<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        module: &str,
        account: &Account,
        role: &str,
        stats: &mut SyncStats,
    ) -> Result<bool> {
        let Some(context) = self.context(module, role) else {
            return Ok(false);
        };
        let pair = (module.to_string(), account.id);
        if context.members.contains(&account.id) || self.enrolled.contains(&pair) {
            return Ok(false);
        }

        let request = EnrolRequest {
            instance_id: context.instance.id,
            course_id: context.instance.course_id,
            account_id: account.id,
            role_id: context.role_id,
            time_start: context.time_start,
            time_end: None,
            recover_grades: false,
        };
        tracing::debug!("Enrol user {} with role {}", account.id, request.role_id);

        self.enrolled.insert(pair);
        stats.enrolments += 1;
        store.enrol(&request).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryState, MemoryStore};
    use chrono::{FixedOffset, Timelike};

    fn course(id: i64) -> Course {
        Course {
            id,
            shortname: "M1".to_string(),
            fullname: "M1".to_string(),
            idnumber: "M1".to_string(),
        }
    }

    fn account(id: i64) -> Account {
        Account {
            id,
            username: format!("u{}", id),
            email: String::new(),
            firstname: String::new(),
            lastname: String::new(),
            idnumber: String::new(),
        }
    }

    #[test]
    fn test_start_of_day_is_local_midnight() {
        let zone = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = zone.with_ymd_and_hms(2024, 9, 16, 14, 35, 10).unwrap();
        let start = start_of_day(&now);

        let back = zone.timestamp_opt(start, 0).unwrap();
        assert_eq!(back.date_naive(), now.date_naive());
        assert_eq!((back.hour(), back.minute(), back.second()), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_existing_member_is_never_enrolled() {
        let store = MemoryStore::new(MemoryState::new().with_course(1, "M1", "M1").with_enrolled(1, 42));
        let mut engine = EnrolmentEngine::with_time_start("manual", 1_000);
        let mut stats = SyncStats::default();

        let status = engine
            .check(&store, "M1", Some(&course(1)), Some(&account(42)), DEFAULT_ROLE)
            .await;
        assert_eq!(status, EnrolmentStatus::AlreadyEnrolled);

        let issued = engine
            .enrol(&store, "M1", &account(42), DEFAULT_ROLE, &mut stats)
            .await
            .unwrap();
        assert!(!issued);
        assert_eq!(stats.enrolments, 0);
        assert!(store.snapshot().await.enrolments.is_empty());
    }

    #[tokio::test]
    async fn test_enrol_at_most_once_with_shared_start() {
        let store = MemoryStore::new(MemoryState::new().with_course(1, "M1", "M1"));
        let mut engine = EnrolmentEngine::with_time_start("manual", 1_000);
        let mut stats = SyncStats::default();

        for id in [7, 8, 7] {
            if engine
                .check(&store, "M1", Some(&course(1)), Some(&account(id)), DEFAULT_ROLE)
                .await
                == EnrolmentStatus::NotEnrolled
            {
                engine
                    .enrol(&store, "M1", &account(id), DEFAULT_ROLE, &mut stats)
                    .await
                    .unwrap();
            }
        }

        let state = store.snapshot().await;
        assert_eq!(stats.enrolments, 2);
        assert_eq!(state.enrolments.len(), 2);
        assert!(state.enrolments.iter().all(|e| e.time_start == 1_000));
        assert!(state.enrolments.iter().all(|e| e.role_id == 5 && e.time_end.is_none()));
        assert_eq!(state.roster_fetches, vec![1]);
    }

    #[tokio::test]
    async fn test_context_per_role() {
        let store = MemoryStore::new(MemoryState::new().with_course(1, "M1", "M1"));
        let mut engine = EnrolmentEngine::with_time_start("manual", 0);

        for role in [DEFAULT_ROLE, TEACHER_ROLE, DEFAULT_ROLE] {
            engine.check(&store, "M1", Some(&course(1)), None, role).await;
        }

        assert_eq!(engine.context("M1", DEFAULT_ROLE).map(|c| c.role_id), Some(5));
        assert_eq!(engine.context("M1", TEACHER_ROLE).map(|c| c.role_id), Some(3));
        assert_eq!(store.snapshot().await.roster_fetches.len(), 2);
    }

    #[tokio::test]
    async fn test_policy_failures_leave_module_without_enrolment() {
        let cases = [
            MemoryState::new().with_course(1, "M1", "M1").without_instances(1),
            MemoryState::new().with_course(1, "M1", "M1").with_disabled_plugin("manual"),
            MemoryState::new().with_course(1, "M1", "M1").with_forbidden_course(1),
        ];

        for state in cases {
            let store = MemoryStore::new(state);
            let mut engine = EnrolmentEngine::with_time_start("manual", 0);
            let mut stats = SyncStats::default();

            let status = engine
                .check(&store, "M1", Some(&course(1)), Some(&account(9)), DEFAULT_ROLE)
                .await;
            assert_eq!(status, EnrolmentStatus::NotEnrolled);
            assert!(engine.context("M1", DEFAULT_ROLE).is_none());

            let issued = engine
                .enrol(&store, "M1", &account(9), DEFAULT_ROLE, &mut stats)
                .await
                .unwrap();
            assert!(!issued);
            assert_eq!(stats.enrolments, 0);
            assert!(store.snapshot().await.roster_fetches.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_role_fails_build() {
        let store = MemoryStore::new(MemoryState::new().with_course(1, "M1", "M1"));
        let err = EnrolmentContext::build(&store, &course(1), "manual", "nonexistent", 0).await;
        assert!(matches!(err, Err(SyncError::UnknownRole { .. })));
    }

    #[tokio::test]
    async fn test_missing_course_skips_context() {
        let store = MemoryStore::new(MemoryState::new());
        let mut engine = EnrolmentEngine::with_time_start("manual", 0);

        let status = engine
            .check(&store, "M1", None, Some(&account(1)), DEFAULT_ROLE)
            .await;
        assert_eq!(status, EnrolmentStatus::NotEnrolled);
        assert!(engine.context("M1", DEFAULT_ROLE).is_none());
    }
}
