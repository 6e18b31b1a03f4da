use crate::core::report::SyncStats;
use crate::domain::model::{Course, Module, NewCourse, Program};
use crate::domain::ports::TargetStore;
use crate::utils::error::{Result, SyncError};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Short code of a module with the dot-joined program code removed.
///
/// `M1.P100.HS24` gives `M1` (everything before the first `.P100`) and
/// `P100.M1` gives `M1`. A module code without the program code is returned
/// unchanged; `None` means there is no program code to strip.
pub fn derive_short_code(module_code: &str, program_code: &str) -> Option<String> {
    if program_code.is_empty() {
        return None;
    }

    let re = Regex::new(&format!(r"\.{}", regex::escape(program_code))).ok()?;
    if let Some(found) = re.find(module_code) {
        if found.start() > 0 {
            return Some(module_code[..found.start()].to_string());
        }
    }

    let prefix = format!("{}.", program_code);
    match module_code.strip_prefix(&prefix) {
        Some(rest) if !rest.is_empty() => Some(rest.to_string()),
        _ => Some(module_code.to_string()),
    }
}

/// 模組對應 Moodle 課程，每個代碼只解析或建立一次
#[derive(Debug, Default)]
pub struct ModuleResolver {
    category: i64,
    resolved: HashMap<String, Course>,
    // (module code, program code) pairs already known to be missing
    missing: HashSet<(String, String)>,
}

impl ModuleResolver {
    pub fn new(category: i64) -> Self {
        Self {
            category,
            ..Default::default()
        }
    }

    /// Exact idnumber match first, then the derived short code.
    pub async fn resolve<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        module: &Module,
        program: &Program,
    ) -> Result<Option<Course>> {
        let code = module.code();
        if let Some(course) = self.resolved.get(code) {
            return Ok(Some(course.clone()));
        }

        let key = (code.to_string(), program.code().to_string());
        if self.missing.contains(&key) {
            return Ok(None);
        }

        let mut found = store.course_by_idnumber(code).await?;

        if found.is_none() {
            if let Some(short) = derive_short_code(code, program.code()) {
                tracing::debug!("Looking up {} by short code {}", code, short);
                found = store.course_by_shortname(&short).await?;
            }
        }

        match &found {
            Some(course) => {
                self.resolved.insert(code.to_string(), course.clone());
            }
            None => {
                self.missing.insert(key);
            }
        }
        Ok(found)
    }

    /// Creates the course for a module that did not resolve.
    pub async fn create<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        module: &Module,
        stats: &mut SyncStats,
    ) -> Result<Course> {
        let code = module.code();
        if code.is_empty() {
            return Err(SyncError::CourseNotResolved {
                code: module.id.clone().unwrap_or_default(),
            });
        }
        if let Some(course) = self.resolved.get(code) {
            return Ok(course.clone());
        }

        let spec = NewCourse {
            fullname: if module.name().is_empty() {
                code.to_string()
            } else {
                module.name().to_string()
            },
            shortname: code.to_string(),
            idnumber: code.to_string(),
            category: self.category,
        };

        let course = store.create_course(&spec).await?;
        stats.courses_created += 1;
        tracing::info!("🆕 Created course {} for module {}", course.id, code);

        self.resolved.insert(code.to_string(), course.clone());
        self.missing.retain(|(c, _)| c != code);
        Ok(course)
    }
}
