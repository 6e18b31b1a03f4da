use crate::config::options::SyncOptions;
use crate::core::enrolment::{EnrolmentEngine, EnrolmentStatus, DEFAULT_ROLE, TEACHER_ROLE};
use crate::core::module_resolver::ModuleResolver;
use crate::core::report::{self, AccountOrigin, SyncStats};
use crate::core::student_resolver::StudentResolver;
use crate::domain::model::{Course, Member, Module, Program, Scope};
use crate::domain::ports::{SourceClient, TargetStore};
use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use std::io::Write;

/// A module that passed the filters, with its course if one was found.
#[derive(Debug, Clone)]
pub struct SelectedModule {
    pub module: Module,
    pub program: Program,
    pub course: Option<Course>,
}

/// Terminal state of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOutcome {
    SkippedNoEmail,
    Unresolved,
    AlreadyEnrolled,
    Enrolled,
    NotEnrolledByPolicy,
}

/// Target-side settings the pipeline needs besides the operator options.
#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub course_category: i64,
    pub auth_method: String,
    pub enrol_method: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            course_category: 1,
            auth_method: "shibboleth".to_string(),
            enrol_method: "manual".to_string(),
        }
    }
}

/// 學程 → 模組 → 學員 三階段同步
pub struct SyncPipeline<S: SourceClient, T: TargetStore, W: Write> {
    source: S,
    target: T,
    options: SyncOptions,
    out: W,
    modules: ModuleResolver,
    students: StudentResolver,
    enrolment: EnrolmentEngine,
}

impl<S: SourceClient, T: TargetStore, W: Write> SyncPipeline<S, T, W> {
    pub fn new(source: S, target: T, options: SyncOptions, settings: TargetSettings, out: W) -> Self {
        Self {
            source,
            target,
            options,
            out,
            modules: ModuleResolver::new(settings.course_category),
            students: StudentResolver::new(settings.auth_method),
            enrolment: EnrolmentEngine::new(settings.enrol_method),
        }
    }

    /// Replaces the enrolment engine, e.g. to pin the start timestamp.
    pub fn with_enrolment(mut self, engine: EnrolmentEngine) -> Self {
        self.enrolment = engine;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub async fn run(&mut self) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        let programs = self.fetch_programs().await?;
        let modules = self.fetch_modules(&programs, &mut stats).await?;
        self.fetch_students(&modules, &mut stats).await?;

        tracing::info!(
            "✅ Sync finished: {} courses, {} users created, {} enrolments",
            stats.courses_created,
            stats.accounts_created,
            stats.enrolments
        );

        if self.options.report {
            report::write_summary(&mut self.out, &stats)?;
        }
        Ok(stats)
    }

    /// Fetch failures and undecodable records count as absent.
    async fn load<R: DeserializeOwned>(&self, scope: Scope) -> Vec<R> {
        let raw = match self.source.fetch(&scope).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("{} treated as empty: {}", scope, e);
                return Vec::new();
            }
        };

        raw.into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!("Skipping undecodable record in {}: {}", scope, e);
                    None
                }
            })
            .collect()
    }

    pub async fn fetch_programs(&mut self) -> Result<Vec<Program>> {
        let options = &self.options;
        let listing = options.programs.is_on() && options.show();
        let downstream = options.wants_modules() || options.students;

        if listing {
            report::heading(&mut self.out, "Programs")?;
        }

        let programs = self.load::<Program>(Scope::Programs).await;
        let mut selected = Vec::new();
        for program in programs {
            if !self.options.programs.accepts(program.code()) {
                continue;
            }

            if listing {
                writeln!(self.out, "{}", report::program_line(&program))?;
            }

            // only hand programs on if a later stage needs them
            if downstream {
                selected.push(program);
            }
        }

        Ok(selected)
    }

    pub async fn fetch_modules(
        &mut self,
        programs: &[Program],
        stats: &mut SyncStats,
    ) -> Result<Vec<SelectedModule>> {
        let listing = self.options.wants_modules() && self.options.show();
        if listing {
            report::heading(&mut self.out, "Modules")?;
        }

        let pattern = self.options.module_pattern.clone().unwrap_or_default();
        tracing::debug!("Processing {} programs", programs.len());

        let mut selected = Vec::new();
        'programs: for program in programs {
            let Some(program_id) = program.id.clone() else {
                tracing::debug!("Program {} has no id, skipping", program.code());
                continue;
            };

            let modules = self.load::<Module>(Scope::ModulesOf(program_id)).await;
            for module in modules {
                let code = module.code().to_string();
                if !self.options.modules.accepts(&code) || !code.contains(&pattern) {
                    continue;
                }
                let last = self.options.modules.is_exactly(&code);

                if let Some(entry) = self.select_module(module, program, stats).await? {
                    if listing {
                        writeln!(
                            self.out,
                            "{}",
                            report::module_line(&entry.module, entry.course.as_ref())
                        )?;
                    }
                    if self.options.students {
                        selected.push(entry);
                    }
                }

                // at most one module matches an exact filter
                if last {
                    tracing::debug!("Stop module processing after {}", code);
                    break 'programs;
                }
            }
        }

        Ok(selected)
    }

    async fn select_module(
        &mut self,
        module: Module,
        program: &Program,
        stats: &mut SyncStats,
    ) -> Result<Option<SelectedModule>> {
        let code = module.code().to_string();

        let mut course = match self.modules.resolve(&self.target, &module, program).await {
            Ok(course) => course,
            Err(e) => {
                tracing::debug!("Lookup of module {} failed: {}", code, e);
                return Ok(None);
            }
        };

        if course.is_none() {
            if self.options.auto_create {
                match self.modules.create(&self.target, &module, stats).await {
                    Ok(created) => course = Some(created),
                    Err(e) => tracing::debug!("Could not create module {}: {}", code, e),
                }
            }
            // inform mode lists modules even without a course
            if course.is_none() && !self.options.inform {
                tracing::debug!("Module {} not found", code);
                return Ok(None);
            }
        }

        Ok(Some(SelectedModule {
            module,
            program: program.clone(),
            course,
        }))
    }

    pub async fn fetch_students(
        &mut self,
        modules: &[SelectedModule],
        stats: &mut SyncStats,
    ) -> Result<Vec<MemberOutcome>> {
        let mut outcomes = Vec::new();
        if !self.options.students {
            return Ok(outcomes);
        }

        let show = self.options.show();
        if show {
            report::heading(&mut self.out, "Participants")?;
        }
        tracing::debug!("Processing {} modules", modules.len());

        for entry in modules {
            if show {
                report::heading(
                    &mut self.out,
                    &format!("{}: {}", entry.module.code(), entry.module.name()),
                )?;
            }

            let Some(module_id) = entry.module.id.clone() else {
                continue;
            };
            let members = self.load::<Member>(Scope::MembersOf(module_id)).await;
            for member in members {
                outcomes.push(self.process_member(entry, &member, stats).await?);
            }
        }

        Ok(outcomes)
    }

    async fn process_member(
        &mut self,
        entry: &SelectedModule,
        member: &Member,
        stats: &mut SyncStats,
    ) -> Result<MemberOutcome> {
        if self.options.inform || self.options.verbose {
            tracing::debug!("Course member {}", serde_json::to_string(member)?);
        }

        if member.email().is_none() {
            return Ok(MemberOutcome::SkippedNoEmail);
        }

        let (account, origin) = match self.students.resolve(&self.target, member).await {
            Ok(Some(account)) => (account, AccountOrigin::Exists),
            Ok(None) if self.options.auto_register => {
                match self.students.register(&self.target, member, stats).await {
                    Ok(account) => (account, AccountOrigin::Created),
                    Err(e) => {
                        tracing::debug!("Registration skipped: {}", e);
                        return Ok(MemberOutcome::Unresolved);
                    }
                }
            }
            Ok(None) => return Ok(MemberOutcome::Unresolved),
            Err(e) => {
                tracing::debug!("Lookup of {:?} failed: {}", member.uuid, e);
                return Ok(MemberOutcome::Unresolved);
            }
        };

        let role = if member.has_role_marker() {
            TEACHER_ROLE
        } else {
            DEFAULT_ROLE
        };
        let code = entry.module.code();

        let status = self
            .enrolment
            .check(&self.target, code, entry.course.as_ref(), Some(&account), role)
            .await;

        let outcome = match status {
            EnrolmentStatus::AlreadyEnrolled => MemberOutcome::AlreadyEnrolled,
            EnrolmentStatus::NotEnrolled if self.options.auto_enrol => {
                match self.enrolment.enrol(&self.target, code, &account, role, stats).await {
                    Ok(true) => MemberOutcome::Enrolled,
                    Ok(false) => MemberOutcome::NotEnrolledByPolicy,
                    Err(e) => {
                        tracing::debug!("Enrolment of {} in {} failed: {}", account.id, code, e);
                        MemberOutcome::NotEnrolledByPolicy
                    }
                }
            }
            EnrolmentStatus::NotEnrolled => MemberOutcome::NotEnrolledByPolicy,
        };

        if self.options.inform || self.options.show() {
            let enrolled = matches!(
                outcome,
                MemberOutcome::AlreadyEnrolled | MemberOutcome::Enrolled
            );
            writeln!(
                self.out,
                "{}",
                report::member_line(member, origin, role, Some(&account), enrolled)
            )?;
        }

        Ok(outcome)
    }
}
