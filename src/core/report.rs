use crate::domain::model::{Account, Course, Member, Module, Program};
use std::io::Write;

/// 單次執行的統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub courses_created: usize,
    pub accounts_created: usize,
    /// enrol calls issued, not confirmed enrolments
    pub enrolments: usize,
}

/// Whether a listed member exists in the target or was registered now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOrigin {
    Exists,
    Created,
}

impl AccountOrigin {
    fn label(self) -> &'static str {
        match self {
            AccountOrigin::Exists => "exists",
            AccountOrigin::Created => "create",
        }
    }
}

pub fn heading<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    writeln!(out, "== {} ==", title)
}

pub fn program_line(program: &Program) -> String {
    format!(
        "{} : {} : {} : {}",
        program.status.as_deref().unwrap_or(""),
        program.id.as_deref().unwrap_or(""),
        program.code(),
        program.bezeichnung.as_deref().unwrap_or("")
    )
}

pub fn module_line(module: &Module, course: Option<&Course>) -> String {
    format!(
        "{} : {} : {} : {}",
        module.id.as_deref().unwrap_or(""),
        module.code(),
        module.name(),
        course
            .map(|c| c.id.to_string())
            .unwrap_or_else(|| "not found".to_string())
    )
}

pub fn member_line(
    member: &Member,
    origin: AccountOrigin,
    role: &str,
    account: Option<&Account>,
    enrolled: bool,
) -> String {
    format!(
        "{} : {} : {} : {} : {} : {}",
        member.uuid.as_deref().unwrap_or(""),
        member.mail.as_deref().unwrap_or(""),
        origin.label(),
        role,
        account
            .map(|a| a.id.to_string())
            .unwrap_or_else(|| "no moodle user".to_string()),
        if enrolled { "enroled" } else { "not enroled" }
    )
}

pub fn write_summary<W: Write>(out: &mut W, stats: &SyncStats) -> std::io::Result<()> {
    heading(out, "Statistics")?;
    writeln!(out, "  Created {} Courses", stats.courses_created)?;
    writeln!(out, "  Created {} Users", stats.accounts_created)?;
    writeln!(out, "  Enrolled {} Users", stats.enrolments)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_line_without_course() {
        let module = Module {
            id: Some("9".to_string()),
            nummer: Some("P100.M1".to_string()),
            bezeichnung: Some("Mathematik".to_string()),
        };
        assert_eq!(module_line(&module, None), "9 : P100.M1 : Mathematik : not found");
    }

    #[test]
    fn test_member_line() {
        let member = Member {
            uuid: Some("u1".to_string()),
            mail: Some("a@x.org".to_string()),
            ..Default::default()
        };
        let account = Account {
            id: 17,
            username: "u1".to_string(),
            email: "a@x.org".to_string(),
            firstname: String::new(),
            lastname: String::new(),
            idnumber: String::new(),
        };
        assert_eq!(
            member_line(&member, AccountOrigin::Created, "student", Some(&account), false),
            "u1 : a@x.org : create : student : 17 : not enroled"
        );
    }

    #[test]
    fn test_summary() {
        let stats = SyncStats {
            courses_created: 1,
            accounts_created: 2,
            enrolments: 3,
        };

        let mut out = Vec::new();
        write_summary(&mut out, &stats).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("== Statistics ==\n"));
        assert!(text.contains("  Created 1 Courses\n"));
        assert!(text.contains("  Created 2 Users\n"));
        assert!(text.contains("  Enrolled 3 Users\n"));
    }
}
