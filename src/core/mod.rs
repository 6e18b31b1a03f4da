pub mod enrolment;
pub mod module_resolver;
pub mod pipeline;
pub mod report;
pub mod student_resolver;

pub use crate::domain::model::{Account, Course, Member, Module, Program, Scope};
pub use crate::domain::ports::{SourceClient, TargetStore};
pub use crate::utils::error::Result;
