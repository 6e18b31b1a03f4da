use crate::utils::error::{Result, SyncError};
use crate::utils::validation::Validate;

/// 三態選項：未指定、全部、指定代碼
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Off,
    All,
    Only(String),
}

impl Selection {
    /// `None` = flag absent, `Some("")` = flag without value.
    pub fn from_flag(value: Option<&str>) -> Self {
        match value {
            None => Selection::Off,
            Some("") => Selection::All,
            Some(code) => Selection::Only(code.to_string()),
        }
    }

    pub fn is_on(&self) -> bool {
        !matches!(self, Selection::Off)
    }

    /// An exact filter rejects every other code; `Off` and `All` accept all.
    pub fn accepts(&self, code: &str) -> bool {
        match self {
            Selection::Only(wanted) => wanted == code,
            _ => true,
        }
    }

    pub fn is_exactly(&self, code: &str) -> bool {
        matches!(self, Selection::Only(wanted) if wanted == code)
    }
}

/// Operator intent for one run, after the inform override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub verbose: bool,
    pub list: bool,
    pub inform: bool,
    pub programs: Selection,
    pub modules: Selection,
    pub module_pattern: Option<String>,
    pub students: bool,
    pub auto_create: bool,
    pub auto_register: bool,
    pub auto_enrol: bool,
    pub report: bool,
}

impl SyncOptions {
    /// `inform` shows everything and changes nothing.
    pub fn apply_inform(mut self) -> Self {
        if self.inform {
            self.list = true;
            self.auto_create = false;
            self.auto_register = false;
            self.auto_enrol = false;
        }
        self
    }

    pub fn show(&self) -> bool {
        self.list || self.verbose
    }

    pub fn wants_modules(&self) -> bool {
        self.modules.is_on() || self.module_pattern.is_some()
    }
}

impl Validate for SyncOptions {
    fn validate(&self) -> Result<()> {
        if let Some(pattern) = &self.module_pattern {
            if pattern.is_empty() {
                return Err(SyncError::InvalidConfigValueError {
                    field: "spattern".to_string(),
                    value: pattern.clone(),
                    reason: "-M requires a pattern string".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_from_flag() {
        assert_eq!(Selection::from_flag(None), Selection::Off);
        assert_eq!(Selection::from_flag(Some("")), Selection::All);
        assert_eq!(
            Selection::from_flag(Some("M1")),
            Selection::Only("M1".to_string())
        );
    }

    #[test]
    fn test_selection_accepts() {
        let only = Selection::Only("M1".to_string());
        assert!(only.accepts("M1"));
        assert!(!only.accepts("M2"));
        assert!(only.is_exactly("M1"));
        assert!(Selection::All.accepts("M2"));
        assert!(!Selection::All.is_exactly("M2"));
    }

    #[test]
    fn test_inform_disables_side_effects() {
        let options = SyncOptions {
            inform: true,
            auto_create: true,
            auto_register: true,
            auto_enrol: true,
            ..Default::default()
        }
        .apply_inform();

        assert!(options.list);
        assert!(!options.auto_create);
        assert!(!options.auto_register);
        assert!(!options.auto_enrol);
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        let options = SyncOptions {
            module_pattern: Some(String::new()),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
