use crate::core::report::SyncStats;
use crate::domain::model::{Account, AccountSetup, Member, NewAccount, PASSWORD_NOT_CACHED};
use crate::domain::ports::TargetStore;
use crate::utils::error::{Result, SyncError};
use std::collections::{HashMap, HashSet};

/// 以 Evento UUID 對應 Moodle 帳號
#[derive(Debug)]
pub struct StudentResolver {
    auth_method: String,
    known: HashMap<String, Account>,
    // identities whose registration was already attempted and refused
    refused: HashSet<String>,
}

impl StudentResolver {
    pub fn new(auth_method: impl Into<String>) -> Self {
        Self {
            auth_method: auth_method.into(),
            known: HashMap::new(),
            refused: HashSet::new(),
        }
    }

    /// Looks the member up by username = external identity. Email is never used.
    pub async fn resolve<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        member: &Member,
    ) -> Result<Option<Account>> {
        let Some(identity) = member.identity() else {
            return Ok(None);
        };
        if let Some(account) = self.known.get(identity) {
            return Ok(Some(account.clone()));
        }

        let found = store.account_by_username(identity).await?;
        if let Some(account) = &found {
            self.known.insert(identity.to_string(), account.clone());
        }
        Ok(found)
    }

    pub fn new_account(&self, member: &Member) -> NewAccount {
        NewAccount {
            auth: self.auth_method.clone(),
            username: member.identity().unwrap_or_default().to_string(),
            email: member.mail.clone().unwrap_or_default(),
            firstname: member.vorname.clone().unwrap_or_default(),
            lastname: member.nachname.clone().unwrap_or_default(),
            idnumber: member.id.clone().unwrap_or_default(),
            confirmed: true,
            interests: String::new(),
            timecreated: chrono::Utc::now().timestamp(),
            local_host: true,
            password: PASSWORD_NOT_CACHED.to_string(),
        }
    }

    /// Creates the account and runs the store's post-create setup.
    pub async fn register<T: TargetStore + ?Sized>(
        &mut self,
        store: &T,
        member: &Member,
        stats: &mut SyncStats,
    ) -> Result<Account> {
        let identity = member
            .identity()
            .ok_or_else(|| SyncError::AccountCreationFailed {
                username: String::new(),
            })?
            .to_string();

        if let Some(account) = self.known.get(&identity) {
            return Ok(account.clone());
        }
        if self.refused.contains(&identity) {
            return Err(SyncError::AccountCreationFailed { username: identity });
        }

        tracing::debug!("Registering user {}", identity);
        let spec = self.new_account(member);
        let id = match store.create_account(&spec).await {
            Ok(id) if id > 0 => id,
            Ok(_) => {
                tracing::debug!("User not created: {:?}", spec);
                self.refused.insert(identity.clone());
                return Err(SyncError::AccountCreationFailed { username: identity });
            }
            Err(e) => {
                self.refused.insert(identity);
                return Err(e);
            }
        };

        // the account exists from here on, whatever the setup does
        stats.accounts_created += 1;
        tracing::info!("🆕 Registered {} as user {}", identity, id);

        let mut account = Account {
            id,
            username: spec.username.clone(),
            email: spec.email.clone(),
            firstname: spec.firstname.clone(),
            lastname: spec.lastname.clone(),
            idnumber: spec.idnumber.clone(),
        };
        match self.finish_setup(store, id, &spec).await {
            Ok(Some(stored)) => account = stored,
            Ok(None) => tracing::debug!("User {} not readable after creation", id),
            Err(e) => tracing::debug!("Setup of user {} incomplete: {}", id, e),
        }

        self.known.insert(identity, account.clone());
        Ok(account)
    }

    /// Post-create steps, reload and the created notification.
    async fn finish_setup<T: TargetStore + ?Sized>(
        &self,
        store: &T,
        id: i64,
        spec: &NewAccount,
    ) -> Result<Option<Account>> {
        let mut steps = vec![AccountSetup::Preferences];
        if store.tagging_enabled() {
            steps.push(AccountSetup::Interests);
        }
        steps.extend([
            AccountSetup::Bounces,
            AccountSetup::ForumTracking,
            AccountSetup::ProfileFields,
        ]);
        for step in steps {
            store.setup_account(id, step, spec).await?;
        }

        let stored = store.account_by_id(id).await?;
        store.notify_account_created(id).await?;
        Ok(stored)
    }
}
