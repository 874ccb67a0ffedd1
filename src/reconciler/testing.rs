//! In-memory [`DirectoryApi`] that records every call.
//!
//! The fake keeps just enough state for reconciler flows to behave like the
//! remote system: users and their status, role assignments, group
//! memberships and applications. Individual calls can be made to fail.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::{
    client::{
        AppQuery, AssignRoleRequest, ChangePasswordRequest, ClientError, ClientResult,
        CreateUserRequest, DirectoryApi, Page, RemoteUser, UserCredentials, UserUpdate,
    },
    config::ReconcilerConfig,
    models::{Application, AssignmentType, Group, GroupProfile, GroupType, Role, UserStatus},
};

/// A call received by the fake, with the arguments that matter to tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateUser {
        request: CreateUserRequest,
        activate: bool,
    },
    GetUser(String),
    UpdateUser {
        user_id: String,
        update: UserUpdate,
    },
    PartialUpdateUser {
        user_id: String,
        update: UserUpdate,
    },
    DeactivateOrDelete(String),
    Activate {
        user_id: String,
        send_email: bool,
    },
    Deactivate(String),
    Suspend(String),
    Unsuspend(String),
    ExpirePassword(String),
    ChangePassword {
        user_id: String,
        old_password: String,
        new_password: String,
    },
    ChangeRecoveryQuestion {
        user_id: String,
        credentials: UserCredentials,
    },
    ListRoles(String),
    AssignRole {
        user_id: String,
        role_type: String,
        disable_notifications: bool,
    },
    RemoveRole {
        user_id: String,
        role_id: String,
    },
    ListGroups(String),
    AddToGroup {
        group_id: String,
        user_id: String,
    },
    RemoveFromGroup {
        group_id: String,
        user_id: String,
    },
    GetApplication(String),
    ListApplications {
        query: AppQuery,
        next: Option<String>,
    },
}

type Matcher = Box<dyn Fn(&Call) -> bool + Send>;

#[derive(Default)]
struct Inner {
    users: HashMap<String, RemoteUser>,
    roles: HashMap<String, Vec<Role>>,
    groups: HashMap<String, Vec<Group>>,
    apps: HashMap<String, Application>,
    app_pages: Vec<Vec<Application>>,
    repeat_app_links: bool,
    calls: Vec<Call>,
    failures: Vec<(Matcher, u16)>,
    pending_polls_per_transition: u32,
    pending_polls: u32,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeDirectory {
    inner: Mutex<Inner>,
}

/// Reconciler settings that never wait.
pub fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        status_poll_interval_ms: 0,
        status_poll_attempts: 3,
        disable_role_notifications: false,
    }
}

pub fn remote_user(id: &str, status: UserStatus) -> RemoteUser {
    let login = format!("{id}@example.com");
    let profile = json!({
        "login": login,
        "email": login,
        "firstName": "Ada",
        "lastName": "Lovelace",
    });
    RemoteUser {
        id: id.to_string(),
        status,
        transitioning_to_status: None,
        profile: profile.as_object().cloned().unwrap_or_default(),
        created: None,
        activated: None,
        status_changed: None,
        last_login: None,
        last_updated: None,
    }
}

impl FakeDirectory {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn insert_user(&self, id: &str, status: UserStatus) {
        self.insert_remote_user(remote_user(id, status));
    }

    pub fn insert_remote_user(&self, user: RemoteUser) {
        self.lock().users.insert(user.id.clone(), user);
    }

    pub fn user(&self, id: &str) -> Option<RemoteUser> {
        self.lock().users.get(id).cloned()
    }

    pub fn insert_role(&self, user_id: &str, role_id: &str, role_type: &str, via: AssignmentType) {
        self.lock()
            .roles
            .entry(user_id.to_string())
            .or_default()
            .push(Role {
                id: role_id.to_string(),
                role_type: role_type.to_string(),
                label: None,
                status: Some("ACTIVE".into()),
                assignment_type: Some(via),
            });
    }

    pub fn role_types(&self, user_id: &str) -> Vec<String> {
        let mut types: Vec<_> = self
            .lock()
            .roles
            .get(user_id)
            .map(|roles| roles.iter().map(|r| r.role_type.clone()).collect())
            .unwrap_or_default();
        types.sort();
        types
    }

    pub fn insert_group(&self, user_id: &str, group_id: &str, group_type: GroupType) {
        self.lock()
            .groups
            .entry(user_id.to_string())
            .or_default()
            .push(group(group_id, group_type));
    }

    pub fn group_ids(&self, user_id: &str) -> Vec<String> {
        let mut ids: Vec<_> = self
            .lock()
            .groups
            .get(user_id)
            .map(|groups| groups.iter().map(|g| g.id.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn insert_app(&self, app: Application) {
        self.lock().apps.insert(app.id.clone(), app);
    }

    /// Queue one page of the application listing.
    pub fn push_app_page(&self, apps: Vec<Application>) {
        self.lock().app_pages.push(apps);
    }

    /// Pages fetched through a next link point back at that same link.
    pub fn repeat_app_links(&self) {
        self.lock().repeat_app_links = true;
    }

    /// Make every call accepted by `matcher` fail with `status`.
    pub fn fail_on(&self, matcher: impl Fn(&Call) -> bool + Send + 'static, status: u16) {
        self.lock().failures.push((Box::new(matcher), status));
    }

    /// After each status transition, report the user as still transitioning
    /// for this many fetches.
    pub fn set_pending_transition_polls(&self, polls: u32) {
        self.lock().pending_polls_per_transition = polls;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    fn record(&self, call: Call) -> ClientResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        let failure = inner
            .failures
            .iter()
            .find(|(matcher, _)| matcher(&call))
            .map(|(_, status)| *status);
        inner.calls.push(call);
        match failure {
            Some(404) => Err(ClientError::NotFound("injected".into())),
            Some(status) => Err(ClientError::Api {
                status,
                code: "E0000001".into(),
                summary: "Api validation failed".into(),
                causes: Vec::new(),
            }),
            None => Ok(inner),
        }
    }
}

impl Inner {
    fn user_mut(&mut self, id: &str) -> ClientResult<&mut RemoteUser> {
        self.users
            .get_mut(id)
            .ok_or_else(|| ClientError::NotFound(format!("user {id}")))
    }

    fn transition(&mut self, id: &str, status: UserStatus) -> ClientResult<()> {
        self.user_mut(id)?.status = status;
        self.pending_polls = self.pending_polls_per_transition;
        Ok(())
    }
}

fn group(id: &str, group_type: GroupType) -> Group {
    Group {
        id: id.to_string(),
        group_type: Some(group_type),
        profile: GroupProfile {
            name: id.to_string(),
            description: None,
        },
    }
}

fn merge(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl DirectoryApi for FakeDirectory {
    async fn create_user(
        &self,
        request: &CreateUserRequest,
        activate: bool,
    ) -> ClientResult<RemoteUser> {
        let mut inner = self.record(Call::CreateUser {
            request: request.clone(),
            activate,
        })?;
        inner.next_id += 1;
        let id = format!("00u{}", inner.next_id);
        let has_password = request
            .credentials
            .as_ref()
            .is_some_and(|c| c.password.is_some());
        let status = match (activate, has_password) {
            (false, _) => UserStatus::Staged,
            (true, true) => UserStatus::Active,
            (true, false) => UserStatus::Provisioned,
        };
        let user = RemoteUser {
            profile: request.profile.clone(),
            ..remote_user(&id, status)
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id_or_login: &str) -> ClientResult<RemoteUser> {
        let mut inner = self.record(Call::GetUser(id_or_login.to_string()))?;
        let mut user = inner
            .users
            .values()
            .find(|u| {
                u.id == id_or_login
                    || u.profile.get("login").and_then(Value::as_str) == Some(id_or_login)
            })
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("user {id_or_login}")))?;
        if inner.pending_polls > 0 {
            inner.pending_polls -= 1;
            user.transitioning_to_status = Some(user.status);
        }
        Ok(user)
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> ClientResult<RemoteUser> {
        let mut inner = self.record(Call::UpdateUser {
            user_id: user_id.to_string(),
            update: update.clone(),
        })?;
        let user = inner.user_mut(user_id)?;
        if let Some(profile) = &update.profile {
            user.profile = profile.clone();
        }
        Ok(user.clone())
    }

    async fn partial_update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> ClientResult<RemoteUser> {
        let mut inner = self.record(Call::PartialUpdateUser {
            user_id: user_id.to_string(),
            update: update.clone(),
        })?;
        let user = inner.user_mut(user_id)?;
        if let Some(profile) = &update.profile {
            merge(&mut user.profile, profile);
        }
        Ok(user.clone())
    }

    async fn deactivate_or_delete_user(&self, user_id: &str) -> ClientResult<()> {
        let mut inner = self.record(Call::DeactivateOrDelete(user_id.to_string()))?;
        let user = inner.user_mut(user_id)?;
        if user.status == UserStatus::Deprovisioned {
            inner.users.remove(user_id);
        } else {
            user.status = UserStatus::Deprovisioned;
        }
        Ok(())
    }

    async fn activate_user(&self, user_id: &str, send_email: bool) -> ClientResult<()> {
        self.record(Call::Activate {
            user_id: user_id.to_string(),
            send_email,
        })?
        .transition(user_id, UserStatus::Active)
    }

    async fn deactivate_user(&self, user_id: &str) -> ClientResult<()> {
        self.record(Call::Deactivate(user_id.to_string()))?
            .transition(user_id, UserStatus::Deprovisioned)
    }

    async fn suspend_user(&self, user_id: &str) -> ClientResult<()> {
        self.record(Call::Suspend(user_id.to_string()))?
            .transition(user_id, UserStatus::Suspended)
    }

    async fn unsuspend_user(&self, user_id: &str) -> ClientResult<()> {
        self.record(Call::Unsuspend(user_id.to_string()))?
            .transition(user_id, UserStatus::Active)
    }

    async fn expire_password(&self, user_id: &str) -> ClientResult<()> {
        let mut inner = self.record(Call::ExpirePassword(user_id.to_string()))?;
        inner.user_mut(user_id)?.status = UserStatus::PasswordExpired;
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: &str,
        request: &ChangePasswordRequest,
    ) -> ClientResult<()> {
        let mut inner = self.record(Call::ChangePassword {
            user_id: user_id.to_string(),
            old_password: request.old_password.value.clone().unwrap_or_default(),
            new_password: request.new_password.value.clone().unwrap_or_default(),
        })?;
        inner.user_mut(user_id).map(|_| ())
    }

    async fn change_recovery_question(
        &self,
        user_id: &str,
        credentials: &UserCredentials,
    ) -> ClientResult<()> {
        let mut inner = self.record(Call::ChangeRecoveryQuestion {
            user_id: user_id.to_string(),
            credentials: credentials.clone(),
        })?;
        inner.user_mut(user_id).map(|_| ())
    }

    async fn list_user_roles(&self, user_id: &str) -> ClientResult<Vec<Role>> {
        let inner = self.record(Call::ListRoles(user_id.to_string()))?;
        Ok(inner.roles.get(user_id).cloned().unwrap_or_default())
    }

    async fn assign_role(
        &self,
        user_id: &str,
        request: &AssignRoleRequest,
        disable_notifications: bool,
    ) -> ClientResult<Role> {
        let mut inner = self.record(Call::AssignRole {
            user_id: user_id.to_string(),
            role_type: request.role_type.clone(),
            disable_notifications,
        })?;
        inner.next_id += 1;
        let role = Role {
            id: format!("ra{}", inner.next_id),
            role_type: request.role_type.clone(),
            label: None,
            status: Some("ACTIVE".into()),
            assignment_type: Some(AssignmentType::User),
        };
        inner
            .roles
            .entry(user_id.to_string())
            .or_default()
            .push(role.clone());
        Ok(role)
    }

    async fn remove_role(&self, user_id: &str, role_assignment_id: &str) -> ClientResult<()> {
        let mut inner = self.record(Call::RemoveRole {
            user_id: user_id.to_string(),
            role_id: role_assignment_id.to_string(),
        })?;
        let roles = inner.roles.entry(user_id.to_string()).or_default();
        let before = roles.len();
        roles.retain(|r| r.id != role_assignment_id);
        if roles.len() == before {
            return Err(ClientError::NotFound(format!("role {role_assignment_id}")));
        }
        Ok(())
    }

    async fn list_user_groups(&self, user_id: &str) -> ClientResult<Vec<Group>> {
        let inner = self.record(Call::ListGroups(user_id.to_string()))?;
        Ok(inner.groups.get(user_id).cloned().unwrap_or_default())
    }

    async fn add_user_to_group(&self, group_id: &str, user_id: &str) -> ClientResult<()> {
        let mut inner = self.record(Call::AddToGroup {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        let groups = inner.groups.entry(user_id.to_string()).or_default();
        if !groups.iter().any(|g| g.id == group_id) {
            groups.push(group(group_id, GroupType::OktaGroup));
        }
        Ok(())
    }

    async fn remove_user_from_group(&self, group_id: &str, user_id: &str) -> ClientResult<()> {
        let mut inner = self.record(Call::RemoveFromGroup {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        let groups = inner.groups.entry(user_id.to_string()).or_default();
        let before = groups.len();
        groups.retain(|g| g.id != group_id);
        if groups.len() == before {
            return Err(ClientError::NotFound(format!("group {group_id}")));
        }
        Ok(())
    }

    async fn get_application(&self, app_id: &str) -> ClientResult<Application> {
        let inner = self.record(Call::GetApplication(app_id.to_string()))?;
        inner
            .apps
            .get(app_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("app {app_id}")))
    }

    async fn list_applications(
        &self,
        query: &AppQuery,
        next: Option<&str>,
    ) -> ClientResult<Page<Application>> {
        let inner = self.record(Call::ListApplications {
            query: query.clone(),
            next: next.map(str::to_string),
        })?;
        let index = match next {
            None => 0,
            Some(link) => link
                .strip_prefix("page-")
                .and_then(|i| i.parse::<usize>().ok())
                .ok_or_else(|| ClientError::Parse(format!("unexpected next link {link}")))?,
        };
        let items = inner.app_pages.get(index).cloned().unwrap_or_default();
        let next = match next {
            Some(link) if inner.repeat_app_links => Some(link.to_string()),
            _ => (index + 1 < inner.app_pages.len()).then(|| format!("page-{}", index + 1)),
        };
        Ok(Page { items, next })
    }
}
