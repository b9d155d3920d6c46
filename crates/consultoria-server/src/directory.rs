//! In-memory account, project and message records.
//!
//! Everything lives in one [`Directory`] behind a mutex. Operations are
//! synchronous and short; no lock is held across an await point.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use consultoria_proto::payloads::{
    auth::Role,
    profile::{Profile, ProfileUpdate},
};
use thiserror::Error;

/// Directory lookup and validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Another account already uses this email.
    #[error("email already registered")]
    DuplicateEmail,

    /// No account with this id.
    #[error("user not found")]
    UserNotFound(u64),

    /// No project with this id.
    #[error("project not found")]
    ProjectNotFound(u64),

    /// The user is neither the project's owner nor its consultant.
    #[error("you do not have access to this project")]
    AccessDenied {
        /// Project that was asked for
        project_id: u64,
        /// User that asked
        user_id: u64,
    },
}

/// Lifecycle of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    /// Published, no consultant working on it yet.
    Pending,
    /// A consultant is working on it.
    InProgress,
    /// Delivered.
    Completed,
    /// Abandoned.
    Cancelled,
}

impl ProjectStatus {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Assigned on registration, starting at 1.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Login email, unique ignoring case.
    pub email: String,
    password: String,
    /// Consultant or company.
    pub role: Role,
    /// Free-text description.
    pub bio: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Location of the uploaded profile photo.
    pub photo_url: Option<String>,
}

impl User {
    /// Public view of this account.
    #[must_use]
    pub fn profile(&self) -> Profile {
        Profile {
            user_id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            bio: self.bio.clone(),
            phone: self.phone.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// Project record. Its chat is open between the owner and the consultant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Assigned on creation, starting at 1.
    pub id: u64,
    /// Title.
    pub name: String,
    /// Lifecycle state.
    pub status: ProjectStatus,
    /// Company that published it.
    pub owner_id: u64,
    /// Consultant working on it, if any.
    pub consultant_id: Option<u64>,
}

impl Project {
    /// Whether `user_id` may read and write this project's chat.
    #[must_use]
    pub fn has_participant(&self, user_id: u64) -> bool {
        self.owner_id == user_id || self.consultant_id == Some(user_id)
    }

    /// The participant that is not `user_id`.
    #[must_use]
    pub fn other_party(&self, user_id: u64) -> Option<u64> {
        if self.owner_id == user_id { self.consultant_id } else { Some(self.owner_id) }
    }
}

/// Chat message record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Assigned on posting, increasing with posting order.
    pub id: u64,
    /// Project chat it belongs to.
    pub project_id: u64,
    /// Author.
    pub sender_id: u64,
    /// Text as sent.
    pub content: String,
    /// Local date-time of posting, `YYYY-MM-DDTHH:MM:SS`.
    pub timestamp: String,
}

/// Fields of a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Login password.
    pub password: String,
    /// Consultant or company.
    pub role: Role,
}

/// Shared handle to the records. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct Directory {
    inner: Arc<Mutex<DirectoryInner>>,
}

#[derive(Default)]
struct DirectoryInner {
    users: BTreeMap<u64, User>,
    projects: BTreeMap<u64, Project>,
    /// Posting order.
    messages: Vec<StoredMessage>,
    photos: BTreeMap<u64, Vec<u8>>,
    last_user_id: u64,
    last_project_id: u64,
    last_message_id: u64,
}

impl DirectoryInner {
    fn email_taken(&self, email: &str, except: Option<u64>) -> bool {
        self.users
            .values()
            .any(|user| Some(user.id) != except && user.email.eq_ignore_ascii_case(email))
    }

    fn participant_project(
        &self,
        project_id: u64,
        user_id: u64,
    ) -> Result<&Project, DirectoryError> {
        let project =
            self.projects.get(&project_id).ok_or(DirectoryError::ProjectNotFound(project_id))?;
        if !project.has_participant(user_id) {
            return Err(DirectoryError::AccessDenied { project_id, user_id });
        }
        Ok(project)
    }
}

impl Directory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding two accounts and two projects, for local runs.
    ///
    /// - user 1: "Empresa Acme", company, `contato@acme.com` / `acme1234`
    /// - user 2: "Ana", consultant, `ana@x.com` / `pw123456`
    /// - project 1: "Cloud migration", owned by 1, consultant 2, in progress
    /// - project 2: "Data audit", owned by 1, no consultant yet
    pub fn with_demo_data() -> Self {
        let directory = Self::new();
        let mut inner = directory.lock();

        let acme = inner.insert_user(NewUser {
            name: "Empresa Acme".into(),
            email: "contato@acme.com".into(),
            password: "acme1234".into(),
            role: Role::Company,
        });
        let ana = inner.insert_user(NewUser {
            name: "Ana".into(),
            email: "ana@x.com".into(),
            password: "pw123456".into(),
            role: Role::Consultant,
        });
        inner.insert_project("Cloud migration", acme, Some(ana), ProjectStatus::InProgress);
        inner.insert_project("Data audit", acme, None, ProjectStatus::Pending);

        drop(inner);
        directory
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::DuplicateEmail`] if the email is in use.
    pub fn register(&self, new_user: NewUser) -> Result<User, DirectoryError> {
        let mut inner = self.lock();
        if inner.email_taken(&new_user.email, None) {
            return Err(DirectoryError::DuplicateEmail);
        }
        let id = inner.insert_user(new_user);
        inner.users.get(&id).cloned().ok_or(DirectoryError::UserNotFound(id))
    }

    /// Account matching both credentials.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<User> {
        self.lock()
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email) && user.password == password)
            .cloned()
    }

    /// Account by id.
    pub fn user(&self, user_id: u64) -> Option<User> {
        self.lock().users.get(&user_id).cloned()
    }

    /// Apply the set fields of `update` to an account.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::UserNotFound`] or, for a changed email already in
    /// use, [`DirectoryError::DuplicateEmail`].
    pub fn update_profile(
        &self,
        user_id: u64,
        update: &ProfileUpdate,
    ) -> Result<User, DirectoryError> {
        let mut inner = self.lock();
        if let Some(email) = &update.email {
            if inner.email_taken(email, Some(user_id)) {
                return Err(DirectoryError::DuplicateEmail);
            }
        }

        let user = inner.users.get_mut(&user_id).ok_or(DirectoryError::UserNotFound(user_id))?;
        if let Some(name) = &update.name {
            user.name.clone_from(name);
        }
        if let Some(email) = &update.email {
            user.email.clone_from(email);
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        Ok(user.clone())
    }

    /// Replace an account's photo, served from `photo_url`.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::UserNotFound`].
    pub fn set_photo(
        &self,
        user_id: u64,
        photo_url: String,
        content: Vec<u8>,
    ) -> Result<User, DirectoryError> {
        let mut inner = self.lock();
        let user = inner.users.get_mut(&user_id).ok_or(DirectoryError::UserNotFound(user_id))?;
        user.photo_url = Some(photo_url);
        let user = user.clone();
        inner.photos.insert(user_id, content);
        Ok(user)
    }

    /// Bytes of an account's photo.
    pub fn photo(&self, user_id: u64) -> Option<Vec<u8>> {
        self.lock().photos.get(&user_id).cloned()
    }

    /// Publish a project.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::UserNotFound`] if the owner or consultant is unknown.
    pub fn create_project(
        &self,
        name: &str,
        owner_id: u64,
        consultant_id: Option<u64>,
        status: ProjectStatus,
    ) -> Result<Project, DirectoryError> {
        let mut inner = self.lock();
        for id in std::iter::once(owner_id).chain(consultant_id) {
            if !inner.users.contains_key(&id) {
                return Err(DirectoryError::UserNotFound(id));
            }
        }
        let id = inner.insert_project(name, owner_id, consultant_id, status);
        inner.projects.get(&id).cloned().ok_or(DirectoryError::ProjectNotFound(id))
    }

    /// Project by id.
    pub fn project(&self, project_id: u64) -> Option<Project> {
        self.lock().projects.get(&project_id).cloned()
    }

    /// Append a message to a project's chat.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::ProjectNotFound`], [`DirectoryError::UserNotFound`]
    /// or [`DirectoryError::AccessDenied`] if the sender is not a participant.
    pub fn post_message(
        &self,
        project_id: u64,
        sender_id: u64,
        content: String,
        timestamp: String,
    ) -> Result<StoredMessage, DirectoryError> {
        let mut inner = self.lock();
        inner.participant_project(project_id, sender_id)?;
        if !inner.users.contains_key(&sender_id) {
            return Err(DirectoryError::UserNotFound(sender_id));
        }

        inner.last_message_id += 1;
        let message =
            StoredMessage { id: inner.last_message_id, project_id, sender_id, content, timestamp };
        inner.messages.push(message.clone());
        Ok(message)
    }

    /// A project's messages, oldest first, if `user_id` participates in it.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::ProjectNotFound`] or [`DirectoryError::AccessDenied`].
    pub fn messages(
        &self,
        project_id: u64,
        user_id: u64,
    ) -> Result<Vec<StoredMessage>, DirectoryError> {
        let inner = self.lock();
        inner.participant_project(project_id, user_id)?;
        Ok(inner.messages.iter().filter(|m| m.project_id == project_id).cloned().collect())
    }

    /// Projects in which `user_id` can chat: those it participates in that
    /// have a consultant assigned.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::UserNotFound`].
    pub fn projects_with_chat(&self, user_id: u64) -> Result<Vec<Project>, DirectoryError> {
        let inner = self.lock();
        if !inner.users.contains_key(&user_id) {
            return Err(DirectoryError::UserNotFound(user_id));
        }
        Ok(inner
            .projects
            .values()
            .filter(|p| p.consultant_id.is_some() && p.has_participant(user_id))
            .cloned()
            .collect())
    }

    /// Number of accounts.
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }
}

impl DirectoryInner {
    fn insert_user(&mut self, new_user: NewUser) -> u64 {
        self.last_user_id += 1;
        let id = self.last_user_id;
        self.users.insert(id, User {
            id,
            name: new_user.name,
            email: new_user.email,
            password: new_user.password,
            role: new_user.role,
            bio: None,
            phone: None,
            photo_url: None,
        });
        id
    }

    fn insert_project(
        &mut self,
        name: &str,
        owner_id: u64,
        consultant_id: Option<u64>,
        status: ProjectStatus,
    ) -> u64 {
        self.last_project_id += 1;
        let id = self.last_project_id;
        self.projects.insert(id, Project {
            id,
            name: name.to_string(),
            status,
            owner_id,
            consultant_id,
        });
        id
    }
}
