use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

/// Longest accepted record name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// A user record as seen by callers. `name` is the storage key.
///
/// `email` and `age` use empty/zero as "unset". On updates those sentinels
/// mean "not supplied", so a field can be changed but never cleared.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub age: u8,
}

/// The persisted value for a record: everything except the key.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub age: u8,
}

/// Body of a partial update; the name comes from the request path.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserChanges {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub age: u8,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, age: u8) -> Self {
        Self { name: name.into(), email: email.into(), age }
    }

    /// Rebuild a record from its key and stored payload.
    pub fn from_parts(name: impl Into<String>, info: UserInfo) -> Self {
        Self { name: name.into(), email: info.email, age: info.age }
    }

    /// The payload to persist under `self.name`.
    pub fn info(&self) -> UserInfo {
        UserInfo { email: self.email.clone(), age: self.age }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        validate_name(&self.name)?;
        if !self.email.is_empty() {
            validate_email(&self.email)?;
        }
        Ok(())
    }
}

impl UserInfo {
    /// Sparse merge: copy only the fields `patch` actually sets.
    /// Returns whether anything changed.
    pub fn apply(&mut self, patch: &User) -> bool {
        let mut changed = false;
        if !patch.email.is_empty() && patch.email != self.email {
            self.email = patch.email.clone();
            changed = true;
        }
        if patch.age != 0 && patch.age != self.age {
            self.age = patch.age;
            changed = true;
        }
        changed
    }
}

impl UserChanges {
    pub fn into_patch(self, name: impl Into<String>) -> User {
        User { name: name.into(), email: self.email, age: self.age }
    }
}

pub fn validate_name(name: &str) -> Result<(), ModelError> {
    if name.trim().is_empty() {
        return Err(ModelError::Validation("name required".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ModelError::Validation(format!("name longer than {MAX_NAME_LEN} bytes")));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    if !email.contains('@') {
        return Err(ModelError::Validation("invalid email".into()));
    }
    Ok(())
}
