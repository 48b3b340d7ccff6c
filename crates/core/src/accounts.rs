//! Users and groups.
//!
//! Accounts live in a single `accounts.yaml` under the data directory. Access lists on
//! resources store usernames and group names; this registry resolves the identifiers
//! clients send (username or email for users) to those canonical names.

use crate::config::CoreConfig;
use crate::{ResourceError, ResourceResult};
use hsr_types::{EmailAddress, NonEmptyText, TextError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: NonEmptyText,
    pub email: EmailAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl User {
    /// Name used in commit signatures: the full name when known, else the username.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .unwrap_or_else(|| self.username.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: NonEmptyText,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    groups: Vec<Group>,
}

/// In-memory view of `accounts.yaml`. Mutations are written back immediately.
#[derive(Debug)]
pub struct AccountRegistry {
    path: PathBuf,
    users: Vec<User>,
    groups: Vec<Group>,
}

impl AccountRegistry {
    /// Loads the registry; a missing file is an empty registry.
    pub fn load(cfg: &CoreConfig) -> ResourceResult<Self> {
        Self::load_from(cfg.accounts_file())
    }

    fn load_from(path: PathBuf) -> ResourceResult<Self> {
        let file = match fs::read_to_string(&path) {
            Ok(contents) => serde_yaml::from_str::<AccountsFile>(&contents)
                .map_err(ResourceError::YamlDeserialization)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AccountsFile::default(),
            Err(e) => return Err(ResourceError::FileRead(e)),
        };

        Ok(Self {
            path,
            users: file.users,
            groups: file.groups,
        })
    }

    /// Writes the registry via a temporary sibling file and rename.
    pub fn save(&self) -> ResourceResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(ResourceError::StorageDirCreation)?;
        }

        let file = AccountsFile {
            users: self.users.clone(),
            groups: self.groups.clone(),
        };
        let yaml = serde_yaml::to_string(&file).map_err(ResourceError::YamlSerialization)?;

        let tmp = partial_path(&self.path);
        fs::write(&tmp, yaml).map_err(ResourceError::FileWrite)?;
        fs::rename(&tmp, &self.path).map_err(ResourceError::FileWrite)?;
        Ok(())
    }

    /// Registers a user.
    ///
    /// # Errors
    ///
    /// - [`ResourceError::Text`] if the username is blank or contains whitespace, the email
    ///   is invalid, or the username or full name contains a line break, another control
    ///   character or `<`/`>` (they could not be used in commit signatures).
    /// - [`ResourceError::DuplicateAccount`] if the username or email is already registered.
    pub fn add_user(
        &mut self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
    ) -> ResourceResult<User> {
        let username = NonEmptyText::token(username)?;
        let email = EmailAddress::parse(email)?;
        if email.as_str().contains(['<', '>']) {
            return Err(TextError::ForbiddenCharacter(email.as_str().to_string()).into());
        }
        let full_name = match full_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Some(NonEmptyText::single_line(name)?.into_inner()),
            None => None,
        };

        if self.users.iter().any(|u| u.username == username) {
            return Err(ResourceError::DuplicateAccount(format!(
                "username '{}'",
                username
            )));
        }
        if self
            .users
            .iter()
            .any(|u| u.email.as_str().eq_ignore_ascii_case(email.as_str()))
        {
            return Err(ResourceError::DuplicateAccount(format!("email '{}'", email)));
        }

        let user = User {
            username,
            email,
            full_name,
        };
        self.users.push(user.clone());
        self.save()?;

        tracing::info!(username = %user.username, "user registered");
        Ok(user)
    }

    /// Registers an empty group.
    pub fn add_group(&mut self, name: &str) -> ResourceResult<Group> {
        let name = NonEmptyText::token(name)?;
        if self.groups.iter().any(|g| g.name == name) {
            return Err(ResourceError::DuplicateAccount(format!("group '{}'", name)));
        }

        let group = Group {
            name,
            members: Vec::new(),
        };
        self.groups.push(group.clone());
        self.save()?;

        tracing::info!(group = %group.name, "group registered");
        Ok(group)
    }

    /// Adds a user (by username or email) to a group. Adding an existing member is a no-op.
    pub fn add_group_member(&mut self, group: &str, user_id: &str) -> ResourceResult<Group> {
        let username = self.user_from_id(user_id)?.username.as_str().to_string();
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.name.as_str() == group.trim())
            .ok_or_else(|| ResourceError::GroupNotFound(group.to_string()))?;

        if !group.members.contains(&username) {
            group.members.push(username);
        }
        let group = group.clone();
        self.save()?;
        Ok(group)
    }

    /// Resolves a user by username, then by email (case-insensitive).
    pub fn user_from_id(&self, id: &str) -> ResourceResult<&User> {
        let id = id.trim();
        self.users
            .iter()
            .find(|u| u.username.as_str() == id)
            .or_else(|| {
                self.users
                    .iter()
                    .find(|u| u.email.as_str().eq_ignore_ascii_case(id))
            })
            .ok_or_else(|| ResourceError::UserNotFound(id.to_string()))
    }

    pub fn group_from_id(&self, id: &str) -> ResourceResult<&Group> {
        let id = id.trim();
        self.groups
            .iter()
            .find(|g| g.name.as_str() == id)
            .ok_or_else(|| ResourceError::GroupNotFound(id.to_string()))
    }

    pub fn list_users(&self) -> &[User] {
        &self.users
    }

    pub fn list_groups(&self) -> &[Group] {
        &self.groups
    }

    /// Names of the groups `username` belongs to.
    pub fn groups_of(&self, username: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|g| g.members.iter().any(|m| m == username))
            .map(|g| g.name.as_str().to_string())
            .collect()
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> AccountRegistry {
        AccountRegistry::load_from(temp.path().join("accounts.yaml")).unwrap()
    }

    #[test]
    fn missing_file_is_empty_registry() {
        let temp = TempDir::new().unwrap();
        let reg = registry(&temp);
        assert!(reg.list_users().is_empty());
        assert!(reg.list_groups().is_empty());
    }

    #[test]
    fn users_persist_and_resolve_by_username_or_email() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.add_user("alice", "alice@example.org", Some("Alice Liddell"))
            .unwrap();

        let reg = registry(&temp);
        assert_eq!(reg.user_from_id("alice").unwrap().display_name(), "Alice Liddell");
        assert_eq!(
            reg.user_from_id("ALICE@example.org").unwrap().username.as_str(),
            "alice"
        );
        assert!(matches!(
            reg.user_from_id("bob"),
            Err(ResourceError::UserNotFound(_))
        ));
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.add_user("alice", "alice@example.org", None).unwrap();

        assert!(matches!(
            reg.add_user("alice", "other@example.org", None),
            Err(ResourceError::DuplicateAccount(_))
        ));
        assert!(matches!(
            reg.add_user("alice2", "Alice@Example.org", None),
            Err(ResourceError::DuplicateAccount(_))
        ));
        assert!(matches!(
            reg.add_user("has space", "s@example.org", None),
            Err(ResourceError::Text(_))
        ));
    }

    #[test]
    fn names_unusable_in_commit_signatures_are_rejected() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);

        for (username, full_name) in [
            ("dave", Some("Dave\nSmith")),
            ("eve<x>", None),
            ("fay", Some("Fay <admin>")),
            ("gus", Some("Gus\u{7}")),
        ] {
            let email = format!("{}@example.org", username.trim_end_matches("<x>"));
            assert!(
                matches!(
                    reg.add_user(username, &email, full_name),
                    Err(ResourceError::Text(TextError::ForbiddenCharacter(_)))
                ),
                "{username:?} / {full_name:?} should be rejected"
            );
        }
        assert!(reg.list_users().is_empty());
        assert!(registry(&temp).list_users().is_empty());
    }

    #[test]
    fn group_membership() {
        let temp = TempDir::new().unwrap();
        let mut reg = registry(&temp);
        reg.add_user("alice", "alice@example.org", None).unwrap();
        reg.add_group("hydro").unwrap();

        reg.add_group_member("hydro", "alice@example.org").unwrap();
        let group = reg.add_group_member("hydro", "alice").unwrap();
        assert_eq!(group.members, ["alice"]);
        assert_eq!(reg.groups_of("alice"), ["hydro"]);

        assert!(matches!(
            reg.add_group_member("nope", "alice"),
            Err(ResourceError::GroupNotFound(_))
        ));
        assert!(matches!(
            reg.group_from_id("nope"),
            Err(ResourceError::GroupNotFound(_))
        ));
    }
}
