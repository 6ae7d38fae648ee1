use serde::{Deserialize, Serialize};

pub type UserId = String;

/// Identifier of the first seeded user.
pub const FIRST_USER_ID: &str = "u1";
/// Identifier of the second seeded user.
pub const SECOND_USER_ID: &str = "u2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The two people sharing expenses, with the given display names.
pub fn default_users(first_name: &str, second_name: &str) -> [User; 2] {
    [
        User::new(FIRST_USER_ID, first_name),
        User::new(SECOND_USER_ID, second_name),
    ]
}

/// Returns the counterpart of `id` in a two-person setup.
pub fn other_user<'a>(users: &'a [User], id: &str) -> Option<&'a User> {
    users.iter().find(|u| u.id != id)
}
