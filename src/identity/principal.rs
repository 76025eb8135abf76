use serde::{Deserialize, Serialize};

/// The authenticated identity behind a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// Name shown on screens: display name when set, otherwise the email.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().filter(|s| !s.trim().is_empty()).unwrap_or(&self.email)
    }
}
