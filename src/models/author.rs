use serde::{Deserialize, Serialize};

/// Email placeholder for authors whose address could not be resolved.
pub const EMAIL_NOT_FOUND: &str = "not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    pub email: String,
    pub fullname: String,
}

impl Author {
    pub fn has_email(&self) -> bool {
        self.email != EMAIL_NOT_FOUND
    }
}

/// "This author currently owns the violation on this page."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub page_id: String,
    pub username: String,
}
