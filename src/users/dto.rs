use serde::{Deserialize, Serialize};

use crate::auth::repo_types::{Role, User};

/// Partial update; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
}

/// Admin edit replaces all four fields.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub avatar_url: Option<String>,
    pub address: String,
}

impl From<User> for Profile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            role: u.role,
            is_blocked: u.is_blocked,
            is_verified: u.is_verified,
            avatar_url: u.avatar_url,
            address: u.address,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: String,
    pub profile: Profile,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub message: String,
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserDeletedResponse {
    pub message: String,
    pub user_id: i64,
}
