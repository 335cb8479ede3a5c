use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::{error::AppError, validation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Strict parse, used for role changes submitted by an admin
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Lenient parse for stored data. Anything unrecognized is a plain user.
    pub fn from_stored(value: &str) -> Role {
        Role::parse(value).unwrap_or_else(|| {
            log::warn!("⚠️ Unrecognized role '{}', treating as user", value);
            Role::User
        })
    }

    /// Where a freshly logged-in session should navigate
    pub fn landing_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::User => "/dashboard",
        }
    }
}

pub fn deserialize_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().map(Role::from_stored).unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, deserialize_with = "deserialize_role")]
    pub role: Role,
}

/// Login credential, stored apart from the public profile
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validation::validate_name(&self.name)?;
        validation::validate_email(&self.email)?;
        validation::validate_password(&self.password)?;
        validation::validate_phone(&self.phone)?;
        validation::validate_address(&self.address)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Self-service profile form. Email is read-only.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RoleUpdate {
    pub role: String,
}

/// Field overwrite applied by the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Option<Role>,
}

impl ProfileUpdate {
    pub fn validate(self) -> Result<UserPatch, AppError> {
        if self.name.is_none() && self.phone.is_none() && self.address.is_none() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }
        if let Some(name) = &self.name {
            validation::validate_name(name)?;
        }
        if let Some(phone) = &self.phone {
            validation::validate_phone(phone)?;
        }
        if let Some(address) = &self.address {
            validation::validate_address(address)?;
        }

        Ok(UserPatch {
            name: self.name.map(|n| n.trim().to_string()),
            phone: self.phone.map(|p| p.trim().to_string()),
            address: self.address.map(|a| a.trim().to_string()),
            role: None,
        })
    }
}

impl RoleUpdate {
    pub fn validate(&self) -> Result<UserPatch, AppError> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| AppError::Validation(format!("Unknown role: {}", self.role)))?;
        Ok(UserPatch {
            role: Some(role),
            ..Default::default()
        })
    }
}

impl UserPatch {
    pub fn apply(&self, user: &mut UserRecord) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            user.address = address.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }
}
