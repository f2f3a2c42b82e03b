use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminStatus {
    Enabled,
    Disabled,
    Locked,
}

impl AdminStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdminStatus::Enabled => "enabled",
            AdminStatus::Disabled => "disabled",
            AdminStatus::Locked => "locked",
        }
    }

    /// Unknown values are treated as disabled.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "enabled" => AdminStatus::Enabled,
            "locked" => AdminStatus::Locked,
            _ => AdminStatus::Disabled,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::admin_users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub nickname: String,
    pub role_id: i64,
    pub role_key: String,
    pub data_scope: String,
    pub status: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl AdminUser {
    pub fn status(&self) -> AdminStatus {
        AdminStatus::parse(&self.status)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::admin_users)]
pub struct NewAdminUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub nickname: &'a str,
    pub role_id: i64,
    pub role_key: &'a str,
    pub data_scope: &'a str,
    pub status: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}
