use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::PgWireResult;

/// Single shared password for every login, checked by pgwire's cleartext startup handler.
#[derive(Debug)]
pub struct SharedPasswordAuthSource {
    password: String,
}

impl SharedPasswordAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for SharedPasswordAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        tracing::debug!(user = ?login.user(), "password login");
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
