/*!
 * # Request identity
 *
 * Every workflow operation receives an explicit [`RequestContext`] naming the
 * caller and their role. The HTTP layer builds it from headers set by the
 * fronting identity proxy; tests and tools construct it directly.
 */

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ServiceError;

pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Workflow roles. Anyone can submit and approve through a token; the finance
/// roles gate the finance queue.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Role {
    #[sea_orm(string_value = "Employee")]
    #[serde(rename = "Employee")]
    #[strum(serialize = "Employee", ascii_case_insensitive)]
    Employee,
    #[sea_orm(string_value = "Finance")]
    #[serde(rename = "Finance")]
    #[strum(serialize = "Finance", ascii_case_insensitive)]
    Finance,
    #[sea_orm(string_value = "Finance Approver")]
    #[serde(rename = "Finance Approver")]
    #[strum(serialize = "Finance Approver", ascii_case_insensitive)]
    FinanceApprover,
    #[sea_orm(string_value = "Super Admin")]
    #[serde(rename = "Super Admin")]
    #[strum(serialize = "Super Admin", ascii_case_insensitive)]
    SuperAdmin,
}

impl Role {
    pub fn is_finance_staff(&self) -> bool {
        matches!(self, Self::Finance | Self::FinanceApprover)
    }
}

/// Authenticated caller of a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl RequestContext {
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            role,
        }
    }

    /// Fails with `Forbidden` unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role], action: &str) -> Result<(), ServiceError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} role may not {}",
                self.role, action
            )))
        }
    }

    pub fn is(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let email = header_value(parts, USER_EMAIL_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized("missing caller identity".to_string()))?;
        let name = header_value(parts, USER_NAME_HEADER).unwrap_or(email);
        let role = match header_value(parts, USER_ROLE_HEADER) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| ServiceError::Unauthorized(format!("unknown role '{}'", raw)))?,
            None => Role::Employee,
        };

        Ok(RequestContext::new(email, name, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn roles_parse_from_display_names() {
        assert_eq!("Finance Approver".parse::<Role>().ok(), Some(Role::FinanceApprover));
        assert_eq!("finance".parse::<Role>().ok(), Some(Role::Finance));
        assert_eq!(Role::SuperAdmin.to_string(), "Super Admin");
        assert!("Auditor".parse::<Role>().is_err());
    }

    #[test]
    fn require_role_rejects_other_roles() {
        let ctx = RequestContext::new("a@x.org", "A", Role::Employee);
        assert_matches!(
            ctx.require_role(&[Role::Finance], "process expenses"),
            Err(ServiceError::Forbidden(_))
        );
        let finance = RequestContext::new("f@x.org", "F", Role::Finance);
        assert!(finance.require_role(&[Role::Finance], "process expenses").is_ok());
    }

    #[tokio::test]
    async fn extracts_context_from_headers() {
        let req = axum::http::Request::builder()
            .header(USER_EMAIL_HEADER, "fin@x.org")
            .header(USER_NAME_HEADER, "Fin User")
            .header(USER_ROLE_HEADER, "Finance")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let ctx = RequestContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.email, "fin@x.org");
        assert_eq!(ctx.role, Role::Finance);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let req = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let result = RequestContext::from_request_parts(&mut parts, &()).await;
        assert_matches!(result, Err(ServiceError::Unauthorized(_)));
    }
}
