//! State slices held by the shared store.
//!
//! Every top-level slice sits behind its own `Arc`. Mutations replace only the
//! slice they touch, so subscribers can detect change by pointer identity.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mosaic_core::{CoreError, Value};
use serde::{Deserialize, Serialize};

/// The authenticated session, as issued by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            email: None,
            roles: Vec::new(),
            access_token: None,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub session: Option<Session>,
}

/// An organizational scope the user can act in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// Permissions granted to the current user inside this tenant.
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TenantMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plan: None,
            permissions: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantState {
    pub tenant_id: Option<String>,
    pub current_org_permissions: Vec<String>,
    pub tenant_metadata: Option<TenantMetadata>,
    pub available_tenants: Vec<TenantMetadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// The caller-supplied part of a notification; the store assigns id and time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    #[serde(default)]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }

    /// Tag the notification with the bundle that raised it.
    #[must_use]
    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Load status of one remote, written by the loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadState {
    pub loading: bool,
    pub loaded: bool,
    pub error: Option<String>,
}

/// The whole shared state. Cloning copies only the slice pointers.
#[derive(Debug, Clone, Default)]
pub struct SharedStoreState {
    pub auth: Arc<AuthState>,
    pub tenant: Arc<TenantState>,
    pub notifications: Arc<Vec<Notification>>,
    pub remotes: Arc<BTreeMap<String, Arc<LoadState>>>,
}

impl SharedStoreState {
    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    /// Render the state as a `Value` tree.
    pub fn to_value(&self) -> Result<Value, CoreError> {
        let remotes: BTreeMap<&String, &LoadState> = self
            .remotes
            .iter()
            .map(|(name, state)| (name, state.as_ref()))
            .collect();

        Ok(Value::map()
            .with("auth", Value::from_serialize(self.auth.as_ref())?)
            .with("tenant", Value::from_serialize(self.tenant.as_ref())?)
            .with(
                "notifications",
                Value::from_serialize(self.notifications.as_ref())?,
            )
            .with("remotes", Value::from_serialize(&remotes)?))
    }
}

/// Slices a host provides once it knows the session. Absent slices are kept.
#[derive(Debug, Clone, Default)]
pub struct InitialState {
    pub auth: Option<AuthState>,
    pub tenant: Option<TenantState>,
    pub notifications: Option<Vec<Notification>>,
}

impl InitialState {
    pub fn with_session(session: Session) -> Self {
        Self {
            auth: Some(AuthState {
                session: Some(session),
            }),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mosaic_core::address;

    #[test]
    fn session_expiry() {
        let now = Utc::now();
        let mut session = Session::new("u1", "Ada");
        assert!(!session.is_expired(now));

        session.expires_at = Some(now - Duration::seconds(1));
        assert!(session.is_expired(now));
    }

    #[test]
    fn notification_defaults_to_unread_info() {
        let parsed: NewNotification =
            serde_json::from_value(serde_json::json!({"title": "Saved"})).unwrap();
        assert_eq!(parsed.kind, NotificationKind::Info);
        assert_eq!(parsed.message, "");
    }

    #[test]
    fn state_renders_camel_case() {
        let state = SharedStoreState {
            tenant: Arc::new(TenantState {
                tenant_id: Some("acme".into()),
                ..TenantState::default()
            }),
            ..SharedStoreState::default()
        };

        let value = state.to_value().unwrap();
        assert_eq!(
            value.get(&address!("tenant/tenantId")),
            Some(&Value::from("acme"))
        );
        assert_eq!(value.get(&address!("auth/session")), Some(&Value::Null));
    }
}
