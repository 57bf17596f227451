//! Address-based read/write access to the shared store.
//!
//! Remotes that cannot link against this crate's types (WASM guests, script
//! hosts) reach the store through `read` and `write` on addresses:
//!
//! | address                      | read                      | write                          |
//! |------------------------------|---------------------------|--------------------------------|
//! | ``                           | whole state               | -                              |
//! | `auth`, `auth/session`       | session                   | read-only                      |
//! | `tenant`                     | tenant slice              | -                              |
//! | `tenant/id`                  | current tenant id         | string or null                 |
//! | `tenant/permissions`         | permission list           | list of strings                |
//! | `tenant/metadata`            | current tenant metadata   | -                              |
//! | `tenant/available`           | selectable tenants        | -                              |
//! | `notifications`              | list                      | append (map), returns its address |
//! | `notifications/unread`       | unread count              | -                              |
//! | `notifications/<id>`         | one notification          | null dismisses                 |
//! | `notifications/<id>/read`    | read flag                 | `true` marks read              |
//! | `remotes`, `remotes/<name>`  | load status               | read-only                      |
//! | `docs`                       | this table                | -                              |

use mosaic_core::{Address, CoreError, Value};

use crate::error::{Result, StoreError};
use crate::state::NewNotification;
use crate::store::SharedStore;

impl SharedStore {
    /// Read the value at `address`. `Ok(None)` means nothing is there yet.
    pub fn read(&self, address: &Address) -> Result<Option<Value>> {
        let state = self.snapshot();
        let value = match address.segments().as_slice() {
            [] => Some(state.to_value()?),
            ["auth"] => Some(Value::from_serialize(state.auth.as_ref())?),
            ["auth", "session"] => Some(Value::from_serialize(&state.auth.session)?),
            ["tenant"] => Some(Value::from_serialize(state.tenant.as_ref())?),
            ["tenant", "id"] => Some(Value::from(state.tenant.tenant_id.clone())),
            ["tenant", "permissions"] => {
                Some(Value::from(state.tenant.current_org_permissions.clone()))
            }
            ["tenant", "metadata"] => Some(Value::from_serialize(&state.tenant.tenant_metadata)?),
            ["tenant", "available"] => {
                Some(Value::from_serialize(&state.tenant.available_tenants)?)
            }
            ["notifications"] => Some(Value::from_serialize(state.notifications.as_ref())?),
            ["notifications", "unread"] => Some(Value::from(state.unread_count())),
            ["notifications", id] => state
                .notifications
                .iter()
                .find(|n| n.id == *id)
                .map(Value::from_serialize)
                .transpose()?,
            ["notifications", id, "read"] => state
                .notifications
                .iter()
                .find(|n| n.id == *id)
                .map(|n| Value::Bool(n.read)),
            ["remotes"] => Some(Value::from_serialize(
                &state
                    .remotes
                    .iter()
                    .map(|(name, s)| (name.as_str(), s.as_ref()))
                    .collect::<std::collections::BTreeMap<_, _>>(),
            )?),
            ["remotes", name] => state
                .remotes
                .get(*name)
                .map(|s| Value::from_serialize(s.as_ref()))
                .transpose()?,
            ["docs"] => Some(docs()),
            _ => {
                return Err(StoreError::NoRoute {
                    address: address.clone(),
                })
            }
        };
        Ok(value)
    }

    /// Write `value` at `address`, returning the address of what was written.
    pub fn write(&self, address: &Address, value: Value) -> Result<Address> {
        let invalid = |message: &str| StoreError::InvalidValue {
            address: address.clone(),
            message: message.to_string(),
        };

        match address.segments().as_slice() {
            ["tenant", "id"] => match value {
                Value::Null => self.set_tenant_id(None),
                Value::String(id) => self.set_tenant_id(Some(id)),
                _ => return Err(invalid("expected a string or null")),
            },
            ["tenant", "permissions"] => {
                let permissions: Vec<String> = value
                    .deserialize_into()
                    .map_err(|_| invalid("expected a list of strings"))?;
                self.set_org_permissions(permissions);
            }
            ["notifications"] => {
                let notification: NewNotification = value
                    .deserialize_into()
                    .map_err(|e| invalid(&e.to_string()))?;
                let id = self.push_notification(notification);
                return Ok(address.child(&id).map_err(CoreError::from)?);
            }
            ["notifications", id] => match value {
                Value::Null => {
                    if !self.dismiss_notification(id) {
                        return Err(StoreError::UnknownNotification { id: id.to_string() });
                    }
                }
                _ => return Err(invalid("only null (dismiss) may be written")),
            },
            ["notifications", id, "read"] => match value {
                Value::Bool(true) => {
                    if !self.mark_notification_read(id) {
                        return Err(StoreError::UnknownNotification { id: id.to_string() });
                    }
                }
                _ => return Err(invalid("only true may be written")),
            },
            ["auth", ..] | ["remotes", ..] => {
                return Err(StoreError::ReadOnly {
                    address: address.clone(),
                })
            }
            _ => {
                return Err(StoreError::NoRoute {
                    address: address.clone(),
                })
            }
        }
        Ok(address.clone())
    }
}

fn docs() -> Value {
    Value::map()
        .with("title", "Shared Store")
        .with(
            "description",
            "Page-wide state shared by the host and every remote.\n\n\
             Read `auth/session`, `tenant/*`, `notifications`, `remotes/<name>`.\n\
             Write `tenant/id`, `tenant/permissions`, append to `notifications`,\n\
             write `true` to `notifications/<id>/read` or null to `notifications/<id>`.",
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Session;
    use collection_literals::btree;
    use mosaic_core::{address, GlobalScope};
    use std::sync::Arc;

    fn store() -> Arc<SharedStore> {
        SharedStore::get_or_create(&GlobalScope::new()).unwrap()
    }

    #[test]
    fn read_session_and_tenant() {
        let store = store();
        assert_eq!(store.read(&address!("auth/session")).unwrap(), Some(Value::Null));

        store.set_session(Some(Session::new("u1", "Ada")));
        store.set_tenant_id(Some("acme".into()));

        let session = store.read(&address!("auth/session")).unwrap().unwrap();
        assert_eq!(session.get(&address!("userId")), Some(&Value::from("u1")));
        assert_eq!(
            store.read(&address!("tenant/id")).unwrap(),
            Some(Value::from("acme"))
        );
    }

    #[test]
    fn write_tenant_id() {
        let store = store();
        store.write(&address!("tenant/id"), Value::from("globex")).unwrap();
        assert_eq!(store.tenant_id().as_deref(), Some("globex"));

        store.write(&address!("tenant/id"), Value::Null).unwrap();
        assert_eq!(store.tenant_id(), None);

        assert!(matches!(
            store.write(&address!("tenant/id"), Value::Integer(3)),
            Err(StoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn append_and_mark_notification_through_addresses() {
        let store = store();
        let written = store
            .write(
                &address!("notifications"),
                Value::map()
                    .with("title", "Imported")
                    .with("kind", "success")
                    .with("source", "users"),
            )
            .unwrap();

        assert_eq!(written.len(), 2);
        let id = written.components[1].clone();
        assert_eq!(
            store.read(&address!("notifications/unread")).unwrap(),
            Some(Value::Integer(1))
        );

        store.write(&written.child("read").unwrap(), Value::Bool(true)).unwrap();
        assert_eq!(
            store.read(&written.child("read").unwrap()).unwrap(),
            Some(Value::Bool(true))
        );

        store.write(&written, Value::Null).unwrap();
        assert!(store.notifications().iter().all(|n| n.id != id));
        assert_eq!(
            store.write(&written, Value::Null),
            Err(StoreError::UnknownNotification { id })
        );
    }

    #[test]
    fn remote_status_is_read_only() {
        let store = store();
        assert_eq!(store.read(&address!("remotes/users")).unwrap(), None);

        store.set_remote_error("users", "offline");
        let status = store.read(&address!("remotes/users")).unwrap().unwrap();
        assert_eq!(status.get(&address!("error")), Some(&Value::from("offline")));

        assert!(matches!(
            store.write(&address!("remotes/users"), Value::Null),
            Err(StoreError::ReadOnly { .. })
        ));
        assert!(matches!(
            store.write(&address!("auth/session"), Value::Null),
            Err(StoreError::ReadOnly { .. })
        ));
    }

    #[test]
    fn remotes_read_as_one_map() {
        let store = store();
        store.set_remote_loading("users");
        store.set_remote_loaded("settings");

        let status = |loading: bool, loaded: bool| {
            Value::Map(btree! {
                "loading".to_string() => Value::Bool(loading),
                "loaded".to_string() => Value::Bool(loaded),
                "error".to_string() => Value::Null,
            })
        };
        assert_eq!(
            store.read(&address!("remotes")).unwrap(),
            Some(Value::Map(btree! {
                "settings".to_string() => status(false, true),
                "users".to_string() => status(true, false),
            }))
        );
    }

    #[test]
    fn unknown_addresses_have_no_route() {
        let store = store();
        assert!(matches!(
            store.read(&address!("billing")),
            Err(StoreError::NoRoute { .. })
        ));
        assert!(matches!(
            store.write(&address!("tenant"), Value::Null),
            Err(StoreError::NoRoute { .. })
        ));
        assert!(store.read(&address!("docs")).unwrap().is_some());
    }
}
