//! Users remote, compiled to a WebAssembly component.
//!
//! Exposes `./UsersPage` and `./UserBadge`. Both read the current tenant from
//! the host's shared store when they are requested.

wit_bindgen::generate!({
    world: "remote-entry",
    path: "wit/remote.wit",
});

use std::sync::atomic::{AtomicBool, Ordering};

use exports::mosaic::remote::container::{ContainerError, ExportEntry, Guest};
use mosaic::remote::host::{log, store_read, LogLevel, ReadResult, SharedPackage, Value};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

struct UsersRemote;

fn current_tenant() -> Result<Option<String>, ContainerError> {
    match store_read("tenant/id") {
        ReadResult::Found(Value::ValText(id)) => Ok(Some(id)),
        ReadResult::Found(_) | ReadResult::NotFound => Ok(None),
        ReadResult::ReadError(e) => Err(ContainerError::Failed(format!(
            "failed to read tenant/id: {}",
            e
        ))),
    }
}

fn text(name: &str, value: impl Into<String>) -> ExportEntry {
    ExportEntry {
        name: name.to_string(),
        val: Value::ValText(value.into()),
    }
}

impl Guest for UsersRemote {
    fn init(shared: Vec<SharedPackage>) -> Result<(), ContainerError> {
        if INITIALIZED.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for package in &shared {
            log(
                LogLevel::Debug,
                &format!("shared {} {}", package.name, package.version),
            );
        }
        log(LogLevel::Info, "users remote initialized");
        Ok(())
    }

    fn get(module: String) -> Result<Vec<ExportEntry>, ContainerError> {
        if !INITIALIZED.load(Ordering::Acquire) {
            return Err(ContainerError::NotInitialized);
        }

        let tenant = current_tenant()?;
        let tenant_json = match &tenant {
            Some(id) => format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")),
            None => "null".to_string(),
        };

        match module.as_str() {
            "./UsersPage" => Ok(vec![
                ExportEntry {
                    name: "default".to_string(),
                    val: Value::ValJson(format!(
                        "{{\"title\":\"Users\",\"tenant\":{},\"columns\":[\"name\",\"email\",\"role\"]}}",
                        tenant_json
                    )),
                },
                text("title", "Users"),
            ]),
            "./UserBadge" => Ok(vec![text(
                "default",
                tenant.unwrap_or_else(|| "no tenant".to_string()),
            )]),
            _ => Err(ContainerError::NotExposed(module)),
        }
    }
}

export!(UsersRemote);
