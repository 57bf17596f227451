//! Host side of the `mosaic:remote/host` interface.
//!
//! Guests see the shared store through its path facade and the share scope
//! through package versions. Values that are not scalars cross the boundary
//! as JSON text.

use std::sync::Arc;

use mosaic_core::{Address, Value};
use mosaic_federation::ShareScope;
use mosaic_store::SharedStore;
use tracing::{debug, error, info, warn};

use crate::bindings::mosaic::remote::host::{
    self, LogLevel, ReadResult, Value as WitValue, WriteResult,
};

/// State held by the wasmtime store of one remote instance.
pub struct WasmRemoteState {
    /// Where the remote was loaded from, for logs.
    pub label: String,

    pub store: Arc<SharedStore>,

    /// Set by the first `init`.
    pub share_scope: Option<ShareScope>,
}

impl WasmRemoteState {
    pub fn new(label: impl Into<String>, store: Arc<SharedStore>) -> Self {
        Self {
            label: label.into(),
            store,
            share_scope: None,
        }
    }
}

pub(crate) fn value_to_wit(value: &Value) -> WitValue {
    match value {
        Value::Null => WitValue::ValNull,
        Value::Bool(b) => WitValue::ValBool(*b),
        Value::Integer(i) => WitValue::ValInteger(*i),
        Value::Float(f) => WitValue::ValFloat(*f),
        Value::String(s) => WitValue::ValText(s.clone()),
        Value::Array(_) | Value::Map(_) => WitValue::ValJson(value.to_json().to_string()),
    }
}

pub(crate) fn wit_to_value(value: WitValue) -> Result<Value, serde_json::Error> {
    Ok(match value {
        WitValue::ValNull => Value::Null,
        WitValue::ValBool(b) => Value::Bool(b),
        WitValue::ValInteger(i) => Value::Integer(i),
        WitValue::ValFloat(f) => Value::Float(f),
        WitValue::ValText(s) => Value::String(s),
        WitValue::ValJson(json) => Value::from(serde_json::from_str::<serde_json::Value>(&json)?),
    })
}

impl host::Host for WasmRemoteState {
    fn log(&mut self, level: LogLevel, message: String) {
        let remote = self.label.as_str();
        match level {
            LogLevel::Debug => debug!(remote, "{message}"),
            LogLevel::Info => info!(remote, "{message}"),
            LogLevel::Warn => warn!(remote, "{message}"),
            LogLevel::Error => error!(remote, "{message}"),
        }
    }

    fn shared_version(&mut self, name: String) -> Option<String> {
        self.share_scope.as_ref().and_then(|scope| scope.version(&name))
    }

    fn store_read(&mut self, path: String) -> ReadResult {
        let address = match Address::parse(&path) {
            Ok(a) => a,
            Err(e) => return ReadResult::ReadError(format!("invalid path: {}", e)),
        };

        match self.store.read(&address) {
            Ok(Some(value)) => ReadResult::Found(value_to_wit(&value)),
            Ok(None) => ReadResult::NotFound,
            Err(e) => ReadResult::ReadError(e.to_string()),
        }
    }

    fn store_write(&mut self, path: String, val: WitValue) -> WriteResult {
        let address = match Address::parse(&path) {
            Ok(a) => a,
            Err(e) => return WriteResult::WriteError(format!("invalid path: {}", e)),
        };
        let value = match wit_to_value(val) {
            Ok(v) => v,
            Err(e) => return WriteResult::WriteError(format!("invalid json: {}", e)),
        };

        match self.store.write(&address, value) {
            Ok(written) => {
                debug!(remote = %self.label, address = %written, "store write");
                WriteResult::Written(written.to_string())
            }
            Err(e) => WriteResult::WriteError(e.to_string()),
        }
    }
}
