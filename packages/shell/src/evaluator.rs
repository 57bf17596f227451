//! Picks an evaluator per entry.

use async_trait::async_trait;
use bytes::Bytes;
use mosaic_core::GlobalScope;
use mosaic_federation::{EntryEvaluator, EntryModule, ImportError};
use mosaic_http::JsonEntryEvaluator;
use mosaic_wasm::{WasmError, WasmEvaluator};
use url::Url;

const WASM_MAGIC: &[u8] = b"\0asm";

/// WebAssembly components by extension or magic number, JSON manifests otherwise.
pub struct DispatchEvaluator {
    json: JsonEntryEvaluator,
    wasm: WasmEvaluator,
}

impl DispatchEvaluator {
    pub fn new(global: &GlobalScope) -> Result<Self, WasmError> {
        Ok(Self {
            json: JsonEntryEvaluator,
            wasm: WasmEvaluator::new(global)?,
        })
    }
}

pub fn is_wasm(url: &Url, source: &[u8]) -> bool {
    url.path().ends_with(".wasm") || source.starts_with(WASM_MAGIC)
}

#[async_trait]
impl EntryEvaluator for DispatchEvaluator {
    async fn evaluate(&self, url: &Url, source: Bytes) -> Result<EntryModule, ImportError> {
        if is_wasm(url, &source) {
            self.wasm.evaluate(url, source).await
        } else {
            self.json.evaluate(url, source).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn detects_wasm_by_extension() {
        assert!(is_wasm(&url("https://cdn.example.com/users/remote.wasm?t=1"), b"{}"));
        assert!(!is_wasm(&url("https://cdn.example.com/users/remoteEntry.json"), b"{}"));
    }

    #[test]
    fn detects_wasm_by_magic() {
        assert!(is_wasm(
            &url("https://cdn.example.com/users/entry"),
            b"\0asm\x0d\0\x01\0"
        ));
    }

    #[tokio::test]
    async fn json_entries_go_to_the_manifest_evaluator() {
        let evaluator = DispatchEvaluator::new(&GlobalScope::new()).unwrap();
        let manifest = br#"{ "scope": "settings_app", "modules": { "./Page": 1 } }"#;
        let entry = evaluator
            .evaluate(
                &url("https://cdn.example.com/settings/remoteEntry.json"),
                Bytes::from_static(manifest),
            )
            .await
            .unwrap();
        assert!(entry.module.get("get").is_some());
    }

    #[tokio::test]
    async fn broken_wasm_is_an_evaluate_error() {
        let evaluator = DispatchEvaluator::new(&GlobalScope::new()).unwrap();
        let result = evaluator
            .evaluate(
                &url("https://cdn.example.com/users/remote.wasm"),
                Bytes::from_static(b"\0asm"),
            )
            .await;
        assert!(matches!(result, Err(ImportError::Evaluate { .. })));
    }
}
