#![allow(dead_code)]

use std::sync::Once;

use json_context::{ContextOptions, JsonContext, PushOptions, PushResult, Value};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Routes engine logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn context(config: serde_json::Value) -> JsonContext {
    init_tracing();
    JsonContext::new(ContextOptions::from_json(config).expect("valid options")).expect("valid matchers")
}

pub fn push_verified(ctx: &mut JsonContext, object: serde_json::Value) -> PushResult {
    ctx.push_change(Value::from(object), PushOptions::verified())
}

pub fn push(ctx: &mut JsonContext, object: &Value) -> PushResult {
    ctx.push_change(object.clone(), PushOptions::default())
}

/// Values of `field` across a sequence in the document.
pub fn field_of(ctx: &JsonContext, collection: &str, field: &str) -> Vec<String> {
    let items = ctx.get(collection, None).unwrap().expect("collection exists");
    items
        .as_array()
        .expect("collection is a sequence")
        .to_vec()
        .iter()
        .map(|item| match item.get(field) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect()
}
