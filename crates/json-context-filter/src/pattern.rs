//! Pattern evaluation.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use json_context_query::{loose_equal, Scope};
use json_context_value::{Key, Value};
use regex::Regex;
use tracing::warn;

/// Tests `candidate` against `pattern`.
///
/// `$query` operators anywhere in the pattern are evaluated with the whole
/// candidate as their context.
pub fn matches(candidate: &Value, pattern: &Value, scope: &Scope<'_>) -> bool {
    check(candidate, pattern, candidate, scope)
}

/// Tests a single field `value` of `candidate` against `pattern`.
pub fn matches_field(value: &Value, pattern: &Value, candidate: &Value, scope: &Scope<'_>) -> bool {
    check(value, pattern, candidate, scope)
}

fn check(value: &Value, pattern: &Value, candidate: &Value, scope: &Scope<'_>) -> bool {
    match pattern {
        Value::Object(fields) => fields.entries().into_iter().all(|(key, expected)| {
            match key.strip_prefix('$') {
                Some(op) => operator(op, value, &expected, candidate, scope),
                None => {
                    let actual = value.get_key(&Key::Name(key)).unwrap_or_default();
                    check(&actual, &expected, candidate, scope)
                }
            }
        }),
        Value::Array(items) => match value {
            Value::Array(actual) => {
                let items = items.to_vec();
                let actual = actual.to_vec();
                items.len() == actual.len()
                    && items
                        .iter()
                        .zip(actual.iter())
                        .all(|(p, v)| check(v, p, candidate, scope))
            }
            _ => false,
        },
        scalar => loose_equal(value, scalar),
    }
}

fn operator(op: &str, value: &Value, arg: &Value, candidate: &Value, scope: &Scope<'_>) -> bool {
    match op {
        "present" => !value.is_null() == arg.is_truthy(),
        "any" => list(arg).iter().any(|v| loose_equal(value, v)),
        "matchAny" => list(arg).iter().any(|p| check(value, p, candidate, scope)),
        "not" => !check(value, arg, candidate, scope),
        "contains" => match (value, arg) {
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::Array(arr), _) => {
                let items = arr.to_vec();
                list(arg).iter().all(|x| items.iter().any(|item| loose_equal(item, x)))
            }
            _ => false,
        },
        "excludes" => match (value, arg) {
            (Value::Null, _) => true,
            (Value::String(s), Value::String(needle)) => !s.contains(needle.as_str()),
            (Value::Array(arr), _) => {
                let items = arr.to_vec();
                !list(arg).iter().any(|x| items.iter().any(|item| loose_equal(item, x)))
            }
            _ => false,
        },
        "only" => match value {
            Value::Array(arr) => {
                let allowed = list(arg);
                arr.to_vec()
                    .iter()
                    .all(|item| allowed.iter().any(|x| loose_equal(item, x)))
            }
            _ => false,
        },
        "query" => match arg.as_str() {
            Some(expr) => match scope.query_str(expr, Some(candidate)) {
                Ok(result) => loose_equal(value, &result.value.unwrap_or_default()),
                Err(err) => {
                    warn!(expr, %err, "pattern $query does not parse");
                    false
                }
            },
            None => false,
        },
        "test" => match arg.as_str() {
            Some(expr) => match scope.query_str(expr, Some(value)) {
                Ok(result) => result.value.is_some_and(|v| v.is_truthy()),
                Err(err) => {
                    warn!(expr, %err, "pattern $test does not parse");
                    false
                }
            },
            None => false,
        },
        "regex" => match (value, arg.as_str()) {
            (Value::String(s), Some(re)) => match cached_regex(re) {
                Ok(re) => re.is_match(s),
                Err(err) => {
                    warn!(regex = re, %err, "pattern $regex does not compile");
                    false
                }
            },
            _ => false,
        },
        _ => {
            warn!(operator = op, "unknown pattern operator");
            false
        }
    }
}

const REGEX_CACHE_MAX: usize = 256;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

/// Compiles `pattern` once and reuses it. The cache is cleared when full.
fn cached_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    if let Some(re) = cache.read().ok().and_then(|guard| guard.get(pattern).cloned()) {
        return Ok(re);
    }

    let compiled = Regex::new(pattern)?;
    if let Ok(mut guard) = cache.write() {
        if guard.len() >= REGEX_CACHE_MAX {
            guard.clear();
        }
        guard.insert(pattern.to_string(), compiled.clone());
    }
    Ok(compiled)
}

fn list(arg: &Value) -> Vec<Value> {
    match arg {
        Value::Array(arr) => arr.to_vec(),
        other => vec![other.clone()],
    }
}
