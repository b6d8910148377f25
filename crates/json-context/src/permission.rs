//! Permission checks.

use json_context_query::{Query, Scope};
use json_context_value::Value;
use tracing::trace;

use crate::change::{Action, Change};
use crate::error::ConfigError;
use crate::matcher::{parse, Allow, Permission};

#[derive(Debug)]
pub(crate) enum CompiledPermission {
    Flag(bool),
    Queries(Vec<Query>),
}

impl CompiledPermission {
    fn compile(index: usize, permission: &Permission) -> Result<Self, ConfigError> {
        Ok(match permission {
            Permission::Flag(flag) => CompiledPermission::Flag(*flag),
            Permission::Query(expr) => CompiledPermission::Queries(vec![parse(index, "allow", expr)?]),
            Permission::All(exprs) => CompiledPermission::Queries(
                exprs
                    .iter()
                    .map(|expr| parse(index, "allow", expr))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// A query passes when it resolves to something truthy other than the
    /// descriptor itself. An empty list never passes.
    fn evaluate(&self, descriptor: &Value, scope: &Scope<'_>) -> bool {
        match self {
            CompiledPermission::Flag(flag) => *flag,
            CompiledPermission::Queries(queries) => {
                !queries.is_empty()
                    && queries.iter().all(|query| match scope.get(query, Some(descriptor)) {
                        Some(value) => !value.same(descriptor) && value.is_truthy(),
                        None => false,
                    })
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompiledAllow {
    change: Option<CompiledPermission>,
    append: Option<CompiledPermission>,
    update: Option<CompiledPermission>,
    remove: Option<CompiledPermission>,
}

impl CompiledAllow {
    pub(crate) fn compile(index: usize, allow: &Allow) -> Result<Self, ConfigError> {
        let compile = |p: &Option<Permission>| {
            p.as_ref()
                .map(|p| CompiledPermission::compile(index, p))
                .transpose()
        };
        Ok(Self {
            change: compile(&allow.change)?,
            append: compile(&allow.append)?,
            update: compile(&allow.update)?,
            remove: compile(&allow.remove)?,
        })
    }

    fn for_action(&self, action: Action) -> Option<&CompiledPermission> {
        match action {
            Action::Append => self.append.as_ref(),
            Action::Update => self.update.as_ref(),
            Action::Remove => self.remove.as_ref(),
        }
    }
}

/// Decides whether `change` may be applied.
///
/// Pre-verified changes always pass. Without an `allow` block the context's
/// default policy applies. Otherwise `change` is asked first, then the
/// action's own entry; an action nobody speaks for is denied.
pub(crate) fn check_allowed(
    allow: Option<&CompiledAllow>,
    change: &Change,
    scope: &Scope<'_>,
    default_allow: bool,
) -> bool {
    if change.verified_change {
        return true;
    }
    let Some(allow) = allow else {
        return default_allow;
    };

    let descriptor = change.to_value();
    let mut verdict = None;
    if let Some(permission) = &allow.change {
        verdict = Some(permission.evaluate(&descriptor, scope));
    }
    if verdict != Some(false) {
        if let Some(permission) = allow.for_action(change.action) {
            verdict = Some(permission.evaluate(&descriptor, scope));
        }
    }
    trace!(matcher = change.matcher_index, action = %change.action, ?verdict, "permission check");
    verdict.unwrap_or(false)
}
