//! The restricted ambient context that sandboxed code resolves free names against.
//!
//! Built once per [`Sandbox`](super::Sandbox):
//!
//! 1. Enumerate the real global object's own names.
//! 2. Drop every excluded name.
//! 3. Copy the remaining bindings out of an isolated realm (or, failing that,
//!    the real global).
//! 4. Wrap each value as a top-level stand-in.
//! 5. Zero every enumerable real-global name and every excluded name again.
//! 6. Install the evaluator under `Function`.
//! 7. Put a `Proxy` in front that re-filters reads, answers every membership
//!    test with `true` and ignores every mutation.

use boa_engine::object::builtins::{JsArray, JsProxyBuilder};
use boa_engine::{Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue};
use tracing::{debug, warn};

use super::evaluator::{COMPILE_PRIMITIVE_NAME, Evaluator};
use super::exclusion::{ExclusionSet, is_excluded, is_structurally_denied};
use super::interceptor::{Interceptor, Reflection, own_names_of};
use super::realm::{SourcedBindings, source_isolated, source_real, within};
use crate::config::SandboxConfig;

/// How a name resolves inside the restricted context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A composite, seen through a stand-in.
    Wrapped,
    /// A scalar passed through as is.
    Scalar,
    /// Reads `undefined`: excluded, zeroed, or absent from the sourcing realm.
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub name: String,
    pub kind: BindingKind,
}

/// The built restricted context. Immutable once built.
#[derive(Clone)]
pub struct RestrictedContext {
    scope: JsObject,
    bindings: JsObject,
    evaluator: Evaluator,
    interceptor: Interceptor,
    exclusions: ExclusionSet,
    isolated: bool,
    proxied: bool,
}

impl RestrictedContext {
    /// The object injected as scope and passed as the leading argument.
    pub fn scope(&self) -> &JsObject {
        &self.scope
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    /// Whether bindings came from an isolated realm.
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Whether the scope is a `Proxy` rather than a plain stand-in.
    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    /// Read `name` the way sandboxed code would.
    pub fn get(&self, name: &str, context: &mut Context) -> JsValue {
        self.scope
            .get(JsString::from(name), context)
            .unwrap_or_else(|err| {
                debug!("Restricted read of {} failed: {}", name, err);
                JsValue::undefined()
            })
    }

    /// Every name defined in the context, in definition order, with how it
    /// resolves.
    pub fn describe(&self, context: &mut Context) -> Vec<BindingEntry> {
        let names = self.interceptor.reflection().own_names(&self.bindings, context);
        names
            .into_iter()
            .map(|name| {
                let value = self.get(&name, context);
                let kind = if value.is_undefined() {
                    BindingKind::Denied
                } else if value.is_object() {
                    BindingKind::Wrapped
                } else {
                    BindingKind::Scalar
                };
                BindingEntry { name, kind }
            })
            .collect()
    }
}

impl std::fmt::Debug for RestrictedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestrictedContext")
            .field("isolated", &self.isolated)
            .field("proxied", &self.proxied)
            .field("exclusions", &self.exclusions)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`RestrictedContext`].
#[derive(Debug, Clone)]
pub struct RestrictedContextBuilder {
    exclusions: ExclusionSet,
    isolated_realm: bool,
    harden_realm: bool,
    use_proxy: bool,
}

impl Default for RestrictedContextBuilder {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

impl RestrictedContextBuilder {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            exclusions: ExclusionSet::with_extra(config.extra_excluded.iter().cloned()),
            isolated_realm: config.isolated_realm,
            harden_realm: config.harden_realm,
            use_proxy: config.use_proxy,
        }
    }

    pub fn exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn isolated_realm(mut self, enabled: bool) -> Self {
        self.isolated_realm = enabled;
        self
    }

    pub fn harden_realm(mut self, enabled: bool) -> Self {
        self.harden_realm = enabled;
        self
    }

    pub fn use_proxy(mut self, enabled: bool) -> Self {
        self.use_proxy = enabled;
        self
    }

    /// Build the context. Never fails; every problem degrades isolation or
    /// drops attributes instead.
    pub fn build(&self, context: &mut Context) -> RestrictedContext {
        let reflection = Reflection::capture(context);
        let real_global = context.global_object();

        let real_names = reflection.own_names(&real_global, context);
        let enumerable = reflection.enumerable_names(&real_global, context);
        let candidates: Vec<String> = real_names
            .into_iter()
            .filter(|name| !self.exclusions.is_excluded(name))
            .collect();
        debug!(
            "Restricted context: {} candidate bindings, {} enumerable host globals",
            candidates.len(),
            enumerable.len()
        );

        let sourced = if self.isolated_realm {
            source_isolated(context, &candidates, self.harden_realm)
                .unwrap_or_else(|| source_real(context, &candidates))
        } else {
            source_real(context, &candidates)
        };
        let SourcedBindings {
            values,
            global: sourced_global,
            realm,
            isolated,
        } = sourced;
        // Natives built from here on belong to the sourcing realm, and so do
        // the errors they raise.
        let interceptor = Interceptor::in_realm(realm.clone(), context);

        let bindings = JsObject::with_null_proto();
        let mut self_refs = Vec::new();
        for (name, value) in &values {
            if let Some(object) = value.as_object() {
                let object = object.clone();
                if JsObject::equals(&object, &sourced_global) || JsObject::equals(&object, &real_global) {
                    self_refs.push(name.clone());
                    define(&bindings, name, JsValue::undefined(), context);
                    continue;
                }
            }
            let wrapped = interceptor.wrap(value, true, context);
            define(&bindings, name, wrapped, context);
        }

        let zeroed = enumerable
            .iter()
            .map(String::as_str)
            .chain(self.exclusions.names())
            .filter(|name| !self_refs.iter().any(|self_ref| self_ref == name));
        let mut zeroed_count = 0usize;
        for name in zeroed {
            define(&bindings, name, JsValue::undefined(), context);
            zeroed_count += 1;
        }

        let scope = if self.use_proxy {
            within(&realm, context, |context| guard(&bindings, context))
        } else {
            // Names are fixed when the stand-in is built; late values are
            // read live from the placeholders defined above.
            interceptor
                .wrap(&bindings.clone().into(), true, context)
                .as_object()
                .map(|stand_in| stand_in.clone())
                .unwrap_or_else(|| bindings.clone())
        };
        interceptor.set_restricted(&scope);

        for name in &self_refs {
            define(&bindings, name, scope.clone().into(), context);
        }

        let evaluator = Evaluator::new(realm, scope.clone(), interceptor.clone());
        let function = evaluator.to_function(context);
        interceptor.adopt(&function);
        define(&bindings, COMPILE_PRIMITIVE_NAME, function.into(), context);

        debug!(
            "Restricted context built: {} bindings, {} zeroed, {} self references (isolated: {}, proxy: {})",
            values.len(),
            zeroed_count,
            self_refs.len(),
            isolated,
            self.use_proxy
        );
        if !isolated {
            warn!("Restricted context sourced from the real global; object literals share host prototypes");
        }

        RestrictedContext {
            scope,
            bindings,
            evaluator,
            interceptor,
            exclusions: self.exclusions.clone(),
            isolated,
            proxied: self.use_proxy,
        }
    }
}

fn define(bindings: &JsObject, name: &str, value: JsValue, context: &mut Context) {
    if let Err(err) = bindings.create_data_property_or_throw(JsString::from(name), value, context) {
        debug!("Could not bind {} in restricted context: {}", name, err);
    }
}

/// Put a `Proxy` in front of the bindings record.
///
/// The record itself stays extensible and configurable so that the traps
/// below never violate the proxy invariants.
fn guard(bindings: &JsObject, context: &mut Context) -> JsObject {
    JsProxyBuilder::new(bindings.clone())
        .get(trap_get)
        .has(trap_has)
        .set(trap_ignore)
        .delete_property(trap_ignore)
        .define_property(trap_ignore)
        .set_prototype_of(trap_ignore)
        .prevent_extensions(trap_refuse)
        .own_keys(trap_own_keys)
        .get_own_property_descriptor(trap_get_own_property_descriptor)
        .build(context)
        .into()
}

/// Names the context never yields, whatever the record holds.
fn hidden(name: &str) -> bool {
    is_structurally_denied(name) || (is_excluded(name) && name != COMPILE_PRIMITIVE_NAME)
}

fn trap_target(args: &[JsValue]) -> JsResult<JsObject> {
    args.get_or_undefined(0)
        .as_object()
        .map(|target| target.clone())
        .ok_or_else(|| JsNativeError::typ().with_message("proxy target is not an object").into())
}

fn trap_get(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let target = trap_target(args)?;
    let key = args.get_or_undefined(1);
    if let Some(name) = key.as_string()
        && hidden(&name.to_std_string_escaped())
    {
        return Ok(JsValue::undefined());
    }
    let key = key.to_property_key(context)?;
    target.get(key, context)
}

fn trap_has(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(true.into())
}

fn trap_ignore(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(true.into())
}

fn trap_refuse(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> JsResult<JsValue> {
    Ok(false.into())
}

fn trap_own_keys(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let target = trap_target(args)?;
    let mut visible = Vec::new();
    for name in own_names_of(&target, context) {
        if hidden(&name) || target.get(JsString::from(name.as_str()), context)?.is_undefined() {
            continue;
        }
        visible.push(JsValue::from(JsString::from(name)));
    }
    Ok(JsArray::from_iter(visible, context).into())
}

fn trap_get_own_property_descriptor(
    _this: &JsValue,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let target = trap_target(args)?;
    let key = args.get_or_undefined(1);
    let Some(name) = key.as_string() else {
        return Ok(JsValue::undefined());
    };
    if hidden(&name.to_std_string_escaped()) {
        return Ok(JsValue::undefined());
    }
    let key = key.to_property_key(context)?;
    if !target.has_own_property(key.clone(), context)? {
        return Ok(JsValue::undefined());
    }
    let value = target.get(key, context)?;
    if value.is_undefined() {
        return Ok(JsValue::undefined());
    }

    let descriptor = JsObject::with_null_proto();
    descriptor.create_data_property_or_throw(JsString::from("value"), value, context)?;
    descriptor.create_data_property_or_throw(JsString::from("writable"), true, context)?;
    descriptor.create_data_property_or_throw(JsString::from("enumerable"), true, context)?;
    descriptor.create_data_property_or_throw(JsString::from("configurable"), true, context)?;
    Ok(descriptor.into())
}
