//! Sourcing ambient bindings, preferably from a disposable isolated realm.
//!
//! A fresh realm carries only the standard built-ins: host-registered
//! globals do not exist there, and anything sandboxed code manages to climb
//! to (an object literal's constructor, a caught exception's constructor)
//! lands in that realm instead of the host's. The realm is kept afterwards
//! as the one compiled units are evaluated in.

use std::collections::{HashSet, VecDeque};

use boa_engine::object::FunctionObjectBuilder;
use boa_engine::property::{PropertyDescriptor, PropertyKey};
use boa_engine::realm::Realm;
use boa_engine::{Context, JsArgs, JsObject, JsResult, JsString, JsValue, NativeFunction, Script, Source};
use boa_gc::{Finalize, Trace, custom_trace};
use tracing::{debug, warn};

use super::interceptor::{callable_member, freeze_with, list_items};

/// Binding values copied out by name, plus the realm facts the context
/// builder needs.
pub(crate) struct SourcedBindings {
    pub values: Vec<(String, JsValue)>,
    /// Global object the values were read from.
    pub global: JsObject,
    /// Realm the values came from. Compiled units and every native the
    /// sandbox hands out belong to it.
    pub realm: Realm,
    pub isolated: bool,
}

/// Keeps a realm entered; the previous realm is restored on drop.
struct EnteredRealm<'a> {
    context: &'a mut Context,
    previous: Option<Realm>,
}

impl<'a> EnteredRealm<'a> {
    fn enter(context: &'a mut Context, realm: Realm) -> Self {
        let previous = context.enter_realm(realm);
        Self {
            context,
            previous: Some(previous),
        }
    }
}

impl Drop for EnteredRealm<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.context.enter_realm(previous);
        }
    }
}

/// Run `f` with `realm` entered, restoring the current realm afterwards on
/// every path.
pub(crate) fn within<R>(realm: &Realm, context: &mut Context, f: impl FnOnce(&mut Context) -> R) -> R {
    let entered = EnteredRealm::enter(context, realm.clone());
    f(entered.context)
}

/// Parse and evaluate `source` as a script of `realm`.
///
/// Functions the script creates belong to `realm`, and so do the objects and
/// errors those functions create.
pub(crate) fn evaluate_in(realm: &Realm, source: &str, context: &mut Context) -> JsResult<JsValue> {
    within(realm, context, |context| {
        Script::parse(Source::from_bytes(source), None, context)?.evaluate(context)
    })
}

/// Copy `names` out of a freshly created realm.
///
/// Returns `None` when the realm cannot be created or a binding cannot be
/// read; the caller then falls back to [`source_real`]. The realm is left
/// before returning on every path.
pub(crate) fn source_isolated(
    context: &mut Context,
    names: &[String],
    harden: bool,
) -> Option<SourcedBindings> {
    let realm = match context.create_realm() {
        Ok(realm) => realm,
        Err(err) => {
            warn!("Isolated realm unavailable, using the real global: {}", err);
            return None;
        }
    };

    let (values, global) = within(&realm, context, |context| {
        let global = context.global_object();
        let mut values = Vec::with_capacity(names.len());
        for name in names {
            match global.get(JsString::from(name.as_str()), context) {
                Ok(value) => values.push((name.clone(), value)),
                Err(err) => {
                    warn!(
                        "Copying {} from isolated realm failed, using the real global: {}",
                        name, err
                    );
                    return None;
                }
            }
        }

        if harden {
            harden_realm(&global, context);
        }
        Some((values, global))
    })?;

    debug!("Copied {} bindings out of the isolated realm", values.len());

    Some(SourcedBindings {
        values,
        global,
        realm,
        isolated: true,
    })
}

/// Read `names` straight from the real global object.
pub(crate) fn source_real(context: &mut Context, names: &[String]) -> SourcedBindings {
    let global = context.global_object();

    let values = names
        .iter()
        .map(|name| {
            let value = global
                .get(JsString::from(name.as_str()), context)
                .unwrap_or_else(|err| {
                    debug!("Reading {} from the real global failed: {}", name, err);
                    JsValue::undefined()
                });
            (name.clone(), value)
        })
        .collect();

    SourcedBindings {
        values,
        global,
        realm: context.realm().clone(),
        isolated: false,
    }
}

/// Intrinsics that no global binding reaches through own attributes or
/// `[[Prototype]]` links. Each one is produced on its own so an unsupported
/// form does not hide the others.
const UNREACHABLE_INTRINSICS: &str = r#"(function () {
    var found = [];
    function take(make) {
        try { found.push(make()); } catch (e) {}
    }
    take(function () { return [][Symbol.iterator](); });
    take(function () { return ''[Symbol.iterator](); });
    take(function () { return new Map().entries(); });
    take(function () { return new Set().values(); });
    take(function () { return /a/g[Symbol.matchAll]('a'); });
    take(function () { return (function* () {})(); });
    take(function () { return (async function () {}); });
    take(function () { return (async function* () {})(); });
    take(function () { return new Int8Array(0); });
    take(function () { return [].values().map(function (x) { return x; }); });
    take(function () { return Iterator.from({ next: function () { return { done: true }; } }); });
    return found;
})()"#;

/// Freeze everything the isolated realm shares between compiled units.
///
/// Walks every object reachable from the realm's global and its hidden
/// intrinsics, through own attribute values, accessors and `[[Prototype]]`
/// links. Data attributes of prototypes are first turned into shadowing
/// accessors so that freezing them does not break `instance.attr = value`.
///
/// Must run while the isolated realm is entered. Never applied to the real
/// realm.
fn harden_realm(global: &JsObject, context: &mut Context) {
    let object = context.intrinsics().constructors().object().constructor();
    let freeze = callable_member(&object, "freeze", context);
    let describe = callable_member(&object, "getOwnPropertyDescriptor", context);
    let (Some(freeze), Some(describe)) = (freeze, describe) else {
        warn!("Isolated realm lacks Object.freeze or Object.getOwnPropertyDescriptor; leaving it unhardened");
        return;
    };

    let mut roots = vec![global.clone()];
    match context.eval(Source::from_bytes(UNREACHABLE_INTRINSICS)) {
        Ok(found) => {
            if let Some(found) = found.as_object() {
                let found = list_items(&found.clone(), context).unwrap_or_default();
                roots.extend(found.iter().filter_map(|value| value.as_object().map(|object| object.clone())));
            }
        }
        Err(err) => debug!("Collecting hidden intrinsics failed: {}", err),
    }

    let mut walk = RealmWalk::new(describe);
    walk.visit(roots, context);

    let mut created = Vec::new();
    let mut overridable = 0usize;
    let prototypes: Vec<JsObject> = walk
        .order
        .iter()
        .filter(|object| walk.prototypes.contains(*object))
        .cloned()
        .collect();
    for prototype in &prototypes {
        overridable += make_overridable(prototype, &walk, &mut created, context);
    }

    for object in walk.order.iter().chain(created.iter()) {
        freeze_with(Some(&freeze), object, context);
    }
    debug!(
        "Hardened isolated realm: {} objects frozen, {} prototype attributes made overridable",
        walk.order.len() + created.len(),
        overridable
    );
}

/// Breadth-first walk over a realm's object graph.
struct RealmWalk {
    describe: JsObject,
    seen: HashSet<JsObject>,
    /// Objects in discovery order.
    order: Vec<JsObject>,
    /// Objects found in a `[[Prototype]]` link or a constructor's
    /// `prototype` slot.
    prototypes: HashSet<JsObject>,
}

impl RealmWalk {
    fn new(describe: JsObject) -> Self {
        Self {
            describe,
            seen: HashSet::new(),
            order: Vec::new(),
            prototypes: HashSet::new(),
        }
    }

    fn visit(&mut self, roots: Vec<JsObject>, context: &mut Context) {
        let prototype_key = PropertyKey::from(JsString::from("prototype"));
        let mut queue: VecDeque<(JsObject, bool)> = roots.into_iter().map(|root| (root, false)).collect();

        while let Some((object, as_prototype)) = queue.pop_front() {
            if as_prototype {
                self.prototypes.insert(object.clone());
            }
            if !self.seen.insert(object.clone()) {
                continue;
            }
            self.order.push(object.clone());

            if let Some(prototype) = object.prototype() {
                queue.push_back((prototype, true));
            }

            let keys = match object.own_property_keys(context) {
                Ok(keys) => keys,
                Err(err) => {
                    debug!("Skipping attributes of an unlistable object: {}", err);
                    continue;
                }
            };
            let callable = object.is_callable();
            for key in keys {
                let Some(descriptor) = self.describe_own(&object, &key, context) else {
                    continue;
                };
                let prototype_slot = callable && key == prototype_key;
                for field in ["value", "get", "set"] {
                    let Ok(found) = descriptor.get(JsString::from(field), context) else {
                        continue;
                    };
                    if let Some(found) = found.as_object() {
                        queue.push_back((found.clone(), prototype_slot && field == "value"));
                    }
                }
            }
        }
    }

    fn describe_own(&self, object: &JsObject, key: &PropertyKey, context: &mut Context) -> Option<JsObject> {
        match self.describe.call(
            &JsValue::undefined(),
            &[object.clone().into(), key.clone().into()],
            context,
        ) {
            Ok(descriptor) => descriptor.as_object().map(|descriptor| descriptor.clone()),
            Err(err) => {
                debug!("Describing an intrinsic attribute failed: {}", err);
                None
            }
        }
    }
}

fn flag(descriptor: &JsObject, name: &str, context: &mut Context) -> bool {
    descriptor
        .get(JsString::from(name), context)
        .map(|value| value.to_boolean())
        .unwrap_or(false)
}

/// Replace every writable, configurable data attribute of `prototype` with
/// a getter returning the same value and a setter that defines the attribute
/// on the receiver instead. Returns how many attributes were replaced.
fn make_overridable(
    prototype: &JsObject,
    walk: &RealmWalk,
    created: &mut Vec<JsObject>,
    context: &mut Context,
) -> usize {
    let keys = match prototype.own_property_keys(context) {
        Ok(keys) => keys,
        Err(_) => return 0,
    };

    let mut replaced = 0usize;
    for key in keys {
        let Some(descriptor) = walk.describe_own(prototype, &key, context) else {
            continue;
        };
        let is_data = descriptor
            .has_own_property(JsString::from("value"), context)
            .unwrap_or(false);
        if !is_data || !flag(&descriptor, "writable", context) || !flag(&descriptor, "configurable", context) {
            continue;
        }
        let value = descriptor
            .get(JsString::from("value"), context)
            .unwrap_or_else(|_| JsValue::undefined());
        let enumerable = flag(&descriptor, "enumerable", context);

        let (getter, setter) = shadowing_accessors(prototype, &key, value, context);
        let accessor = PropertyDescriptor::builder()
            .get(getter.clone())
            .set(setter.clone())
            .enumerable(enumerable)
            .configurable(true)
            .build();
        match prototype.define_property_or_throw(key, accessor, context) {
            Ok(_) => {
                created.push(getter);
                created.push(setter);
                replaced += 1;
            }
            Err(err) => debug!("Prototype attribute left as data: {}", err),
        }
    }
    replaced
}

#[derive(Finalize)]
struct ShadowCapture {
    home: JsObject,
    key: JsValue,
}

unsafe impl Trace for ShadowCapture {
    custom_trace!(this, mark, {
        mark(&this.home);
        mark(&this.key);
    });
}

fn shadowing_accessors(
    home: &JsObject,
    key: &PropertyKey,
    value: JsValue,
    context: &mut Context,
) -> (JsObject, JsObject) {
    let getter = NativeFunction::from_copy_closure_with_captures(
        |_this, _args, value, _context| Ok(value.clone()),
        value,
    );
    let setter = NativeFunction::from_copy_closure_with_captures(
        |this, args, shadow, context| {
            let Some(receiver) = this.as_object() else {
                return Ok(JsValue::undefined());
            };
            let receiver = receiver.clone();
            // The frozen prototype itself keeps its value.
            if JsObject::equals(&receiver, &shadow.home) {
                return Ok(JsValue::undefined());
            }
            let key = shadow.key.to_property_key(context)?;
            receiver.create_data_property(key, args.get_or_undefined(0).clone(), context)?;
            Ok(JsValue::undefined())
        },
        ShadowCapture {
            home: home.clone(),
            key: key.clone().into(),
        },
    );

    let getter: JsObject = FunctionObjectBuilder::new(context.realm(), getter)
        .length(0)
        .constructor(false)
        .build()
        .into();
    let setter: JsObject = FunctionObjectBuilder::new(context.realm(), setter)
        .length(1)
        .constructor(false)
        .build()
        .into();
    (getter, setter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn isolated_realm_lacks_host_globals() {
        let mut context = Context::default();
        context
            .eval(Source::from_bytes("globalThis.hostOnly = 1;"))
            .unwrap();

        let sourced =
            source_isolated(&mut context, &names(&["Math", "hostOnly"]), false).unwrap();
        assert!(sourced.isolated);
        assert!(sourced.values[0].1.is_object());
        assert!(sourced.values[1].1.is_undefined());
    }

    #[test]
    fn isolated_values_are_distinct_from_real_ones() {
        let mut context = Context::default();
        let real_math = context
            .global_object()
            .get(JsString::from("Math"), &mut context)
            .unwrap();

        let sourced = source_isolated(&mut context, &names(&["Math"]), false).unwrap();
        assert!(!sourced.values[0].1.strict_equals(&real_math));
        assert!(!JsObject::equals(&sourced.global, &context.global_object()));
    }

    #[test]
    fn realm_is_left_after_sourcing() {
        let mut context = Context::default();
        let before = context.global_object();

        let _ = source_isolated(&mut context, &names(&["JSON"]), true);

        assert!(JsObject::equals(&before, &context.global_object()));
        let value = context.eval(Source::from_bytes("typeof JSON")).unwrap();
        assert_eq!(value.as_string().unwrap().to_std_string_escaped(), "object");
    }

    #[test]
    fn hardening_freezes_isolated_prototypes_only() {
        let mut context = Context::default();
        let sourced = source_isolated(&mut context, &names(&["Object", "Array"]), true).unwrap();

        let isolated_object = sourced.values[0].1.as_object().unwrap().clone();
        let prototype = isolated_object
            .get(JsString::from("prototype"), &mut context)
            .unwrap();
        let is_frozen = context
            .eval(Source::from_bytes("Object.isFrozen"))
            .unwrap();
        let is_frozen = is_frozen.as_object().unwrap().clone();

        let frozen = is_frozen
            .call(&JsValue::undefined(), &[prototype], &mut context)
            .unwrap();
        assert_eq!(frozen.as_boolean(), Some(true));

        let host = context
            .eval(Source::from_bytes("Object.isFrozen(Object.prototype)"))
            .unwrap();
        assert_eq!(host.as_boolean(), Some(false));
    }

    fn truthy_in(realm: &Realm, context: &mut Context, source: &str) -> bool {
        evaluate_in(realm, source, context).unwrap().as_boolean().unwrap()
    }

    #[test]
    fn hardening_reaches_intrinsics_behind_instances() {
        let mut context = Context::default();
        let sourced = source_isolated(&mut context, &names(&["Object"]), true).unwrap();

        for expression in [
            "Object.getPrototypeOf(Object.getPrototypeOf([][Symbol.iterator]()))",
            "Object.getPrototypeOf([][Symbol.iterator]())",
            "Object.getPrototypeOf(''[Symbol.iterator]())",
            "Object.getPrototypeOf(Object.getPrototypeOf((function* () {})()))",
            "Object.getPrototypeOf(async function () {})",
            "Object.getPrototypeOf(Object.getPrototypeOf(new Int8Array(0)))",
            "Object.getPrototypeOf(new Map().entries())",
        ] {
            let source = format!("Object.isFrozen({expression})");
            assert!(truthy_in(&sourced.realm, &mut context, &source), "{expression} is mutable");
        }
    }

    #[test]
    fn frozen_prototypes_still_allow_shadowing() {
        let mut context = Context::default();
        let sourced = source_isolated(&mut context, &names(&["Object"]), true).unwrap();

        assert!(truthy_in(
            &sourced.realm,
            &mut context,
            r#"(function () {
                var o = {};
                o.toString = 5;
                var list = [];
                list.push = null;
                return o.toString === 5
                    && Object.keys(o).join() === 'toString'
                    && list.push === null
                    && typeof ({}).toString === 'function'
                    && typeof [].push === 'function';
            })()"#
        ));
        assert!(truthy_in(
            &sourced.realm,
            &mut context,
            "(function () { Object.prototype.toString = 5; return typeof ({}).toString === 'function'; })()"
        ));
    }

    #[test]
    fn scripts_evaluate_in_the_given_realm() {
        let mut context = Context::default();
        let sourced = source_isolated(&mut context, &names(&["Object"]), false).unwrap();

        let global = evaluate_in(&sourced.realm, "globalThis", &mut context).unwrap();
        let global = global.as_object().unwrap();
        assert!(JsObject::equals(&global, &sourced.global));
        assert!(!JsObject::equals(&global, &context.global_object()));

        let err = evaluate_in(&sourced.realm, "return (", &mut context);
        assert!(err.is_err());
        let value = context.eval(Source::from_bytes("typeof Object")).unwrap();
        assert_eq!(value.as_string().unwrap().to_std_string_escaped(), "function");
    }

    #[test]
    fn real_sourcing_reads_live_bindings() {
        let mut context = Context::default();
        context
            .eval(Source::from_bytes("globalThis.hostOnly = 7;"))
            .unwrap();

        let sourced = source_real(&mut context, &names(&["hostOnly", "missing"]));
        assert!(!sourced.isolated);
        assert_eq!(sourced.values[0].1.as_number(), Some(7.0));
        assert!(sourced.values[1].1.is_undefined());
        assert!(JsObject::equals(&sourced.global, &context.global_object()));
    }
}
