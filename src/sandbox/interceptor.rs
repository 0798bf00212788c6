//! Attribute interception: turns any host value into a read-only, filtered stand-in.
//!
//! A stand-in mirrors the target's own attribute names minus the structural
//! deny list. Each attribute is an accessor that wraps the nested value on
//! read, and writes through it are swallowed. Callable targets get a `Proxy`
//! over an inert function shell whose call and construct traps forward to
//! the target, so plain calls keep their receiver and `new` keeps working.
//!
//! Every object this module creates (stand-ins, accessors, shells) has its
//! `[[Prototype]]` replaced by one frozen, attribute-less object, so nothing
//! reachable from a stand-in leads back to the host's `Function.prototype`.
//! Natives are created in the interceptor's realm, which is also the realm of
//! any error they raise.

use boa_engine::object::FunctionObjectBuilder;
use boa_engine::property::{PropertyDescriptor, PropertyKey};
use boa_engine::realm::Realm;
use boa_engine::{Context, JsArgs, JsObject, JsResult, JsString, JsValue, NativeFunction};
use boa_gc::{Finalize, Gc, GcRefCell, Trace, custom_trace};
use tracing::debug;

use super::exclusion::{STRUCTURAL_DENYLIST, is_structurally_denied};

/// Host reflection intrinsics, captured once from the real realm.
///
/// Captured up front so later tampering with `Object.*` by host scripts does
/// not change how stand-ins are built.
#[derive(Clone, Finalize)]
pub(crate) struct Reflection {
    own_names: Option<JsObject>,
    enumerable_names: Option<JsObject>,
    freeze: Option<JsObject>,
}

unsafe impl Trace for Reflection {
    custom_trace!(this, mark, {
        mark(&this.own_names);
        mark(&this.enumerable_names);
        mark(&this.freeze);
    });
}

impl Reflection {
    pub(crate) fn capture(context: &mut Context) -> Self {
        let object = context.intrinsics().constructors().object().constructor();
        Self {
            own_names: callable_member(&object, "getOwnPropertyNames", context),
            enumerable_names: callable_member(&object, "keys", context),
            freeze: callable_member(&object, "freeze", context),
        }
    }

    /// Own string-keyed attribute names of `target`.
    ///
    /// A reflection denial yields whatever was collected before the failure.
    pub(crate) fn own_names(&self, target: &JsObject, context: &mut Context) -> Vec<String> {
        list_names(self.own_names.as_ref(), target, context)
    }

    /// Own enumerable string-keyed attribute names of `target`.
    pub(crate) fn enumerable_names(&self, target: &JsObject, context: &mut Context) -> Vec<String> {
        list_names(self.enumerable_names.as_ref(), target, context)
    }

    pub(crate) fn freeze(&self, target: &JsObject, context: &mut Context) {
        freeze_with(self.freeze.as_ref(), target, context);
    }
}

/// Own string-keyed names of `target`, listed with the current realm's
/// `Object.getOwnPropertyNames`. For callers that hold no [`Reflection`].
pub(crate) fn own_names_of(target: &JsObject, context: &mut Context) -> Vec<String> {
    let object = context.intrinsics().constructors().object().constructor();
    let lister = callable_member(&object, "getOwnPropertyNames", context);
    list_names(lister.as_ref(), target, context)
}

pub(crate) fn callable_member(object: &JsObject, name: &str, context: &mut Context) -> Option<JsObject> {
    match object.get(JsString::from(name), context) {
        Ok(value) => match value.as_object() {
            Some(member) if member.is_callable() => Some(member.clone()),
            _ => None,
        },
        Err(err) => {
            debug!("reflection intrinsic {} unavailable: {}", name, err);
            None
        }
    }
}

pub(crate) fn freeze_with(freeze: Option<&JsObject>, target: &JsObject, context: &mut Context) {
    let Some(freeze) = freeze else {
        return;
    };
    if let Err(err) = freeze.call(&JsValue::undefined(), &[target.clone().into()], context) {
        debug!("freeze failed: {}", err);
    }
}

/// Elements of an array-like, read through `length` and indices.
pub(crate) fn list_items(list: &JsObject, context: &mut Context) -> JsResult<Vec<JsValue>> {
    let length = list.get(JsString::from("length"), context)?.to_u32(context)?;
    let mut items = Vec::with_capacity(length as usize);
    for index in 0..length {
        items.push(list.get(index, context)?);
    }
    Ok(items)
}

/// Argument list handed to a `Proxy` call or construct trap.
pub(crate) fn trap_arguments(list: &JsValue, context: &mut Context) -> JsResult<Vec<JsValue>> {
    match list.as_object() {
        Some(list) => list_items(&list, context),
        None => Ok(Vec::new()),
    }
}

/// A `Proxy` in front of `shell` whose `apply` and `construct` traps are the
/// given natives, created in `realm`.
///
/// A native built as a constructor never sees the receiver of a plain call;
/// an `apply` trap does. `construct` is only installed when `shell` is a
/// constructor.
pub(crate) fn call_trap(
    shell: &JsObject,
    realm: &Realm,
    apply: NativeFunction,
    construct: NativeFunction,
    context: &mut Context,
) -> JsResult<JsObject> {
    let handler = JsObject::with_null_proto();
    let apply: JsObject = FunctionObjectBuilder::new(realm, apply)
        .name(JsString::from("apply"))
        .length(3)
        .build()
        .into();
    handler.create_data_property_or_throw(JsString::from("apply"), apply, context)?;
    if shell.is_constructor() {
        let construct: JsObject = FunctionObjectBuilder::new(realm, construct)
            .name(JsString::from("construct"))
            .length(3)
            .build()
            .into();
        handler.create_data_property_or_throw(JsString::from("construct"), construct, context)?;
    }

    let proxy = realm.intrinsics().constructors().proxy().constructor();
    proxy.construct(&[shell.clone().into(), handler.into()], None, context)
}

fn list_names(lister: Option<&JsObject>, target: &JsObject, context: &mut Context) -> Vec<String> {
    let Some(lister) = lister else {
        return Vec::new();
    };

    let listed = match lister.call(&JsValue::undefined(), &[target.clone().into()], context) {
        Ok(listed) => listed,
        Err(err) => {
            debug!("attribute enumeration denied: {}", err);
            return Vec::new();
        }
    };
    let Some(array) = listed.as_object() else {
        return Vec::new();
    };
    let array = array.clone();

    let length = match array
        .get(JsString::from("length"), context)
        .and_then(|length| length.to_u32(context))
    {
        Ok(length) => length,
        Err(_) => return Vec::new(),
    };

    let mut names = Vec::with_capacity(length as usize);
    for index in 0..length {
        match array.get(index, context) {
            Ok(name) => {
                if let Some(name) = name.as_string() {
                    names.push(name.to_std_string_escaped());
                }
            }
            Err(err) => {
                debug!("attribute enumeration cut short at {}: {}", index, err);
                break;
            }
        }
    }
    names
}

/// Shape of the stand-in synthesized for a composite target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandInKind {
    /// Forwarding proxy; constructible when the target is.
    Callable { constructor: bool },
    /// Null-prototype record of accessors.
    PlainComposite,
}

impl StandInKind {
    pub fn of(target: &JsObject) -> Self {
        if target.is_callable() {
            Self::Callable {
                constructor: target.is_constructor(),
            }
        } else {
            Self::PlainComposite
        }
    }
}

#[derive(Finalize)]
struct CacheEntry {
    target: JsObject,
    stand_in: JsObject,
}

unsafe impl Trace for CacheEntry {
    custom_trace!(this, mark, {
        mark(&this.target);
        mark(&this.stand_in);
    });
}

#[derive(Finalize)]
struct InterceptorState {
    reflection: Reflection,
    /// Realm every native this module creates belongs to.
    realm: Realm,
    /// Frozen, null-prototype, attribute-less object installed as the
    /// `[[Prototype]]` of everything this module creates.
    severed: JsObject,
    /// Accessor used for structural denials and as the swallowing setter.
    inert: JsObject,
    /// Top-level memo: identity of a root value to its stand-in.
    cache: GcRefCell<Vec<CacheEntry>>,
    /// The restricted context, never forwarded as an implicit receiver.
    restricted: GcRefCell<Option<JsObject>>,
}

unsafe impl Trace for InterceptorState {
    custom_trace!(this, mark, {
        mark(&this.reflection);
        mark(&this.realm);
        mark(&this.severed);
        mark(&this.inert);
        mark(&this.cache);
        mark(&this.restricted);
    });
}

/// Recursive wrapper producing filtered stand-ins.
///
/// Cheap to clone; all clones share one memo cache.
#[derive(Clone, Finalize)]
pub struct Interceptor {
    inner: Gc<InterceptorState>,
}

unsafe impl Trace for Interceptor {
    custom_trace!(this, mark, {
        mark(&this.inner);
    });
}

impl Interceptor {
    /// An interceptor whose natives belong to the current realm.
    pub fn new(context: &mut Context) -> Self {
        let realm = context.realm().clone();
        Self::in_realm(realm, context)
    }

    /// An interceptor whose natives belong to `realm`.
    pub fn in_realm(realm: Realm, context: &mut Context) -> Self {
        let reflection = Reflection::capture(context);

        let severed = JsObject::with_null_proto();
        reflection.freeze(&severed, context);

        let inert = FunctionObjectBuilder::new(
            &realm,
            NativeFunction::from_fn_ptr(|_this, _args, _context| Ok(JsValue::undefined())),
        )
        .name(JsString::from(""))
        .length(0)
        .constructor(false)
        .build();
        let inert: JsObject = inert.into();
        inert.set_prototype(Some(severed.clone()));
        reflection.freeze(&inert, context);

        Self {
            inner: Gc::new(InterceptorState {
                reflection,
                realm,
                severed,
                inert,
                cache: GcRefCell::new(Vec::new()),
                restricted: GcRefCell::new(None),
            }),
        }
    }

    pub(crate) fn reflection(&self) -> &Reflection {
        &self.inner.reflection
    }

    /// The frozen empty object that replaces every stand-in's chain slot.
    pub fn severed_prototype(&self) -> JsObject {
        self.inner.severed.clone()
    }

    /// Number of memoized top-level entries.
    pub fn cached_len(&self) -> usize {
        self.inner.cache.borrow().len()
    }

    /// Wrap `value` into a stand-in.
    ///
    /// Scalars pass through. Top-level wraps are memoized by identity, and a
    /// memoized stand-in wraps to itself. Never fails: reflection problems
    /// leave the stand-in with fewer attributes.
    pub fn wrap(&self, value: &JsValue, top_level: bool, context: &mut Context) -> JsValue {
        let Some(target) = value.as_object() else {
            return value.clone();
        };
        let target = target.clone();

        if let Some(existing) = self.lookup(&target) {
            return existing.into();
        }

        let stand_in = self.build_stand_in(&target, context);

        if top_level {
            self.remember(&target, &stand_in);
        }
        stand_in.into()
    }

    /// Record the restricted context so forwarders never pass it on as `this`.
    pub(crate) fn set_restricted(&self, restricted: &JsObject) {
        *self.inner.restricted.borrow_mut() = Some(restricted.clone());
        self.remember(restricted, restricted);
    }

    /// Treat an object this crate built as already safe: it wraps to itself.
    pub(crate) fn adopt(&self, object: &JsObject) {
        self.remember(object, object);
    }

    /// Replace the chain slot of an object this crate created, deny the
    /// structural names on it, and freeze it.
    pub(crate) fn seal(&self, object: &JsObject, context: &mut Context) {
        object.set_prototype(Some(self.inner.severed.clone()));

        for &name in STRUCTURAL_DENYLIST {
            let denial = PropertyDescriptor::builder()
                .get(self.inner.inert.clone())
                .set(self.inner.inert.clone())
                .enumerable(false)
                .configurable(false)
                .build();
            if let Err(err) = object.define_property_or_throw(JsString::from(name), denial, context) {
                debug!("could not deny {} on stand-in: {}", name, err);
            }
        }

        self.inner.reflection.freeze(object, context);
    }

    fn lookup(&self, target: &JsObject) -> Option<JsObject> {
        self.inner
            .cache
            .borrow()
            .iter()
            .find(|entry| JsObject::equals(&entry.target, target))
            .map(|entry| entry.stand_in.clone())
    }

    fn remember(&self, target: &JsObject, stand_in: &JsObject) {
        let mut cache = self.inner.cache.borrow_mut();
        cache.push(CacheEntry {
            target: target.clone(),
            stand_in: stand_in.clone(),
        });
        if !JsObject::equals(target, stand_in) {
            cache.push(CacheEntry {
                target: stand_in.clone(),
                stand_in: stand_in.clone(),
            });
        }
    }

    fn build_stand_in(&self, target: &JsObject, context: &mut Context) -> JsObject {
        let kind = StandInKind::of(target);
        let stand_in = match kind {
            StandInKind::Callable { constructor } => self.callable_shell(constructor),
            StandInKind::PlainComposite => JsObject::with_null_proto(),
        };

        let names = self.inner.reflection.own_names(target, context);
        for name in names {
            if is_structurally_denied(&name) {
                continue;
            }
            // Function-only legacy slots expose the caller's frames.
            if matches!(kind, StandInKind::Callable { .. }) && (name == "arguments" || name == "caller") {
                continue;
            }

            let getter = self.accessor(target, &name, context);
            let accessor = PropertyDescriptor::builder()
                .get(getter)
                .set(self.inner.inert.clone())
                .enumerable(true)
                .configurable(false)
                .build();
            if let Err(err) = stand_in.define_property_or_throw(JsString::from(name.as_str()), accessor, context)
            {
                debug!("skipping attribute {}: {}", name, err);
            }
        }

        self.seal(&stand_in, context);
        match kind {
            StandInKind::Callable { .. } => self.forwarder(target, &stand_in, context),
            StandInKind::PlainComposite => stand_in,
        }
    }

    fn accessor(&self, target: &JsObject, name: &str, context: &mut Context) -> JsObject {
        let capture = AccessorCapture {
            interceptor: self.clone(),
            target: target.clone(),
            key: JsString::from(name),
        };
        let getter = NativeFunction::from_copy_closure_with_captures(
            |_this, _args, captures, context| {
                let key = PropertyKey::from(captures.key.clone());
                match captures.target.get(key, context) {
                    Ok(value) => Ok(captures.interceptor.wrap(&value, false, context)),
                    Err(err) => {
                        debug!("attribute read failed: {}", err);
                        Ok(JsValue::undefined())
                    }
                }
            },
            capture,
        );
        let getter: JsObject = FunctionObjectBuilder::new(&self.inner.realm, getter)
            .name(JsString::from(name))
            .length(0)
            .constructor(false)
            .build()
            .into();
        getter.set_prototype(Some(self.inner.severed.clone()));
        getter
    }

    /// Inert function object that carries a callable stand-in's attributes.
    fn callable_shell(&self, constructor: bool) -> JsObject {
        FunctionObjectBuilder::new(
            &self.inner.realm,
            NativeFunction::from_fn_ptr(|_this, _args, _context| Ok(JsValue::undefined())),
        )
        .name(JsString::from(""))
        .length(0)
        .constructor(constructor)
        .build()
        .into()
    }

    /// Put a call-forwarding `Proxy` in front of a sealed `shell`.
    fn forwarder(&self, target: &JsObject, shell: &JsObject, context: &mut Context) -> JsObject {
        let capture = ForwardCapture {
            interceptor: self.clone(),
            target: target.clone(),
        };
        let apply = NativeFunction::from_copy_closure_with_captures(
            |_handler, args, captures, context| {
                let receiver = captures.interceptor.outbound_receiver(args.get_or_undefined(1));
                let arguments = trap_arguments(args.get_or_undefined(2), context)?;
                captures.target.call(&receiver, &arguments, context)
            },
            capture.clone(),
        );
        let construct = NativeFunction::from_copy_closure_with_captures(
            |_handler, args, captures, context| {
                let arguments = trap_arguments(args.get_or_undefined(1), context)?;
                // The target's own realm picks the instance prototype.
                captures
                    .target
                    .construct(&arguments, None, context)
                    .map(JsValue::from)
            },
            capture,
        );

        match call_trap(shell, &self.inner.realm, apply, construct, context) {
            Ok(forwarder) => forwarder,
            Err(err) => {
                debug!("forwarding proxy unavailable, stand-in is inert: {}", err);
                shell.clone()
            }
        }
    }

    /// The receiver forwarded to a wrapped callable.
    fn outbound_receiver(&self, this: &JsValue) -> JsValue {
        let restricted = self.inner.restricted.borrow();
        match (this.as_object(), restricted.as_ref()) {
            (Some(receiver), Some(restricted)) if JsObject::equals(&receiver.clone(), restricted) => {
                JsValue::undefined()
            }
            _ => this.clone(),
        }
    }
}

#[derive(Finalize)]
struct AccessorCapture {
    interceptor: Interceptor,
    target: JsObject,
    key: JsString,
}

unsafe impl Trace for AccessorCapture {
    custom_trace!(this, mark, {
        mark(&this.interceptor);
        mark(&this.target);
    });
}

#[derive(Clone, Finalize)]
struct ForwardCapture {
    interceptor: Interceptor,
    target: JsObject,
}

unsafe impl Trace for ForwardCapture {
    custom_trace!(this, mark, {
        mark(&this.interceptor);
        mark(&this.target);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;
    use boa_engine::property::Attribute;

    fn eval(context: &mut Context, source: &str) -> JsValue {
        context.eval(Source::from_bytes(source)).unwrap()
    }

    fn expose(context: &mut Context, name: &str, value: JsValue) {
        context
            .register_global_property(JsString::from(name), value, Attribute::all())
            .unwrap();
    }

    fn as_bool(value: JsValue) -> bool {
        value.as_boolean().unwrap()
    }

    fn as_text(value: JsValue) -> String {
        value.as_string().unwrap().to_std_string_escaped()
    }

    #[test]
    fn scalars_pass_through() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);

        let number = JsValue::from(42);
        let wrapped = interceptor.wrap(&number, true, &mut context);
        assert_eq!(wrapped.as_number(), Some(42.0));

        let undefined = interceptor.wrap(&JsValue::undefined(), false, &mut context);
        assert!(undefined.is_undefined());
        assert_eq!(interceptor.cached_len(), 0);
    }

    #[test]
    fn attributes_read_through_and_nest() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "({ a: 1, nested: { b: 'two' } })");

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert_eq!(eval(&mut context, "s.a").as_number(), Some(1.0));
        assert_eq!(as_text(eval(&mut context, "s.nested.b")), "two");
        assert!(as_bool(eval(&mut context, "Object.getPrototypeOf(s.nested) !== null")));
    }

    #[test]
    fn structural_names_read_undefined() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(
            &mut context,
            "({ constructor: 5, prototype: 6, safe: 7 })",
        );

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert!(eval(&mut context, "s.constructor").is_undefined());
        assert!(eval(&mut context, "s.prototype").is_undefined());
        assert!(eval(&mut context, "s.__proto__").is_undefined());
        assert_eq!(eval(&mut context, "s.safe").as_number(), Some(7.0));
        assert_eq!(as_text(eval(&mut context, "Object.keys(s).join(',')")), "safe");
    }

    #[test]
    fn writes_are_swallowed() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "({ a: 1 })");

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        eval(&mut context, "s.a = 99; s.extra = 1; delete s.a;");
        eval(&mut context, "(function () { 'use strict'; s.a = 100; })()");
        assert_eq!(eval(&mut context, "s.a").as_number(), Some(1.0));
        assert!(eval(&mut context, "s.extra").is_undefined());
    }

    #[test]
    fn top_level_wraps_are_memoized() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "({ a: 1 })");

        let first = interceptor.wrap(&target, true, &mut context);
        let second = interceptor.wrap(&target, true, &mut context);
        assert!(first.strict_equals(&second));

        let again = interceptor.wrap(&first, true, &mut context);
        assert!(again.strict_equals(&first));
    }

    #[test]
    fn nested_rewrap_is_observably_identical() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "({ a: 1, b: { c: [1, 2] }, constructor: 3 })");

        let once = interceptor.wrap(&target, false, &mut context);
        let twice = interceptor.wrap(&once, false, &mut context);
        expose(&mut context, "once", once);
        expose(&mut context, "twice", twice);

        assert!(as_bool(eval(
            &mut context,
            "Object.keys(once).join() === Object.keys(twice).join()"
        )));
        assert!(as_bool(eval(
            &mut context,
            "once.a === twice.a && once.b.c[1] === twice.b.c[1] && twice.constructor === undefined"
        )));
    }

    #[test]
    fn chain_slot_is_severed() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "({ a: 1 })");

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert!(as_bool(eval(
            &mut context,
            "const p = Object.getPrototypeOf(s); Object.isFrozen(p) && Object.getOwnPropertyNames(p).length === 0 && Object.getPrototypeOf(p) === null"
        )));
        assert!(as_bool(eval(&mut context, "Object.isFrozen(s)")));
    }

    #[test]
    fn accessors_do_not_lead_back_to_function() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "({ a: 1 })");

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert!(eval(
            &mut context,
            "Object.getOwnPropertyDescriptor(s, 'a').get.constructor"
        )
        .is_undefined());
        assert!(eval(
            &mut context,
            "Object.getOwnPropertyDescriptor(s, 'a').set.call"
        )
        .is_undefined());
    }

    #[test]
    fn callables_forward_calls() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(&mut context, "(function add(a, b) { return a + b; })");

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "add", wrapped);

        assert_eq!(eval(&mut context, "add(2, 3)").as_number(), Some(5.0));
        assert!(eval(&mut context, "add.call").is_undefined());
        assert!(eval(&mut context, "add.constructor").is_undefined());
        assert_eq!(as_text(eval(&mut context, "add.name")), "add");
    }

    #[test]
    fn callables_forward_construction() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(
            &mut context,
            "(class Point { constructor(x) { this.x = x; } })",
        );

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "Point", wrapped);

        assert_eq!(eval(&mut context, "new Point(4).x").as_number(), Some(4.0));
        assert!(eval(&mut context, "Point.prototype").is_undefined());
    }

    #[test]
    fn restricted_context_never_forwarded_as_receiver() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let restricted = JsObject::with_null_proto();
        interceptor.set_restricted(&restricted);

        let target = eval(
            &mut context,
            "({ m() { 'use strict'; return this === undefined; } }).m",
        );
        let wrapped = interceptor.wrap(&target, true, &mut context);
        let wrapped = wrapped.as_object().unwrap().clone();

        let result = wrapped
            .call(&JsValue::from(restricted.clone()), &[], &mut context)
            .unwrap();
        assert_eq!(result.as_boolean(), Some(true));

        let other = JsObject::with_null_proto();
        let result = wrapped.call(&JsValue::from(other), &[], &mut context).unwrap();
        assert_eq!(result.as_boolean(), Some(false));
    }

    #[test]
    fn sloppy_functions_keep_their_receiver() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(
            &mut context,
            "({ name: 'inner', get: function () { return this && this.name; }, self: function () { return this; } })",
        );

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert_eq!(as_text(eval(&mut context, "s.get()")), "inner");
        assert!(as_bool(eval(&mut context, "s.self() === s")));
        assert!(as_bool(eval(&mut context, "typeof s.get === 'function'")));
        assert!(eval(&mut context, "s.get.prototype").is_undefined());
    }

    #[test]
    fn restricted_receiver_is_dropped_for_sloppy_functions() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let restricted = JsObject::with_null_proto();
        interceptor.set_restricted(&restricted);

        let target = eval(&mut context, "(function () { return this === globalThis; })");
        let wrapped = interceptor.wrap(&target, true, &mut context);
        let wrapped = wrapped.as_object().unwrap().clone();

        let result = wrapped
            .call(&JsValue::from(restricted), &[], &mut context)
            .unwrap();
        assert_eq!(result.as_boolean(), Some(true));
    }

    #[test]
    fn reflection_denial_degrades_to_empty_stand_in() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(
            &mut context,
            "new Proxy({ hidden: 1 }, { ownKeys() { throw new Error('denied'); } })",
        );

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert!(eval(&mut context, "s.hidden").is_undefined());
        assert_eq!(eval(&mut context, "Object.keys(s).length").as_number(), Some(0.0));
    }

    #[test]
    fn throwing_getter_reads_undefined() {
        let mut context = Context::default();
        let interceptor = Interceptor::new(&mut context);
        let target = eval(
            &mut context,
            "({ get boom() { throw new Error('no'); }, fine: 1 })",
        );

        let wrapped = interceptor.wrap(&target, true, &mut context);
        expose(&mut context, "s", wrapped);

        assert!(eval(&mut context, "s.boom").is_undefined());
        assert_eq!(eval(&mut context, "s.fine").as_number(), Some(1.0));
    }

    #[test]
    fn stand_in_kind_classification() {
        let mut context = Context::default();
        let function = eval(&mut context, "(function () {})");
        let arrow = eval(&mut context, "(() => 1)");
        let record = eval(&mut context, "({})");

        assert_eq!(
            StandInKind::of(&function.as_object().unwrap().clone()),
            StandInKind::Callable { constructor: true }
        );
        assert_eq!(
            StandInKind::of(&arrow.as_object().unwrap().clone()),
            StandInKind::Callable { constructor: false }
        );
        assert_eq!(
            StandInKind::of(&record.as_object().unwrap().clone()),
            StandInKind::PlainComposite
        );
    }
}
