//! Scope-injected compilation of caller text.
//!
//! Caller text is first parsed on its own as `(function (<params>\n) {\n<body>\n})`
//! and must come back as exactly that one function expression. It is then
//! evaluated as a script of the sourcing realm in this shape:
//!
//! ```text
//! (function (globalThis) {
//!     with (globalThis) {
//!         return function (<params>
//!         ) {
//!             <body>
//!             /**/;return;
//!         };
//!     }
//! })
//! ```
//!
//! The `with` scope is the restricted context. Its membership test always
//! answers true, so every free name in `<body>` resolves against it. The
//! inner function's own parameters and locals still shadow it.

use boa_engine::ast::expression::Expression;
use boa_engine::ast::scope::Scope;
use boa_engine::ast::{Statement, StatementListItem};
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::parser::Parser;
use boa_engine::realm::Realm;
use boa_engine::{Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction, Source};
use boa_gc::{Finalize, Trace, custom_trace};
use tracing::debug;

use super::interceptor::{Interceptor, call_trap, trap_arguments};
use super::realm::evaluate_in;

/// Name of the compiled unit's first formal parameter, the injected scope.
pub const SCOPE_PARAMETER: &str = "globalThis";

/// Name the evaluator is installed under inside the restricted context.
pub const COMPILE_PRIMITIVE_NAME: &str = "Function";

/// Compiles caller text against one restricted context.
#[derive(Clone, Finalize)]
pub struct Evaluator {
    /// Realm compiled units and their errors belong to.
    realm: Realm,
    scope: JsObject,
    interceptor: Interceptor,
}

unsafe impl Trace for Evaluator {
    custom_trace!(this, mark, {
        mark(&this.realm);
        mark(&this.scope);
        mark(&this.interceptor);
    });
}

impl Evaluator {
    pub(crate) fn new(realm: Realm, scope: JsObject, interceptor: Interceptor) -> Self {
        Self {
            realm,
            scope,
            interceptor,
        }
    }

    /// Compile `body` with the given parameter names.
    ///
    /// Malformed parameters or body fail here with a `SyntaxError`, before
    /// anything can be invoked.
    pub fn compile(&self, params: &[String], body: &str, context: &mut Context) -> JsResult<SandboxedFunction> {
        let params = params.join(",");
        let arity = validate(&params, body, context)?;

        let unit = evaluate_in(&self.realm, &synthesize(&params, body), context)?;
        let Some(unit) = unit.as_object() else {
            return Err(JsNativeError::typ()
                .with_message("compiled unit is not a function")
                .into());
        };
        let inner = unit.call(&JsValue::undefined(), &[self.scope.clone().into()], context)?;
        let Some(inner) = inner.as_object() else {
            return Err(JsNativeError::typ()
                .with_message("compiled unit returned a non-function")
                .into());
        };
        debug!("Compiled sandboxed unit ({} params, {} bytes)", arity, body.len());

        SandboxedFunction::build(inner.clone(), self, arity, context)
    }

    /// The evaluator as a script-callable `Function` replacement.
    ///
    /// Plain calls and `new` both compile: all arguments are converted to
    /// strings, the last one is the body, the rest are parameter names.
    pub(crate) fn to_function(&self, context: &mut Context) -> JsObject {
        let native = NativeFunction::from_copy_closure_with_captures(
            |_this, args, evaluator, context| {
                let mut texts = args
                    .iter()
                    .map(|arg| arg.to_string(context).map(|text| text.to_std_string_escaped()))
                    .collect::<JsResult<Vec<String>>>()?;
                let body = texts.pop().unwrap_or_default();
                let function = evaluator.compile(&texts, &body, context)?;
                Ok(function.into())
            },
            self.clone(),
        );
        let function: JsObject = FunctionObjectBuilder::new(&self.realm, native)
            .name(JsString::from(COMPILE_PRIMITIVE_NAME))
            .length(1)
            .constructor(true)
            .build()
            .into();
        self.interceptor.seal(&function, context);
        function
    }
}

/// Parse caller text as one standalone function expression and return its
/// formal parameter count.
///
/// Text that closes the literal early, or leaves a comment or literal open,
/// fails to parse or yields more than one statement.
fn validate(params: &str, body: &str, context: &mut Context) -> JsResult<usize> {
    let standalone = format!("(function ({params}\n) {{\n{body}\n}})");
    let script =
        Parser::new(Source::from_bytes(&standalone)).parse_script(&Scope::new_global(), context.interner_mut())?;

    let [StatementListItem::Statement(statement)] = script.statements().statements() else {
        return Err(malformed());
    };
    let Statement::Expression(expression) = &**statement else {
        return Err(malformed());
    };
    let expression = match expression {
        Expression::Parenthesized(inner) => inner.expression(),
        other => other,
    };
    match expression {
        Expression::FunctionExpression(function) => Ok(function.parameters().length() as usize),
        _ => Err(malformed()),
    }
}

fn malformed() -> boa_engine::JsError {
    JsNativeError::syntax()
        .with_message("parameters or body do not form a single function")
        .into()
}

fn synthesize(params: &str, body: &str) -> String {
    format!(
        "(function ({scope}) {{ with ({scope}) {{ return function ({params}\n) {{\n{body}\n/**/;return;}}; }} }})",
        scope = SCOPE_PARAMETER,
    )
}

/// A compiled sandboxed unit, callable from Rust and from scripts.
///
/// Scripts see a `Proxy` over a sealed function shell: plain calls and `new`
/// both reach the compiled function, nothing else about it is visible.
#[derive(Debug, Clone)]
pub struct SandboxedFunction {
    object: JsObject,
}

#[derive(Clone, Finalize)]
struct UnitCapture {
    inner: JsObject,
    scope: JsObject,
}

unsafe impl Trace for UnitCapture {
    custom_trace!(this, mark, {
        mark(&this.inner);
        mark(&this.scope);
    });
}

impl SandboxedFunction {
    fn build(inner: JsObject, evaluator: &Evaluator, arity: usize, context: &mut Context) -> JsResult<Self> {
        let shell: JsObject = FunctionObjectBuilder::new(
            &evaluator.realm,
            NativeFunction::from_fn_ptr(|_this, _args, _context| Ok(JsValue::undefined())),
        )
        .name(JsString::from("anonymous"))
        .length(arity)
        .constructor(true)
        .build()
        .into();
        evaluator.interceptor.seal(&shell, context);

        let capture = UnitCapture {
            inner,
            scope: evaluator.scope.clone(),
        };
        let apply = NativeFunction::from_copy_closure_with_captures(
            |_handler, args, captures, context| {
                // Sloppy code would otherwise see the realm's global as `this`.
                let this = args.get_or_undefined(1);
                let receiver = if this.is_null_or_undefined() {
                    JsValue::from(captures.scope.clone())
                } else {
                    this.clone()
                };
                let arguments = trap_arguments(args.get_or_undefined(2), context)?;
                captures.inner.call(&receiver, &arguments, context)
            },
            capture.clone(),
        );
        let construct = NativeFunction::from_copy_closure_with_captures(
            |_handler, args, captures, context| {
                let arguments = trap_arguments(args.get_or_undefined(1), context)?;
                captures
                    .inner
                    .construct(&arguments, None, context)
                    .map(JsValue::from)
            },
            capture,
        );

        let object = call_trap(&shell, &evaluator.realm, apply, construct, context)?;
        Ok(Self { object })
    }

    /// Invoke with an explicit receiver.
    ///
    /// An `undefined` or `null` receiver is replaced by the restricted context.
    pub fn call(&self, this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        self.object.call(this, args, context)
    }

    /// Invoke as a constructor.
    pub fn construct(&self, args: &[JsValue], context: &mut Context) -> JsResult<JsObject> {
        self.object.construct(args, None, context)
    }

    pub fn as_object(&self) -> &JsObject {
        &self.object
    }
}

impl From<SandboxedFunction> for JsValue {
    fn from(function: SandboxedFunction) -> Self {
        function.object.into()
    }
}

impl From<SandboxedFunction> for JsObject {
    fn from(function: SandboxedFunction) -> Self {
        function.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_source_shape() {
        let source = synthesize("a,b", "return a + b");
        assert!(source.starts_with("(function (globalThis) { with (globalThis) {"));
        assert!(source.contains("return function (a,b\n) {\nreturn a + b\n/**/;return;};"));
        assert!(source.ends_with("} })"));
    }

    #[test]
    fn line_comment_in_body_cannot_swallow_closing_statements() {
        let source = synthesize("", "return 1 // trailing");
        assert!(source.contains("// trailing\n/**/;return;}"));
    }

    #[test]
    fn line_comment_in_params_cannot_swallow_the_list_end() {
        let source = synthesize("a // note", "return a");
        assert!(source.contains("(a // note\n) {"));
    }

    #[test]
    fn validation_counts_formal_parameters() {
        let mut context = Context::default();
        assert_eq!(validate("", "return 1", &mut context).unwrap(), 0);
        assert_eq!(validate("a,b", "return a + b", &mut context).unwrap(), 2);
        assert_eq!(validate("a, b = 1, ...rest", "return a", &mut context).unwrap(), 1);
    }

    #[test]
    fn validation_accepts_complete_bodies() {
        let mut context = Context::default();
        let bodies = [
            "let x = 1; const y = 2; return x + y;",
            "const add = (a, b) => a + b; return add(1, 2);",
            "try { throw new Error('x'); } catch (e) { return e.message; } finally {}",
            "return function () { return this; };",
            "return 1 // trailing",
            "'use strict'; return 1;",
        ];
        for body in bodies {
            assert!(validate("", body, &mut context).is_ok(), "{body}");
        }
    }

    #[test]
    fn validation_rejects_text_that_escapes_the_literal() {
        let mut context = Context::default();
        let bodies = [
            "}",
            "return 1 }",
            "}); globalThis.escaped = 1; (function () {",
            "}, function () {",
            "}).call(null, function () {",
            "/* open",
            "return (",
            "return `open",
        ];
        for body in bodies {
            assert!(validate("", body, &mut context).is_err(), "{body}");
        }

        assert!(validate("a b", "return 1", &mut context).is_err());
        assert!(validate("a) { }); (function (b", "return 1", &mut context).is_err());
    }
}
