//! `Sandbox`: one engine context plus its lazily built restricted context.

use boa_engine::property::Attribute;
use boa_engine::{Context, JsString, JsValue, Source};
use once_cell::unsync::OnceCell;
use tracing::debug;

use super::context::{RestrictedContext, RestrictedContextBuilder};
use super::error::SandboxError;
use super::evaluator::{COMPILE_PRIMITIVE_NAME, SandboxedFunction};
use crate::config::SandboxConfig;

/// Owns an engine context and compiles caller text against a restricted view
/// of its ambient scope.
///
/// The restricted context is built on first use and then reused for every
/// compiled unit.
pub struct Sandbox {
    context: Context,
    config: SandboxConfig,
    restricted: OnceCell<RestrictedContext>,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_config(SandboxConfig::default())
    }

    pub fn with_config(config: SandboxConfig) -> Self {
        Self::from_context(Context::default(), config)
    }

    /// Wrap an existing engine context. Host globals registered on it before
    /// the first compile are seen (and filtered) by the restricted context.
    pub fn from_context(context: Context, config: SandboxConfig) -> Self {
        Self {
            context,
            config,
            restricted: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Whether the restricted context has been built yet.
    pub fn is_built(&self) -> bool {
        self.restricted.get().is_some()
    }

    /// The restricted context, built on the first call.
    pub fn restricted_context(&mut self) -> &RestrictedContext {
        let Self {
            context,
            config,
            restricted,
        } = self;
        restricted.get_or_init(|| {
            debug!("Building restricted context");
            RestrictedContextBuilder::from_config(config).build(context)
        })
    }

    /// Compile `body` with the given parameter names.
    ///
    /// Only syntax problems fail here; nothing in `body` runs yet.
    pub fn compile(&mut self, params: &[&str], body: &str) -> Result<SandboxedFunction, SandboxError> {
        let evaluator = self.restricted_context().evaluator().clone();
        let params: Vec<String> = params.iter().map(|param| param.to_string()).collect();
        evaluator
            .compile(&params, body, &mut self.context)
            .map_err(|err| SandboxError::from_compile(err, &mut self.context))
    }

    pub fn call(&mut self, function: &SandboxedFunction, args: &[JsValue]) -> Result<JsValue, SandboxError> {
        self.call_with_this(function, &JsValue::undefined(), args)
    }

    pub fn call_with_this(
        &mut self,
        function: &SandboxedFunction,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, SandboxError> {
        function
            .call(this, args, &mut self.context)
            .map_err(SandboxError::thrown)
    }

    /// Compile a zero-parameter body and invoke it once.
    pub fn run(&mut self, body: &str) -> Result<JsValue, SandboxError> {
        let function = self.compile(&[], body)?;
        self.call(&function, &[])
    }

    /// Evaluate trusted host code in the real ambient scope.
    pub fn eval_host(&mut self, source: &str) -> Result<JsValue, SandboxError> {
        self.context
            .eval(Source::from_bytes(source))
            .map_err(SandboxError::host)
    }

    /// Expose the sandboxed `Function` replacement to host scripts as `name`.
    pub fn register_global(&mut self, name: &str) -> Result<(), SandboxError> {
        let restricted = self.restricted_context().clone();
        let function = restricted.get(COMPILE_PRIMITIVE_NAME, &mut self.context);
        self.context
            .register_global_property(
                JsString::from(name),
                function,
                Attribute::WRITABLE | Attribute::CONFIGURABLE,
            )
            .map_err(SandboxError::host)
    }

    /// Decode a JSON argument into an engine value.
    pub fn json_value(&mut self, json: &serde_json::Value) -> Result<JsValue, SandboxError> {
        JsValue::from_json(json, &mut self.context).map_err(SandboxError::host)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}
