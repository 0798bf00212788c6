use boa_engine::error::JsNativeErrorKind;
use boa_engine::{Context, JsError};
use thiserror::Error;

/// Errors surfaced by the [`Sandbox`](super::Sandbox) facade.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Parameter list or body text does not parse.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Compilation failed for a reason other than syntax.
    #[error("compile failed: {0}")]
    Compile(String),

    /// An exception escaped a sandboxed invocation.
    #[error("uncaught exception: {0}")]
    Thrown(String),

    /// Host-side evaluation failed.
    #[error("host script failed: {0}")]
    Host(String),
}

impl SandboxError {
    /// Classify an error raised while compiling caller text.
    pub(crate) fn from_compile(err: JsError, context: &mut Context) -> Self {
        let message = err.to_string();
        let is_syntax = err
            .try_native(context)
            .map(|native| matches!(native.kind, JsNativeErrorKind::Syntax))
            .unwrap_or(false);
        if is_syntax {
            Self::Syntax(message)
        } else {
            Self::Compile(message)
        }
    }

    pub(crate) fn thrown(err: JsError) -> Self {
        Self::Thrown(err.to_string())
    }

    pub(crate) fn host(err: JsError) -> Self {
        Self::Host(err.to_string())
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }
}
