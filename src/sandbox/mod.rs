//! Least-privilege evaluation of caller-supplied script text.
//!
//! Three cooperating pieces:
//! - [`Interceptor`] turns any value into a read-only, filtered stand-in.
//! - [`RestrictedContextBuilder`] assembles the restricted ambient context
//!   from stand-ins, preferably sourced from a disposable isolated realm.
//! - [`Evaluator`] compiles caller text so that every free name resolves
//!   against that context.
//!
//! [`Sandbox`] ties them to one engine context and builds the restricted
//! context lazily, once.

pub mod context;
pub mod error;
pub mod evaluator;
pub mod exclusion;
pub mod interceptor;
mod realm;
pub mod runtime;

pub use context::{BindingEntry, BindingKind, RestrictedContext, RestrictedContextBuilder};
pub use error::SandboxError;
pub use evaluator::{Evaluator, SandboxedFunction};
pub use exclusion::{DENIED_GLOBALS, ExclusionSet, STRUCTURAL_DENYLIST, is_excluded, is_structurally_denied};
pub use interceptor::{Interceptor, StandInKind};
pub use runtime::Sandbox;
