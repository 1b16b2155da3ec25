//! Request guard: the glue between a host environment and a rule.
//!
//! A host (a web handler, an RPC dispatcher, a CLI) hands the guard its
//! request plus any explicit per-call contexts. The guard derives context
//! from the request, merges the explicit contexts over it, enforces the rule
//! and, on rejection, lets a caller-supplied handler choose the response.

use rulegate_core::Context;
use std::sync::Arc;

use crate::enforce::{enforce, Rejection};
use crate::rule::Rule;

/// Derives context attributes from a host request.
pub trait ContextSource<R>: Send + Sync {
    fn derive(&self, request: &R) -> Context;
}

/// Source that contributes nothing; every attribute must come from the
/// direct contexts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDerivedContext;

impl<R> ContextSource<R> for NoDerivedContext {
    fn derive(&self, _request: &R) -> Context {
        Context::new()
    }
}

impl<R, F> ContextSource<R> for F
where
    F: Fn(&R) -> Context + Send + Sync,
{
    fn derive(&self, request: &R) -> Context {
        self(request)
    }
}

type DenyHandler<R, E> = Arc<dyn Fn(Rejection<Context>, &R) -> E + Send + Sync>;

/// Enforces one rule for requests of type `R`.
pub struct Guard<R, E = Rejection<Context>> {
    rule: Rule<Context>,
    source: Arc<dyn ContextSource<R>>,
    on_deny: DenyHandler<R, E>,
}

impl<R: 'static> Guard<R, Rejection<Context>> {
    /// Guard with no derived context whose denial response is the
    /// [`Rejection`] itself.
    pub fn new(rule: Rule<Context>) -> Self {
        Self {
            rule,
            source: Arc::new(NoDerivedContext),
            on_deny: Arc::new(|rejection: Rejection<Context>, _request: &R| rejection),
        }
    }
}

impl<R: 'static, E> Guard<R, E> {
    pub fn with_source(mut self, source: impl ContextSource<R> + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    /// Replace the denial handler, changing the response type.
    pub fn on_deny<E2, F>(self, handler: F) -> Guard<R, E2>
    where
        F: Fn(Rejection<Context>, &R) -> E2 + Send + Sync + 'static,
    {
        Guard {
            rule: self.rule,
            source: self.source,
            on_deny: Arc::new(handler),
        }
    }

    pub fn rule(&self) -> &Rule<Context> {
        &self.rule
    }

    /// Build the effective context for `request`.
    ///
    /// Direct contexts merge in order (later wins), then the result merges
    /// over the derived context (direct wins).
    pub fn context_for(&self, request: &R, direct: &[Context]) -> Context {
        let derived = self.source.derive(request);
        Context::merge_all(direct).merged_over(&derived)
    }

    /// Enforce the rule for `request`, returning the merged context on
    /// success.
    pub fn authorize(&self, request: &R, direct: &[Context]) -> Result<Context, Rejection<Context>> {
        let context = self.context_for(request, direct);
        enforce(&self.rule, &context)?;
        Ok(context)
    }

    /// [`Guard::authorize`] with the rejection mapped through the denial
    /// handler.
    pub fn handle(&self, request: &R, direct: &[Context]) -> Result<Context, E> {
        self.authorize(request, direct)
            .map_err(|rejection| (self.on_deny)(rejection, request))
    }
}

impl<R, E> Clone for Guard<R, E> {
    fn clone(&self) -> Self {
        Self {
            rule: self.rule.clone(),
            source: Arc::clone(&self.source),
            on_deny: Arc::clone(&self.on_deny),
        }
    }
}
