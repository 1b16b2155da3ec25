use rulegate_core::Context;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A named pure test over a context.
///
/// Cloning is cheap (shared closure), so one predicate can sit inside any
/// number of rules. A predicate must be total; if its body panics the panic
/// propagates to whoever evaluates it.
pub struct Predicate<C> {
    name: Arc<str>,
    test: Arc<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C> Predicate<C> {
    pub fn new<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            test: Arc::new(test),
        }
    }

    pub fn test(&self, context: &C) -> bool {
        (self.test)(context)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same test under a different diagnostic name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            test: Arc::clone(&self.test),
        }
    }
}

impl<C> Clone for Predicate<C> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            test: Arc::clone(&self.test),
        }
    }
}

impl<C> fmt::Debug for Predicate<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.name).finish()
    }
}

/// Shorthand for [`Predicate::new`].
pub fn predicate<C, F>(name: impl Into<String>, test: F) -> Predicate<C>
where
    F: Fn(&C) -> bool + Send + Sync + 'static,
{
    Predicate::new(name, test)
}

// ---------------------------------------------------------------------------
// Primitives and combinators
// ---------------------------------------------------------------------------

/// Never matches.
pub fn never<C: 'static>() -> Predicate<C> {
    Predicate::new("never", |_: &C| false)
}

/// Always matches.
pub fn always<C: 'static>() -> Predicate<C> {
    Predicate::new("always", |_: &C| true)
}

/// Matches when `inner` does not.
pub fn not<C: 'static>(inner: Predicate<C>) -> Predicate<C> {
    let name = format!("!{}", inner.name());
    Predicate::new(name, move |ctx: &C| !inner.test(ctx))
}

/// Matches when every predicate matches. Stops at the first miss; an empty
/// list matches everything.
pub fn every<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Predicate<C> {
    let predicates: Vec<Predicate<C>> = predicates.into_iter().collect();
    let name = format!("every({})", join_names(&predicates));
    Predicate::new(name, move |ctx: &C| predicates.iter().all(|p| p.test(ctx)))
}

/// Alias of [`every`].
pub fn all<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Predicate<C> {
    every(predicates)
}

/// Matches when at least one predicate matches. Stops at the first hit; an
/// empty list matches nothing.
pub fn some<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Predicate<C> {
    let predicates: Vec<Predicate<C>> = predicates.into_iter().collect();
    let name = format!("some({})", join_names(&predicates));
    Predicate::new(name, move |ctx: &C| predicates.iter().any(|p| p.test(ctx)))
}

/// Alias of [`some`].
pub fn any<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Predicate<C> {
    some(predicates)
}

/// Matches when no predicate matches.
pub fn none<C: 'static>(predicates: impl IntoIterator<Item = Predicate<C>>) -> Predicate<C> {
    let inner = some(predicates);
    let name = format!("none{}", &inner.name()["some".len()..]);
    not(inner).renamed(name)
}

pub(crate) fn join_names<C>(predicates: &[Predicate<C>]) -> String {
    predicates
        .iter()
        .map(Predicate::name)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Attribute predicates over Context
// ---------------------------------------------------------------------------

/// The attribute is set to something other than `null`.
pub fn attribute_present(key: impl Into<String>) -> Predicate<Context> {
    let key = key.into();
    let name = format!("{}?", key);
    Predicate::new(name, move |ctx: &Context| ctx.contains(&key))
}

/// The attribute is missing or `null`.
pub fn attribute_absent(key: impl Into<String>) -> Predicate<Context> {
    let key = key.into();
    let name = format!("!{}?", key);
    Predicate::new(name, move |ctx: &Context| !ctx.contains(&key))
}

/// The attribute equals `expected` exactly (JSON equality).
pub fn attribute_equals(key: impl Into<String>, expected: impl Into<Value>) -> Predicate<Context> {
    let key = key.into();
    let expected = expected.into();
    let name = format!("{}=={}", key, expected);
    Predicate::new(name, move |ctx: &Context| ctx.get(&key) == Some(&expected))
}

/// The attribute equals one of `candidates`.
pub fn attribute_in<V: Into<Value>>(
    key: impl Into<String>,
    candidates: impl IntoIterator<Item = V>,
) -> Predicate<Context> {
    let key = key.into();
    let candidates: Vec<Value> = candidates.into_iter().map(Into::into).collect();
    let name = format!("{} in {}", key, Value::Array(candidates.clone()));
    Predicate::new(name, move |ctx: &Context| {
        ctx.get(&key).is_some_and(|v| candidates.contains(v))
    })
}
