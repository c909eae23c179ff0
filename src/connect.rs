//! Adapter traits that let [`Signal::connect`](crate::Signal::connect) and
//! its relatives accept any callable whose parameters are a prefix of the
//! signal's argument tuple, optionally preceded by explicitly bound
//! arguments.
//!
//! Rust has no variadic generics, so this follows the pattern the
//! `signals2` crate uses in its `connect.rs` (and that `axum`/`bevy` use
//! for handler extraction): one blanket impl per supported arity, each
//! carrying a distinct zero-sized `Marker` type parameter so the
//! impls never overlap in the eyes of the coherence checker, even though
//! they'd otherwise all look like "some generic `F` implementing some
//! `Fn` trait for the same `Args`".
//!
//! Supported shapes are capped at signal-argument tuples of arity 0..=3 and
//! bound-argument tuples of arity 0..=1. Extending either ceiling is a
//! mechanical addition of more macro invocations, not a change to the
//! dispatch core itself.

use std::sync::Arc;

/// Converts a user callable into the type-erased adapter a [`Signal`]
/// stores internally. `Marker` exists only to disambiguate overlapping
/// blanket impls; callers never name it.
///
/// [`Signal`]: crate::Signal
pub trait IntoSubscriber<Args, Marker> {
    #[doc(hidden)]
    fn into_subscriber(self) -> Arc<dyn Fn(&Args) + Send + Sync>;
}

/// Like [`IntoSubscriber`], but for callables that additionally receive a
/// fixed prefix of arguments bound once at connect time.
pub trait IntoBoundSubscriber<Bound, Args, Marker> {
    #[doc(hidden)]
    fn into_bound_subscriber(self, bound: Bound) -> Arc<dyn Fn(&Args) + Send + Sync>;
}

/// Marker for a slot taking no arguments.
pub struct Arity0;
/// Marker for a slot taking a one-element prefix.
pub struct Arity1;
/// Marker for a slot taking a two-element prefix.
pub struct Arity2;
/// Marker for a slot taking a three-element prefix.
pub struct Arity3;

/// Marker for a bound slot taking only the bound argument.
pub struct BoundArity1;
/// Marker for a bound slot taking the bound argument plus a one-element prefix.
pub struct BoundArity2;
/// Marker for a bound slot taking the bound argument plus a two-element prefix.
pub struct BoundArity3;

macro_rules! unbound_subscriber_impl {
    ($marker:ident ; ( $($used:ident),* ) ; ( $($unused:ident),* )) => {
        impl<F, $($used,)* $($unused,)*> IntoSubscriber<($($used,)* $($unused,)*), $marker> for F
        where
            F: Fn($(&$used),*) + Send + Sync + 'static,
            $($used: Send + Sync + 'static,)*
            $($unused: Send + Sync + 'static,)*
        {
            fn into_subscriber(self) -> Arc<dyn Fn(&($($used,)* $($unused,)*)) + Send + Sync> {
                Arc::new(move |args: &($($used,)* $($unused,)*)| {
                    #[allow(non_snake_case, unused_variables)]
                    let ($($used,)* $($unused,)*) = args;
                    self($($used),*)
                })
            }
        }
    };
}

// Arity 0 signal: only a no-argument slot fits.
unbound_subscriber_impl!(Arity0; (); ());

// Arity 1 signal.
unbound_subscriber_impl!(Arity0; (); (A0));
unbound_subscriber_impl!(Arity1; (A0); ());

// Arity 2 signal.
unbound_subscriber_impl!(Arity0; (); (A0, A1));
unbound_subscriber_impl!(Arity1; (A0); (A1));
unbound_subscriber_impl!(Arity2; (A0, A1); ());

// Arity 3 signal.
unbound_subscriber_impl!(Arity0; (); (A0, A1, A2));
unbound_subscriber_impl!(Arity1; (A0); (A1, A2));
unbound_subscriber_impl!(Arity2; (A0, A1); (A2));
unbound_subscriber_impl!(Arity3; (A0, A1, A2); ());

macro_rules! bound_subscriber_impl {
    ($marker:ident ; ( $($used:ident),* ) ; ( $($unused:ident),* )) => {
        impl<F, B0, $($used,)* $($unused,)*> IntoBoundSubscriber<(B0,), ($($used,)* $($unused,)*), $marker> for F
        where
            F: Fn(&B0, $(&$used),*) + Send + Sync + 'static,
            B0: Send + Sync + 'static,
            $($used: Send + Sync + 'static,)*
            $($unused: Send + Sync + 'static,)*
        {
            fn into_bound_subscriber(self, bound: (B0,)) -> Arc<dyn Fn(&($($used,)* $($unused,)*)) + Send + Sync> {
                let (b0,) = bound;
                Arc::new(move |args: &($($used,)* $($unused,)*)| {
                    #[allow(non_snake_case, unused_variables)]
                    let ($($used,)* $($unused,)*) = args;
                    self(&b0, $($used),*)
                })
            }
        }
    };
}

// Arity 0 signal: the slot only ever sees the bound argument.
bound_subscriber_impl!(BoundArity1; (); ());

// Arity 1 signal.
bound_subscriber_impl!(BoundArity1; (); (A0));
bound_subscriber_impl!(BoundArity2; (A0); ());

// Arity 2 signal.
bound_subscriber_impl!(BoundArity1; (); (A0, A1));
bound_subscriber_impl!(BoundArity2; (A0); (A1));
bound_subscriber_impl!(BoundArity3; (A0, A1); ());

// Arity 3 signal (bound arg plus up to a two-element prefix; a slot wanting
// the bound argument plus all three emit arguments is outside the capped
// arity family — see the module-level note above).
bound_subscriber_impl!(BoundArity1; (); (A0, A1, A2));
bound_subscriber_impl!(BoundArity2; (A0); (A1, A2));
bound_subscriber_impl!(BoundArity3; (A0, A1); (A2));
