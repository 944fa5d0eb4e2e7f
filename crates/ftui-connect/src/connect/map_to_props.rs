#![forbid(unsafe_code)]

//! `map_state_to_props` / `map_dispatch_to_props` wrappers.
//!
//! A [`MapToProps`] is a recipe; each binding instance calls
//! [`init`](MapToProps::init) once to get its own [`Subselector`], so
//! per-instance memo state never leaks between nodes.
//!
//! Constant mappers ([`none`](MapToProps::none),
//! [`dispatch_only`](MapToProps::dispatch_only),
//! [`from_dispatch`](MapToProps::from_dispatch)) compute once per binding and
//! always return the same `Rc`. Function mappers compute on every call and
//! have their first result shape-checked.

use std::rc::Rc;

use crate::error::DerivationError;
use crate::options::FactoryOptions;
use crate::store::Dispatch;

use super::verify::{PlainObject, verify_plain_object};

type InstanceFn<I, O, T> = Box<dyn FnMut(&I, &O) -> Result<T, DerivationError>>;
type MakeFn<I, O, T> = Rc<dyn Fn(&FactoryOptions) -> InstanceFn<I, O, T>>;

/// Maps store state to state props.
pub type MapStateToProps<S, O, SP> = MapToProps<Rc<S>, O, SP>;

/// Maps the store's dispatch to dispatch props.
pub type MapDispatchToProps<A, O, DP> = MapToProps<Dispatch<A>, O, DP>;

/// Default dispatch props: the dispatch function itself.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchProps<A> {
    pub dispatch: Dispatch<A>,
}

enum Source<I, O, T> {
    Constant(Rc<dyn Fn(&I) -> T>),
    Func {
        make: MakeFn<I, O, T>,
        depends_on_own_props: Option<bool>,
    },
}

impl<I, O, T> Clone for Source<I, O, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(f) => Self::Constant(Rc::clone(f)),
            Self::Func {
                make,
                depends_on_own_props,
            } => Self::Func {
                make: Rc::clone(make),
                depends_on_own_props: *depends_on_own_props,
            },
        }
    }
}

/// A state or dispatch mapper.
pub struct MapToProps<I, O, T> {
    source: Source<I, O, T>,
    method_name: &'static str,
    provided: bool,
}

impl<I, O, T> Clone for MapToProps<I, O, T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            method_name: self.method_name,
            provided: self.provided,
        }
    }
}

impl<I, O, T> std::fmt::Debug for MapToProps<I, O, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.source {
            Source::Constant(_) => "constant",
            Source::Func { .. } => "func",
        };
        f.debug_struct("MapToProps")
            .field("method_name", &self.method_name)
            .field("kind", &kind)
            .field("declared_depends_on_own_props", &self.declared_depends_on_own_props())
            .finish()
    }
}

/// One binding's instance of a mapper.
pub struct Subselector<I, O, T> {
    map: Box<dyn FnMut(&I, &O) -> Result<Rc<T>, DerivationError>>,
    depends_on_own_props: bool,
}

impl<I, O, T> Subselector<I, O, T> {
    /// Compute props.
    ///
    /// # Errors
    ///
    /// Whatever the user's map function raised.
    pub fn call(&mut self, input: &I, own_props: &O) -> Result<Rc<T>, DerivationError> {
        (self.map)(input, own_props)
    }

    /// Whether a change of own props alone requires recomputation.
    #[must_use]
    pub fn depends_on_own_props(&self) -> bool {
        self.depends_on_own_props
    }
}

impl<I, O, T> MapToProps<I, O, T> {
    /// Diagnostic name of the mapper (`mapStateToProps` or `mapDispatchToProps`).
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        self.method_name
    }

    /// The caller's declaration. `None` for custom mappers that left it out.
    #[must_use]
    pub fn declared_depends_on_own_props(&self) -> Option<bool> {
        match &self.source {
            Source::Constant(_) => Some(false),
            Source::Func {
                depends_on_own_props,
                ..
            } => *depends_on_own_props,
        }
    }

    /// Whether the mapper was supplied by the caller (as opposed to the
    /// `none()` default).
    #[must_use]
    pub fn is_provided(&self) -> bool {
        self.provided
    }
}

impl<I: 'static, O: 'static, T: 'static> MapToProps<I, O, T> {
    fn constant(method_name: &'static str, f: impl Fn(&I) -> T + 'static) -> Self {
        Self {
            source: Source::Constant(Rc::new(f)),
            method_name,
            provided: true,
        }
    }

    fn func(
        method_name: &'static str,
        make: impl Fn(&FactoryOptions) -> InstanceFn<I, O, T> + 'static,
        depends_on_own_props: Option<bool>,
    ) -> Self
    where
        T: PlainObject,
    {
        let make: MakeFn<I, O, T> = Rc::new(move |options: &FactoryOptions| -> InstanceFn<I, O, T> {
            let mut inner = make(options);
            let display_name = options.display_name.clone();
            let mut first = true;
            Box::new(move |input: &I, own: &O| {
                let props = inner(input, own)?;
                if first {
                    first = false;
                    if cfg!(debug_assertions) {
                        verify_plain_object(&props, &display_name, method_name);
                    }
                }
                Ok(props)
            })
        });
        Self {
            source: Source::Func {
                make,
                depends_on_own_props,
            },
            method_name,
            provided: true,
        }
    }

    /// Create the per-binding instance.
    pub fn init(&self, options: &FactoryOptions) -> Subselector<I, O, T> {
        match &self.source {
            Source::Constant(f) => {
                let f = Rc::clone(f);
                let mut cached: Option<Rc<T>> = None;
                Subselector {
                    map: Box::new(move |input: &I, _: &O| {
                        Ok(Rc::clone(cached.get_or_insert_with(|| Rc::new(f(input)))))
                    }),
                    depends_on_own_props: false,
                }
            }
            Source::Func {
                make,
                depends_on_own_props,
            } => {
                let mut inner = make(options);
                Subselector {
                    map: Box::new(move |input: &I, own: &O| inner(input, own).map(Rc::new)),
                    depends_on_own_props: depends_on_own_props.unwrap_or(true),
                }
            }
        }
    }
}

impl<S: 'static, O: 'static, SP: 'static> MapToProps<Rc<S>, O, SP> {
    /// No state mapping: constant default props, no subscription.
    pub fn none() -> Self
    where
        SP: Default,
    {
        let mut mapper = Self::constant("mapStateToProps", |_: &Rc<S>| SP::default());
        mapper.provided = false;
        mapper
    }

    /// Derive from state only; own-props changes never recompute.
    pub fn from_state(f: impl Fn(&S) -> SP + 'static) -> Self
    where
        SP: PlainObject,
    {
        let f = Rc::new(f);
        Self::func(
            "mapStateToProps",
            move |_: &FactoryOptions| -> InstanceFn<Rc<S>, O, SP> {
                let f = Rc::clone(&f);
                Box::new(move |state: &Rc<S>, _: &O| Ok(f(&**state)))
            },
            Some(false),
        )
    }

    /// Derive from state and own props.
    pub fn from_state_and_props(f: impl Fn(&S, &O) -> SP + 'static) -> Self
    where
        SP: PlainObject,
    {
        let f = Rc::new(f);
        Self::func(
            "mapStateToProps",
            move |_: &FactoryOptions| -> InstanceFn<Rc<S>, O, SP> {
                let f = Rc::clone(&f);
                Box::new(move |state: &Rc<S>, own: &O| Ok(f(&**state, own)))
            },
            Some(true),
        )
    }

    /// Fallible mapper. Leaving `depends_on_own_props` as `None` draws a
    /// warning and is treated as `true`.
    pub fn custom(
        f: impl Fn(&Rc<S>, &O) -> Result<SP, DerivationError> + 'static,
        depends_on_own_props: Option<bool>,
    ) -> Self
    where
        SP: PlainObject,
    {
        let f = Rc::new(f);
        Self::func(
            "mapStateToProps",
            move |_: &FactoryOptions| -> InstanceFn<Rc<S>, O, SP> {
                let f = Rc::clone(&f);
                Box::new(move |state: &Rc<S>, own: &O| f(state, own))
            },
            depends_on_own_props,
        )
    }

    /// Build a fresh mapper per binding, e.g. one with its own memo cache.
    pub fn per_instance<F>(
        make: impl Fn(&FactoryOptions) -> F + 'static,
        depends_on_own_props: bool,
    ) -> Self
    where
        F: FnMut(&Rc<S>, &O) -> Result<SP, DerivationError> + 'static,
        SP: PlainObject,
    {
        Self::func(
            "mapStateToProps",
            move |options: &FactoryOptions| -> InstanceFn<Rc<S>, O, SP> { Box::new(make(options)) },
            Some(depends_on_own_props),
        )
    }
}

impl<A: 'static, O: 'static> MapToProps<Dispatch<A>, O, DispatchProps<A>> {
    /// Default dispatch mapping: expose `dispatch` itself.
    pub fn dispatch_only() -> Self {
        let expose = |dispatch: &Dispatch<A>| DispatchProps {
            dispatch: dispatch.clone(),
        };
        let mut mapper = Self::constant("mapDispatchToProps", expose);
        mapper.provided = false;
        mapper
    }
}

impl<A: 'static, O: 'static, DP: 'static> MapToProps<Dispatch<A>, O, DP> {
    /// Build dispatch props once per binding.
    pub fn from_dispatch(f: impl Fn(&Dispatch<A>) -> DP + 'static) -> Self {
        Self::constant("mapDispatchToProps", f)
    }

    /// Build dispatch props from dispatch and own props.
    pub fn from_dispatch_and_props(f: impl Fn(&Dispatch<A>, &O) -> DP + 'static) -> Self
    where
        DP: PlainObject,
    {
        let f = Rc::new(f);
        Self::func(
            "mapDispatchToProps",
            move |_: &FactoryOptions| -> InstanceFn<Dispatch<A>, O, DP> {
                let f = Rc::clone(&f);
                Box::new(move |dispatch: &Dispatch<A>, own: &O| Ok(f(dispatch, own)))
            },
            Some(true),
        )
    }

    /// Fallible mapper. Leaving `depends_on_own_props` as `None` draws a
    /// warning and is treated as `true`.
    pub fn custom(
        f: impl Fn(&Dispatch<A>, &O) -> Result<DP, DerivationError> + 'static,
        depends_on_own_props: Option<bool>,
    ) -> Self
    where
        DP: PlainObject,
    {
        let f = Rc::new(f);
        Self::func(
            "mapDispatchToProps",
            move |_: &FactoryOptions| -> InstanceFn<Dispatch<A>, O, DP> {
                let f = Rc::clone(&f);
                Box::new(move |dispatch: &Dispatch<A>, own: &O| f(dispatch, own))
            },
            depends_on_own_props,
        )
    }
}
