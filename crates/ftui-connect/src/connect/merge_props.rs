#![forbid(unsafe_code)]

//! Combining own, state and dispatch props into the props a host sees.

use std::rc::Rc;

use crate::options::FactoryOptions;

use super::verify::{PlainObject, verify_plain_object};

/// Default merge result: all three inputs side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedProps<O, SP, DP> {
    pub own: O,
    pub state: Rc<SP>,
    pub dispatch: Rc<DP>,
}

/// One binding's merge function.
pub type MergeFn<O, SP, DP, MP> = Box<dyn FnMut(&Rc<SP>, &Rc<DP>, &O) -> Rc<MP>>;

type InitMerge<O, SP, DP, MP> = Rc<dyn Fn(&FactoryOptions, bool) -> MergeFn<O, SP, DP, MP>>;

/// A merge recipe, instantiated once per binding.
pub struct MergeProps<O, SP, DP, MP> {
    init: InitMerge<O, SP, DP, MP>,
    custom: bool,
}

impl<O, SP, DP, MP> Clone for MergeProps<O, SP, DP, MP> {
    fn clone(&self) -> Self {
        Self {
            init: Rc::clone(&self.init),
            custom: self.custom,
        }
    }
}

impl<O, SP, DP, MP> std::fmt::Debug for MergeProps<O, SP, DP, MP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeProps").field("custom", &self.custom).finish()
    }
}

type SideBySide<O, SP, DP> = MergeFn<O, SP, DP, MergedProps<O, SP, DP>>;

impl<O: Clone + 'static, SP: 'static, DP: 'static> MergeProps<O, SP, DP, MergedProps<O, SP, DP>> {
    /// Place own, state and dispatch props side by side.
    pub fn side_by_side() -> Self {
        Self {
            init: Rc::new(|_: &FactoryOptions, _: bool| -> SideBySide<O, SP, DP> {
                Box::new(|state: &Rc<SP>, dispatch: &Rc<DP>, own: &O| {
                    Rc::new(MergedProps {
                        own: own.clone(),
                        state: Rc::clone(state),
                        dispatch: Rc::clone(dispatch),
                    })
                })
            }),
            custom: false,
        }
    }
}

impl<O: 'static, SP: 'static, DP: 'static, MP: PlainObject + 'static> MergeProps<O, SP, DP, MP> {
    /// Custom merge. When the binding is pure, a result `are_equal` to the
    /// previous one is dropped and the previous `Rc` is returned instead.
    pub fn custom(
        merge: impl Fn(&SP, &DP, &O) -> MP + 'static,
        are_equal: impl Fn(&MP, &MP) -> bool + 'static,
    ) -> Self {
        let merge = Rc::new(merge);
        let are_equal = Rc::new(are_equal);
        Self {
            init: Rc::new(move |options: &FactoryOptions, pure: bool| -> MergeFn<O, SP, DP, MP> {
                let merge = Rc::clone(&merge);
                let are_equal = Rc::clone(&are_equal);
                let display_name = options.display_name.clone();
                let mut merged: Option<Rc<MP>> = None;
                Box::new(move |state: &Rc<SP>, dispatch: &Rc<DP>, own: &O| {
                    let next = merge(&**state, &**dispatch, own);
                    match &merged {
                        Some(prev) if pure && are_equal(&next, prev) => return Rc::clone(prev),
                        Some(_) => {}
                        None => {
                            if cfg!(debug_assertions) {
                                verify_plain_object(&next, &display_name, "mergeProps");
                            }
                        }
                    }
                    let next = Rc::new(next);
                    merged = Some(Rc::clone(&next));
                    next
                })
            }),
            custom: true,
        }
    }
}

impl<O, SP, DP, MP> MergeProps<O, SP, DP, MP> {
    /// Whether the caller supplied the merge function.
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom
    }

    /// Create the per-binding merge function.
    pub fn init(&self, options: &FactoryOptions, pure: bool) -> MergeFn<O, SP, DP, MP> {
        (self.init)(options, pure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> FactoryOptions {
        crate::options::ConnectOptions::default().factory_options("Row")
    }

    #[derive(Debug, PartialEq)]
    struct Sum {
        total: i32,
    }

    impl PlainObject for Sum {}

    #[test]
    fn side_by_side_keeps_inputs() {
        let mut merge = MergeProps::<&str, i32, u8, _>::side_by_side().init(&options(), true);
        let state = Rc::new(4);
        let dispatch = Rc::new(1u8);
        let merged = merge(&state, &dispatch, &"own");
        assert_eq!(merged.own, "own");
        assert!(Rc::ptr_eq(&merged.state, &state));
        assert!(Rc::ptr_eq(&merged.dispatch, &dispatch));
    }

    #[test]
    fn pure_custom_merge_reuses_equal_result() {
        let recipe = MergeProps::custom(
            |s: &i32, d: &i32, o: &i32| Sum { total: s + d + o },
            |a: &Sum, b: &Sum| a == b,
        );
        assert!(recipe.is_custom());
        let mut merge = recipe.init(&options(), true);
        let first = merge(&Rc::new(1), &Rc::new(2), &3);
        let same = merge(&Rc::new(3), &Rc::new(2), &1);
        assert!(Rc::ptr_eq(&first, &same));
        let other = merge(&Rc::new(0), &Rc::new(0), &0);
        assert_eq!(other.total, 0);
    }

    #[test]
    fn impure_custom_merge_always_replaces() {
        let recipe = MergeProps::custom(
            |s: &i32, _: &i32, _: &()| Sum { total: *s },
            |a: &Sum, b: &Sum| a == b,
        );
        let mut merge = recipe.init(&options(), false);
        let a = merge(&Rc::new(1), &Rc::new(0), &());
        let b = merge(&Rc::new(1), &Rc::new(0), &());
        assert!(!Rc::ptr_eq(&a, &b));
    }
}
