use std::marker::PhantomData;
use std::ops::{AddAssign, MulAssign};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Values that can travel through a collective.
pub trait Element: Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Element for T where
    T: Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

/// A binary reduction operator, assumed associative.
///
/// `combine` folds `incoming` into `acc` so that `acc` becomes `acc ⊕ incoming`;
/// for operators that are not commutative the left operand always comes from
/// the lower rank.
pub trait ReduceOp<T>: Send + Sync {
    fn combine(&self, acc: &mut T, incoming: &T);

    fn is_commutative(&self) -> bool {
        true
    }
}

/// Element-wise `acc[i] ← acc[i] ⊕ incoming[i]`.
pub fn fold_into<T, O>(op: &O, acc: &mut [T], incoming: &[T])
where
    O: ReduceOp<T> + ?Sized,
{
    for (a, b) in acc.iter_mut().zip(incoming) {
        op.combine(a, b);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

impl<T> ReduceOp<T> for Sum
where
    T: AddAssign + Clone + Send + Sync,
{
    fn combine(&self, acc: &mut T, incoming: &T) {
        *acc += incoming.clone();
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Prod;

impl<T> ReduceOp<T> for Prod
where
    T: MulAssign + Clone + Send + Sync,
{
    fn combine(&self, acc: &mut T, incoming: &T) {
        *acc *= incoming.clone();
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Max;

impl<T> ReduceOp<T> for Max
where
    T: PartialOrd + Clone + Send + Sync,
{
    fn combine(&self, acc: &mut T, incoming: &T) {
        if *incoming > *acc {
            *acc = incoming.clone();
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Min;

impl<T> ReduceOp<T> for Min
where
    T: PartialOrd + Clone + Send + Sync,
{
    fn combine(&self, acc: &mut T, incoming: &T) {
        if *incoming < *acc {
            *acc = incoming.clone();
        }
    }
}

/// Sequence concatenation; not commutative.
#[derive(Clone, Copy, Debug, Default)]
pub struct Concat;

impl ReduceOp<String> for Concat {
    fn combine(&self, acc: &mut String, incoming: &String) {
        acc.push_str(incoming);
    }

    fn is_commutative(&self) -> bool {
        false
    }
}

impl<U> ReduceOp<Vec<U>> for Concat
where
    U: Clone + Send + Sync,
{
    fn combine(&self, acc: &mut Vec<U>, incoming: &Vec<U>) {
        acc.extend_from_slice(incoming);
    }

    fn is_commutative(&self) -> bool {
        false
    }
}

/// A user-supplied operator.
pub struct ReduceFn<T, F> {
    func: F,
    commutative: bool,
    _marker: PhantomData<fn(&mut T, &T)>,
}

impl<T, F> ReduceFn<T, F>
where
    F: Fn(&mut T, &T) + Send + Sync,
{
    pub fn commutative(func: F) -> Self {
        ReduceFn {
            func,
            commutative: true,
            _marker: PhantomData,
        }
    }

    pub fn non_commutative(func: F) -> Self {
        ReduceFn {
            func,
            commutative: false,
            _marker: PhantomData,
        }
    }
}

impl<T, F> ReduceOp<T> for ReduceFn<T, F>
where
    F: Fn(&mut T, &T) + Send + Sync,
{
    fn combine(&self, acc: &mut T, incoming: &T) {
        (self.func)(acc, incoming)
    }

    fn is_commutative(&self) -> bool {
        self.commutative
    }
}
