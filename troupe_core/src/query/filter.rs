//! Query filters: membership predicates that never resolve into the view.
//!
//! Filters compose conjunctively with `&`; `!` flips a requirement into an
//! exclusion and back.

use crate::query::QueryMeta;
use crate::signature::{component_tag_of, Component};
use std::marker::PhantomData;
use std::ops;

/// A membership predicate. Filters only contribute signatures and tick
/// filters; the query plan evaluates them centrally.
pub trait EntityFilter: Send + Sync + 'static {
    fn describe(&self, meta: &mut QueryMeta);
}

/// The filter that admits everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct Passthrough;

impl EntityFilter for Passthrough {
    fn describe(&self, _: &mut QueryMeta) {}
}

/// Requires the component without delivering it.
pub struct With<T: Component>(PhantomData<T>);

/// Rejects entities holding the component.
pub struct Without<T: Component>(PhantomData<T>);

/// Requires the component to have been added within the tick window.
pub struct Added<T: Component>(PhantomData<T>);

/// Requires the component to have changed within the tick window.
pub struct Changed<T: Component>(PhantomData<T>);

pub fn with<T: Component>() -> With<T> {
    With(PhantomData)
}

pub fn without<T: Component>() -> Without<T> {
    Without(PhantomData)
}

pub fn added<T: Component>() -> Added<T> {
    Added(PhantomData)
}

pub fn changed<T: Component>() -> Changed<T> {
    Changed(PhantomData)
}

impl<T: Component> EntityFilter for With<T> {
    fn describe(&self, meta: &mut QueryMeta) {
        let tag = component_tag_of::<T>();
        meta.signature.insert(tag);
        meta.backstage.insert(tag);
    }
}

impl<T: Component> EntityFilter for Without<T> {
    fn describe(&self, meta: &mut QueryMeta) {
        meta.excluded.insert(component_tag_of::<T>());
    }
}

impl<T: Component> EntityFilter for Added<T> {
    fn describe(&self, meta: &mut QueryMeta) {
        let tag = component_tag_of::<T>();
        meta.signature.insert(tag);
        meta.backstage.insert(tag);
        meta.added_filters.push(tag);
    }
}

impl<T: Component> EntityFilter for Changed<T> {
    fn describe(&self, meta: &mut QueryMeta) {
        let tag = component_tag_of::<T>();
        meta.signature.insert(tag);
        meta.backstage.insert(tag);
        meta.changed_filters.push(tag);
    }
}

/// Conjunction of two filters.
#[derive(Copy, Clone, Debug, Default)]
pub struct And<A, B> {
    a: A,
    b: B,
}

impl<A: EntityFilter, B: EntityFilter> EntityFilter for And<A, B> {
    fn describe(&self, meta: &mut QueryMeta) {
        self.a.describe(meta);
        self.b.describe(meta);
    }
}

macro_rules! impl_filter_plumbing {
    ( $name:ident ) => {
        impl<T: Component> Default for $name<T> {
            fn default() -> Self {
                $name(PhantomData)
            }
        }

        impl<T: Component> Clone for $name<T> {
            fn clone(&self) -> Self {
                $name(PhantomData)
            }
        }

        impl<T: Component> Copy for $name<T> {}

        impl<T: Component, Rhs: EntityFilter> ops::BitAnd<Rhs> for $name<T> {
            type Output = And<Self, Rhs>;

            fn bitand(self, rhs: Rhs) -> Self::Output {
                And { a: self, b: rhs }
            }
        }
    };
}

impl_filter_plumbing!(With);
impl_filter_plumbing!(Without);
impl_filter_plumbing!(Added);
impl_filter_plumbing!(Changed);

impl<A: EntityFilter, B: EntityFilter, Rhs: EntityFilter> ops::BitAnd<Rhs> for And<A, B> {
    type Output = And<Self, Rhs>;

    fn bitand(self, rhs: Rhs) -> Self::Output {
        And { a: self, b: rhs }
    }
}

impl<Rhs: EntityFilter> ops::BitAnd<Rhs> for Passthrough {
    type Output = And<Self, Rhs>;

    fn bitand(self, rhs: Rhs) -> Self::Output {
        And { a: self, b: rhs }
    }
}

impl<T: Component> ops::Not for With<T> {
    type Output = Without<T>;

    fn not(self) -> Self::Output {
        Without(PhantomData)
    }
}

impl<T: Component> ops::Not for Without<T> {
    type Output = With<T>;

    fn not(self) -> Self::Output {
        With(PhantomData)
    }
}
