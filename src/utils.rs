use std::iter::{once, Chain, Once};
use std::slice;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

/// A list holding at least one element.
///
/// The first element is stored apart from the rest, so an empty value cannot be built in code.
/// Serialized as a plain JSON array; deserializing an empty array fails.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone> {
    first: T,
    rest: Vec<T>,
}

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(first: T) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    pub fn first(&self) -> &T {
        &self.first
    }

    pub fn push(&mut self, value: T) {
        self.rest.push(value)
    }

    pub fn iter(&self) -> Chain<Once<&T>, slice::Iter<'_, T>> {
        once(&self.first).chain(self.rest.iter())
    }

    pub fn into_vec(self) -> Vec<T> {
        once(self.first).chain(self.rest).collect()
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = Error;

    fn try_from(values: Vec<T>) -> Result<NonEmptyVec<T>, Error> {
        let mut values = values.into_iter();
        let Some(first) = values.next() else {
            bail!("expected at least one element")
        };
        Ok(NonEmptyVec {
            first,
            rest: values.collect(),
        })
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(values: NonEmptyVec<T>) -> Vec<T> {
        values.into_vec()
    }
}

impl<'a, T: Clone> IntoIterator for &'a NonEmptyVec<T> {
    type Item = &'a T;
    type IntoIter = Chain<Once<&'a T>, slice::Iter<'a, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
