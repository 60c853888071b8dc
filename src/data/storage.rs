//! Pluggable backing buffers for field samples.
//!
//! A field keeps all of its samples in one flat buffer; sample `i` of a
//! field with `k` components lives at `[i * k .. (i + 1) * k)`. This trait
//! abstracts the buffer so a field can be backed by something other than a
//! `Vec` (pinned or shared memory handed to a transport) without touching
//! the Data Store API.

use core::fmt::{self, Debug};

use crate::coupling_error::CouplingError;

/// Contiguous, indexable storage for `V` with slice access.
pub trait Storage<V>: Debug {
    /// Buffer of `len` elements, all equal to `fill`.
    fn with_len(len: usize, fill: V) -> Self
    where
        V: Clone;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `new_len`, filling new cells with `fill`.
    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone;

    fn as_slice(&self) -> &[V];

    fn as_mut_slice(&mut self) -> &mut [V];

    /// Copy `src` into `[offset .. offset + src.len())`.
    fn write_at(&mut self, offset: usize, src: &[V]) -> Result<(), CouplingError>
    where
        V: Clone,
    {
        let len = self.len();
        let dst = offset
            .checked_add(src.len())
            .and_then(|end| self.as_mut_slice().get_mut(offset..end))
            .ok_or(CouplingError::BlockLengthMismatch {
                expected: len.saturating_sub(offset),
                found: src.len(),
            })?;
        dst.clone_from_slice(src);
        Ok(())
    }

    /// Copy `[offset .. offset + dst.len())` into `dst`.
    fn read_into(&self, offset: usize, dst: &mut [V]) -> Result<(), CouplingError>
    where
        V: Clone,
    {
        let src = offset
            .checked_add(dst.len())
            .and_then(|end| self.as_slice().get(offset..end))
            .ok_or(CouplingError::BlockLengthMismatch {
                expected: self.len().saturating_sub(offset),
                found: dst.len(),
            })?;
        dst.clone_from_slice(src);
        Ok(())
    }
}

/// `Vec`-backed storage (default).
#[derive(Clone, PartialEq)]
pub struct VecStorage<V>(pub(crate) Vec<V>);

impl<V> Debug for VecStorage<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VecStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl<V> Default for VecStorage<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Storage<V> for VecStorage<V> {
    fn with_len(len: usize, fill: V) -> Self
    where
        V: Clone,
    {
        Self(vec![fill; len])
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn resize(&mut self, new_len: usize, fill: V)
    where
        V: Clone,
    {
        self.0.resize(new_len, fill);
    }

    fn as_slice(&self) -> &[V] {
        &self.0
    }

    fn as_mut_slice(&mut self) -> &mut [V] {
        &mut self.0
    }
}

impl<V> From<Vec<V>> for VecStorage<V> {
    fn from(v: Vec<V>) -> Self {
        Self(v)
    }
}
