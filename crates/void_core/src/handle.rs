//! Type-safe handles into a stable pool
//!
//! A [`Pool`] stores values that never move and are never removed, so a
//! [`Handle`] stays valid as long as the pool lives. Handles keep a
//! generation field so foreign handles are rejected.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A type-safe handle to a value of type `T` stored in a [`Pool`]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Create a handle from raw parts
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Create an invalid/null handle
    #[inline]
    pub const fn null() -> Self {
        Self::new(u32::MAX, 0)
    }

    /// Check if this handle is null
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.index == u32::MAX
    }

    /// Slot index
    #[inline]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at the time the handle was issued
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

// Manual trait implementations to avoid T bounds
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        if self.is_null() {
            write!(f, "Handle<{}>(null)", short)
        } else {
            write!(f, "Handle<{}>({}v{})", short, self.index, self.generation)
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Append-only storage addressed by handles.
///
/// Values never move once inserted and are never removed, so a handle stays
/// valid for the lifetime of the pool.
pub struct Pool<T> {
    values: Vec<T>,
}

impl<T> Pool<T> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Insert a value and get a handle to it
    pub fn insert(&mut self, value: T) -> Handle<T> {
        let index = self.values.len() as u32;
        assert!(index != u32::MAX, "handle pool exhausted");
        self.values.push(value);
        Handle::new(index, 0)
    }

    /// Get a reference to a value by its handle
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        if handle.generation != 0 {
            return None;
        }
        self.values.get(handle.index as usize)
    }

    /// Get a mutable reference to a value by its handle
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        if handle.generation != 0 {
            return None;
        }
        self.values.get_mut(handle.index as usize)
    }

    /// Check if a handle points at a value of this pool
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all handles and values in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (Handle::new(i as u32, 0), v))
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Indexing with a handle that was never issued by this pool is a
/// programming error and panics.
impl<T> Index<Handle<T>> for Pool<T> {
    type Output = T;

    fn index(&self, handle: Handle<T>) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("foreign handle {:?}", handle),
        }
    }
}

impl<T> IndexMut<Handle<T>> for Pool<T> {
    fn index_mut(&mut self, handle: Handle<T>) -> &mut T {
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("foreign handle {:?}", handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut pool: Pool<String> = Pool::new();
        let h1 = pool.insert("hello".to_string());
        let h2 = pool.insert("world".to_string());

        assert_ne!(h1, h2);
        assert_eq!(pool.get(h1).map(String::as_str), Some("hello"));
        assert_eq!(pool[h2], "world");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_handles_stay_valid() {
        let mut pool: Pool<i32> = Pool::new();
        let first = pool.insert(1);
        for i in 2..100 {
            pool.insert(i);
        }
        assert_eq!(pool[first], 1);
        assert!(pool.contains(first));
        assert!(!pool.contains(Handle::new(100, 0)));
        assert!(!pool.contains(Handle::new(0, 1)));

        let values: Vec<i32> = pool.iter().take(3).map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    #[should_panic]
    fn test_index_null_handle_panics() {
        let pool: Pool<u8> = Pool::new();
        let _ = pool[Handle::null()];
    }
}
