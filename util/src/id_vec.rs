use std::marker::PhantomData;

/// Vec wrapper that uses typed indexes.
#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub struct IdVec<K, V> {
    vec: Vec<V>,
    _phantom: PhantomData<K>,
}

impl<K, V> Default for IdVec<K, V> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<K, V> IdVec<K, V> {
    /// Create a new `IdVec` backed by the given vec.
    fn new(vec: Vec<V>) -> Self {
        Self {
            vec,
            _phantom: PhantomData,
        }
    }

    /// Create a new `IdVec` with the given capacity.
    pub fn with_capacity(cap: usize) -> Self {
        Self::new(Vec::with_capacity(cap))
    }

    /// Get the current length
    #[inline]
    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// True if len == 0
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Iterate through immutable references to values
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.vec.iter()
    }
}

impl<K: From<usize>, V> IdVec<K, V> {
    /// Id that the next call to `push` will return.
    #[inline]
    pub fn next_id(&self) -> K {
        self.vec.len().into()
    }

    /// Push `v` into the underlying vec, and return an id that can be used to retrieve it later.
    #[inline]
    pub fn push(&mut self, v: V) -> K {
        let id = self.vec.len().into();
        self.vec.push(v);
        id
    }
}

impl<K: Into<usize>, V> IdVec<K, V> {
    /// Get the value with id `k`.
    #[inline]
    pub fn get(&self, k: K) -> &V {
        &self.vec[k.into()]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Id(usize);
    impl From<usize> for Id {
        fn from(v: usize) -> Self {
            Self(v)
        }
    }
    impl From<Id> for usize {
        fn from(id: Id) -> usize {
            id.0
        }
    }

    #[test]
    fn test_push_and_get() {
        let mut v: IdVec<Id, &str> = IdVec::with_capacity(2);
        assert_eq!(v.next_id(), Id(0));
        let a = v.push("a");
        let b = v.push("b");
        assert_eq!(*v.get(a), "a");
        assert_eq!(*v.get(b), "b");
        assert_eq!(v.iter().copied().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(v.next_id(), Id(2));
    }
}
