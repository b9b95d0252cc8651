//! An ordered map backed by an AVL tree.
//!
//! # Examples
//!
//! ```
//! use avl_map::AvlMap;
//!
//! let mut map = AvlMap::new();
//!
//! // Nothing in here yet.
//! assert_eq!(map.get(&1), None);
//!
//! map.insert(1, 2);
//! assert_eq!(map.get(&1), Some(&2));
//!
//! // Inserting a new value for the same key overwrites the value
//! // and hands the old one back.
//! assert_eq!(map.insert(1, 3), Some(2));
//! assert_eq!(map.get(&1), Some(&3));
//!
//! // Removing a key returns its value.
//! assert_eq!(map.remove(&1), Some(3));
//! assert_eq!(map.get(&1), None);
//! ```

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ops::{Bound, Index, RangeBounds};
use std::ptr::NonNull;

use crate::error::Error;
use crate::iter::{IntoIter, Iter, IterMut, Keys, Range, Values, ValuesMut};
use crate::node::{Link, Node, NodePtr};

/// A self-balancing binary search tree (specifically, an AVL tree) storing
/// one value per key, ordered by the key's `Ord`.
///
/// Keys are unique: inserting under an existing key replaces the stored value
/// rather than adding a second entry. Every mutation leaves the tree
/// AVL-balanced, so point operations stay `O(log n)`.
///
/// Iteration order is ascending key order. The iterators walk the tree
/// through per-node parent pointers, so a full pass costs `O(n)` without any
/// auxiliary stack.
pub struct AvlMap<K, V> {
    // The root is a `Link` (nullable owning slot) so that nodes can hold
    // non-owning parent pointers back into the structure that owns them.
    root: Link<K, V>,
    len: usize,
}

impl<K, V> AvlMap<K, V> {
    /// Generates a new, empty map.
    pub fn new() -> Self {
        AvlMap {
            root: Link(None),
            len: 0,
        }
    }

    /// The number of entries in the map.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree: 0 for an empty map, 1 for a single entry.
    ///
    /// The AVL balancing keeps this logarithmic in [`len`](Self::len).
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// // Ascending inserts are the worst case for an unbalanced tree; the
    /// // rebalancing keeps the height at ⌈log2(n + 1)⌉ anyway.
    /// let map: AvlMap<_, _> = (1..=7).map(|k| (k, ())).collect();
    /// assert_eq!(map.height(), 3);
    /// ```
    pub fn height(&self) -> usize {
        self.root.root().map_or(0, |node| node.height)
    }

    /// Removes every entry, releasing all nodes.
    pub fn clear(&mut self) {
        self.root.take().free();
        self.len = 0;
    }

    /// Potentially finds the value associated with the given key. If no entry
    /// has the corresponding key, `None` is returned.
    ///
    /// The key may be any borrowed form of the map's key type.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut map = AvlMap::new();
    /// map.insert(String::from("one"), 1);
    ///
    /// assert_eq!(map.get("one"), Some(&1));
    /// assert_eq!(map.get("two"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        // SAFETY: the node is owned by `self`, so the reference lives as long
        // as the `&self` borrow.
        self.root
            .find(key)
            .0
            .map(|ptr| unsafe { &(*ptr.as_ptr()).value })
    }

    /// As [`get`](Self::get), but yields the stored key alongside the value.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.root
            .find(key)
            .0
            .map(|ptr| unsafe { (&(*ptr.as_ptr()).key, &(*ptr.as_ptr()).value) })
    }

    /// Potentially finds a mutable reference to the value associated with the
    /// given key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.root
            .find(key)
            .0
            .map(|ptr| unsafe { &mut (*ptr.as_ptr()).value })
    }

    /// Checked lookup: the value under `key`, or [`Error::KeyNotFound`].
    ///
    /// Use this instead of [`get`](Self::get) when an absent key is a
    /// caller-level error to propagate with `?` rather than an expected case.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::{AvlMap, Error};
    ///
    /// let mut map = AvlMap::new();
    /// map.insert(1, "one");
    ///
    /// assert_eq!(map.at(&1), Ok(&"one"));
    /// assert_eq!(map.at(&2), Err(Error::KeyNotFound));
    /// ```
    pub fn at<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Checked mutable lookup; see [`at`](Self::at).
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, Error>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Whether the map holds an entry for the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.root.find(key).0.is_some()
    }

    /// The value under `key`, inserting a default-constructed value first if
    /// the key is absent. Never fails; the insert-on-miss is the one way a
    /// read mutates the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut histogram: AvlMap<char, u32> = AvlMap::new();
    /// for letter in "banana".chars() {
    ///     *histogram.get_or_insert_default(letter) += 1;
    /// }
    ///
    /// assert_eq!(histogram.get(&'a'), Some(&3));
    /// assert_eq!(histogram.len(), 3);
    /// ```
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        K: Ord,
        V: Default,
    {
        // Explicit existence check first: a plain insert would clobber the
        // value already stored under `key`.
        if let Some(ptr) = self.root.find(&key).0 {
            return unsafe { &mut (*ptr.as_ptr()).value };
        }
        let (_, ptr) = self.root.insert(Link(None), key, V::default());
        self.len += 1;
        unsafe { &mut (*ptr.as_ptr()).value }
    }

    /// The smallest key and its value, or `None` for an empty map.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.root
            .leftmost()
            .0
            .map(|ptr| unsafe { (&(*ptr.as_ptr()).key, &(*ptr.as_ptr()).value) })
    }

    /// The largest key and its value, or `None` for an empty map.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.root
            .rightmost()
            .0
            .map(|ptr| unsafe { (&(*ptr.as_ptr()).key, &(*ptr.as_ptr()).value) })
    }

    /// Inserts the given value under the given key.
    ///
    /// For a fresh key the new node is linked in, the tree is rebalanced
    /// bottom-up along the insertion path, and `None` is returned. For an
    /// existing key the stored value is replaced and handed back as
    /// `Some(old)`; the tree structure does not change.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut map = AvlMap::new();
    ///
    /// assert_eq!(map.insert(1, "a"), None);
    /// assert_eq!(map.insert(1, "b"), Some("a"));
    /// assert_eq!(map.get(&1), Some(&"b"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V>
    where
        K: Ord,
    {
        let (old, _) = self.root.insert(Link(None), key, value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Removes the entry for the given key and returns its value. If the map
    /// does not contain the key, nothing happens.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let mut map = AvlMap::new();
    /// map.insert(1, 2);
    ///
    /// assert_eq!(map.remove(&1), Some(2));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// As [`remove`](Self::remove), but yields the stored key alongside the
    /// value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let removed = self.root.remove(key);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Removes and returns the entry with the smallest key, or `None` for an
    /// empty map.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        if self.root.0.is_none() {
            return None;
        }
        let pair = self.root.take_leftmost();
        self.len -= 1;
        Some(pair)
    }

    /// Removes and returns the entry with the largest key, or `None` for an
    /// empty map.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        if self.root.0.is_none() {
            return None;
        }
        let pair = self.root.take_rightmost();
        self.len -= 1;
        Some(pair)
    }

    /// Keeps only the entries for which the predicate returns `true`.
    ///
    /// Visits entries in ascending key order. Runs in `O(n log n)`: the map
    /// is drained and the surviving entries are reinserted.
    pub fn retain<F>(&mut self, mut f: F)
    where
        K: Ord,
        F: FnMut(&K, &mut V) -> bool,
    {
        let drained = mem::take(self);
        for (key, mut value) in drained {
            if f(&key, &mut value) {
                self.insert(key, value);
            }
        }
    }

    /// An iterator over the entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.leftmost(), self.root.rightmost(), self.len)
    }

    /// An iterator over the entries in ascending key order, with mutable
    /// references to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(self.root.leftmost(), self.root.rightmost(), self.len)
    }

    /// An iterator over the keys in ascending order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self.iter())
    }

    /// An iterator over the values, in ascending order of their keys.
    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self.iter())
    }

    /// An iterator over mutable references to the values, in ascending order
    /// of their keys.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut::new(self.iter_mut())
    }

    /// An iterator over the entries whose keys fall within `range`, in
    /// ascending key order.
    ///
    /// # Panics
    ///
    /// Panics if the range's start is greater than its end, or if both bounds
    /// exclude the same key.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let map = AvlMap::from([(1, "a"), (3, "b"), (5, "c"), (7, "d")]);
    /// let keys: Vec<_> = map.range(2..=5).map(|(k, _)| *k).collect();
    /// assert_eq!(keys, [3, 5]);
    /// ```
    pub fn range<Q, R>(&self, range: R) -> Range<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        match (range.start_bound(), range.end_bound()) {
            (Bound::Excluded(start), Bound::Excluded(end)) if start == end => {
                panic!("range start and end are equal and excluded in AvlMap")
            }
            (
                Bound::Included(start) | Bound::Excluded(start),
                Bound::Included(end) | Bound::Excluded(end),
            ) if start > end => {
                panic!("range start is greater than range end in AvlMap")
            }
            _ => {}
        }
        let front = match range.start_bound() {
            Bound::Unbounded => self.root.leftmost(),
            Bound::Included(key) => self.root.first_at_or_after(key),
            Bound::Excluded(key) => self.root.first_after(key),
        };
        let back = match range.end_bound() {
            Bound::Unbounded => self.root.rightmost(),
            Bound::Included(key) => self.root.last_at_or_before(key),
            Bound::Excluded(key) => self.root.last_before(key),
        };
        Range::new(front, back)
    }

    /// An iterator positioned at the first entry whose key is not less than
    /// `key`, running to the end of the map. Empty when no such entry exists.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let map = AvlMap::from([(10, "x"), (20, "y"), (30, "z")]);
    /// assert_eq!(map.lower_bound(&15).next(), Some((&20, &"y")));
    /// assert_eq!(map.lower_bound(&20).next(), Some((&20, &"y")));
    /// assert_eq!(map.lower_bound(&35).next(), None);
    /// ```
    pub fn lower_bound<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.range((Bound::Included(key), Bound::Unbounded))
    }

    /// An iterator positioned at the first entry whose key is strictly
    /// greater than `key`, running to the end of the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let map = AvlMap::from([(10, "x"), (20, "y"), (30, "z")]);
    /// assert_eq!(map.upper_bound(&20).next(), Some((&30, &"z")));
    /// ```
    pub fn upper_bound<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.range((Bound::Excluded(key), Bound::Unbounded))
    }

    /// The entries between [`lower_bound`](Self::lower_bound) and
    /// [`upper_bound`](Self::upper_bound) for `key`: the matching entry when
    /// the key is present, empty otherwise.
    pub fn equal_range<Q>(&self, key: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.range((Bound::Included(key), Bound::Included(key)))
    }

    /// Visits every entry in ascending key order (left, node, right) and
    /// returns the visitor, so state accumulated inside a `move` closure can
    /// be threaded through.
    ///
    /// # Examples
    ///
    /// ```
    /// use avl_map::AvlMap;
    ///
    /// let map = AvlMap::from([(5, ()), (3, ()), (8, ()), (1, ()), (4, ())]);
    /// let mut sum = 0;
    /// map.traverse_lnr(|key, _| sum += key);
    /// assert_eq!(sum, 21);
    /// ```
    pub fn traverse_lnr<F>(&self, mut visit: F) -> F
    where
        F: FnMut(&K, &V),
    {
        self.root.for_each_lnr(&mut visit);
        visit
    }

    /// Visits every entry in descending key order (right, node, left) and
    /// returns the visitor.
    pub fn traverse_rnl<F>(&self, mut visit: F) -> F
    where
        F: FnMut(&K, &V),
    {
        self.root.for_each_rnl(&mut visit);
        visit
    }

    /// Visits every entry in level order (breadth first, using an explicit
    /// queue of node pointers) and returns the visitor.
    pub fn traverse_breadth<F>(&self, mut visit: F) -> F
    where
        F: FnMut(&K, &V),
    {
        let mut queue = VecDeque::new();
        if let Some(root) = self.root.0 {
            queue.push_back(root);
        }
        while let Some(ptr) = queue.pop_front() {
            let node = unsafe { ptr.as_ref() };
            visit(&node.key, &node.value);
            if let Some(left) = node.left.0 {
                queue.push_back(left);
            }
            if let Some(right) = node.right.0 {
                queue.push_back(right);
            }
        }
        visit
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self)
    where
        K: Ord,
    {
        fn chk<K: Ord, V>(
            link: Link<K, V>,
            parent: Link<K, V>,
            min: Option<&K>,
            max: Option<&K>,
        ) -> (usize, usize) {
            let Some(ptr) = link.0 else {
                return (0, 0);
            };
            let node = unsafe { ptr.as_ref() };
            assert!(node.parent.0 == parent.0, "stale parent pointer");
            if let Some(min) = min {
                assert!(*min < node.key);
            }
            if let Some(max) = max {
                assert!(node.key < *max);
            }
            let (left_len, left_height) = chk(node.left, link, min, Some(&node.key));
            let (right_len, right_height) = chk(node.right, link, Some(&node.key), max);
            assert_eq!(node.height, left_height.max(right_height) + 1);
            assert!(left_height.abs_diff(right_height) <= 1);
            (left_len + right_len + 1, node.height)
        }

        let (len, _) = chk(self.root, Link(None), None, None);
        assert_eq!(len, self.len);
    }
}

// Search, insertion, and removal are expressed on the owning slots: each
// recursive call descends one slot and rebalances it on the way back out,
// which restores the AVL invariant bottom-up along the whole path of a
// structural change.
impl<K, V> Link<K, V> {
    fn find<Q>(self, key: &Q) -> Self
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut current = self;
        while let Some(ptr) = current.0 {
            let node = unsafe { ptr.as_ref() };
            current = match key.cmp(node.key.borrow()) {
                Ordering::Less => node.left,
                Ordering::Equal => break,
                Ordering::Greater => node.right,
            };
        }
        current
    }

    /// First node whose key is not less than `key`, or `Link(None)`.
    fn first_at_or_after<Q>(self, key: &Q) -> Self
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut current = self;
        let mut candidate = Link(None);
        while let Some(ptr) = current.0 {
            let node = unsafe { ptr.as_ref() };
            if node.key.borrow() < key {
                current = node.right;
            } else {
                candidate = current;
                current = node.left;
            }
        }
        candidate
    }

    /// First node whose key is strictly greater than `key`, or `Link(None)`.
    fn first_after<Q>(self, key: &Q) -> Self
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut current = self;
        let mut candidate = Link(None);
        while let Some(ptr) = current.0 {
            let node = unsafe { ptr.as_ref() };
            if node.key.borrow() <= key {
                current = node.right;
            } else {
                candidate = current;
                current = node.left;
            }
        }
        candidate
    }

    /// Last node whose key is not greater than `key`, or `Link(None)`.
    fn last_at_or_before<Q>(self, key: &Q) -> Self
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut current = self;
        let mut candidate = Link(None);
        while let Some(ptr) = current.0 {
            let node = unsafe { ptr.as_ref() };
            if key < node.key.borrow() {
                current = node.left;
            } else {
                candidate = current;
                current = node.right;
            }
        }
        candidate
    }

    /// Last node whose key is strictly less than `key`, or `Link(None)`.
    fn last_before<Q>(self, key: &Q) -> Self
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut current = self;
        let mut candidate = Link(None);
        while let Some(ptr) = current.0 {
            let node = unsafe { ptr.as_ref() };
            if key <= node.key.borrow() {
                current = node.left;
            } else {
                candidate = current;
                current = node.right;
            }
        }
        candidate
    }

    fn insert(&mut self, parent: Link<K, V>, key: K, value: V) -> (Option<V>, NodePtr<K, V>)
    where
        K: Ord,
    {
        let Some(mut node_ptr) = self.0 else {
            let mut node = Node::new_boxed(key, value);
            node.parent = parent;
            let ptr = NonNull::from(Box::leak(node));
            self.0 = Some(ptr);
            return (None, ptr);
        };
        let node = unsafe { node_ptr.as_mut() };
        let this = Link(Some(node_ptr));
        let (old, ptr) = match key.cmp(&node.key) {
            Ordering::Less => node.left.insert(this, key, value),
            Ordering::Equal => return (Some(mem::replace(&mut node.value, value)), node_ptr),
            Ordering::Greater => node.right.insert(this, key, value),
        };
        if old.is_none() {
            self.balance();
        }
        (old, ptr)
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ord = match self.root() {
            None => return None,
            Some(node) => key.cmp(node.key.borrow()),
        };
        let removed = match ord {
            Ordering::Less => {
                let node = self.root_mut().expect("non-empty slot");
                node.left.remove(key)
            }
            Ordering::Greater => {
                let node = self.root_mut().expect("non-empty slot");
                node.right.remove(key)
            }
            Ordering::Equal => Some(self.unlink_root()),
        };
        if removed.is_some() {
            self.balance();
        }
        removed
    }

    /// Detaches the node owned by this slot and returns its pair.
    ///
    /// With zero or one child the node is unlinked and the child (a leaf, by
    /// the AVL invariant) spliced into its place. With two children the
    /// node's payload is replaced by its in-order successor's, the leftmost
    /// of the right subtree, and that successor node is unlinked instead, so
    /// the structure around this slot stays put.
    fn unlink_root(&mut self) -> (K, V) {
        let node = self.root_mut().expect("unlink_root on an empty slot");
        if node.left.0.is_some() && node.right.0.is_some() {
            let (successor_key, successor_value) = node.right.take_leftmost();
            let key = mem::replace(&mut node.key, successor_key);
            let value = mem::replace(&mut node.value, successor_value);
            (key, value)
        } else {
            let ptr = self.0.take().expect("unlink_root on an empty slot");
            // SAFETY: the slot owned this node and has just released it, so
            // the box is the sole owner; the spliced child is re-parented
            // before anyone can observe it.
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            let child = if node.left.0.is_some() {
                node.left
            } else {
                node.right
            };
            *self = child;
            if let Some(child_node) = self.root_mut() {
                child_node.parent = node.parent;
            }
            (node.key, node.value)
        }
    }

    /// Unlinks the smallest node of this non-empty subtree and returns its
    /// pair, rebalancing every slot on the way back up.
    fn take_leftmost(&mut self) -> (K, V) {
        let has_left = self.root().map_or(false, |node| node.left.0.is_some());
        let pair = if has_left {
            let node = self.root_mut().expect("non-empty slot");
            node.left.take_leftmost()
        } else {
            let ptr = self.0.take().expect("take_leftmost on an empty subtree");
            // SAFETY: as in `unlink_root`; the leftmost node's right child is
            // a leaf or absent, so splicing it up cannot orphan anything.
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            *self = node.right;
            if let Some(child_node) = self.root_mut() {
                child_node.parent = node.parent;
            }
            (node.key, node.value)
        };
        self.balance();
        pair
    }

    /// Mirror of [`Link::take_leftmost`].
    fn take_rightmost(&mut self) -> (K, V) {
        let has_right = self.root().map_or(false, |node| node.right.0.is_some());
        let pair = if has_right {
            let node = self.root_mut().expect("non-empty slot");
            node.right.take_rightmost()
        } else {
            let ptr = self.0.take().expect("take_rightmost on an empty subtree");
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            *self = node.left;
            if let Some(child_node) = self.root_mut() {
                child_node.parent = node.parent;
            }
            (node.key, node.value)
        };
        self.balance();
        pair
    }

    fn for_each_lnr<F>(self, visit: &mut F)
    where
        F: FnMut(&K, &V),
    {
        if let Some(ptr) = self.0 {
            let node = unsafe { ptr.as_ref() };
            node.left.for_each_lnr(visit);
            visit(&node.key, &node.value);
            node.right.for_each_lnr(visit);
        }
    }

    fn for_each_rnl<F>(self, visit: &mut F)
    where
        F: FnMut(&K, &V),
    {
        if let Some(ptr) = self.0 {
            let node = unsafe { ptr.as_ref() };
            node.right.for_each_rnl(visit);
            visit(&node.key, &node.value);
            node.left.for_each_rnl(visit);
        }
    }
}

impl<K, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for AvlMap<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K: Clone, V: Clone> Clone for AvlMap<K, V> {
    fn clone(&self) -> Self {
        AvlMap {
            root: self.root.clone_subtree(Link(None)),
            len: self.len,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for AvlMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for AvlMap<K, V> {}

impl<K, Q, V> Index<&Q> for AvlMap<K, V>
where
    K: Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    type Output = V;

    /// As [`AvlMap::get`], but panics when the key is absent. Use
    /// [`AvlMap::at`] for a recoverable variant.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AvlMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlMap<K, V> {
    /// Inserts each pair in sequence; for duplicate keys the last value wins.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for AvlMap<K, V> {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> IntoIterator for AvlMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self)
    }
}

impl<'a, K, V> IntoIterator for &'a AvlMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut AvlMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}


#[cfg(test)]
mod quicktests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::test::quick::Op;

    /// Applies a set of operations to an `AvlMap` and a `BTreeMap`.
    /// This way we can ensure that after a random smattering of inserts
    /// and deletes both maps hold the same entries in the same order.
    fn do_ops<K, V>(ops: &[Op<K, V>], map: &mut AvlMap<K, V>, reference: &mut BTreeMap<K, V>)
    where
        K: Ord + Clone,
        V: PartialEq + Clone + std::fmt::Debug,
    {
        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    assert_eq!(
                        map.insert(k.clone(), v.clone()),
                        reference.insert(k.clone(), v.clone())
                    );
                }
                Op::Remove(k) => {
                    assert_eq!(map.remove(k), reference.remove(k));
                }
                Op::Iter => {
                    assert!(map.iter().eq(reference.iter()));
                }
            }
            map.check_consistency();
            assert_eq!(map.len(), reference.len());
        }
    }

    quickcheck::quickcheck! {
        fn fuzz_multiple_operations_i8(ops: Vec<Op<i8, i8>>) -> bool {
            let mut map = AvlMap::new();
            let mut reference = BTreeMap::new();

            do_ops(&ops, &mut map, &mut reference);
            reference.keys().all(|key| map.get(key) == reference.get(key))
        }
    }

    quickcheck::quickcheck! {
        fn contains(xs: Vec<i8>) -> bool {
            let mut map = AvlMap::new();
            for x in &xs {
                map.insert(*x, *x);
            }

            xs.iter().all(|x| map.get(x) == Some(x))
        }
    }

    quickcheck::quickcheck! {
        fn iteration_is_strictly_ascending(xs: Vec<i16>) -> bool {
            let mut map = AvlMap::new();
            for x in &xs {
                map.insert(*x, ());
            }

            let keys: Vec<_> = map.keys().copied().collect();
            keys.len() == map.len() && keys.windows(2).all(|w| w[0] < w[1])
        }
    }

    quickcheck::quickcheck! {
        fn bounds_match_btree(xs: Vec<i8>, probes: Vec<i8>) -> bool {
            let mut map = AvlMap::new();
            let mut reference = BTreeMap::new();
            for x in &xs {
                map.insert(*x, *x);
                reference.insert(*x, *x);
            }

            probes.iter().all(|p| {
                let excluded = (std::ops::Bound::Excluded(*p), std::ops::Bound::Unbounded);
                map.lower_bound(p).next() == reference.range(*p..).next()
                    && map.upper_bound(p).next() == reference.range(excluded).next()
            })
        }
    }

    quickcheck::quickcheck! {
        fn pop_first_drains_in_ascending_order(xs: Vec<i8>) -> bool {
            let mut map = AvlMap::new();
            for x in &xs {
                map.insert(*x, ());
            }

            let mut previous = None;
            while let Some((key, ())) = map.pop_first() {
                if previous.map_or(false, |p| p >= key) {
                    return false;
                }
                previous = Some(key);
            }
            map.is_empty()
        }
    }
}
