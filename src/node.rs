//! Node, link, and rotation primitives shared by the map and its iterators.
//!
//! A [`Link`] is a nullable owning slot: the map's root slot and every node's
//! `left`/`right` field are links, and the node behind a link is owned by
//! exactly that slot. `parent` pointers are non-owning copies of the owning
//! slot's node, used for upward traversal by the iterators.

use std::ptr::NonNull;

pub(crate) type NodePtr<K, V> = NonNull<Node<K, V>>;

/// One stored key/value pair plus its structural links.
///
/// `Node` deliberately has no `Drop` impl: subtrees are released by
/// [`Link::free`], and removal detaches a node first so its `Box` can be
/// destructured into the owned key and value.
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
    /// Height of the subtree rooted at this node. A leaf has height 1 and a
    /// missing child counts as 0.
    pub(crate) height: usize,
    /// Non-owning back-reference; `Link(None)` for the root node.
    pub(crate) parent: Link<K, V>,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new_boxed(key: K, value: V) -> Box<Self> {
        Box::new(Node {
            key,
            value,
            left: Link(None),
            right: Link(None),
            height: 1,
            parent: Link(None),
        })
    }

    pub(crate) fn left(&self) -> Option<&Self> {
        self.left.root()
    }

    pub(crate) fn right(&self) -> Option<&Self> {
        self.right.root()
    }

    pub(crate) fn fix_left_child_parent(&mut self) {
        let self_ptr = NonNull::from(&*self);
        if let Some(left) = self.left.root_mut() {
            left.parent = Link(Some(self_ptr));
        }
    }

    pub(crate) fn fix_right_child_parent(&mut self) {
        let self_ptr = NonNull::from(&*self);
        if let Some(right) = self.right.root_mut() {
            right.parent = Link(Some(self_ptr));
        }
    }

    /// Adjusts the height of `self` to be the max of its children's heights + 1.
    pub(crate) fn fix_height(&mut self) {
        let left_height = self.left().map_or(0, |n| n.height);
        let right_height = self.right().map_or(0, |n| n.height);
        self.height = left_height.max(right_height) + 1;
    }

    /// The difference in height between the right and left subtrees. See [the
    /// Wikipedia page][wiki] for more details.
    ///
    /// [wiki]: https://en.wikipedia.org/wiki/AVL_tree#Balance_factor
    pub(crate) fn balance_factor(&self) -> isize {
        let left_height = self.left().map_or(0, |n| n.height);
        let right_height = self.right().map_or(0, |n| n.height);
        right_height as isize - left_height as isize
    }
}

/// A nullable owning slot holding a whole subtree.
pub(crate) struct Link<K, V>(pub(crate) Option<NodePtr<K, V>>);

impl<K, V> Clone for Link<K, V> {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}
impl<K, V> Copy for Link<K, V> {}

impl<K, V> Link<K, V> {
    /// The node at the root of the subtree owned by this link.
    ///
    /// SAFETY: a non-`None` link always points at a live `Node`. Because we
    /// take `&self` here, there can be no aliasing with `root_mut`; aliasing
    /// through a copied raw pointer is the caller's responsibility, as with
    /// any raw-pointer dereference in this crate.
    pub(crate) fn root(&self) -> Option<&Node<K, V>> {
        unsafe { self.0.as_ref().map(|ptr| ptr.as_ref()) }
    }

    pub(crate) fn root_mut(&mut self) -> Option<&mut Node<K, V>> {
        unsafe { self.0.as_mut().map(|ptr| ptr.as_mut()) }
    }

    pub(crate) fn take(&mut self) -> Self {
        Link(self.0.take())
    }

    /// Restores the AVL invariant at this slot after a child subtree changed
    /// height by at most one.
    ///
    /// Recomputes the root's height and applies the single or double rotation
    /// dictated by the balance factors. Callers balance every slot along the
    /// path of a structural change on the way back out of the recursion; one
    /// call per slot is enough because a single insert or removal shifts each
    /// ancestor's balance by at most one.
    ///
    /// See https://en.wikipedia.org/wiki/AVL_tree#Rebalancing for terminology.
    pub(crate) fn balance(&mut self) {
        let Some(root) = self.root_mut() else {
            return;
        };
        root.fix_height();
        match (root.balance_factor(), root.left(), root.right()) {
            (-2, Some(left), _) => match left.balance_factor() {
                n if n <= 0 => self.rotate_right(),
                _ => self.rotate_left_right(),
            },
            (2, _, Some(right)) => match right.balance_factor() {
                n if n >= 0 => self.rotate_left(),
                _ => self.rotate_right_left(),
            },
            _ => {}
        }

        if cfg!(debug_assertions) {
            let Some(root) = self.root() else {
                return;
            };
            let left_height = root.left().map_or(0, |n| n.height);
            let right_height = root.right().map_or(0, |n| n.height);
            assert_eq!(root.height, left_height.max(right_height) + 1);
            assert!(left_height.abs_diff(right_height) <= 1);
        }
    }

    /// Rotate self to the right. This moves the left child up vertically and
    /// self down vertically. Used to rebalance the tree when the left child is
    /// too tall. As such, it must only be called when there _is_ a left child.
    ///
    /// ## Panics
    ///
    /// When called on a slot without a left child.
    ///
    /// # Diagram
    ///
    /// Roughly speaking, we want to perform this transformation:
    ///
    /// ```text
    ///    Option<parent>            Option<parent>
    ///      /                         /
    ///   old_root (i.e. "self")    new_root
    ///    /     \                  /     \
    /// new_root  z     rotate ->  x    old_root
    ///  / \                               /  \
    /// x   y                             y    z
    /// ```
    fn rotate_right(&mut self) {
        let mut old_root = self.take();
        let old_root = old_root.root_mut().expect("cannot rotate an empty subtree");

        let mut new_root = old_root.left.take();
        let new_root = new_root
            .root_mut()
            .expect("right rotation requires a left child");

        let old_parent = old_root.parent;
        let old_right = new_root.right.take();

        // NB we can skip `fix_right_child_parent` on `new_root` because we
        // re-link `old_root` by hand below.
        old_root.parent = Link(Some(new_root.into()));
        old_root.left = old_right;
        old_root.fix_left_child_parent();
        old_root.fix_height();

        new_root.parent = old_parent;
        new_root.right = Link(Some(old_root.into()));
        new_root.fix_height();
        self.0 = Some(new_root.into());
    }

    /// Mirror image of [`Link::rotate_right`]: moves the right child up and
    /// self down. Must only be called when there is a right child.
    fn rotate_left(&mut self) {
        let mut old_root = self.take();
        let old_root = old_root.root_mut().expect("cannot rotate an empty subtree");

        let mut new_root = old_root.right.take();
        let new_root = new_root
            .root_mut()
            .expect("left rotation requires a right child");

        let old_parent = old_root.parent;
        let old_left = new_root.left.take();

        old_root.parent = Link(Some(new_root.into()));
        old_root.right = old_left;
        old_root.fix_right_child_parent();
        old_root.fix_height();

        new_root.parent = old_parent;
        new_root.left = Link(Some(old_root.into()));
        new_root.fix_height();
        self.0 = Some(new_root.into());
    }

    fn rotate_right_left(&mut self) {
        self.root_mut()
            .expect("rotating a subtree requires a root")
            .right
            .rotate_right();
        self.rotate_left();
    }

    fn rotate_left_right(&mut self) {
        self.root_mut()
            .expect("rotating a subtree requires a root")
            .left
            .rotate_left();
        self.rotate_right();
    }

    // The four navigation walks below read link fields through raw places
    // rather than `&Node` references: the iterators call them while borrows
    // of other nodes' values may still be live, and a whole-node reference
    // would overlap those borrows.

    /// Leftmost (smallest-key) node of this subtree, or `Link(None)` when the
    /// subtree is empty.
    pub(crate) fn leftmost(self) -> Self {
        let mut current = self;
        while let Some(ptr) = current.0 {
            let left = unsafe { (*ptr.as_ptr()).left };
            if left.0.is_none() {
                break;
            }
            current = left;
        }
        current
    }

    /// Rightmost (largest-key) node of this subtree, or `Link(None)` when the
    /// subtree is empty.
    pub(crate) fn rightmost(self) -> Self {
        let mut current = self;
        while let Some(ptr) = current.0 {
            let right = unsafe { (*ptr.as_ptr()).right };
            if right.0.is_none() {
                break;
            }
            current = right;
        }
        current
    }

    /// The in-order successor of the node behind this link.
    ///
    /// Standard rule: the leftmost node of the right subtree if there is one,
    /// otherwise the first ancestor that is reached from its left child.
    pub(crate) fn successor(self) -> Self {
        let Some(ptr) = self.0 else {
            return Link(None);
        };
        let right = unsafe { (*ptr.as_ptr()).right };
        if right.0.is_some() {
            return right.leftmost();
        }
        let mut child = ptr;
        let mut parent = unsafe { (*ptr.as_ptr()).parent };
        while let Some(parent_ptr) = parent.0 {
            let parent_left = unsafe { (*parent_ptr.as_ptr()).left };
            if parent_left.0 == Some(child) {
                return parent;
            }
            child = parent_ptr;
            parent = unsafe { (*parent_ptr.as_ptr()).parent };
        }
        Link(None)
    }

    /// The in-order predecessor of the node behind this link; mirror of
    /// [`Link::successor`].
    pub(crate) fn predecessor(self) -> Self {
        let Some(ptr) = self.0 else {
            return Link(None);
        };
        let left = unsafe { (*ptr.as_ptr()).left };
        if left.0.is_some() {
            return left.rightmost();
        }
        let mut child = ptr;
        let mut parent = unsafe { (*ptr.as_ptr()).parent };
        while let Some(parent_ptr) = parent.0 {
            let parent_right = unsafe { (*parent_ptr.as_ptr()).right };
            if parent_right.0 == Some(child) {
                return parent;
            }
            child = parent_ptr;
            parent = unsafe { (*parent_ptr.as_ptr()).parent };
        }
        Link(None)
    }

    /// Releases every node in this subtree, children before parent.
    pub(crate) fn free(self) {
        if let Some(ptr) = self.0 {
            // SAFETY: links own their subtrees, so each node is boxed exactly
            // once; the children are freed before the box (and with it the
            // key and value) is dropped.
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            node.left.free();
            node.right.free();
        }
    }

    /// Deep-copies this subtree, preserving per-node heights and rebuilding
    /// parent links against the copy.
    ///
    /// If a key or value clone panics partway through, every node copied so
    /// far is freed before the panic continues to propagate.
    pub(crate) fn clone_subtree(self, parent: Link<K, V>) -> Self
    where
        K: Clone,
        V: Clone,
    {
        struct FreeOnPanic<K, V>(Link<K, V>);
        impl<K, V> Drop for FreeOnPanic<K, V> {
            fn drop(&mut self) {
                self.0.free();
            }
        }

        let Some(ptr) = self.0 else {
            return Link(None);
        };
        let node = unsafe { ptr.as_ref() };

        let mut copy = Node::new_boxed(node.key.clone(), node.value.clone());
        copy.height = node.height;
        copy.parent = parent;
        let copy_ptr = NonNull::from(Box::leak(copy));
        let copy_link = Link(Some(copy_ptr));

        let guard = FreeOnPanic(copy_link);
        unsafe {
            (*copy_ptr.as_ptr()).left = node.left.clone_subtree(copy_link);
            (*copy_ptr.as_ptr()).right = node.right.clone_subtree(copy_link);
        }
        std::mem::forget(guard);
        copy_link
    }
}
