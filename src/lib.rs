//! This crate exposes an ordered map backed by a self-balancing Binary
//! Search Tree (an AVL tree).
//!
//! ## Binary Search Tree
//!
//! A Binary Search Tree is a data structure supporting operations to
//! insert, find, and delete stored records. BSTs are typically defined
//! recursively using the notion of a `Node`. A `Node` will typically store
//! some sort of value (the value that was inserted, for example) and will
//! sometimes have child `Node`s. The most important invariants of a BST are:
//!
//! 1. For every `Node` in a BST, all the `Node`s in its left subtree have a
//!    key less than its own key.
//! 2. For every `Node` in a BST, all the `Node`s in its right subtree have a
//!    key greater than its own key.
//!
//! Searching the tree takes `O(height)`, so everything hinges on keeping the
//! height close to `lg N`. A plain BST only manages that for lucky insertion
//! orders; feed it sorted input and it degenerates into a linked list. An
//! AVL tree adds a third invariant:
//!
//! 3. For every `Node`, the heights of its two subtrees differ by at most 1.
//!
//! After each insertion or removal, the nodes along the changed path are
//! re-examined and the occasional local "rotation" (an `O(1)` pointer
//! shuffle) restores the invariant. That bounds the height, and with it
//! every point operation, at `O(lg N)`.
//!
//! Each node here also keeps a non-owning pointer to its parent. That is
//! what lets the iterators walk to an in-order neighbor in amortized `O(1)`
//! without maintaining an explicit stack of ancestors.

#![deny(missing_docs, clippy::clone_on_ref_ptr)]

mod error;
pub mod iter;
pub mod map;
mod node;

#[cfg(test)]
pub(crate) mod test;

pub use error::Error;
pub use map::AvlMap;
