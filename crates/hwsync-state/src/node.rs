//! Publish bookkeeping shared by all interior state-tree nodes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Publish flag carried by every interior node of the state tree.
///
/// A node starts out writable; once its tree is published the flag is set and
/// every mutator must refuse to run. The flag is deliberately excluded from
/// value identity: two trees with the same forwarding content are equal
/// regardless of publication, so `PartialEq` always returns true and `Clone`
/// yields a fresh, writable flag.
#[derive(Debug, Default)]
pub struct Published(AtomicBool);

impl Published {
    pub fn new() -> Self {
        Published(AtomicBool::new(false))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Fails fast on an attempt to mutate a published node.
    pub fn assert_writable(&self, node: &str) {
        assert!(
            !self.get(),
            "attempted to mutate published {} node; clone or modify() it first",
            node
        );
    }
}

impl Clone for Published {
    fn clone(&self) -> Self {
        Published::new()
    }
}

impl PartialEq for Published {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for Published {}

/// Implemented by every interior node so the generic copy-on-write detach
/// below can consult its publish flag.
pub(crate) trait StateNode: Clone {
    fn publish_flag(&self) -> &Published;
}

/// Detaches `arc` for writing: if the node is published, or shared with
/// another tree version, it is replaced by a writable clone. Returns a
/// mutable reference into the (now uniquely held) node.
pub(crate) fn cow_detach<T: StateNode>(arc: &mut Arc<T>) -> &mut T {
    if arc.publish_flag().get() || Arc::strong_count(arc) > 1 {
        *arc = Arc::new(T::clone(arc));
    }
    Arc::get_mut(arc).expect("detached state node must be uniquely held")
}
