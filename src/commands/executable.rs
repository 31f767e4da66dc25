use crate::frame::Frame;
use crate::store::Store;

pub trait Executable {
    /// Runs the command against the store and builds the reply. Arguments were validated while
    /// parsing, so execution itself can't fail.
    fn exec(self, store: Store) -> Frame;
}
