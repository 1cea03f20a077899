/// Progress reporting for long-running collection. Frontends implement this
/// to surface status; every method defaults to a no-op.
pub trait Progress {
    /// Called once with the number of items, when known.
    fn begin(&mut self, _total: usize) {}

    /// Free-form status line.
    fn log(&mut self, _msg: &str) {}

    /// One item finished, successfully or not.
    fn item_done(&mut self, _id: &str) {}

    fn finish(&mut self) {}
}

pub struct NullProgress;
impl Progress for NullProgress {}
