/// Sink that map and reduce functions yield their records into.
///
/// Records are moved into the sink, so nothing emitted can alias state the
/// caller keeps mutating.
pub trait Emit<T> {
    fn emit(&mut self, item: T);
}

impl<T> Emit<T> for Vec<T> {
    fn emit(&mut self, item: T) {
        self.push(item)
    }
}
