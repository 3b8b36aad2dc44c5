// In-memory mirror of the remote engine's state.

mod cache;

pub(crate) use cache::StateCache;
