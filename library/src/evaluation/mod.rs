//! Network evaluation: scheduling, kernel contexts, and background work.
//!
//! A single evaluation pass executes processors sequentially in
//! topological order. Graph mutation and invalidation state are shared
//! mutable state with no per-node isolation, so the pass itself is
//! single-threaded; individual kernels may offload to a worker thread
//! through `background::BackgroundCompute`, publishing results only from
//! the evaluation thread.

pub mod background;
pub mod context;
pub mod evaluator;
