//! # mempool - reusable memory for the wire layers
//!
//! A process-wide pool of byte buffers, growable byte accumulators and text
//! builders. The pool is an explicit handle rather than a global: create one
//! at startup, clone it into every connection, and tests can build isolated
//! pools to count leaks.
//!
//! Every checkout is a guard that puts the item back when dropped, so the
//! return happens on success, on `?` propagation and while unwinding.
//!
//! ## Example
//!
//! ```rust
//! use mempool::BufferPool;
//!
//! let pool = BufferPool::default();
//! {
//!     let mut buf = pool.checkout_buffer(1000);
//!     assert!(buf.len() >= 1000);
//!     buf[0] = b'*';
//! }
//! assert_eq!(pool.stats().outstanding(), 0);
//! ```

mod guard;
mod pool;

pub use guard::PooledAccumulator;
pub use guard::PooledBuffer;
pub use guard::PooledText;
pub use pool::BufferPool;
pub use pool::BufferPoolConfig;
pub use pool::PoolStats;
