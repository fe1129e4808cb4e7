//! # transport - socket plumbing under the RESP reader
//!
//! Layers, leaves first:
//!
//! - [`Completion`]: single-use result slot for one socket operation, usable
//!   as a blocking wait, a future, or a callback.
//! - [`SlotPool`]: shared pool of reusable operation descriptors. Each read or
//!   write leases one and gives it back on every exit path.
//! - [`RawSocketStream`]: issues reads and writes against a [`SocketIo`]
//!   through leased slots, in suspending, blocking and begin/end flavours.
//! - [`BufferedStream`]: read-ahead buffer over the raw stream so that many
//!   small protocol reads cost one socket read. Writes pass straight through.
//!
//! ## Example
//!
//! ```no_run
//! use mempool::BufferPool;
//! use transport::{BufferedStream, RawSocketStream, SlotPool, StreamConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let slots = SlotPool::new();
//! let buffers = BufferPool::default();
//! let socket = tokio::net::TcpStream::connect("127.0.0.1:6379").await?;
//! let raw = RawSocketStream::new(socket, slots);
//! let mut stream = BufferedStream::new(raw, &buffers, StreamConfig::default());
//! stream.write_all(b"*1\r\n$4\r\nPING\r\n").await?;
//! let mut reply = [0u8; 7];
//! let n = stream.read(&mut reply).await?;
//! # let _ = n;
//! # Ok(())
//! # }
//! ```

mod buffered;
mod completion;
mod config;
mod error;
mod raw;
mod slot;
mod socket;

pub use buffered::BufferedStream;
pub use completion::Completer;
pub use completion::Completion;
pub use completion::CompletionState;
pub use config::StreamConfig;
pub use error::Operation;
pub use error::TransportError;
pub use raw::RawSocketStream;
pub use raw::ReadDone;
pub use raw::SYNC_COMPLETION_BUDGET;
pub use slot::LeasedSlot;
pub use slot::OperationSlot;
pub use slot::SlotPool;
pub use slot::SlotPoolStats;
pub use slot::Transfer;
pub use socket::SocketIo;
