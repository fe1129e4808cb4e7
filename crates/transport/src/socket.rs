use std::io;
use std::task::Context;
use std::task::Poll;

/// A connected, non-blocking byte socket.
///
/// All methods take `&self` so one socket can be shared between a stream and
/// the background tasks that carry its begin/end operations. `try_*` never
/// block: they return [`io::ErrorKind::WouldBlock`] when the socket is not
/// ready, after which `poll_*_ready` registers the task for wakeup.
pub trait SocketIo: Send + Sync {
	fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;

	fn try_write(&self, buf: &[u8]) -> io::Result<usize>;

	fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;

	fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl SocketIo for tokio::net::TcpStream {
	fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
		tokio::net::TcpStream::try_read(self, buf)
	}

	fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
		tokio::net::TcpStream::try_write(self, buf)
	}

	fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		tokio::net::TcpStream::poll_read_ready(self, cx)
	}

	fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		tokio::net::TcpStream::poll_write_ready(self, cx)
	}
}

#[cfg(unix)]
impl SocketIo for tokio::net::UnixStream {
	fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
		tokio::net::UnixStream::try_read(self, buf)
	}

	fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
		tokio::net::UnixStream::try_write(self, buf)
	}

	fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		tokio::net::UnixStream::poll_read_ready(self, cx)
	}

	fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		tokio::net::UnixStream::poll_write_ready(self, cx)
	}
}

impl<T: SocketIo + ?Sized> SocketIo for std::sync::Arc<T> {
	fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
		(**self).try_read(buf)
	}

	fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
		(**self).try_write(buf)
	}

	fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		(**self).poll_read_ready(cx)
	}

	fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		(**self).poll_write_ready(cx)
	}
}
