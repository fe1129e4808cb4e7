//! Readers running over the transport stack give back every pooled buffer and
//! operation slot when decoding fails.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::task::Context;
use std::task::Poll;

use mempool::BufferPool;
use resp::AsyncResp3Reader;
use resp::Decode;
use resp::Resp3Reader;
use resp::RespError;
use resp::RespValue;
use rstest::rstest;
use transport::BufferedStream;
use transport::RawSocketStream;
use transport::SlotPool;
use transport::SocketIo;
use transport::StreamConfig;

/// Hands out `data` at most `chunk` bytes per read, then fails with `fault`,
/// or reports end of stream when there is no fault.
struct Faulting {
	data: Mutex<VecDeque<u8>>,
	chunk: usize,
	fault: Option<io::ErrorKind>,
}

impl SocketIo for Faulting {
	fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
		let mut data = self.data.lock().unwrap();
		if data.is_empty() {
			return match self.fault {
				Some(kind) => Err(io::Error::new(kind, "injected fault")),
				None => Ok(0),
			};
		}
		let n = buf.len().min(self.chunk).min(data.len());
		for (dst, src) in buf.iter_mut().zip(data.drain(..n)) {
			*dst = src;
		}
		Ok(n)
	}

	fn try_write(&self, _buf: &[u8]) -> io::Result<usize> {
		Err(io::ErrorKind::BrokenPipe.into())
	}

	fn poll_read_ready(&self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_write_ready(&self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}

fn stream(
	wire: &[u8],
	fault: Option<io::ErrorKind>,
	capacity: usize,
	pool: &BufferPool,
	slots: &SlotPool,
) -> BufferedStream<Faulting> {
	let socket = Faulting {
		data: Mutex::new(wire.iter().copied().collect()),
		chunk: 3,
		fault,
	};
	let config = StreamConfig {
		read_ahead_capacity: capacity,
		buffered: true,
	};
	BufferedStream::new(RawSocketStream::new(socket, slots.clone()), pool, config)
}

fn check(result: Result<RespValue, RespError>, fault: Option<io::ErrorKind>) {
	match (result, fault) {
		(Err(RespError::Io(e)), Some(kind)) => assert_eq!(e.kind(), kind),
		(Err(RespError::Protocol(_)), None) => {}
		(other, _) => panic!("unexpected outcome {:?} for fault {:?}", other, fault),
	}
}

#[rstest]
#[case(&b"$3\r\nfooXY\r\n"[..], None, 4)]
#[case(&b"*2\r\n$?\r\n;3\r\nab"[..], None, 64)]
#[case(&b"%1\r\n+k\r\n&oops\r\n"[..], None, 4096)]
#[case(&b"*2\r\n$10\r\nabc"[..], Some(io::ErrorKind::ConnectionReset), 4)]
#[case(&b"$?\r\n;4\r\nab"[..], Some(io::ErrorKind::ConnectionAborted), 4096)]
#[case(&b""[..], Some(io::ErrorKind::BrokenPipe), 64)]
fn test_blocking_reader_releases_on_fault(
	#[case] wire: &[u8],
	#[case] fault: Option<io::ErrorKind>,
	#[case] capacity: usize,
) {
	let pool = BufferPool::default();
	let slots = SlotPool::new();
	let mut reader = Resp3Reader::new(stream(wire, fault, capacity, &pool, &slots), pool.clone());
	check(reader.read_object(Decode::Raw), fault);
	assert_eq!(slots.stats().leased, 0);

	drop(reader);
	assert_eq!(pool.stats().outstanding(), 0);
	assert_eq!(slots.stats().leased, 0);
}

#[rstest]
#[case(&b"$3\r\nfooXY\r\n"[..], None, 4)]
#[case(&b"*2\r\n$?\r\n;3\r\nab"[..], None, 64)]
#[case(&b"%1\r\n+k\r\n&oops\r\n"[..], None, 4096)]
#[case(&b"*2\r\n$10\r\nabc"[..], Some(io::ErrorKind::ConnectionReset), 4)]
#[case(&b"$?\r\n;4\r\nab"[..], Some(io::ErrorKind::ConnectionAborted), 4096)]
#[case(&b""[..], Some(io::ErrorKind::BrokenPipe), 64)]
#[tokio::test]
async fn test_async_reader_releases_on_fault(
	#[case] wire: &[u8],
	#[case] fault: Option<io::ErrorKind>,
	#[case] capacity: usize,
) {
	let pool = BufferPool::default();
	let slots = SlotPool::new();
	let mut reader = AsyncResp3Reader::new(stream(wire, fault, capacity, &pool, &slots), pool.clone());
	check(reader.read_object(Decode::Raw).await, fault);
	assert_eq!(slots.stats().leased, 0);

	drop(reader);
	assert_eq!(pool.stats().outstanding(), 0);
	assert_eq!(slots.stats().leased, 0);
}

#[tokio::test]
async fn test_blob_chunk_releases_on_fault() {
	let pool = BufferPool::default();
	let slots = SlotPool::new();
	let wire = b"$8\r\nabcd";
	let mut reader = AsyncResp3Reader::new(
		stream(wire, Some(io::ErrorKind::ConnectionReset), 4, &pool, &slots),
		pool.clone(),
	);
	let mut out: Vec<u8> = Vec::new();
	match reader.read_blob_string_chunk(&mut out, 2).await {
		Err(RespError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
		other => panic!("expected io error, got {:?}", other),
	}
	assert_eq!(out, b"abcd");

	drop(reader);
	assert_eq!(pool.stats().outstanding(), 0);
	assert_eq!(slots.stats().leased, 0);
}
