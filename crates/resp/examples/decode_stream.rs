use std::io;
use std::io::Read;

use mempool::BufferPool;
use resp::Decode;
use resp::Resp3Reader;
use resp::RespError;

/// Hands out the wire one small fragment at a time, like a slow socket.
struct Fragmented {
	chunks: Vec<&'static [u8]>,
	current: &'static [u8],
}

impl Read for Fragmented {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		while self.current.is_empty() {
			if self.chunks.is_empty() {
				return Ok(0);
			}
			self.current = self.chunks.remove(0);
		}
		let n = self.current.len().min(buf.len());
		buf[..n].copy_from_slice(&self.current[..n]);
		self.current = &self.current[n..];
		Ok(n)
	}
}

fn main() {
	println!("--- RESP3 Stream Decode Example ---");

	let stream = Fragmented {
		chunks: vec![
			b"+O".as_slice(),
			b"K\r\n:1".as_slice(),
			b"00".as_slice(),
			b"0\r\n*2\r\n$3\r\nSE".as_slice(),
			b"T\r\n$3\r\nk".as_slice(),
			b"ey\r\n%?\r\n+ver\r\n:3\r\n.".as_slice(),
			b"\r\n$?\r\n;3\r\nabc\r\n;0\r\n".as_slice(),
		],
		current: b"",
	};

	let pool = BufferPool::default();
	let mut reader = Resp3Reader::new(stream, pool.clone());
	loop {
		match reader.read_object(Decode::Utf8) {
			Ok(value) => println!("[{:?}]\n{}", value.message_type(), value),
			Err(RespError::ConnectionClosed) => {
				println!("\n[Stream] closed");
				break;
			}
			Err(e) => {
				println!("\n[Reader] error: {}", e);
				break;
			}
		}
	}
	println!("Outstanding pooled buffers: {}", pool.stats().outstanding());
}
