//! Decoding behaviour shared by the blocking and async readers.

use std::io;
use std::io::Read;

use mempool::BufferPool;
use resp::AUTH_REQUIRED;
use resp::AsyncResp3Reader;
use resp::Decode;
use resp::MessageType;
use resp::ParseError;
use resp::ReaderOptions;
use resp::Resp3Reader;
use resp::RespEncoder;
use resp::RespError;
use resp::RespValue;
use rstest::rstest;

fn blocking(wire: &[u8]) -> Result<RespValue, RespError> {
	Resp3Reader::new(wire, BufferPool::default()).read_object(Decode::Utf8)
}

async fn suspending(wire: &[u8]) -> Result<RespValue, RespError> {
	AsyncResp3Reader::new(wire, BufferPool::default())
		.read_object(Decode::Utf8)
		.await
}

#[test]
fn test_streamed_blob_string() {
	let wire = b"$?\r\n;4\r\nhell\r\n;1\r\no\r\n;0\r\n";
	assert_eq!(blocking(wire).unwrap(), RespValue::blob("hello"));
}

#[test]
fn test_single_null_element_is_empty() {
	assert_eq!(blocking(b"*1\r\n_\r\n").unwrap(), RespValue::Array(vec![]));
	assert_eq!(blocking(b"*1\r\n$-1\r\n").unwrap(), RespValue::Array(vec![]));
}

#[rstest]
#[case(&b"$-1\r\n"[..], MessageType::BlobString)]
#[case(&b"!-1\r\n"[..], MessageType::BlobError)]
#[case(&b"*-1\r\n"[..], MessageType::Array)]
#[case(&b"%-1\r\n"[..], MessageType::Map)]
#[case(&b"_\r\n"[..], MessageType::Null)]
#[tokio::test]
async fn test_null_keeps_wire_type(#[case] wire: &[u8], #[case] kind: MessageType) {
	for value in [blocking(wire).unwrap(), suspending(wire).await.unwrap()] {
		assert!(value.is_null());
		assert_eq!(value.message_type(), kind);
		assert_eq!(value.encode().unwrap(), wire);
	}
}

#[test]
fn test_map_alternates_keys_and_values() {
	let value = blocking(b"%2\r\n+a\r\n:1\r\n+b\r\n:2\r\n").unwrap();
	assert_eq!(
		value,
		RespValue::Map(vec![
			RespValue::simple_string("a"),
			RespValue::Number(1),
			RespValue::simple_string("b"),
			RespValue::Number(2),
		])
	);
	let keys: Vec<_> = value
		.map_pairs()
		.unwrap()
		.map(|(k, _)| k.as_str().unwrap().to_string())
		.collect();
	assert_eq!(keys, ["a", "b"]);
}

#[test]
fn test_streamed_array() {
	assert_eq!(
		blocking(b"*?\r\n:1\r\n:2\r\n.\r\n").unwrap(),
		RespValue::Array(vec![RespValue::Number(1), RespValue::Number(2)])
	);
}

#[test]
fn test_streamed_array_ended_by_eof() {
	assert_eq!(
		blocking(b"*?\r\n:1\r\n").unwrap(),
		RespValue::Array(vec![RespValue::Number(1)])
	);
}

#[test]
fn test_auth_required() {
	let wire = format!("-{}\r\n", AUTH_REQUIRED);
	match blocking(wire.as_bytes()) {
		Err(RespError::AuthRequired(text)) => assert_eq!(text, AUTH_REQUIRED),
		other => panic!("expected auth failure, got {:?}", other),
	}
	// Any other error reply is an ordinary value.
	assert_eq!(
		blocking(b"-ERR unknown command\r\n").unwrap(),
		RespValue::simple_error("ERR unknown command")
	);
}

#[test]
fn test_auth_required_inside_aggregate() {
	let wire = format!("*2\r\n:1\r\n-{}\r\n", AUTH_REQUIRED);
	assert!(matches!(
		blocking(wire.as_bytes()),
		Err(RespError::AuthRequired(_))
	));
}

#[test]
fn test_blob_consumes_payload_and_terminator() {
	let wire = b"$3\r\nfoo\r\n$3\r\nbar\r\n";
	let mut reader = Resp3Reader::new(&wire[..], BufferPool::default());
	assert_eq!(reader.read_object(Decode::Utf8).unwrap(), RespValue::blob("foo"));
	assert_eq!(reader.read_object(Decode::Utf8).unwrap(), RespValue::blob("bar"));
	assert!(matches!(
		reader.read_object(Decode::Utf8),
		Err(RespError::ConnectionClosed)
	));
}

#[rstest]
#[case(&b"+OK\r\n"[..])]
#[case(&b"$-1\r\n"[..])]
#[case(&b"*3\r\n:1\r\n$2\r\nhi\r\n#f\r\n"[..])]
#[case(&b"%?\r\n+k\r\n~2\r\n:1\r\n:2\r\n.\r\n"[..])]
#[case(&b"|1\r\n+ttl\r\n:3\r\n"[..])]
#[case(&b">2\r\n+invalidate\r\n*1\r\n$1\r\nk\r\n"[..])]
#[case(&b"=15\r\ntxt:Some string\r\n"[..])]
#[case(&b"(-3492890328409238509324850943850943825024385\r\n"[..])]
#[case(&b"!21\r\nSYNTAX invalid syntax\r\n"[..])]
#[case(&b"*1\r\n_\r\n"[..])]
#[case(&b"*2\r\n:1\r\n"[..])]
#[case(&b"$?\r\n;2\r\nab\r\n;x\r\n"[..])]
#[tokio::test]
async fn test_blocking_and_async_agree(#[case] wire: &[u8]) {
	let expected = blocking(wire);
	let actual = suspending(wire).await;
	match (expected, actual) {
		(Ok(a), Ok(b)) => assert_eq!(a, b),
		(Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
		(a, b) => panic!("readers disagree: {:?} vs {:?}", a, b),
	}
}

#[test]
fn test_scratch_returns_after_protocol_error() {
	let pool = BufferPool::default();
	let cases: [&[u8]; 4] = [
		b"$5\r\nhel",
		b"*2\r\n$?\r\n;3\r\nab",
		b"$3\r\nfooXY",
		b"%1\r\n+k\r\n.\r\n",
	];
	for wire in cases {
		let mut reader = Resp3Reader::new(wire, pool.clone());
		assert!(reader.read_object(Decode::Raw).is_err());
	}
	assert_eq!(pool.stats().outstanding(), 0);
}

/// Yields `data`, then fails every read.
struct Failing<'a> {
	data: &'a [u8],
}

impl Read for Failing<'_> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.data.is_empty() {
			return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"));
		}
		self.data.read(buf)
	}
}

#[test]
fn test_scratch_returns_after_io_error() {
	let pool = BufferPool::default();
	let mut reader = Resp3Reader::new(
		Failing {
			data: b"*2\r\n$10\r\nabc",
		},
		pool.clone(),
	);
	match reader.read_object(Decode::Raw) {
		Err(RespError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
		other => panic!("expected io error, got {:?}", other),
	}
	assert_eq!(pool.stats().outstanding(), 0);
}

#[test]
fn test_options_bound_blob_size() {
	let options = ReaderOptions {
		max_blob_len: 4,
		..Default::default()
	};
	let mut reader = Resp3Reader::with_options(&b"$?\r\n;3\r\nabc\r\n;3\r\ndef\r\n;0\r\n"[..], BufferPool::default(), options);
	assert!(matches!(
		reader.read_object(Decode::Raw),
		Err(RespError::Protocol(ParseError::BlobTooLarge { len: 6, limit: 4 }))
	));
}

#[test]
fn test_deep_nesting_is_bounded() {
	let mut wire = Vec::new();
	for _ in 0..10_000 {
		wire.extend_from_slice(b"*1\r\n");
	}
	wire.extend_from_slice(b":1\r\n");
	assert!(matches!(
		blocking(&wire),
		Err(RespError::Protocol(ParseError::DepthExceeded(64)))
	));
}
