//! Integration tests for RESP encoder

use bytes::BytesMut;
use mempool::BufferPool;
use proptest::prelude::*;
use resp::AsyncResp3Reader;
use resp::Decode;
use resp::MessageType;
use resp::Resp3Reader;
use resp::RespEncoder;
use resp::RespValue;
use resp::encode_command;
use resp::write_command;
use resp::write_command_async;
use rstest::rstest;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use transport::BufferedStream;
use transport::RawSocketStream;
use transport::SlotPool;
use transport::StreamConfig;

fn args_of(value: RespValue) -> Vec<Vec<u8>> {
	value
		.into_vec()
		.expect("command decodes to an array")
		.iter()
		.map(|arg| arg.as_bytes().expect("argument is a blob").to_vec())
		.collect()
}

#[test]
fn test_encode_redis_set() {
	let mut buf = BytesMut::new();
	encode_command(&["SET", "key", "value"], &mut buf);
	assert_eq!(&buf[..], b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
}

#[rstest]
#[case(RespValue::simple_string("OK"))]
#[case(RespValue::simple_error("ERR test error"))]
#[case(RespValue::Number(42))]
#[case(RespValue::Number(-100))]
#[case(RespValue::blob("hello world"))]
#[case(RespValue::Null)]
#[case(RespValue::TypedNull(MessageType::Set))]
#[case(RespValue::Double(-1.5))]
#[case(RespValue::BigNumber("-123456789012345678901234567890".into()))]
#[case(RespValue::Array(vec![RespValue::Array(vec![RespValue::Number(1)]), RespValue::Boolean(true)]))]
#[case(RespValue::Map(vec![RespValue::blob("k"), RespValue::Set(vec![RespValue::Number(2)])]))]
#[case(RespValue::Push(vec![RespValue::blob("message"), RespValue::blob("chan")]))]
fn test_roundtrip_values(#[case] original: RespValue) {
	let encoded = original.encode().unwrap();
	let decoded = Resp3Reader::new(&encoded[..], BufferPool::default())
		.read_object(Decode::Utf8)
		.unwrap();
	assert_eq!(original, decoded, "Roundtrip failed for {:?}", original);
}

#[test]
fn test_write_command_through_reader() {
	let pool = BufferPool::default();
	let mut wire = Vec::new();
	let args: [&[u8]; 3] = [b"", b"\r\n", b"\xff\x00"];
	write_command(&mut wire, &pool, &args).unwrap();
	let value = Resp3Reader::new(&wire[..], pool.clone())
		.read_object(Decode::Raw)
		.unwrap();
	assert_eq!(args_of(value), args.map(|a| a.to_vec()));
	assert_eq!(pool.stats().outstanding(), 0);
}

proptest! {
	#[test]
	fn command_bytes_survive_roundtrip(args in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8)) {
		let mut buf = BytesMut::new();
		encode_command(&args, &mut buf);
		let value = Resp3Reader::new(&buf[..], BufferPool::default())
			.read_object(Decode::Raw)
			.unwrap();
		prop_assert_eq!(args_of(value), args);
	}
}

async fn pair() -> (TcpStream, TcpStream) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
	(client.unwrap(), accepted.unwrap().0)
}

fn buffered(socket: TcpStream, pool: &BufferPool) -> BufferedStream<TcpStream> {
	BufferedStream::new(
		RawSocketStream::new(socket, SlotPool::new()),
		pool,
		StreamConfig::default(),
	)
}

#[tokio::test]
async fn test_loopback_roundtrip_async() {
	let pool = BufferPool::default();
	let (client, server) = pair().await;
	let mut client = buffered(client, &pool);
	let server = buffered(server, &pool);

	let args: Vec<Vec<u8>> = vec![
		b"HSET".to_vec(),
		Vec::new(),
		b"line\r\nbreak".to_vec(),
		vec![b'x'; 10_000],
	];
	write_command_async(&mut client, &pool, &args).await.unwrap();

	let mut reader = AsyncResp3Reader::new(server, pool.clone());
	let value = reader.read_object(Decode::Raw).await.unwrap();
	assert_eq!(args_of(value), args);

	drop(reader);
	drop(client);
	assert_eq!(pool.stats().outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loopback_roundtrip_blocking() {
	let pool = BufferPool::default();
	let (client, server) = pair().await;
	let mut client = buffered(client, &pool);
	let server = buffered(server, &pool);

	let reply = RespValue::Array(vec![RespValue::blob("a\r\nb"), RespValue::Number(7)]);
	let encoded = reply.encode().unwrap();
	client.write_all(&encoded).await.unwrap();

	let reader_pool = pool.clone();
	let decoded = tokio::task::spawn_blocking(move || {
		Resp3Reader::new(server, reader_pool).read_object(Decode::Utf8)
	})
	.await
	.unwrap()
	.unwrap();
	assert_eq!(decoded, reply);
}
