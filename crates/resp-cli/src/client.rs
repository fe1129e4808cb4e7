use mempool::BufferPool;
use resp::AsyncResp3Reader;
use resp::Decode;
use resp::RespError;
use resp::RespValue;
use resp::write_command_async;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;
use transport::BufferedStream;
use transport::RawSocketStream;
use transport::SlotPool;

use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum ClientError {
	#[error("Failed to connect to {addr}: {source}")]
	Connect {
		addr: String,
		source: std::io::Error,
	},

	#[error(transparent)]
	Resp(#[from] RespError),
}

/// One connection: commands go out through the buffered stream, replies are
/// decoded from the same stream.
pub struct Client {
	reader: AsyncResp3Reader<BufferedStream<TcpStream>>,
	pool: BufferPool,
	decode: Decode,
}

impl Client {
	pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
		let addr = config.addr();
		let socket = TcpStream::connect(&addr)
			.await
			.map_err(|source| ClientError::Connect {
				addr: addr.clone(),
				source,
			})?;
		socket
			.set_nodelay(true)
			.map_err(|source| ClientError::Connect {
				addr: addr.clone(),
				source,
			})?;
		debug!("connected to {}", addr);

		let pool = BufferPool::new(config.pool.clone());
		let stream = BufferedStream::new(
			RawSocketStream::new(socket, SlotPool::new()),
			&pool,
			config.stream.clone(),
		);
		let decode = if config.raw { Decode::Raw } else { Decode::Utf8 };
		Ok(Self {
			reader: AsyncResp3Reader::with_options(stream, pool.clone(), config.reader.clone()),
			pool,
			decode,
		})
	}

	/// Send one command and wait for its reply. Attributes sent ahead of the
	/// reply are logged and skipped.
	pub async fn call<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<RespValue, ClientError> {
		write_command_async(self.reader.get_mut(), &self.pool, args).await?;
		loop {
			let value = self.reader.read_object(self.decode).await?;
			match value {
				RespValue::Attribute(_) => debug!("reply attribute: {}", value),
				value => return Ok(value),
			}
		}
	}

	pub fn pool(&self) -> &BufferPool {
		&self.pool
	}
}
