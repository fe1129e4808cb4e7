use std::process::ExitCode;

use resp::RespError;
use resp_cli::client::Client;
use resp_cli::client::ClientError;
use resp_cli::config::Cli;
use resp_cli::config::Parser;
use resp_cli::config::load;
use tracing::debug;
use tracing::error;
use tracing::info;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
	let args = Cli::parse();
	let config = load(&args)?;
	telemetry::init(&config.log_level)?;

	let mut client = Client::connect(&config).await?;
	info!("sending {} to {}", args.command.join(" "), config.addr());

	let result = client.call(&args.command).await;
	debug!("buffer pool after call: {:?}", client.pool().stats());

	match result {
		Ok(reply) => {
			println!("{}", reply);
			let code = if reply.is_error() {
				ExitCode::FAILURE
			} else {
				ExitCode::SUCCESS
			};
			Ok(code)
		}
		Err(ClientError::Resp(RespError::AuthRequired(message))) => {
			error!("server requires authentication");
			eprintln!("(error) {}", message);
			Ok(ExitCode::FAILURE)
		}
		Err(e) => Err(e.into()),
	}
}
