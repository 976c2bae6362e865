use crate::config::ClientConfig;
use crate::constants::STATUS_SETTLE;
use crate::core_command::ClientCommand;
use crate::core_network::{
    bind_data_listener, establish_control_connection, ControlChannel, DataWorker,
};
use crate::session::{teardown, CommandMode, SessionEnd, SessionState};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, BufReader};

/// Everything the session needs once the outer layers have resolved it.
#[derive(Debug, Clone)]
pub struct ClientParams {
    pub server: SocketAddr,
    pub data_address: IpAddr,
    pub data_port: u16,
    pub mode: CommandMode,
    pub command: Option<ClientCommand>,
}

/// Runs a session reading shell commands from stdin.
pub async fn run(params: ClientParams, config: Arc<ClientConfig>) -> Result<SessionEnd> {
    run_session(params, config, BufReader::new(tokio::io::stdin())).await
}

/// Runs one client session from bootstrap to teardown.
///
/// The data listener is bound and the worker started before the control
/// connection is opened, so the server can connect back as soon as it has
/// the data port.
pub async fn run_session<R>(
    params: ClientParams,
    config: Arc<ClientConfig>,
    input: R,
) -> Result<SessionEnd>
where
    R: AsyncBufRead + Unpin,
{
    info!("Starting client with params: {:?}", params);
    let state = SessionState::new(params.mode);

    let listener = bind_data_listener(params.data_port)
        .await
        .with_context(|| format!("Failed to bind data port {}", params.data_port))?;
    let data_port = listener.local_addr()?.port();
    let worker = tokio::spawn(
        DataWorker::new(listener, Arc::clone(&state), Arc::clone(&config)).run(),
    );

    let stream = match establish_control_connection(
        params.server,
        params.data_address,
        data_port,
        config.ack_read_size,
    )
    .await
    {
        Ok(stream) => stream,
        Err(e) => {
            error!("Control handshake failed: {}", e);
            state.shutdown.set_kill_received();
            if let Err(join_error) = worker.await {
                debug!("Data worker ended abnormally: {}", join_error);
            }
            return Err(e.into());
        }
    };

    let mut control = ControlChannel::new(stream, Arc::clone(&state));
    let result = match params.command {
        Some(command) => control.run_single(command, STATUS_SETTLE).await,
        None => control.run_shell(input).await,
    };

    Ok(teardown(control, worker, &state, config.teardown_grace(), result).await)
}
