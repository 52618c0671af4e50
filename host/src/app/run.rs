//! Viewing session run loop

use std::future::Future;

use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::bridge::methods::SessionSignal;
use crate::deploy::orchestrator::{SessionInfo, SessionSource, ViewerSession};
use crate::errors::HostError;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Shutdown,
    CloseRequested,
}

/// Run one viewing session until shutdown or a content-initiated close
pub async fn run(
    options: AppOptions,
    source: SessionSource,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<SessionExit, HostError> {
    info!("Initializing mini-app host...");
    let app_state = AppState::init(&options).await?;

    let mut session = app_state.orchestrator.open_session(source);
    let session_info = match start_with_retries(&mut session, &options).await {
        Ok(info) => info,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e);
        }
    };
    println!("{}", serde_json::to_string_pretty(&session_info)?);

    let exit = await_session_end(&mut session, shutdown_signal).await;

    match tokio::time::timeout(options.lifecycle.max_shutdown_delay, session.teardown()).await {
        Ok(()) => info!("Session torn down"),
        Err(_) => error!(
            "Teardown timed out after {:?}",
            options.lifecycle.max_shutdown_delay
        ),
    }
    Ok(exit)
}

/// Start a session, retrying failed attempts with exponential backoff
pub async fn start_with_retries(
    session: &mut ViewerSession,
    options: &AppOptions,
) -> Result<SessionInfo, HostError> {
    let cooldown = CooldownOptions {
        base_delay: options.fsm_settings.retry_delay,
        max_delay: options.lifecycle.max_retry_delay,
        ..Default::default()
    };

    let mut result = session.start().await;
    let mut attempt = 0;
    while let Err(e) = &result {
        if !session.fsm().can_retry(options.fsm_settings.retry_count) {
            error!("Giving up on session: {}", e);
            break;
        }
        let wait = calc_exp_backoff(&cooldown, attempt);
        warn!(
            "Session attempt {} failed ({}), retrying in {:?}",
            attempt + 1,
            e,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
        result = session.retry().await;
    }
    result
}

async fn await_session_end(
    session: &mut ViewerSession,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> SessionExit {
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received, shutting down...");
                return SessionExit::Shutdown;
            }
            signal = session.next_signal() => match signal {
                Some(SessionSignal::CloseRequested) => {
                    info!("Mini-app closed itself, shutting down...");
                    return SessionExit::CloseRequested;
                }
                Some(SessionSignal::Ready) => info!("Mini-app reported ready"),
                Some(SessionSignal::Log(_)) => {}
                None => {
                    warn!("Session signal channel closed");
                    return SessionExit::Shutdown;
                }
            },
        }
    }
}
