use crate::db::{postgres, Clock};
use crate::error::{sanitize_error, AppError};
use crate::models::{ConnectionDescriptor, ConnectionInfo, ConnectionStatus};
use crate::state::Session;

/// Connect the session to `descriptor`.
///
/// Reuses the pool of an identical earlier descriptor, then runs an uncached
/// `SELECT 1`. Any failure leaves the session disconnected.
pub async fn connect<C: Clock>(
    session: &Session<C>,
    descriptor: ConnectionDescriptor,
) -> Result<ConnectionInfo, AppError> {
    let target = descriptor.display_target();

    let pool = match session.get_pool(&descriptor) {
        Some(pool) => {
            log::debug!("reusing pool for {}", target);
            pool
        }
        None => match postgres::create_pool(&descriptor, &session.settings).await {
            Ok(pool) => {
                session.add_pool(descriptor.clone(), pool.clone());
                pool
            }
            Err(e) => {
                session.reset_current();
                let message = sanitize_error(&e.to_string());
                log::warn!("connection to {} failed: {}", target, message);
                return Err(AppError::connection(message));
            }
        },
    };

    match postgres::ping(&pool).await {
        Ok(latency) => {
            session.replace_current(descriptor);
            log::info!("connected to {} ({} ms)", target, latency);
            Ok(ConnectionInfo {
                target,
                status: ConnectionStatus::Connected,
                error: None,
                latency_ms: Some(latency),
            })
        }
        Err(e) => {
            session.reset_current();
            if let Some(pool) = session.remove_pool(&descriptor) {
                pool.close().await;
            }
            let message = sanitize_error(&e.to_string());
            log::warn!("liveness check against {} failed: {}", target, message);
            Err(AppError::connection(message))
        }
    }
}

/// Forget the current connection and close its pool
pub async fn disconnect<C: Clock>(session: &Session<C>) {
    if let Some(descriptor) = session.current_descriptor() {
        session.reset_current();
        if let Some(pool) = session.remove_pool(&descriptor) {
            pool.close().await;
        }
        log::info!("disconnected from {}", descriptor.display_target());
    }
}

/// Get connection status
pub fn connection_status<C: Clock>(session: &Session<C>) -> ConnectionInfo {
    match session.current_descriptor() {
        Some(descriptor) if session.is_connected() => ConnectionInfo {
            target: descriptor.display_target(),
            status: ConnectionStatus::Connected,
            error: None,
            latency_ms: None,
        },
        _ => ConnectionInfo::disconnected(),
    }
}
