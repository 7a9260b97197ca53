//! Per-endpoint handlers. Each function opens exactly one transaction,
//! runs its finders, and returns a `Response` tree; `dispatch::dispatch`
//! renders it.

pub mod browse;
pub mod lyrics;
pub mod media;
pub mod playlist;
pub mod search;
pub mod system;
pub mod user;

use crate::db::pool::{ReadTransaction, Session, SessionPool, WriteTransaction};

use super::context::{RequestContext, SERVER_VERSION};
use super::error::ApiError;
use super::response::Response;

/// Every count/size parameter is capped here; exceeding it is a client
/// error, not a silent clamp.
pub const DEFAULT_MAX_COUNT_SIZE: i64 = 1000;

pub async fn read_tx(pool: &SessionPool) -> Result<(Session, ReadTransaction), ApiError> {
    let session = pool.session().await.map_err(ApiError::from)?;
    let tx = session.read().await.map_err(ApiError::from)?;
    Ok((session, tx))
}

pub async fn write_tx(pool: &SessionPool) -> Result<(Session, WriteTransaction), ApiError> {
    let session = pool.session().await.map_err(ApiError::from)?;
    let tx = session.write().await.map_err(ApiError::from)?;
    Ok((session, tx))
}

pub fn ok(ctx: &RequestContext) -> Response {
    Response::ok(SERVER_VERSION, ctx.protocol_version.to_string().as_str(), ctx.open_subsonic_enabled)
}

/// Reads an optional `count`/`size`-style parameter, applying `default`
/// when absent and rejecting anything over `DEFAULT_MAX_COUNT_SIZE`.
pub fn bounded_count(ctx: &RequestContext, name: &str, default: i64) -> Result<i64, ApiError> {
    let value = ctx.parsed_param::<i64>(name)?.unwrap_or(default);
    if value > DEFAULT_MAX_COUNT_SIZE {
        return Err(ApiError::ParameterValueTooHigh(name.to_string()));
    }
    Ok(value.max(0))
}
