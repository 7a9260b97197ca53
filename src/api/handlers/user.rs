//! Admin user CRUD: `getUser`/`getUsers`/`createUser`/`updateUser`/
//! `deleteUser`/`changePassword`. A non-admin may only `getUser`
//! themself; every other entry point here requires admin.

use crate::db::models::{User, UserType};
use crate::db::pool::SessionPool;
use crate::db::user;

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::response::{Node, Response};
use super::{ok, read_tx, write_tx};

fn user_node(user: &User) -> Node {
    Node::new()
        .with_attr("username", user.name.clone())
        .with_attr("adminRole", user.user_type == UserType::Admin)
        .with_attr("scrobblingEnabled", true)
        .with_opt_attr("maxBitRate", user.transcoding_max_bitrate)
}

pub async fn get_user(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let username = ctx.required_param("username")?;
    if !ctx.is_admin() && username != ctx.user.name {
        return Err(ApiError::UserNotAuthorized);
    }

    let (_session, mut tx) = read_tx(pool).await?;
    let found = user::find_by_name(&mut tx, username).await?.ok_or(ApiError::RequestedDataNotFound)?;
    tx.finish().await?;

    Ok(ok(ctx).with_root(|root| root.with_child("user", user_node(&found))))
}

pub async fn get_users(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    let (_session, mut tx) = read_tx(pool).await?;
    let users = user::find_all(&mut tx).await?;
    tx.finish().await?;

    let nodes = users.iter().map(user_node).collect();
    Ok(ok(ctx).with_root(|root| root.with_child("users", Node::new().with_children("user", nodes))))
}

fn parsed_admin_role(ctx: &RequestContext) -> Result<bool, ApiError> {
    Ok(ctx.parsed_param::<bool>("adminRole")?.unwrap_or(false))
}

pub async fn create_user(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    let username = ctx.required_param("username")?.to_string();
    let user_type = if parsed_admin_role(ctx)? { UserType::Admin } else { UserType::Regular };

    let (_session, mut tx) = write_tx(pool).await?;
    if user::find_by_name(&mut tx, &username).await?.is_some() {
        return Err(ApiError::UserAlreadyExists);
    }
    user::create(&mut tx, &username, user_type).await?;
    tx.commit().await?;
    Ok(ok(ctx))
}

pub async fn update_user(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    let username = ctx.required_param("username")?;
    let admin_role = ctx.parsed_param::<bool>("adminRole")?.map(|v| if v { UserType::Admin } else { UserType::Regular });
    let max_bitrate = ctx.parsed_param::<u32>("maxBitRate")?;

    let (_session, mut tx) = write_tx(pool).await?;
    let found = user::find_by_name(&mut tx, username).await?.ok_or(ApiError::RequestedDataNotFound)?;
    user::update(&mut tx, found.id, admin_role, max_bitrate.map(Some)).await?;
    tx.commit().await?;
    Ok(ok(ctx))
}

pub async fn delete_user(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    let username = ctx.required_param("username")?;

    let (_session, mut tx) = write_tx(pool).await?;
    let found = user::find_by_name(&mut tx, username).await?.ok_or(ApiError::RequestedDataNotFound)?;
    user::delete(&mut tx, found.id).await?;
    tx.commit().await?;
    Ok(ok(ctx))
}

/// No writable password backend is configured in this build, so this
/// always answers with the generic error.
pub fn change_password(ctx: &RequestContext) -> Result<Response, ApiError> {
    let username = ctx.required_param("username")?;
    if !ctx.is_admin() && username != ctx.user.name {
        return Err(ApiError::UserNotAuthorized);
    }
    Err(ApiError::NotImplemented)
}
