//! Wallet services - wallet APE, movimenti e red packet

use crate::core::{AppError, AppState};
use crate::dtos::{
    MessageDTO, PageQuery, RedPacketDTO, RedPacketRequest, WalletDTO, WalletTransactionDTO,
};
use crate::entities::User;
use crate::repositories::{Read, RedPacketOutcome};
use axum::{
    Extension,
    extract::{Json, Query, State},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

const DEFAULT_TX_PAGE: i64 = 20;
const MAX_TX_PAGE: i64 = 100;

/// Il wallet viene creato al primo accesso con il bonus di benvenuto
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<WalletDTO>, AppError> {
    let user = state
        .wallet
        .ensure_wallet(current_user.user_id, Utc::now())
        .await?;
    Ok(Json(WalletDTO::from(user)))
}

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id))]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Vec<WalletTransactionDTO>>, AppError> {
    let (limit, offset) = params.resolve(DEFAULT_TX_PAGE, MAX_TX_PAGE);
    let txs = state
        .wallet
        .list_transactions(current_user.user_id, limit, offset)
        .await?;
    Ok(Json(txs.into_iter().map(WalletTransactionDTO::from).collect()))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn send_red_packet(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<RedPacketRequest>,
) -> Result<Json<RedPacketDTO>, AppError> {
    body.validate()?;
    if body.recipient_id == current_user.user_id {
        return Err(AppError::bad_request("Cannot send a red packet to yourself"));
    }
    if state.user.read(&body.recipient_id).await?.is_none() {
        return Err(AppError::not_found("Recipient not found"));
    }

    let outcome = state
        .wallet
        .send_red_packet(
            current_user.user_id,
            body.recipient_id,
            body.amount,
            body.message.as_deref(),
            Utc::now(),
        )
        .await?;

    match outcome {
        RedPacketOutcome::Sent {
            transaction,
            message,
        } => {
            info!(
                "Red packet of {} APE sent to {}",
                body.amount, body.recipient_id
            );
            Ok(Json(RedPacketDTO {
                success: true,
                transaction_id: transaction.transaction_id,
                message_id: message.message_id,
                message: MessageDTO::from(message),
            }))
        }
        RedPacketOutcome::InsufficientBalance => {
            warn!("Insufficient balance for red packet of {}", body.amount);
            Err(AppError::bad_request("Insufficient balance"))
        }
    }
}
