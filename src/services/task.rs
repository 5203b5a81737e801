//! Task services - accettazione, completamento e chiusura dei post task

use super::post::load_post;
use crate::core::{AppError, AppState};
use crate::dtos::{
    CompletionAction, ConfirmCompletionRequest, ExpiryReportDTO, TaskActionDTO, TaskActionRequest,
};
use crate::entities::{Post, TaskStatus, User};
use crate::repositories::{FinalRefund, Read};
use axum::{
    Extension,
    extract::{Json, Path, State},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, instrument, warn};

/// Il post deve esistere ed essere un task
async fn load_task(state: &AppState, post_id: i32) -> Result<Post, AppError> {
    let post = state
        .post
        .read(&post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))?;
    if !post.is_task {
        return Err(AppError::bad_request("This is not a task post"));
    }
    Ok(post)
}

fn require_status(post: &Post, expected: TaskStatus) -> Result<(), AppError> {
    if post.task_status == Some(expected) {
        return Ok(());
    }
    let current = post.task_status.map(|s| s.as_str()).unwrap_or("NONE");
    Err(AppError::bad_request("Task is not in the required status")
        .with_details(format!("Expected {}, current status: {}", expected.as_str(), current)))
}

fn require_owner(post: &Post, user: &User) -> Result<(), AppError> {
    if post.user_id != user.user_id {
        warn!("User {} is not the owner of task {}", user.user_id, post.post_id);
        return Err(AppError::forbidden("You are not the task owner"));
    }
    Ok(())
}

/// Le transizioni falliscono solo se un'altra richiesta ha cambiato lo stato nel frattempo
fn status_changed() -> AppError {
    AppError::conflict("Task status changed, retry")
}

async fn respond(
    state: &AppState,
    post: &Post,
    viewer_id: i32,
    message: &str,
) -> Result<Json<TaskActionDTO>, AppError> {
    let dto = load_post(state, post.post_id, viewer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))?;
    Ok(Json(TaskActionDTO {
        success: true,
        message: message.to_string(),
        post: dto,
    }))
}

/// POST /posts/{post_id}/accept-task
#[instrument(skip(state, current_user), fields(post_id = %post_id, user_id = %current_user.user_id))]
pub async fn accept_task(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
) -> Result<Json<TaskActionDTO>, AppError> {
    let post = load_task(&state, post_id).await?;
    match post.task_status {
        Some(TaskStatus::Open) => {}
        Some(TaskStatus::Completed) => return Err(AppError::bad_request("Task already completed")),
        Some(TaskStatus::InProgress) => {
            return Err(AppError::bad_request("Task already in progress"));
        }
        Some(TaskStatus::CompletionRequested) => {
            return Err(AppError::bad_request(
                "Task completion is pending confirmation",
            ));
        }
        _ => return Err(AppError::bad_request("Task is closed")),
    }
    if post.user_id == current_user.user_id {
        return Err(AppError::bad_request("Cannot accept your own task"));
    }

    let updated = state
        .task
        .accept(&post, current_user.user_id, Utc::now())
        .await?
        .ok_or_else(status_changed)?;
    info!(
        "Task accepted, initial payment {} APE",
        updated.initial_payment_amount
    );

    respond(&state, &updated, current_user.user_id, "Task accepted successfully").await
}

/// POST /posts/{post_id}/request-completion (solo chi ha accettato)
#[instrument(skip(state, current_user), fields(post_id = %post_id, user_id = %current_user.user_id))]
pub async fn request_completion(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
) -> Result<Json<TaskActionDTO>, AppError> {
    let post = load_task(&state, post_id).await?;
    if post.completed_by != Some(current_user.user_id) {
        return Err(AppError::forbidden("You are not the task acceptor"));
    }
    require_status(&post, TaskStatus::InProgress)?;

    let (updated, message) = state
        .task
        .request_completion(&post, current_user.user_id, Utc::now())
        .await?
        .ok_or_else(status_changed)?;
    debug!("Completion request message {}", message.message_id);

    respond(
        &state,
        &updated,
        current_user.user_id,
        "Task completion requested successfully",
    )
    .await
}

/// POST /posts/{post_id}/confirm-completion {approved}
#[instrument(skip(state, current_user, body), fields(post_id = %post_id))]
pub async fn confirm_completion(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
    Json(body): Json<ConfirmCompletionRequest>,
) -> Result<Json<TaskActionDTO>, AppError> {
    let post = load_task(&state, post_id).await?;
    require_owner(&post, &current_user)?;
    require_status(&post, TaskStatus::CompletionRequested)?;

    let now = Utc::now();
    if body.approved {
        let updated = state
            .task
            .complete(&post, None, now)
            .await?
            .ok_or_else(status_changed)?;
        info!("Task completed, final payment {} APE", updated.final_payment_amount);
        respond(
            &state,
            &updated,
            current_user.user_id,
            "Task completion confirmed and final payment sent",
        )
        .await
    } else {
        let updated = state
            .task
            .deny_completion(&post, now)
            .await?
            .ok_or_else(status_changed)?;
        info!("Task completion denied");
        respond(&state, &updated, current_user.user_id, "Task completion denied").await
    }
}

/// POST /posts/{post_id}/handle-completion {action: complete | reject | fail}
#[instrument(skip(state, current_user, body), fields(post_id = %post_id))]
pub async fn handle_completion(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
    Json(body): Json<TaskActionRequest>,
) -> Result<Json<TaskActionDTO>, AppError> {
    let post = load_task(&state, post_id).await?;
    require_owner(&post, &current_user)?;
    require_status(&post, TaskStatus::CompletionRequested)?;
    let action = CompletionAction::parse(&body.action)
        .ok_or_else(|| AppError::bad_request("Invalid action").with_details(body.action.clone()))?;

    let now = Utc::now();
    let (updated, message) = match action {
        CompletionAction::Complete => (
            state
                .task
                .complete(&post, Some("✅ 任务已完成，尾款已发放"), now)
                .await?,
            "Task completed and final payment sent",
        ),
        CompletionAction::Reject => (
            state.task.refund_final(&post, FinalRefund::Ended, now).await?,
            "Task rejected and final payment refunded",
        ),
        CompletionAction::Fail => (
            state.task.refund_final(&post, FinalRefund::Failed, now).await?,
            "Task marked as failed and final payment refunded",
        ),
    };
    let updated = updated.ok_or_else(status_changed)?;
    info!("Task completion handled: {:?}", action);

    respond(&state, &updated, current_user.user_id, message).await
}

/// POST /posts/{post_id}/handle-task-outcome {action: refund | fail}
#[instrument(skip(state, current_user, body), fields(post_id = %post_id))]
pub async fn handle_task_outcome(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
    Json(body): Json<TaskActionRequest>,
) -> Result<Json<TaskActionDTO>, AppError> {
    let post = load_task(&state, post_id).await?;
    require_owner(&post, &current_user)?;
    require_status(&post, TaskStatus::CompletionRequested)?;
    if post.completed_by.is_none() {
        return Err(AppError::bad_request("No acceptor found for this task"));
    }
    let (outcome, message) = match body.action.trim() {
        "refund" => (FinalRefund::Ended, "Task ended with refund"),
        "fail" => (FinalRefund::Failed, "Task marked as failed"),
        other => {
            return Err(AppError::bad_request("Invalid action").with_details(other.to_string()));
        }
    };

    let updated = state
        .task
        .refund_final(&post, outcome, Utc::now())
        .await?
        .ok_or_else(status_changed)?;
    info!("Task outcome {:?} applied", outcome);

    respond(&state, &updated, current_user.user_id, message).await
}

/// POST /admin/tasks/expire-unclaimed: esegue subito il passaggio di scadenza
#[instrument(skip(state, _admin))]
pub async fn expire_unclaimed_tasks(
    State(state): State<Arc<AppState>>,
    Extension(_admin): Extension<User>,
) -> Result<Json<ExpiryReportDTO>, AppError> {
    let now = Utc::now();
    let summary = state.task.expire_unclaimed(now).await?;
    info!(
        "Processed {} expired tasks, refunded {} APE",
        summary.processed, summary.total_refunded
    );
    Ok(Json(ExpiryReportDTO {
        success: true,
        processed: summary.processed,
        total_refunded: summary.total_refunded,
        timestamp: now,
    }))
}

/// Task in background che fa scadere i task mai accettati ogni `interval_secs` secondi
pub async fn start_task_expiry_sweeper(state: Arc<AppState>, interval_secs: u64) {
    info!(
        "Starting task expiry sweeper with interval: {} seconds",
        interval_secs
    );

    let mut interval = time::interval(std::time::Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;
        match state.task.expire_unclaimed(Utc::now()).await {
            Ok(summary) if summary.processed > 0 => info!(
                "Expired {} unclaimed tasks, refunded {} APE",
                summary.processed, summary.total_refunded
            ),
            Ok(_) => debug!("No unclaimed tasks to expire"),
            Err(e) => error!("Task expiry sweep failed: {}", e),
        }
    }
}
