use crate::auth::auth::AuthUser;
use crate::model::chat::{ChatBroadcast, ChatQueueItem, QueueStatus};
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateBroadcast {
    #[schema(example = "Office closed on Friday.")]
    pub content: String,
    /// Send to every enabled user instead of the explicit list.
    #[serde(default)]
    pub select_all_users: bool,
    /// Receiver usernames; ignored when `select_all_users` is set.
    #[serde(default)]
    pub receivers: Vec<String>,
}

/// Receiver list of a broadcast: the explicit rows, or every enabled user
/// minus the system accounts when `select_all_users` is set.
async fn resolve_receivers(
    pool: &MySqlPool,
    broadcast: &ChatBroadcast,
) -> Result<Vec<String>, sqlx::Error> {
    if broadcast.select_all_users {
        sqlx::query_scalar::<_, String>(
            "SELECT username FROM users WHERE enabled = 1 AND username NOT IN ('guest', 'administrator')",
        )
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_scalar::<_, String>(
            "SELECT receiver FROM chat_broadcast_receivers WHERE broadcast_id = ?",
        )
        .bind(broadcast.id)
        .fetch_all(pool)
        .await
    }
}

async fn load_broadcast(
    pool: &MySqlPool,
    broadcast_id: u64,
) -> Result<Option<ChatBroadcast>, sqlx::Error> {
    sqlx::query_as::<_, ChatBroadcast>(
        "SELECT id, sender, content, select_all_users, created_at FROM chat_broadcasts WHERE id = ?",
    )
    .bind(broadcast_id)
    .fetch_optional(pool)
    .await
}

/* =========================
Create broadcast
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/chat/broadcasts",
    request_body = CreateBroadcast,
    responses(
        (status = 201, description = "Broadcast created", body = Object, example = json!({
            "message": "Broadcast created",
            "id": 1
        })),
        (status = 400, description = "Missing content or receivers"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn create_broadcast(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateBroadcast>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if payload.content.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": "Content is required" })));
    }
    if !payload.select_all_users && payload.receivers.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Please add at least one receiver."
        })));
    }

    let result = sqlx::query(
        "INSERT INTO chat_broadcasts (sender, content, select_all_users) VALUES (?, ?, ?)",
    )
    .bind(&auth.username)
    .bind(payload.content.trim())
    .bind(payload.select_all_users)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create broadcast");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let broadcast_id = result.last_insert_id();

    if !payload.select_all_users {
        for receiver in &payload.receivers {
            sqlx::query(
                "INSERT INTO chat_broadcast_receivers (broadcast_id, receiver) VALUES (?, ?)",
            )
            .bind(broadcast_id)
            .bind(receiver)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, broadcast_id, "Failed to store receiver");
                actix_web::error::ErrorInternalServerError("Internal Server Error")
            })?;
        }
    }

    Ok(HttpResponse::Created().json(json!({
        "message": "Broadcast created",
        "id": broadcast_id
    })))
}

/* =========================
Send (enqueue + background delivery)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/chat/broadcasts/{broadcast_id}/send",
    params(("broadcast_id" = u64, Path, description = "Broadcast ID")),
    responses(
        (status = 200, description = "Messages queued", body = Object, example = json!({
            "message": "Queued 42 messages for background processing",
            "queued": 42
        })),
        (status = 400, description = "No receivers"),
        (status = 404, description = "Broadcast not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn send_broadcast(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let broadcast_id = path.into_inner();

    let broadcast = load_broadcast(pool.get_ref(), broadcast_id).await.map_err(|e| {
        tracing::error!(error = %e, broadcast_id, "Failed to fetch broadcast");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(broadcast) = broadcast else {
        return Ok(HttpResponse::NotFound().json(json!({ "message": "Broadcast not found" })));
    };

    let receivers = resolve_receivers(pool.get_ref(), &broadcast).await.map_err(|e| {
        tracing::error!(error = %e, broadcast_id, "Failed to resolve receivers");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if receivers.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "At least one receiver is required"
        })));
    }

    for receiver in &receivers {
        sqlx::query(
            r#"
            INSERT INTO chat_message_queue
                (broadcast_id, sender, receiver, content, status)
            VALUES (?, ?, ?, ?, 'Pending')
            "#,
        )
        .bind(broadcast.id)
        .bind(&broadcast.sender)
        .bind(receiver)
        .bind(&broadcast.content)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, broadcast_id, receiver = %receiver, "Failed to enqueue message");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;
    }

    let queued = receivers.len();

    // drain in the background; the caller gets the queued count right away
    let worker_pool = pool.get_ref().clone();
    actix_web::rt::spawn(async move {
        process_queue(&worker_pool, broadcast_id).await;
    });

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Queued {} messages for background processing", queued),
        "queued": queued
    })))
}

/// Delivers every pending row of the broadcast: a chat_messages insert per
/// receiver, marking the queue row Sent or Failed.
async fn process_queue(pool: &MySqlPool, broadcast_id: u64) {
    let pending = match sqlx::query_as::<_, (u64, String, String, String)>(
        r#"
        SELECT id, sender, receiver, content
        FROM chat_message_queue
        WHERE broadcast_id = ? AND status = 'Pending'
        ORDER BY id
        "#,
    )
    .bind(broadcast_id)
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, broadcast_id, "Failed to read pending queue");
            return;
        }
    };

    let mut sent = 0usize;
    let mut failed = 0usize;

    for (queue_id, sender, receiver, content) in pending {
        let delivery = sqlx::query(
            "INSERT INTO chat_messages (sender, receiver, content) VALUES (?, ?, ?)",
        )
        .bind(&sender)
        .bind(&receiver)
        .bind(&content)
        .execute(pool)
        .await;

        let (status, error) = match delivery {
            Ok(_) => {
                sent += 1;
                (QueueStatus::Sent, None)
            }
            Err(e) => {
                failed += 1;
                (QueueStatus::Failed, Some(e.to_string()))
            }
        };

        if let Err(e) = sqlx::query("UPDATE chat_message_queue SET status = ?, error = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(error)
            .bind(queue_id)
            .execute(pool)
            .await
        {
            tracing::error!(error = %e, queue_id, "Failed to update queue row");
        }
    }

    tracing::info!(broadcast_id, sent, failed, "Chat queue drained");
}

/* =========================
Queue inspection
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/chat/broadcasts/{broadcast_id}/queue",
    params(("broadcast_id" = u64, Path, description = "Broadcast ID")),
    responses(
        (status = 200, description = "Queue rows for the broadcast", body = [ChatQueueItem])
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn broadcast_queue(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let broadcast_id = path.into_inner();

    let rows = sqlx::query_as::<_, ChatQueueItem>(
        r#"
        SELECT id, broadcast_id, sender, receiver, content, status, error, created_at
        FROM chat_message_queue
        WHERE broadcast_id = ?
        ORDER BY id
        "#,
    )
    .bind(broadcast_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, broadcast_id, "Failed to fetch queue");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(rows))
}
