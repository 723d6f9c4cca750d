//! Staff dashboard endpoints. Every route requires a bearer token.

use crate::error::AppError;
use crate::extractors::StaffActor;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use helpdesk_core::{Message, Protocol, Ticket, TicketStatus};
use helpdesk_runtime::TicketUpdateOutcome;
use serde::{Deserialize, Serialize};

/// A ticket with its full log, as shown on the detail page.
#[derive(Debug, Serialize)]
pub struct TicketDetail {
    /// The ticket.
    pub ticket: Ticket,
    /// Every message, oldest first, internal ones included.
    pub messages: Vec<Message>,
}

/// Detail page form: a new status, a comment, or both.
#[derive(Debug, Default, Deserialize)]
pub struct TicketUpdateForm {
    /// Target status. Blank means unchanged.
    #[serde(default)]
    pub status: Option<String>,
    /// Internal comment. Blank means none.
    #[serde(default)]
    pub comment: Option<String>,
}

impl TicketUpdateForm {
    fn status(&self) -> Result<Option<TicketStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(raw.parse()?)),
        }
    }
}

/// `GET /api/dashboard/tickets`: every ticket, newest first.
///
/// # Errors
///
/// 401 without a valid session, 500 on storage failure.
pub async fn list_tickets(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let tickets = state.lifecycle.dashboard().await?;
    tracing::debug!(actor = %actor.name, count = tickets.len(), "Dashboard listed");
    Ok(Json(tickets))
}

/// `GET /api/dashboard/tickets/:protocol`: a ticket and its history.
///
/// # Errors
///
/// 401 without a valid session, 404 for an unknown protocol.
pub async fn ticket_detail(
    State(state): State<AppState>,
    StaffActor(_actor): StaffActor,
    Path(protocol): Path<String>,
) -> Result<Json<TicketDetail>, AppError> {
    let protocol = Protocol::new(protocol);
    let ticket = state.lifecycle.ticket(&protocol).await?;
    let messages = state.lifecycle.history(&protocol).await?;
    Ok(Json(TicketDetail { ticket, messages }))
}

/// `POST /api/dashboard/tickets/:protocol`: change status and/or comment.
///
/// # Errors
///
/// 401 without a valid session, 404 for an unknown protocol, 422 for an
/// unknown status or an empty form.
pub async fn update_ticket(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Path(protocol): Path<String>,
    Json(form): Json<TicketUpdateForm>,
) -> Result<Json<TicketUpdateOutcome>, AppError> {
    let status = form.status()?;
    let protocol = Protocol::new(protocol);

    let outcome = state
        .lifecycle
        .update(&protocol, status, form.comment, actor)
        .await?;

    Ok(Json(outcome))
}
