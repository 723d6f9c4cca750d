//! Public ticket endpoints.
//!
//! Customers never authenticate: they submit the form and follow their
//! ticket's chat by protocol.

use crate::error::AppError;
use crate::extractors::RequestId;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use helpdesk_core::{Protocol, Ticket, TicketStatus, TicketSubmission};
use helpdesk_runtime::ChatBroadcast;
use serde::Serialize;

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    /// Tracking code the customer keeps.
    pub protocol: Protocol,
    /// Initial status.
    pub status: TicketStatus,
}

/// The part of a ticket shown on the customer's chat page.
#[derive(Debug, Serialize)]
pub struct PublicTicket {
    /// Tracking code.
    pub protocol: Protocol,
    /// Customer display name.
    pub customer_name: String,
    /// Sector the ticket was filed under.
    pub sector: String,
    /// Current status.
    pub status: TicketStatus,
    /// Human-readable status.
    pub status_label: &'static str,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl From<Ticket> for PublicTicket {
    fn from(ticket: Ticket) -> Self {
        Self {
            status_label: ticket.status.label(),
            protocol: ticket.protocol,
            customer_name: ticket.customer_name,
            sector: ticket.sector,
            status: ticket.status,
            created_at: ticket.created_at,
        }
    }
}

/// Chat page payload: the ticket and its full log.
#[derive(Debug, Serialize)]
pub struct ChatView {
    /// The ticket.
    pub ticket: PublicTicket,
    /// Every message, oldest first.
    pub messages: Vec<ChatBroadcast>,
}

/// `POST /api/tickets`: open a ticket from the public form.
///
/// # Errors
///
/// 422 if a required field is missing, 500 on storage failure.
pub async fn submit(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Json(submission): Json<TicketSubmission>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    let ticket = state.lifecycle.open_ticket(submission).await?;

    tracing::info!(%request_id, protocol = %ticket.protocol, "Ticket submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmissionReceipt {
            protocol: ticket.protocol,
            status: ticket.status,
        }),
    ))
}

/// `GET /api/tickets/:protocol/chat`: the customer's view of a ticket.
///
/// # Errors
///
/// 404 if no ticket has this protocol.
pub async fn chat_view(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Result<Json<ChatView>, AppError> {
    let protocol = Protocol::new(protocol);
    let ticket = state.lifecycle.ticket(&protocol).await?;
    let messages = state.lifecycle.history(&protocol).await?;

    Ok(Json(ChatView {
        ticket: PublicTicket::from(ticket),
        messages: messages.iter().map(ChatBroadcast::from).collect(),
    }))
}
