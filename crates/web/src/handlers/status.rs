use std::sync::Arc;

use axum::{Json, extract::State};
use pipeline_monitor_core::models::StatusDocument;

use crate::hub::Hub;

pub async fn get_status(State(hub): State<Arc<Hub>>) -> Json<StatusDocument> {
    Json(StatusDocument::clone(&hub.current()))
}
