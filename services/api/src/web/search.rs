//! services/api/src/web/search.rs
//!
//! Free-text and advanced search over clients and referrals.

use axum::{extract::State, Extension, Json};
use casebook_core::domain::{Client, Referral};
use casebook_core::permissions::ADVANCED_SEARCH;
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::web::forms::{SearchForm, SearchRequest};
use crate::web::state::{AppState, StaffUser};

/// Exactly one of the lists is present, matching the search type.
#[derive(Serialize, Default)]
pub struct SearchResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<Client>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrals: Option<Vec<Referral>>,
}

/// POST /search - Search by `searchbar` text or by the advanced fields
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchForm,
    responses(
        (status = 200, description = "Matching live records; empty when nothing matches"),
        (status = 403, description = "Needs view_client and view_referral"),
        (status = 422, description = "Unknown location or status")
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Json(form): Json<SearchForm>,
) -> ApiResult<Json<SearchResults>> {
    staff.require(ADVANCED_SEARCH)?;
    let results = match form.validate()? {
        SearchRequest::Clients(query) => SearchResults {
            clients: Some(state.db.search_clients(&query).await?),
            ..SearchResults::default()
        },
        SearchRequest::Referrals(query) => SearchResults {
            referrals: Some(state.db.search_referrals(&query).await?),
            ..SearchResults::default()
        },
    };
    Ok(Json(results))
}
