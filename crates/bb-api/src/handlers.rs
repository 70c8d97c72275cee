//! # bb-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the ad repository.

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse};
use askama::Template;
use bb_core::error::AppError;
use bb_core::models::AdId;
use bb_core::repo::AdRepository;
use bb_ui::{AdTemplate, IndexTemplate, NewAdTemplate, NotFoundTemplate};
use serde::Deserialize;
use tracing::error;

/// State shared across all actix-web workers.
pub struct AppState {
    pub repo: AdRepository,
}

/// Fields of the "post an ad" form.
#[derive(Debug, Deserialize)]
pub struct NewAdForm {
    #[serde(default)]
    pub ad_author: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ad_text: String,
}

/// Fields of the comment form on an ad page.
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub comment_author: String,
    #[serde(default)]
    pub comment_text: String,
}

/// Renders the board home (`/`).
pub async fn index(data: web::Data<AppState>) -> HttpResponse {
    match data.repo.list_ads().await {
        Ok(listing) => render(
            StatusCode::OK,
            IndexTemplate {
                page_title: "All ads",
                ads: &listing.ads,
                corrupt_count: listing.corrupt.len(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// Blank "post an ad" form (`GET /new`).
pub async fn new_ad_form() -> HttpResponse {
    render(StatusCode::OK, NewAdTemplate::default())
}

/// Creates an ad and sends the browser back to the listing (`POST /new`).
pub async fn create_ad(data: web::Data<AppState>, form: web::Form<NewAdForm>) -> HttpResponse {
    let form = form.into_inner();
    match data.repo.create_ad(&form.ad_author, &form.title, &form.ad_text).await {
        Ok(_) => redirect("/"),
        Err(AppError::ValidationError(message)) => render(
            StatusCode::BAD_REQUEST,
            NewAdTemplate {
                error: Some(message.as_str()),
                ad_author: &form.ad_author,
                title: &form.title,
                ad_text: &form.ad_text,
                ..Default::default()
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// Renders a single ad with its comments (`GET /ad_{id}`).
pub async fn view_ad(data: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Ok(id) = path.parse::<AdId>() else {
        return not_found();
    };
    match data.repo.get_ad(id).await {
        Ok(ad) => render(StatusCode::OK, AdTemplate::new(id, &ad)),
        Err(e) => error_response(&e),
    }
}

/// Appends a comment, then redirects back to the ad (`POST /ad_{id}`).
pub async fn post_comment(
    data: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<CommentForm>,
) -> HttpResponse {
    let Ok(id) = path.parse::<AdId>() else {
        return not_found();
    };
    let form = form.into_inner();

    match data.repo.append_comment(id, &form.comment_author, &form.comment_text).await {
        Ok(()) => redirect(&format!("/ad_{id}")),
        Err(AppError::ValidationError(message)) => match data.repo.get_ad(id).await {
            Ok(ad) => render(
                StatusCode::BAD_REQUEST,
                AdTemplate {
                    error: Some(message.as_str()),
                    comment_author: &form.comment_author,
                    comment_text: &form.comment_text,
                    ..AdTemplate::new(id, &ad)
                },
            ),
            Err(e) => error_response(&e),
        },
        Err(e) => error_response(&e),
    }
}

/// Fallback for every unmatched route.
pub async fn not_found_page() -> HttpResponse {
    not_found()
}

fn not_found() -> HttpResponse {
    render(StatusCode::NOT_FOUND, NotFoundTemplate::default())
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn render(status: StatusCode, view: impl Template) -> HttpResponse {
    match view.render() {
        Ok(html) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(html),
        Err(e) => {
            error!(error = %e, "template rendering failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Maps core failures onto HTTP responses.
fn error_response(err: &AppError) -> HttpResponse {
    match err {
        AppError::NotFound(..) => not_found(),
        AppError::ValidationError(message) => HttpResponse::BadRequest().body(message.clone()),
        AppError::StoreUnavailable(_) => {
            error!(error = %err, "store unavailable");
            HttpResponse::ServiceUnavailable().body("The board is temporarily unavailable.")
        }
        AppError::Conflict(_) => {
            error!(error = %err, "write conflict");
            HttpResponse::Conflict().body("The ad was busy, please try again.")
        }
        AppError::DataCorruption { .. } | AppError::Internal(_) => {
            error!(error = %err, "request failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}
