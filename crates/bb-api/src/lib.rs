//! # bb-api
//!
//! The web routing and orchestration layer for the bulletin board.

pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the routes for the board.
///
/// The caller owns the `App`, so it also decides the fallback service;
/// `handlers::not_found_page` renders the board's 404 page.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // The listing
        .service(web::resource("/").route(web::get().to(handlers::index)))
        // The "post an ad" form and its submission
        .service(
            web::resource("/new")
                .route(web::get().to(handlers::new_ad_form))
                .route(web::post().to(handlers::create_ad)),
        )
        // One ad, e.g. /ad_1717171717000000, and its comment submission
        .service(
            web::resource("/ad_{id}")
                .route(web::get().to(handlers::view_ad))
                .route(web::post().to(handlers::post_comment)),
        );
}
