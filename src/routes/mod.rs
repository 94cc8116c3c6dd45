use actix_web::web;

use crate::middleware::auth::AuthMiddleware;

pub mod health;
pub mod recommendation;

/// Full route table, shared by the binary and the integration tests. The
/// recommendation service is expected in app data as
/// `web::Data<Arc<RecommendationService>>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                // Public surface: general browsing and shared views.
                .route(
                    "/recommendations/general",
                    web::get().to(recommendation::general_list),
                )
                .route(
                    "/recommendations/general/{id}",
                    web::get().to(recommendation::general_details),
                )
                .route(
                    "/chats/{chat_id}/recommendations",
                    web::get().to(recommendation::list_for_chat),
                )
                .route(
                    "/recommendations/{id}/view-access/check",
                    web::post().to(recommendation::check_view_access),
                )
                .route(
                    "/recommendations/{id}",
                    web::get().to(recommendation::details),
                )
                // Everything below requires a logged-in caller.
                .service(
                    web::scope("")
                        .wrap(AuthMiddleware)
                        .route(
                            "/recommendations/general/{id}/add",
                            web::post().to(recommendation::general_add_to_trip),
                        )
                        .route(
                            "/chats/{chat_id}/recommendations/generate",
                            web::post().to(recommendation::generate),
                        )
                        .route(
                            "/recommendations/{id}/details",
                            web::post().to(recommendation::generate_details),
                        )
                        .route(
                            "/recommendations/{id}/claim",
                            web::post().to(recommendation::claim),
                        )
                        .route(
                            "/recommendations/{id}/itinerary",
                            web::put().to(recommendation::edit_itinerary),
                        )
                        .route(
                            "/recommendations/{id}/view-access",
                            web::post().to(recommendation::mint_view_access),
                        )
                        .route(
                            "/recommendations/{id}/share",
                            web::post().to(recommendation::share),
                        )
                        .route("/my-trips", web::get().to(recommendation::my_trips)),
                ),
        );
}
