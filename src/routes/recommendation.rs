use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::middleware::auth::Claims;
use crate::services::recommendation_service::RecommendationService;

type Service = web::Data<Arc<RecommendationService>>;

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewAccessResponse {
    view_access: String,
}

#[derive(Debug, Serialize)]
struct CheckViewAccessResponse {
    allowed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckViewAccessRequest {
    #[serde(default)]
    view_access: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditItineraryRequest {
    #[serde(default)]
    new_itineraries: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    email: String,
}

/*
    GET /api/recommendations/general
*/
pub async fn general_list(service: Service) -> Result<HttpResponse, ServiceError> {
    let templates = service.general_recommendations().await?;
    Ok(HttpResponse::Ok().json(templates))
}

/*
    GET /api/recommendations/general/{id}
*/
pub async fn general_details(
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let template = service.general_recommendation_details(&path).await?;
    Ok(HttpResponse::Ok().json(template))
}

/*
    POST /api/recommendations/general/{id}/add
*/
pub async fn general_add_to_trip(
    claims: web::ReqData<Claims>,
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let id = service.add_general_to_trip(&claims.user_id, &path).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message: id }))
}

/*
    POST /api/chats/{chat_id}/recommendations/generate
*/
pub async fn generate(
    claims: web::ReqData<Claims>,
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let recommendations = service
        .generate_recommendations(&claims.user_id, &path)
        .await?;
    Ok(HttpResponse::Ok().json(recommendations))
}

/*
    GET /api/chats/{chat_id}/recommendations (public, shared browsing)
*/
pub async fn list_for_chat(
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let recommendations = service.recommendations_for_chat(&path).await?;
    Ok(HttpResponse::Ok().json(recommendations))
}

/*
    POST /api/recommendations/{id}/details
*/
pub async fn generate_details(
    claims: web::ReqData<Claims>,
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let recommendation = service
        .generate_recommendation_details(&claims.user_id, &path)
        .await?;
    Ok(HttpResponse::Ok().json(recommendation))
}

/*
    GET /api/recommendations/{id} (public, used by shared views)
*/
pub async fn details(
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let recommendation = service.recommendation_details(&path).await?;
    Ok(HttpResponse::Ok().json(recommendation))
}

/*
    POST /api/recommendations/{id}/claim
*/
pub async fn claim(
    claims: web::ReqData<Claims>,
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let message = service.add_to_trip(&claims.user_id, &path).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

/*
    PUT /api/recommendations/{id}/itinerary
*/
pub async fn edit_itinerary(
    claims: web::ReqData<Claims>,
    service: Service,
    path: web::Path<String>,
    input: web::Json<EditItineraryRequest>,
) -> Result<HttpResponse, ServiceError> {
    let message = service
        .edit_itinerary(&claims.user_id, &path, &input.new_itineraries)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}

/*
    GET /api/my-trips
*/
pub async fn my_trips(
    claims: web::ReqData<Claims>,
    service: Service,
) -> Result<HttpResponse, ServiceError> {
    let trips = service.my_trips(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(trips))
}

/*
    POST /api/recommendations/{id}/view-access
*/
pub async fn mint_view_access(
    service: Service,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let view_access = service.generate_view_access(&path).await?;
    Ok(HttpResponse::Ok().json(ViewAccessResponse { view_access }))
}

/*
    POST /api/recommendations/{id}/view-access/check (public)
*/
pub async fn check_view_access(
    service: Service,
    path: web::Path<String>,
    input: web::Json<CheckViewAccessRequest>,
) -> Result<HttpResponse, ServiceError> {
    let allowed = service.check_view_access(&path, &input.view_access).await?;
    Ok(HttpResponse::Ok().json(CheckViewAccessResponse { allowed }))
}

/*
    POST /api/recommendations/{id}/share
*/
pub async fn share(
    claims: web::ReqData<Claims>,
    service: Service,
    path: web::Path<String>,
    input: web::Json<ShareRequest>,
) -> Result<HttpResponse, ServiceError> {
    let message = service
        .share_itinerary(&claims.user_id, &path, &input.email)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse { message }))
}
