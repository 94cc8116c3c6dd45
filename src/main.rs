use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use velzy_api::db::mongo::create_mongo_client;
use velzy_api::db::repo::MongoRecommendationRepo;
use velzy_api::routes;
use velzy_api::services::ai::PerplexityClient;
use velzy_api::services::geocode::NominatimClient;
use velzy_api::services::images::GoogleImageSearch;
use velzy_api::services::mailer::HttpMailer;
use velzy_api::services::recommendation_service::RecommendationService;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let host = std::env::var("HOST").unwrap_or_else(|_| HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| PORT.to_string())
        .parse()
        .unwrap_or(PORT);

    let mongo_uri = std::env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let client = create_mongo_client(&mongo_uri).await;
    log::info!("MongoDB connection established");

    let base_url = std::env::var("APP_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    let ai = PerplexityClient::from_env().expect("AI client configuration incomplete");
    let images = GoogleImageSearch::from_env().expect("Image search configuration incomplete");
    let mailer = HttpMailer::from_env().expect("Mailer configuration incomplete");

    let service = Arc::new(RecommendationService::new(
        Arc::new(MongoRecommendationRepo::new(client)),
        Arc::new(ai),
        Arc::new(NominatimClient::new()),
        Arc::new(images),
        Arc::new(mailer),
        base_url,
    ));

    log::info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .app_data(web::Data::new(service.clone()))
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
