pub mod ai;
pub mod geocode;
pub mod images;
pub mod mailer;
pub mod recommendation_service;
pub mod retry;
