use std::sync::Arc;

use futures::future::join_all;
use mongodb::bson::oid::ObjectId;
use rand::{distributions::Alphanumeric, Rng};

use crate::db::repo::RecommendationRepo;
use crate::errors::ServiceError;
use crate::models::chat::Chat;
use crate::models::recommendation::{
    GeneralRecommendation, ItineraryDay, ItineraryLocation, Recommendation,
};
use crate::services::ai::AiClient;
use crate::services::geocode::GeocodeClient;
use crate::services::images::{city_image_query, location_image_query, ImageClient};
use crate::services::mailer::{Mailer, ShareEmail};

const VIEW_TOKEN_LEN: usize = 20;

/// The recommendation store: turns chat transcripts into persisted, enriched
/// travel recommendations and manages claiming, editing, and sharing them.
/// All collaborators are injected so the store can run against fakes.
pub struct RecommendationService {
    repo: Arc<dyn RecommendationRepo>,
    ai: Arc<dyn AiClient>,
    geocoder: Arc<dyn GeocodeClient>,
    images: Arc<dyn ImageClient>,
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl RecommendationService {
    pub fn new(
        repo: Arc<dyn RecommendationRepo>,
        ai: Arc<dyn AiClient>,
        geocoder: Arc<dyn GeocodeClient>,
        images: Arc<dyn ImageClient>,
        mailer: Arc<dyn Mailer>,
        base_url: String,
    ) -> Self {
        Self {
            repo,
            ai,
            geocoder,
            images,
            mailer,
            base_url,
        }
    }

    pub async fn general_recommendations(
        &self,
    ) -> Result<Vec<GeneralRecommendation>, ServiceError> {
        self.repo.general_recommendations().await
    }

    pub async fn general_recommendation_details(
        &self,
        id: &str,
    ) -> Result<GeneralRecommendation, ServiceError> {
        let id = parse_id(id, "General Recommendation ID")?;
        self.repo
            .general_recommendation_by_id(&id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("General Recommendation not found".to_string()))
    }

    /// Clones a curated template into the caller's trips. The clone keeps the
    /// template id in `chat_id`, which doubles as the duplicate-claim key.
    pub async fn add_general_to_trip(
        &self,
        user_id: &str,
        general_id: &str,
    ) -> Result<String, ServiceError> {
        let user_id = parse_user_id(user_id)?;
        let general_id = parse_id(general_id, "General Recommendation ID")?;

        let template = self
            .repo
            .general_recommendation_by_id(&general_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("General Recommendation not found".to_string())
            })?;

        if self
            .repo
            .recommendation_cloned_from(&user_id, &general_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Validation(
                "You have already added this recommendation to your trip".to_string(),
            ));
        }

        let clone = Recommendation {
            id: None,
            chat_id: Some(general_id),
            user_id: Some(user_id),
            city: template.city,
            country: template.country,
            country_code: template.country_code,
            city_image: template.city_image,
            days_count: template.days_count,
            itineraries: template.itineraries,
            view_access: None,
        };

        let inserted_id = self.repo.insert_recommendation(&clone).await?;
        Ok(inserted_id.to_hex())
    }

    /// Candidate generation. Idempotent: once a chat has recommendations, the
    /// existing set is returned and the AI is never consulted again.
    pub async fn generate_recommendations(
        &self,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let user_id = parse_user_id(user_id)?;
        let chat_oid = parse_id(chat_id, "Chat ID")?;

        let chat = self.chat_for(&chat_oid, &user_id).await?;

        let existing = self.repo.recommendations_by_chat(&chat_oid).await?;
        if !existing.is_empty() {
            log::info!("Recommendations already exist for chat {}", chat_oid);
            return Ok(existing);
        }

        let transcript = chat.user_transcript();
        let cities = self.ai.propose_cities(&transcript).await?;

        let candidates: Vec<Recommendation> = join_all(cities.into_iter().map(|proposal| {
            async move {
                let city_image = self
                    .images
                    .search_image(&city_image_query(&proposal.city))
                    .await;
                Recommendation {
                    id: None,
                    chat_id: Some(chat_oid),
                    user_id: None,
                    city: proposal.city,
                    country: proposal.country,
                    country_code: proposal.country_code,
                    city_image,
                    days_count: None,
                    itineraries: Vec::new(),
                    view_access: None,
                }
            }
        }))
        .await;

        let ids = self.repo.insert_recommendations(&candidates).await?;
        Ok(candidates
            .into_iter()
            .zip(ids)
            .map(|(mut recommendation, id)| {
                recommendation.id = Some(id);
                recommendation
            })
            .collect())
    }

    pub async fn recommendations_for_chat(
        &self,
        chat_id: &str,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let chat_id = parse_id(chat_id, "Chat ID")?;
        self.repo.recommendations_by_chat(&chat_id).await
    }

    /// Detail generation. Idempotent: a populated itinerary is returned as-is
    /// without touching the AI. The final write is a single atomic swap
    /// conditioned on the itinerary still being empty, so a concurrent
    /// generation cannot be half-overwritten; the loser of that race returns
    /// the winner's record.
    pub async fn generate_recommendation_details(
        &self,
        user_id: &str,
        recommendation_id: &str,
    ) -> Result<Recommendation, ServiceError> {
        let user_id = parse_user_id(user_id)?;
        let rec_id = parse_id(recommendation_id, "Recommendation ID")?;

        let recommendation = self
            .repo
            .recommendation_by_id(&rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))?;

        if recommendation.is_detailed() {
            log::info!("Recommendation details already exist for {}", rec_id);
            return Ok(recommendation);
        }

        let chat_oid = recommendation
            .chat_id
            .ok_or_else(|| ServiceError::NotFound("Chat not found".to_string()))?;
        let chat = self.chat_for(&chat_oid, &user_id).await?;

        let transcript = chat.user_transcript();
        let proposal = self
            .ai
            .propose_itinerary(&transcript, &recommendation.city, &recommendation.country)
            .await?;

        let itineraries = self
            .enrich_itineraries(
                proposal.itineraries,
                &recommendation.city,
                &recommendation.country,
            )
            .await;
        let days_count = itineraries.len() as u32;

        let won = self
            .repo
            .set_itineraries_if_empty(&rec_id, &itineraries, days_count)
            .await?;
        if !won {
            log::info!("Concurrent detail generation already wrote {}", rec_id);
        }

        self.repo
            .recommendation_by_id(&rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))
    }

    pub async fn recommendation_details(&self, id: &str) -> Result<Recommendation, ServiceError> {
        let id = parse_id(id, "Recommendation ID")?;
        self.repo
            .recommendation_by_id(&id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))
    }

    /// Claims an existing recommendation in place. Deliberately not a copy:
    /// once claimed the candidate belongs to that user.
    pub async fn add_to_trip(
        &self,
        user_id: &str,
        recommendation_id: &str,
    ) -> Result<String, ServiceError> {
        let user_id = parse_user_id(user_id)?;
        let rec_id = parse_id(recommendation_id, "Recommendation ID")?;

        if self
            .repo
            .recommendation_claimed_by(&user_id, &rec_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Validation(
                "You have already added this recommendation to your trip".to_string(),
            ));
        }

        self.repo
            .recommendation_by_id(&rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))?;

        self.repo.set_owner(&rec_id, &user_id).await?;
        Ok("Successfully added to your trip".to_string())
    }

    /// Wholesale itinerary replacement. The payload parse is deliberately
    /// lenient: strict JSON first, then a single-to-double-quote pass for
    /// sloppy clients.
    pub async fn edit_itinerary(
        &self,
        user_id: &str,
        recommendation_id: &str,
        new_itineraries: &str,
    ) -> Result<String, ServiceError> {
        let user_id = parse_user_id(user_id)?;
        let rec_id = parse_id(recommendation_id, "Itinerary ID")?;

        if new_itineraries.trim().is_empty() {
            return Err(ServiceError::Validation(
                "New itineraries are required".to_string(),
            ));
        }
        let itineraries = parse_itineraries_lenient(new_itineraries)?;

        // One message for both "no such record" and "not yours": a caller
        // must not learn which of the two it was.
        self.repo
            .recommendation_claimed_by(&user_id, &rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Itinerary not found".to_string()))?;

        self.repo.replace_itineraries(&rec_id, &itineraries).await?;
        Ok("Successfully edited itinerary".to_string())
    }

    pub async fn my_trips(&self, user_id: &str) -> Result<Vec<Recommendation>, ServiceError> {
        let user_id = parse_user_id(user_id)?;
        self.repo.recommendations_by_user(&user_id).await
    }

    /// One view token per recommendation for its lifetime. Minting is
    /// idempotent; the conditional write keeps a concurrent mint from
    /// replacing an existing token.
    pub async fn generate_view_access(
        &self,
        recommendation_id: &str,
    ) -> Result<String, ServiceError> {
        let rec_id = parse_id(recommendation_id, "Recommendation ID")?;

        let recommendation = self
            .repo
            .recommendation_by_id(&rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))?;

        if let Some(token) = recommendation.view_access {
            return Ok(token);
        }

        let token = new_view_token();
        if self
            .repo
            .set_view_access_if_absent(&rec_id, &token)
            .await?
        {
            return Ok(token);
        }

        // Lost the race; hand back whatever won.
        self.repo
            .recommendation_by_id(&rec_id)
            .await?
            .and_then(|r| r.view_access)
            .ok_or_else(|| ServiceError::Upstream("View access token vanished".to_string()))
    }

    /// Public check endpoint: a wrong token is an ordinary `false`, never an
    /// error. Only a missing recommendation fails.
    pub async fn check_view_access(
        &self,
        recommendation_id: &str,
        token: &str,
    ) -> Result<bool, ServiceError> {
        let rec_id = parse_id(recommendation_id, "Recommendation ID")?;

        let recommendation = self
            .repo
            .recommendation_by_id(&rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))?;

        Ok(recommendation.view_access.as_deref() == Some(token))
    }

    pub async fn share_itinerary(
        &self,
        user_id: &str,
        recommendation_id: &str,
        email: &str,
    ) -> Result<String, ServiceError> {
        let user_oid = parse_user_id(user_id)?;
        let rec_id = parse_id(recommendation_id, "Recommendation ID")?;
        if email.trim().is_empty() {
            return Err(ServiceError::Validation("Email is required".to_string()));
        }

        let recommendation = self
            .repo
            .recommendation_by_id(&rec_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Recommendation not found".to_string()))?;

        if !recommendation.is_owned_by(&user_oid) {
            return Err(ServiceError::Unauthorized(
                "You are not authorized to share this itinerary".to_string(),
            ));
        }

        let token = self.generate_view_access(recommendation_id).await?;
        let link = format!("{}/view/{}?token={}", self.base_url, rec_id.to_hex(), token);

        let full_name = self
            .repo
            .user_full_name(&user_oid)
            .await?
            .unwrap_or_else(|| "A Velzy traveler".to_string());

        let share = ShareEmail {
            to: email.trim().to_string(),
            full_name,
            city: recommendation.city.clone(),
            country: recommendation.country.clone(),
            days_count: recommendation
                .days_count
                .unwrap_or(recommendation.itineraries.len() as u32),
            link,
        };

        self.mailer.send_share(&share).await.map_err(|err| {
            log::error!("Share email to {} failed: {}", share.to, err);
            ServiceError::Validation("Error sending email".to_string())
        })?;

        Ok("Successfully shared itinerary".to_string())
    }

    async fn chat_for(
        &self,
        chat_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Chat, ServiceError> {
        self.repo
            .chat_by_id(chat_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Chat not found".to_string()))
    }

    /// Image and coordinate enrichment, fanned out per location. Locations
    /// share no state, so every lookup runs concurrently; individual misses
    /// leave `image: None` or the `[0, 0]` sentinel.
    async fn enrich_itineraries(
        &self,
        days: Vec<ItineraryDay>,
        city: &str,
        country: &str,
    ) -> Vec<ItineraryDay> {
        join_all(days.into_iter().map(|day| {
            let ItineraryDay { day: label, locations } = day;
            async move {
                let locations = join_all(
                    locations
                        .into_iter()
                        .map(|location| self.enrich_location(location, city, country)),
                )
                .await;
                ItineraryDay {
                    day: label,
                    locations,
                }
            }
        }))
        .await
    }

    async fn enrich_location(
        &self,
        location: ItineraryLocation,
        city: &str,
        country: &str,
    ) -> ItineraryLocation {
        let image_query = location_image_query(&location.name, city);
        let (image, coordinates) = futures::join!(
            self.images.search_image(&image_query),
            self.geocoder.resolve_coordinates(&location.name, city, country),
        );
        ItineraryLocation {
            image,
            coordinates: Some(coordinates),
            ..location
        }
    }
}

fn parse_user_id(raw: &str) -> Result<ObjectId, ServiceError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| ServiceError::Unauthenticated)
}

fn parse_id(raw: &str, what: &str) -> Result<ObjectId, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", what)));
    }
    ObjectId::parse_str(raw).map_err(|_| ServiceError::Validation(format!("Invalid {}", what)))
}

fn new_view_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(VIEW_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Strict parse first; on failure, retry with single quotes normalized to
/// double quotes. Anything still unparseable is the caller's problem.
pub fn parse_itineraries_lenient(raw: &str) -> Result<Vec<ItineraryDay>, ServiceError> {
    serde_json::from_str(raw)
        .or_else(|_| serde_json::from_str(&raw.replace('\'', "\"")))
        .map_err(|_| ServiceError::Validation("Invalid itinerary payload".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_token_is_twenty_alphanumeric_chars() {
        let token = new_view_token();
        assert_eq!(token.len(), VIEW_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, new_view_token());
    }

    #[test]
    fn lenient_parse_accepts_strict_json() {
        let days = parse_itineraries_lenient(
            r#"[{"day":"Day 1","locations":[{"slug":"monas","name":"Monas","category":"Monument","coordinates":[-6.17,106.82]}]}]"#,
        )
        .unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].locations[0].slug, "monas");
    }

    #[test]
    fn lenient_parse_normalizes_single_quotes() {
        let days =
            parse_itineraries_lenient("[{'day': 'Day 1', 'locations': []}]").unwrap();
        assert_eq!(days[0].day, "Day 1");
        assert!(days[0].locations.is_empty());
    }

    #[test]
    fn lenient_parse_rejects_garbage() {
        let err = parse_itineraries_lenient("not an itinerary").unwrap_err();
        assert_eq!(
            err,
            ServiceError::Validation("Invalid itinerary payload".to_string())
        );
    }

    #[test]
    fn missing_id_message_names_the_field() {
        let err = parse_id("", "Recommendation ID").unwrap_err();
        assert_eq!(
            err,
            ServiceError::Validation("Recommendation ID is required".to_string())
        );
    }

    #[test]
    fn malformed_user_id_reads_as_unauthenticated() {
        assert_eq!(
            parse_user_id("not-an-oid").unwrap_err(),
            ServiceError::Unauthenticated
        );
    }
}
