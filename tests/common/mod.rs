//! In-memory repository and scripted collaborators so the store's behavior
//! can be exercised without a MongoDB instance or the network.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use velzy_api::db::repo::RecommendationRepo;
use velzy_api::errors::ServiceError;
use velzy_api::models::chat::{Chat, ChatMessage, Sender};
use velzy_api::models::recommendation::{
    GeneralRecommendation, ItineraryDay, ItineraryLocation, Recommendation,
};
use velzy_api::services::ai::{AiClient, CityProposal, ItineraryProposal};
use velzy_api::services::geocode::{GeocodeClient, NO_MATCH};
use velzy_api::services::images::ImageClient;
use velzy_api::services::mailer::{Mailer, ShareEmail};
use velzy_api::services::recommendation_service::RecommendationService;

pub const TEST_BASE_URL: &str = "https://velzy.test";
pub const TEST_COORDINATES: [f64; 2] = [-6.1753924, 106.8271528];

#[derive(Default)]
pub struct InMemoryRepo {
    pub recommendations: Mutex<Vec<Recommendation>>,
    pub generals: Mutex<Vec<GeneralRecommendation>>,
    pub chats: Mutex<Vec<Chat>>,
    pub users: Mutex<HashMap<ObjectId, String>>,
}

impl InMemoryRepo {
    pub fn seed_chat(&self, user_id: ObjectId, user_messages: &[&str]) -> ObjectId {
        let id = ObjectId::new();
        let mut messages = vec![ChatMessage {
            sender: Sender::Bot,
            message: "Hi, I am Velzy. How can I assist you today?".to_string(),
        }];
        for text in user_messages {
            messages.push(ChatMessage {
                sender: Sender::User,
                message: text.to_string(),
            });
        }
        self.chats.lock().unwrap().push(Chat {
            id: Some(id),
            user_id,
            messages,
        });
        id
    }

    pub fn seed_general(&self, city: &str, country: &str, country_code: &str) -> ObjectId {
        let id = ObjectId::new();
        self.generals.lock().unwrap().push(GeneralRecommendation {
            id: Some(id),
            city: city.to_string(),
            country: country.to_string(),
            country_code: country_code.to_string(),
            city_image: Some(format!("https://images.test/{}.jpg", city)),
            days_count: Some(2),
            itineraries: vec![ItineraryDay {
                day: "Day 1".to_string(),
                locations: Vec::new(),
            }],
        });
        id
    }
}

#[async_trait]
impl RecommendationRepo for InMemoryRepo {
    async fn general_recommendations(&self) -> Result<Vec<GeneralRecommendation>, ServiceError> {
        Ok(self.generals.lock().unwrap().clone())
    }

    async fn general_recommendation_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<GeneralRecommendation>, ServiceError> {
        Ok(self
            .generals
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.id.as_ref() == Some(id))
            .cloned())
    }

    async fn chat_by_id(
        &self,
        chat_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Chat>, ServiceError> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id.as_ref() == Some(chat_id) && c.user_id == *user_id)
            .cloned())
    }

    async fn recommendations_by_chat(
        &self,
        chat_id: &ObjectId,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        Ok(self
            .recommendations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.chat_id.as_ref() == Some(chat_id))
            .cloned()
            .collect())
    }

    async fn recommendation_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError> {
        Ok(self
            .recommendations
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id.as_ref() == Some(id))
            .cloned())
    }

    async fn recommendation_claimed_by(
        &self,
        user_id: &ObjectId,
        recommendation_id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError> {
        Ok(self
            .recommendations
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.id.as_ref() == Some(recommendation_id) && r.user_id.as_ref() == Some(user_id)
            })
            .cloned())
    }

    async fn recommendation_cloned_from(
        &self,
        user_id: &ObjectId,
        general_id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError> {
        Ok(self
            .recommendations
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.chat_id.as_ref() == Some(general_id) && r.user_id.as_ref() == Some(user_id)
            })
            .cloned())
    }

    async fn recommendations_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        Ok(self
            .recommendations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id.as_ref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn insert_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<ObjectId, ServiceError> {
        let id = ObjectId::new();
        let mut stored = recommendation.clone();
        stored.id = Some(id);
        self.recommendations.lock().unwrap().push(stored);
        Ok(id)
    }

    async fn insert_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<Vec<ObjectId>, ServiceError> {
        let mut ids = Vec::with_capacity(recommendations.len());
        for recommendation in recommendations {
            ids.push(self.insert_recommendation(recommendation).await?);
        }
        Ok(ids)
    }

    async fn set_itineraries_if_empty(
        &self,
        id: &ObjectId,
        itineraries: &[ItineraryDay],
        days_count: u32,
    ) -> Result<bool, ServiceError> {
        let mut all = self.recommendations.lock().unwrap();
        match all
            .iter_mut()
            .find(|r| r.id.as_ref() == Some(id) && r.itineraries.is_empty())
        {
            Some(record) => {
                record.itineraries = itineraries.to_vec();
                record.days_count = Some(days_count);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_itineraries(
        &self,
        id: &ObjectId,
        itineraries: &[ItineraryDay],
    ) -> Result<(), ServiceError> {
        let mut all = self.recommendations.lock().unwrap();
        if let Some(record) = all.iter_mut().find(|r| r.id.as_ref() == Some(id)) {
            record.itineraries = itineraries.to_vec();
        }
        Ok(())
    }

    async fn set_owner(&self, id: &ObjectId, user_id: &ObjectId) -> Result<(), ServiceError> {
        let mut all = self.recommendations.lock().unwrap();
        if let Some(record) = all.iter_mut().find(|r| r.id.as_ref() == Some(id)) {
            record.user_id = Some(*user_id);
        }
        Ok(())
    }

    async fn set_view_access_if_absent(
        &self,
        id: &ObjectId,
        token: &str,
    ) -> Result<bool, ServiceError> {
        let mut all = self.recommendations.lock().unwrap();
        match all
            .iter_mut()
            .find(|r| r.id.as_ref() == Some(id) && r.view_access.is_none())
        {
            Some(record) => {
                record.view_access = Some(token.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn user_full_name(&self, user_id: &ObjectId) -> Result<Option<String>, ServiceError> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }
}

/// Canned AI replies plus call counters for the idempotence assertions.
pub struct ScriptedAi {
    pub cities: Vec<CityProposal>,
    pub itinerary: ItineraryProposal,
    pub city_calls: AtomicU32,
    pub itinerary_calls: AtomicU32,
}

impl ScriptedAi {
    pub fn new(cities: Vec<CityProposal>, itinerary: ItineraryProposal) -> Self {
        Self {
            cities,
            itinerary,
            city_calls: AtomicU32::new(0),
            itinerary_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AiClient for ScriptedAi {
    async fn propose_cities(&self, _transcript: &str) -> Result<Vec<CityProposal>, ServiceError> {
        self.city_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cities.clone())
    }

    async fn propose_itinerary(
        &self,
        _transcript: &str,
        _city: &str,
        _country: &str,
    ) -> Result<ItineraryProposal, ServiceError> {
        self.itinerary_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.itinerary.clone())
    }
}

pub struct FixedImages;

#[async_trait]
impl ImageClient for FixedImages {
    async fn search_image(&self, query: &str) -> Option<String> {
        Some(format!(
            "https://images.test/{}.jpg",
            query.replace(' ', "-").to_lowercase()
        ))
    }
}

/// Every image lookup comes back empty, as with zero search results.
pub struct MissingImages;

#[async_trait]
impl ImageClient for MissingImages {
    async fn search_image(&self, _query: &str) -> Option<String> {
        None
    }
}

pub struct FixedGeocoder;

#[async_trait]
impl GeocodeClient for FixedGeocoder {
    async fn resolve_coordinates(
        &self,
        _location: &str,
        _city: &str,
        _country: &str,
    ) -> [f64; 2] {
        TEST_COORDINATES
    }
}

/// Every fallback query misses, so only the sentinel remains.
pub struct UnresolvedGeocoder;

#[async_trait]
impl GeocodeClient for UnresolvedGeocoder {
    async fn resolve_coordinates(
        &self,
        _location: &str,
        _city: &str,
        _country: &str,
    ) -> [f64; 2] {
        NO_MATCH
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<ShareEmail>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_share(&self, email: &ShareEmail) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Upstream("SMTP connection reset".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn six_city_proposals() -> Vec<CityProposal> {
    [
        ("Paris", "France", "FR"),
        ("Rome", "Italy", "IT"),
        ("Barcelona", "Spain", "ES"),
        ("Amsterdam", "Netherlands", "NL"),
        ("Prague", "Czech Republic", "CZ"),
        ("Vienna", "Austria", "AT"),
    ]
    .into_iter()
    .map(|(city, country, code)| CityProposal {
        city: city.to_string(),
        country: country.to_string(),
        country_code: code.to_string(),
    })
    .collect()
}

pub fn three_day_itinerary(city: &str, country: &str, country_code: &str) -> ItineraryProposal {
    let itineraries = (1..=3)
        .map(|day| ItineraryDay {
            day: format!("Day {}", day),
            locations: vec![
                ItineraryLocation {
                    slug: format!("stop-{}-a", day),
                    name: format!("Morning Stop {}", day),
                    image: None,
                    category: "Sights & Landmarks".to_string(),
                    coordinates: None,
                },
                ItineraryLocation {
                    slug: format!("stop-{}-b", day),
                    name: format!("Afternoon Stop {}", day),
                    image: None,
                    category: "Cafe".to_string(),
                    coordinates: None,
                },
            ],
        })
        .collect();

    ItineraryProposal {
        city: city.to_string(),
        country: country.to_string(),
        country_code: country_code.to_string(),
        itineraries,
    }
}

pub struct TestHarness {
    pub repo: Arc<InMemoryRepo>,
    pub ai: Arc<ScriptedAi>,
    pub mailer: Arc<RecordingMailer>,
    pub service: Arc<RecommendationService>,
}

pub fn harness() -> TestHarness {
    let repo = Arc::new(InMemoryRepo::default());
    let ai = Arc::new(ScriptedAi::new(
        six_city_proposals(),
        three_day_itinerary("Paris", "France", "FR"),
    ));
    let mailer = Arc::new(RecordingMailer::default());
    let service = Arc::new(RecommendationService::new(
        repo.clone(),
        ai.clone(),
        Arc::new(FixedGeocoder),
        Arc::new(FixedImages),
        mailer.clone(),
        TEST_BASE_URL.to_string(),
    ));

    TestHarness {
        repo,
        ai,
        mailer,
        service,
    }
}

/// Same wiring, but both lookup collaborators miss on every call.
pub fn harness_with_dead_lookups() -> TestHarness {
    let repo = Arc::new(InMemoryRepo::default());
    let ai = Arc::new(ScriptedAi::new(
        six_city_proposals(),
        three_day_itinerary("Paris", "France", "FR"),
    ));
    let mailer = Arc::new(RecordingMailer::default());
    let service = Arc::new(RecommendationService::new(
        repo.clone(),
        ai.clone(),
        Arc::new(UnresolvedGeocoder),
        Arc::new(MissingImages),
        mailer.clone(),
        TEST_BASE_URL.to_string(),
    ));

    TestHarness {
        repo,
        ai,
        mailer,
        service,
    }
}
