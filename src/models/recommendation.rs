use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A single stop within a day of an itinerary. Coordinates are `[lat, lon]`.
/// The AI proposal arrives without images; enrichment fills `image` in, and a
/// failed image lookup leaves it `None` rather than failing the batch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryLocation {
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub day: String,
    pub locations: Vec<ItineraryLocation>,
}

/// The central document. A recommendation starts as a candidate (empty
/// `itineraries`), may later be detailed, claimed into a user's trips, and
/// shared through an opaque `view_access` token.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Origin conversation, or the source template id when cloned from a
    /// general recommendation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ObjectId>,
    /// Owner. Absent until the recommendation is claimed into "my trips".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    pub city: String,
    pub country: String,
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_count: Option<u32>,
    #[serde(default)]
    pub itineraries: Vec<ItineraryDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_access: Option<String>,
}

impl Recommendation {
    pub fn is_detailed(&self) -> bool {
        !self.itineraries.is_empty()
    }

    pub fn is_owned_by(&self, user_id: &ObjectId) -> bool {
        self.user_id.as_ref() == Some(user_id)
    }
}

/// Curated, admin-seeded template. Read-only to this service; cloning it into
/// a trip produces a fresh `Recommendation`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GeneralRecommendation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub city: String,
    pub country: String,
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_count: Option<u32>,
    #[serde(default)]
    pub itineraries: Vec<ItineraryDay>,
}
