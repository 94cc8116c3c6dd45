use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use futures::TryStreamExt;
use mongodb::{Client, Collection};

use crate::errors::ServiceError;
use crate::models::chat::Chat;
use crate::models::recommendation::{GeneralRecommendation, ItineraryDay, Recommendation};

const DB_NAME: &str = "velzy";
const RECOMMENDATIONS: &str = "Recommendations";
const GENERAL_RECOMMENDATIONS: &str = "GeneralRecommendations";
const CHATS: &str = "Chats";
const USERS: &str = "Users";

/// Persistence seam for the recommendation store. The conditional updates
/// (`*_if_empty`, `*_if_absent`) are single-document atomic operations used
/// to narrow the idempotence race windows.
#[async_trait]
pub trait RecommendationRepo: Send + Sync {
    async fn general_recommendations(&self) -> Result<Vec<GeneralRecommendation>, ServiceError>;

    async fn general_recommendation_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<GeneralRecommendation>, ServiceError>;

    /// The chat collaborator's lookup: id and owner must both match.
    async fn chat_by_id(
        &self,
        chat_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Chat>, ServiceError>;

    async fn recommendations_by_chat(
        &self,
        chat_id: &ObjectId,
    ) -> Result<Vec<Recommendation>, ServiceError>;

    async fn recommendation_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError>;

    /// The record only if `user_id` has already claimed it.
    async fn recommendation_claimed_by(
        &self,
        user_id: &ObjectId,
        recommendation_id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError>;

    /// The caller's clone of a general template, if any (`chat_id` stores the
    /// template id for clones).
    async fn recommendation_cloned_from(
        &self,
        user_id: &ObjectId,
        general_id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError>;

    async fn recommendations_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Recommendation>, ServiceError>;

    async fn insert_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<ObjectId, ServiceError>;

    async fn insert_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<Vec<ObjectId>, ServiceError>;

    /// Atomically populates the itinerary, but only while it is still empty.
    /// Returns false when another generation won the race.
    async fn set_itineraries_if_empty(
        &self,
        id: &ObjectId,
        itineraries: &[ItineraryDay],
        days_count: u32,
    ) -> Result<bool, ServiceError>;

    /// Wholesale replacement, no merge.
    async fn replace_itineraries(
        &self,
        id: &ObjectId,
        itineraries: &[ItineraryDay],
    ) -> Result<(), ServiceError>;

    async fn set_owner(&self, id: &ObjectId, user_id: &ObjectId) -> Result<(), ServiceError>;

    /// Mints the view token only if none is stored yet. Returns false when a
    /// token already existed.
    async fn set_view_access_if_absent(
        &self,
        id: &ObjectId,
        token: &str,
    ) -> Result<bool, ServiceError>;

    async fn user_full_name(&self, user_id: &ObjectId) -> Result<Option<String>, ServiceError>;
}

pub struct MongoRecommendationRepo {
    client: Arc<Client>,
}

impl MongoRecommendationRepo {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn recommendations(&self) -> Collection<Recommendation> {
        self.client.database(DB_NAME).collection(RECOMMENDATIONS)
    }

    fn generals(&self) -> Collection<GeneralRecommendation> {
        self.client
            .database(DB_NAME)
            .collection(GENERAL_RECOMMENDATIONS)
    }

    fn chats(&self) -> Collection<Chat> {
        self.client.database(DB_NAME).collection(CHATS)
    }

    fn users(&self) -> Collection<Document> {
        self.client.database(DB_NAME).collection(USERS)
    }
}

fn to_bson_array(itineraries: &[ItineraryDay]) -> Result<bson::Bson, ServiceError> {
    bson::to_bson(itineraries)
        .map_err(|e| ServiceError::Upstream(format!("Failed to encode itineraries: {}", e)))
}

#[async_trait]
impl RecommendationRepo for MongoRecommendationRepo {
    async fn general_recommendations(&self) -> Result<Vec<GeneralRecommendation>, ServiceError> {
        let cursor = self.generals().find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn general_recommendation_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<GeneralRecommendation>, ServiceError> {
        Ok(self.generals().find_one(doc! { "_id": id }).await?)
    }

    async fn chat_by_id(
        &self,
        chat_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Chat>, ServiceError> {
        Ok(self
            .chats()
            .find_one(doc! { "_id": chat_id, "userId": user_id })
            .await?)
    }

    async fn recommendations_by_chat(
        &self,
        chat_id: &ObjectId,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let cursor = self
            .recommendations()
            .find(doc! { "chatId": chat_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn recommendation_by_id(
        &self,
        id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError> {
        Ok(self.recommendations().find_one(doc! { "_id": id }).await?)
    }

    async fn recommendation_claimed_by(
        &self,
        user_id: &ObjectId,
        recommendation_id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError> {
        Ok(self
            .recommendations()
            .find_one(doc! { "_id": recommendation_id, "userId": user_id })
            .await?)
    }

    async fn recommendation_cloned_from(
        &self,
        user_id: &ObjectId,
        general_id: &ObjectId,
    ) -> Result<Option<Recommendation>, ServiceError> {
        Ok(self
            .recommendations()
            .find_one(doc! { "chatId": general_id, "userId": user_id })
            .await?)
    }

    async fn recommendations_by_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let cursor = self
            .recommendations()
            .find(doc! { "userId": user_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_recommendation(
        &self,
        recommendation: &Recommendation,
    ) -> Result<ObjectId, ServiceError> {
        let result = self.recommendations().insert_one(recommendation).await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ServiceError::Upstream("Inserted id was not an ObjectId".to_string()))
    }

    async fn insert_recommendations(
        &self,
        recommendations: &[Recommendation],
    ) -> Result<Vec<ObjectId>, ServiceError> {
        let result = self.recommendations().insert_many(recommendations).await?;
        let mut ids = Vec::with_capacity(recommendations.len());
        for index in 0..recommendations.len() {
            let id = result
                .inserted_ids
                .get(&index)
                .and_then(|id| id.as_object_id())
                .ok_or_else(|| {
                    ServiceError::Upstream("Inserted id was not an ObjectId".to_string())
                })?;
            ids.push(id);
        }
        Ok(ids)
    }

    async fn set_itineraries_if_empty(
        &self,
        id: &ObjectId,
        itineraries: &[ItineraryDay],
        days_count: u32,
    ) -> Result<bool, ServiceError> {
        let result = self
            .recommendations()
            .update_one(
                doc! { "_id": id, "itineraries": { "$size": 0 } },
                doc! { "$set": {
                    "itineraries": to_bson_array(itineraries)?,
                    "daysCount": days_count as i64,
                } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn replace_itineraries(
        &self,
        id: &ObjectId,
        itineraries: &[ItineraryDay],
    ) -> Result<(), ServiceError> {
        self.recommendations()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "itineraries": to_bson_array(itineraries)? } },
            )
            .await?;
        Ok(())
    }

    async fn set_owner(&self, id: &ObjectId, user_id: &ObjectId) -> Result<(), ServiceError> {
        self.recommendations()
            .update_one(doc! { "_id": id }, doc! { "$set": { "userId": user_id } })
            .await?;
        Ok(())
    }

    async fn set_view_access_if_absent(
        &self,
        id: &ObjectId,
        token: &str,
    ) -> Result<bool, ServiceError> {
        // "viewAccess: null" matches both a null field and a missing one.
        let result = self
            .recommendations()
            .update_one(
                doc! { "_id": id, "viewAccess": null },
                doc! { "$set": { "viewAccess": token } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn user_full_name(&self, user_id: &ObjectId) -> Result<Option<String>, ServiceError> {
        let user = self.users().find_one(doc! { "_id": user_id }).await?;
        Ok(user.and_then(|doc| doc.get_str("fullName").ok().map(str::to_string)))
    }
}
