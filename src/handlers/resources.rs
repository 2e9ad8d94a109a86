//! Generic CRUD for the management collections.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use mongodb::bson::{self, oid::ObjectId, Document};
use serde_json::{json, Value};

use crate::errors::{AppError, Result};
use crate::handlers::{document_json, list_query_from_params, parse_object_id};
use crate::services::pagination::{ListEngine, Page};
use crate::state::AppState;
use crate::store::{Direction, Filter, Mutation, StoreQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Drivers,
    Rides,
    Payments,
    RideTypes,
}

impl FromStr for Resource {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "users" => Ok(Resource::Users),
            "drivers" => Ok(Resource::Drivers),
            "rides" => Ok(Resource::Rides),
            "payments" => Ok(Resource::Payments),
            "ride_types" | "ride-types" => Ok(Resource::RideTypes),
            _ => Err(AppError::DocumentNotFound),
        }
    }
}

impl Resource {
    pub fn collection(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Drivers => "drivers",
            Resource::Rides => "rides",
            Resource::Payments => "payments",
            Resource::RideTypes => "ride_types",
        }
    }

    pub fn search_fields(self) -> &'static [&'static str] {
        match self {
            Resource::Users => &["name", "email", "phone"],
            Resource::Drivers => &["full_name", "plate_number", "phone", "model"],
            Resource::Rides => &["pickup_address", "dropoff_address", "rider_id", "driver_id"],
            Resource::Payments => &["reference", "user_id", "method"],
            Resource::RideTypes => &["name", "description"],
        }
    }

    pub fn filters(self) -> &'static [&'static str] {
        match self {
            Resource::Users => &["role", "status"],
            Resource::Drivers => &["status", "payout_frequency"],
            Resource::Rides => &["status", "ride_type"],
            Resource::Payments => &["status", "method"],
            Resource::RideTypes => &["active"],
        }
    }

    /// Fields never sent to or accepted from the console.
    pub fn hidden_fields(self) -> &'static [&'static str] {
        match self {
            Resource::Users => &["password_hash"],
            _ => &[],
        }
    }

    fn strip_hidden(self, mut document: Document) -> Document {
        for field in self.hidden_fields() {
            document.remove(*field);
        }
        document
    }

    /// Payload for an insert or update: a JSON object minus ids and hidden
    /// fields.
    fn payload(self, body: Value) -> Result<Document> {
        if !body.is_object() {
            return Err(AppError::invalid_data("body must be a JSON object"));
        }
        let mut document = bson::to_document(&body).map_err(|e| AppError::invalid_data(e.to_string()))?;
        document.remove("_id");
        document.remove("id");
        Ok(self.strip_hidden(document))
    }
}

pub async fn list_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Value>>> {
    let resource: Resource = resource.parse()?;
    let query = list_query_from_params(&params, resource.filters())?;
    let base = StoreQuery::new().order_by("created_at", Direction::Descending);

    let page = ListEngine::new(resource.search_fields())
        .fetch(state.store.as_ref(), resource.collection(), base, &query)
        .await?;

    Ok(Json(page.map(|document| document_json(resource.strip_hidden(document)))))
}

pub async fn create_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let resource: Resource = resource.parse()?;
    let mut document = resource.payload(body)?;
    let id = ObjectId::new();
    let now = bson::DateTime::from_chrono(state.clock.utc());
    document.insert("_id", id);
    document.insert("created_at", now);
    document.insert("updated_at", now);

    state.store.mutate(resource.collection(), Mutation::Insert(document.clone())).await?;
    tracing::info!("➕ Created {} {}", resource.collection(), id.to_hex());

    Ok((StatusCode::CREATED, Json(document_json(document))))
}

pub async fn update_resource(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let resource: Resource = resource.parse()?;
    let id = parse_object_id(&id)?;
    let mut set = resource.payload(body)?;
    if set.is_empty() {
        return Err(AppError::invalid_data("nothing to update"));
    }
    set.insert("updated_at", bson::DateTime::from_chrono(state.clock.utc()));

    let matched = state
        .store
        .mutate(
            resource.collection(),
            Mutation::Update {
                filters: vec![Filter::eq("_id", id)],
                set,
            },
        )
        .await?;
    if matched == 0 {
        return Err(AppError::DocumentNotFound);
    }

    Ok(Json(json!({ "success": true, "id": id.to_hex() })))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let resource: Resource = resource.parse()?;
    let id = parse_object_id(&id)?;

    let deleted = state
        .store
        .mutate(
            resource.collection(),
            Mutation::Delete {
                filters: vec![Filter::eq("_id", id)],
            },
        )
        .await?;
    if deleted == 0 {
        return Err(AppError::DocumentNotFound);
    }

    tracing::info!("🗑️ Deleted {} {}", resource.collection(), id.to_hex());
    Ok(Json(json!({ "success": true, "id": id.to_hex() })))
}
