use std::collections::HashMap;

use mongodb::bson::{oid::ObjectId, Bson, Document};
use serde_json::Value;

use crate::errors::{AppError, Result};
use crate::services::pagination::{ListQuery, Page, DEFAULT_PAGE_SIZE};

pub(crate) mod auth;
pub(crate) mod payouts;
pub(crate) mod resources;
pub(crate) mod settings;
pub(crate) mod transactions;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Query-string value the console sends for "no filter".
const ANY: &str = "all";

/// Build a [`ListQuery`] from `?page=&page_size=&search=&<field>=` params.
/// Only fields in `filterable` become filters; anything else is ignored.
pub fn list_query_from_params(params: &HashMap<String, String>, filterable: &[&str]) -> Result<ListQuery> {
    let page_size = match params.get("page_size") {
        Some(raw) => raw.parse::<u32>()?,
        None => DEFAULT_PAGE_SIZE,
    };
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::invalid_data(format!("page_size must be between 1 and {}", MAX_PAGE_SIZE)));
    }

    let mut query = ListQuery::new(page_size);
    if let Some(term) = params.get("search") {
        query.set_search_term(term.trim());
    }
    for field in filterable {
        match params.get(*field) {
            Some(value) if !value.is_empty() && value != ANY => query.set_filter(*field, value.as_str()),
            _ => {}
        }
    }
    if let Some(raw) = params.get("page") {
        query.set_page(raw.parse::<u32>()?);
    }

    Ok(query)
}

pub fn parse_object_id(id: &str) -> Result<ObjectId> {
    Ok(ObjectId::parse_str(id)?)
}

fn plain(value: Bson) -> Bson {
    match value {
        Bson::ObjectId(id) => Bson::String(id.to_hex()),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().map(Bson::String).unwrap_or(Bson::DateTime(dt)),
        Bson::Document(inner) => Bson::Document(plain_document(inner)),
        Bson::Array(items) => Bson::Array(items.into_iter().map(plain).collect()),
        other => other,
    }
}

fn plain_document(document: Document) -> Document {
    document
        .into_iter()
        .map(|(key, value)| {
            let key = if key == "_id" { "id".to_string() } else { key };
            (key, plain(value))
        })
        .collect()
}

/// Plain JSON for the console: `_id` becomes `id`, object ids become hex
/// strings and dates RFC 3339 strings.
pub fn document_json(document: Document) -> Value {
    Bson::Document(plain_document(document)).into_relaxed_extjson()
}

pub fn page_json(page: Page<Document>) -> Page<Value> {
    page.map(document_json)
}
