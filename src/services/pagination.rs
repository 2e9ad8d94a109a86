//! Filtering and paging for the management screens.
//!
//! Everything here except [`ListEngine::fetch`] is pure: the same items and
//! query always produce the same page.

use std::borrow::Cow;
use std::collections::BTreeMap;

use mongodb::bson::{oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::Result;
use crate::store::{DataStore, Filter, StoreQuery};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Field access for filtering. Dotted names reach into nested values.
pub trait Searchable {
    fn field_text(&self, field: &str) -> Option<Cow<'_, str>>;
}

fn bson_text(value: &Bson) -> Option<Cow<'_, str>> {
    match value {
        Bson::String(text) => Some(Cow::Borrowed(text.as_str())),
        Bson::Int32(n) => Some(Cow::Owned(n.to_string())),
        Bson::Int64(n) => Some(Cow::Owned(n.to_string())),
        Bson::Double(n) => Some(Cow::Owned(n.to_string())),
        Bson::Boolean(b) => Some(Cow::Owned(b.to_string())),
        Bson::ObjectId(id) => Some(Cow::Owned(id.to_hex())),
        Bson::DateTime(dt) => dt.try_to_rfc3339_string().ok().map(Cow::Owned),
        _ => None,
    }
}

/// Store filter equivalent to `field_text(field) == value`. The console only
/// sends text, so every typed reading of `value` that prints back as the same
/// text is offered to the store as well.
pub fn equality_filter(field: &str, value: &str) -> Filter {
    let mut candidates = vec![Bson::String(value.to_string())];

    match value {
        "true" => candidates.push(Bson::Boolean(true)),
        "false" => candidates.push(Bson::Boolean(false)),
        _ => {}
    }
    if let Ok(n) = value.parse::<i64>() {
        if n.to_string() == value {
            candidates.push(Bson::Int64(n));
        }
    } else if let Ok(n) = value.parse::<f64>() {
        if n.is_finite() && n.to_string() == value {
            candidates.push(Bson::Double(n));
        }
    }
    if let Ok(id) = ObjectId::parse_str(value) {
        if id.to_hex() == value {
            candidates.push(Bson::ObjectId(id));
        }
    }

    if candidates.len() == 1 {
        Filter::eq(field, value)
    } else {
        Filter::is_in(field, candidates)
    }
}

impl Searchable for Document {
    fn field_text(&self, field: &str) -> Option<Cow<'_, str>> {
        let mut segments = field.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Bson::Document(inner) => inner.get(segment)?,
                _ => return None,
            };
        }
        bson_text(current)
    }
}

/// Search, filter and page state for one list. Changing the search term, a
/// filter or the page size always moves back to page 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    search_term: String,
    filters: BTreeMap<String, String>,
    page: u32,
    page_size: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListQuery {
    pub fn new(page_size: u32) -> Self {
        ListQuery {
            search_term: String::new(),
            filters: BTreeMap::new(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.page = 1;
    }

    pub fn set_filter(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.filters.insert(field.into(), value.into());
        self.page = 1;
    }

    pub fn clear_filter(&mut self, field: &str) {
        self.filters.remove(field);
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self, total_pages: u32) {
        self.page = self.page.saturating_add(1).min(total_pages.max(1));
    }

    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.set_search_term(term);
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_filter(field, value);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.set_page(page);
        self
    }

    /// Index of the first item on the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

pub fn total_pages(match_count: u64, page_size: u32) -> u32 {
    let pages = match_count.div_ceil(u64::from(page_size.max(1)));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Number(u32),
    Ellipsis,
}

impl Serialize for PageMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PageMarker::Number(page) => serializer.serialize_u32(*page),
            PageMarker::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

/// Page links to show: every page when there are at most five, otherwise the
/// first and last page around a short window on the current one.
pub fn condensed_page_numbers(current: u32, total: u32) -> Vec<PageMarker> {
    use PageMarker::{Ellipsis, Number};

    if total <= 5 {
        return (1..=total).map(Number).collect();
    }

    let current = current.clamp(1, total);
    let mut markers = Vec::with_capacity(7);

    if current <= 3 {
        markers.extend((1..=4).map(Number));
        markers.push(Ellipsis);
        markers.push(Number(total));
    } else if current >= total - 2 {
        markers.push(Number(1));
        markers.push(Ellipsis);
        markers.extend((total - 3..=total).map(Number));
    } else {
        markers.push(Number(1));
        markers.push(Ellipsis);
        markers.extend((current - 1..=current + 1).map(Number));
        markers.push(Ellipsis);
        markers.push(Number(total));
    }

    markers
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub page_numbers: Vec<PageMarker>,
}

impl<T> Page<T> {
    /// Wrap an already-sliced window of a list with `total_items` matches.
    pub fn from_window(items: Vec<T>, total_items: u64, query: &ListQuery) -> Self {
        let total_pages = total_pages(total_items, query.page_size());
        Page {
            items,
            page: query.page(),
            page_size: query.page_size(),
            total_items,
            total_pages,
            page_numbers: condensed_page_numbers(query.page(), total_pages),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
            page_numbers: self.page_numbers,
        }
    }
}

/// Applies a [`ListQuery`] to items, searching the configured text fields.
#[derive(Debug, Clone, Copy)]
pub struct ListEngine<'a> {
    search_fields: &'a [&'a str],
}

impl<'a> ListEngine<'a> {
    pub fn new(search_fields: &'a [&'a str]) -> Self {
        ListEngine { search_fields }
    }

    pub fn matches<T: Searchable>(&self, item: &T, query: &ListQuery) -> bool {
        let needle = query.search_term().to_lowercase();
        let searched = needle.is_empty()
            || self.search_fields.iter().any(|field| {
                item.field_text(field)
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&needle)
            });

        searched
            && query
                .filters()
                .iter()
                .all(|(field, expected)| item.field_text(field).is_some_and(|actual| actual == expected.as_str()))
    }

    pub fn paginate<T: Searchable + Clone>(&self, items: &[T], query: &ListQuery) -> Page<T> {
        let matching: Vec<&T> = items.iter().filter(|item| self.matches(*item, query)).collect();
        let start = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let window = matching
            .iter()
            .skip(start)
            .take(query.page_size() as usize)
            .map(|item| (*item).clone())
            .collect();

        Page::from_window(window, matching.len() as u64, query)
    }

    /// Fetch one page of `collection`. Without a search term the filters and
    /// the page window go to the store (`count` plus a ranged read); with one,
    /// every candidate is read and filtered here.
    pub async fn fetch(
        &self,
        store: &dyn DataStore,
        collection: &str,
        base: StoreQuery,
        query: &ListQuery,
    ) -> Result<Page<Document>> {
        if query.search_term().is_empty() {
            let filters: Vec<Filter> = base
                .filters
                .iter()
                .cloned()
                .chain(query.filters().iter().map(|(field, value)| equality_filter(field, value)))
                .collect();

            let total = store.count(collection, &filters).await?;
            let mut ranged = base.range(query.offset(), u64::from(query.page_size()));
            ranged.filters = filters;
            let items = store.query(collection, &ranged).await?;

            return Ok(Page::from_window(items, total, query));
        }

        let candidates = store.query(collection, &base).await?;
        Ok(self.paginate(&candidates, query))
    }
}
