//! Intent-driven owner of a list's query state.
//!
//! Screens send [`ListIntent`]s; the controller task applies them to its
//! [`ListQuery`], starts a fetch and publishes the outcome on a watch channel.
//! Every fetch carries a generation number and only the latest generation is
//! ever published, so a slow response for an old query is dropped.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::Document;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::errors::Result;
use crate::services::pagination::{ListEngine, ListQuery, Page};
use crate::store::{DataStore, StoreQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListIntent {
    Search(String),
    Filter { field: String, value: Option<String> },
    Page(u32),
    NextPage,
    PreviousPage,
    PageSize(u32),
    Refresh,
}

#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    async fn fetch(&self, query: &ListQuery) -> Result<Page<Self::Item>>;
}

/// Pages of one collection read through [`ListEngine::fetch`].
pub struct StorePageSource {
    store: Arc<dyn DataStore>,
    collection: String,
    base: StoreQuery,
    search_fields: &'static [&'static str],
}

impl StorePageSource {
    pub fn new(
        store: Arc<dyn DataStore>,
        collection: impl Into<String>,
        base: StoreQuery,
        search_fields: &'static [&'static str],
    ) -> Self {
        StorePageSource {
            store,
            collection: collection.into(),
            base,
            search_fields,
        }
    }
}

#[async_trait]
impl PageSource for StorePageSource {
    type Item = Document;

    async fn fetch(&self, query: &ListQuery) -> Result<Page<Document>> {
        ListEngine::new(self.search_fields)
            .fetch(self.store.as_ref(), &self.collection, self.base.clone(), query)
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListView<T> {
    Loading { query: ListQuery },
    Ready { query: ListQuery, page: Page<T> },
    Failed { query: ListQuery, message: String },
}

impl<T> ListView<T> {
    pub fn query(&self) -> &ListQuery {
        match self {
            ListView::Loading { query } | ListView::Ready { query, .. } | ListView::Failed { query, .. } => query,
        }
    }
}

pub struct ListControllerHandle<T> {
    intents: mpsc::Sender<ListIntent>,
    view: watch::Receiver<ListView<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone> ListControllerHandle<T> {
    pub async fn send(&self, intent: ListIntent) -> bool {
        self.intents.send(intent).await.is_ok()
    }

    pub fn view(&self) -> ListView<T> {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListView<T>> {
        self.view.clone()
    }

    /// Stop accepting intents and wait for the controller to finish.
    pub async fn shutdown(self) {
        drop(self.intents);
        if let Err(e) = self.task.await {
            tracing::warn!("list controller ended abnormally: {}", e);
        }
    }
}

fn apply(query: &mut ListQuery, intent: ListIntent, total_pages: Option<u32>) {
    match intent {
        ListIntent::Search(term) => query.set_search_term(term),
        ListIntent::Filter { field, value: Some(value) } => query.set_filter(field, value),
        ListIntent::Filter { field, value: None } => query.clear_filter(&field),
        ListIntent::Page(page) => query.set_page(page),
        // Without a first page there is no known last page to move towards.
        ListIntent::NextPage => {
            if let Some(total) = total_pages {
                query.next_page(total);
            }
        }
        ListIntent::PreviousPage => query.previous_page(),
        ListIntent::PageSize(size) => query.set_page_size(size),
        ListIntent::Refresh => {}
    }
}

pub fn spawn_list_controller<S: PageSource>(source: Arc<S>, initial: ListQuery) -> ListControllerHandle<S::Item> {
    let (intent_tx, mut intent_rx) = mpsc::channel::<ListIntent>(32);
    let (view_tx, view_rx) = watch::channel(ListView::Loading { query: initial.clone() });
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(u64, ListQuery, Result<Page<S::Item>>)>();

    let start = move |generation: u64, query: ListQuery| {
        let source = source.clone();
        let result_tx = result_tx.clone();
        tokio::spawn(async move {
            let outcome = source.fetch(&query).await;
            // The controller may already be gone; nothing to report to.
            let _ = result_tx.send((generation, query, outcome));
        });
    };

    let task = tokio::spawn({
        let mut query = initial;
        let mut generation: u64 = 1;
        let mut total_pages: Option<u32> = None;
        start(generation, query.clone());

        async move {
            loop {
                tokio::select! {
                    intent = intent_rx.recv() => {
                        let Some(intent) = intent else { break };
                        apply(&mut query, intent, total_pages);
                        generation += 1;
                        view_tx.send_replace(ListView::Loading { query: query.clone() });
                        start(generation, query.clone());
                    }
                    Some((finished, fetched, outcome)) = result_rx.recv() => {
                        if finished != generation {
                            tracing::debug!("discarding stale page for generation {} (latest {})", finished, generation);
                            continue;
                        }
                        let view = match outcome {
                            Ok(page) => {
                                total_pages = Some(page.total_pages);
                                ListView::Ready { query: fetched, page }
                            }
                            Err(e) => {
                                tracing::warn!("❌ list fetch failed: {}", e);
                                ListView::Failed { query: fetched, message: e.to_string() }
                            }
                        };
                        view_tx.send_replace(view);
                    }
                }
            }
        }
    });

    ListControllerHandle {
        intents: intent_tx,
        view: view_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::store::{Direction, MemoryStore};
    use mongodb::bson::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves `items` through the list engine, taking `delay(page)` to answer.
    struct SlowSource {
        items: Vec<Document>,
        delay: fn(u32) -> Duration,
        calls: AtomicUsize,
        fail: bool,
    }

    impl SlowSource {
        fn new(count: i32, delay: fn(u32) -> Duration) -> Self {
            SlowSource {
                items: (1..=count).map(|n| doc! { "n": n, "name": format!("Rider {}", n) }).collect(),
                delay,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl PageSource for SlowSource {
        type Item = Document;

        async fn fetch(&self, query: &ListQuery) -> Result<Page<Document>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep((self.delay)(query.page())).await;
            if self.fail {
                return Err(AppError::data_unavailable("store offline"));
            }
            Ok(ListEngine::new(&["name"]).paginate(&self.items, query))
        }
    }

    async fn settled<T: Clone>(handle: &ListControllerHandle<T>) -> ListView<T> {
        let mut view = handle.subscribe();
        view.wait_for(|view| !matches!(view, ListView::Loading { .. }))
            .await
            .map(|view| view.clone())
            .unwrap()
    }

    /// Send `intent` and return the query it produced plus the settled view.
    async fn dispatch<T: Clone>(handle: &ListControllerHandle<T>, intent: ListIntent) -> (ListQuery, ListView<T>) {
        let mut view = handle.subscribe();
        // A fresh receiver has not seen the current value yet.
        view.borrow_and_update();
        assert!(handle.send(intent).await);
        view.changed().await.unwrap();
        let requested = view.borrow_and_update().query().clone();
        let settled = view
            .wait_for(|view| !matches!(view, ListView::Loading { .. }))
            .await
            .map(|view| view.clone())
            .unwrap();
        (requested, settled)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_for_old_queries_are_discarded() {
        let source = Arc::new(SlowSource::new(30, |page| {
            if page == 1 { Duration::from_millis(500) } else { Duration::from_millis(10) }
        }));
        let handle = spawn_list_controller(source.clone(), ListQuery::new(10));

        let (_, view) = dispatch(&handle, ListIntent::Page(2)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(matches!(&view, ListView::Ready { page, .. } if page.page == 2));
        assert!(matches!(handle.view(), ListView::Ready { page, .. } if page.page == 2));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn every_filter_dimension_resets_the_page() {
        let source = Arc::new(SlowSource::new(30, |_| Duration::from_millis(5)));
        let handle = spawn_list_controller(source, ListQuery::new(5));

        let intents = vec![
            ListIntent::Search("rider 1".to_string()),
            ListIntent::Search(String::new()),
            ListIntent::Filter { field: "name".to_string(), value: Some("Rider 3".to_string()) },
            ListIntent::Filter { field: "name".to_string(), value: None },
            ListIntent::PageSize(20),
        ];

        for intent in intents {
            let (requested, _) = dispatch(&handle, ListIntent::Page(3)).await;
            assert_eq!(requested.page(), 3);

            let (requested, view) = dispatch(&handle, intent).await;
            assert_eq!(requested.page(), 1);
            assert_eq!(view.query().page(), 1);
        }
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn next_page_stops_at_the_last_page() {
        let source = Arc::new(SlowSource::new(12, |_| Duration::from_millis(5)));
        let handle = spawn_list_controller(source, ListQuery::new(5));
        settled(&handle).await;

        for _ in 0..5 {
            dispatch(&handle, ListIntent::NextPage).await;
        }

        assert!(matches!(handle.view(), ListView::Ready { page, .. } if page.page == 3 && page.items.len() == 2));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failures_surface_as_an_error_view() {
        let mut source = SlowSource::new(5, |_| Duration::from_millis(5));
        source.fail = true;
        let handle = spawn_list_controller(Arc::new(source), ListQuery::default());

        let view = settled(&handle).await;

        assert!(matches!(view, ListView::Failed { message, .. } if message.contains("store offline")));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn next_page_before_the_first_page_stays_put() {
        let source = Arc::new(SlowSource::new(30, |_| Duration::from_millis(500)));
        let handle = spawn_list_controller(source, ListQuery::new(10));

        let (requested, view) = dispatch(&handle, ListIntent::NextPage).await;

        assert_eq!(requested.page(), 1);
        assert!(matches!(view, ListView::Ready { page, .. } if page.page == 1 && page.total_pages == 3));
        handle.shutdown().await;
    }

    async fn drivers() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                "drivers",
                (1..=12).map(|n| {
                    doc! {
                        "n": n,
                        "full_name": format!("Driver {}", n),
                        "verified": n % 3 != 0,
                    }
                }),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn store_source_drives_the_controller() {
        let store = drivers().await;
        let source = StorePageSource::new(
            store,
            "drivers",
            StoreQuery::new().order_by("n", Direction::Ascending),
            &["full_name"],
        );
        let handle = spawn_list_controller(Arc::new(source), ListQuery::new(5));

        let first = settled(&handle).await;
        assert!(matches!(&first, ListView::Ready { page, .. } if page.total_items == 12 && page.total_pages == 3));

        let (_, second) = dispatch(&handle, ListIntent::NextPage).await;
        match second {
            ListView::Ready { page, .. } => {
                assert_eq!(page.page, 2);
                assert_eq!(page.items[0].get_i32("n").unwrap(), 6);
            }
            other => panic!("expected a page, got {:?}", other),
        }

        let filter = ListIntent::Filter { field: "verified".to_string(), value: Some("false".to_string()) };
        let (requested, filtered) = dispatch(&handle, filter).await;
        assert_eq!(requested.page(), 1);
        assert!(matches!(filtered, ListView::Ready { page, .. } if page.total_items == 4));

        let (_, searched) = dispatch(&handle, ListIntent::Search("driver 1".to_string())).await;
        // Drivers 1, 10, 11 and 12 match, and of those only 12 is unverified.
        assert!(matches!(searched, ListView::Ready { page, .. } if page.total_items == 1));
        handle.shutdown().await;
    }
}
