//! Sync orchestration
//!
//! # Overview
//!
//! [`SyncEngine`] walks the stream graph parents-first. For every stream
//! context it picks a request plan (list endpoint, or search when an
//! incremental stream has a start value), drives the pages, conforms and
//! flattens each record, hands it to the sink and moves the bookmark.
//! Child streams run depth-first, once per parent record.
//!
//! Bookmarks only ever cover emitted records:
//! - ascending streams advance record by record and may checkpoint
//!   mid-stream
//! - unsorted and newest-first streams keep a local progress marker that is
//!   promoted when the context completes
//!
//! Fatal errors abort the run after a final checkpoint. Record transform
//! errors skip the record with a warning.

mod graph;
mod types;

pub use graph::StreamGraph;
pub use types::{StreamStatus, SyncStats};

use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::pagination::{PageIterator, PageRequest, Paginator, RecordSelector, SearchPaginator};
use crate::partition::{date_windows, Context, PartitionRouter};
use crate::schema::{conform_record, flatten_record, flatten_schema, FieldType, ObjectSchema};
use crate::sink::RecordSink;
use crate::state::{is_newer, StateManager};
use crate::streams::{Catalog, PropertySource, StreamDefinition};
use crate::template;
use crate::types::{JsonObject, ReplicationValue, SortOrder};
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Orchestrates a sync run
pub struct SyncEngine {
    config: Arc<TapConfig>,
    client: HttpClient,
    catalog: Catalog,
    graph: StreamGraph,
    state: StateManager,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationToken,
    statuses: Mutex<BTreeMap<String, StreamStatus>>,
    /// Discovered property names per CRM object
    properties: Mutex<HashMap<String, Arc<Vec<String>>>>,
    /// Effective schema per stream
    schemas: Mutex<HashMap<String, Arc<ObjectSchema>>>,
    /// Keeps state writes and STATE messages in the same order
    checkpoint_lock: Mutex<()>,
}

/// Per-run settings shared by every stream task
struct RunScope {
    selected: BTreeSet<String>,
    /// Selected streams plus the parents needed to reach them
    needed: BTreeSet<String>,
    now: DateTime<Utc>,
    start: Option<i64>,
    end: Option<i64>,
    abort: CancellationToken,
}

/// One endpoint walk within a stream context
struct RequestPlan {
    request: PageRequest,
    paginator: Box<dyn Paginator>,
    selector: RecordSelector,
    order: SortOrder,
}

impl SyncEngine {
    /// Create an engine over the HubSpot catalog
    pub fn new(
        config: Arc<TapConfig>,
        client: HttpClient,
        state: StateManager,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Self> {
        Self::with_catalog(config, client, state, sink, Catalog::hubspot())
    }

    /// Create an engine over a custom catalog
    pub fn with_catalog(
        config: Arc<TapConfig>,
        client: HttpClient,
        state: StateManager,
        sink: Arc<dyn RecordSink>,
        catalog: Catalog,
    ) -> Result<Self> {
        let graph = StreamGraph::from_catalog(&catalog)?;
        let statuses = catalog
            .names()
            .into_iter()
            .map(|name| (name.to_string(), StreamStatus::Pending))
            .collect();

        Ok(Self {
            config,
            client,
            catalog,
            graph,
            state,
            sink,
            cancel: CancellationToken::new(),
            statuses: Mutex::new(statuses),
            properties: Mutex::new(HashMap::new()),
            schemas: Mutex::new(HashMap::new()),
            checkpoint_lock: Mutex::new(()),
        })
    }

    /// Stop the run when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn graph(&self) -> &StreamGraph {
        &self.graph
    }

    pub async fn status(&self, stream: &str) -> Option<StreamStatus> {
        self.statuses.lock().await.get(stream).copied()
    }

    pub async fn statuses(&self) -> BTreeMap<String, StreamStatus> {
        self.statuses.lock().await.clone()
    }

    /// Run a sync of the selected streams
    pub async fn run(&self) -> Result<SyncStats> {
        let started = Instant::now();
        let run = self.scope()?;
        info!(streams = run.selected.len(), "Starting sync");

        for name in self.graph.order() {
            if run.selected.contains(name) {
                self.announce(self.catalog.get(name)?).await?;
            }
        }

        let roots: Vec<&str> = self
            .graph
            .roots()
            .into_iter()
            .filter(|root| run.needed.contains(*root))
            .collect();
        let concurrency = self.config.max_concurrent_streams.max(1);

        let mut stats = SyncStats::new();
        let mut failure: Option<Error> = None;
        {
            let mut trees = futures::stream::iter(roots)
                .map(|root| self.sync_tree(root, &run))
                .buffer_unordered(concurrency);

            while let Some((tree_stats, result)) = trees.next().await {
                stats.merge(&tree_stats);
                if let Err(e) = result {
                    if failure.is_none() {
                        run.abort.cancel();
                        failure = Some(e);
                    }
                }
            }
        }

        let final_checkpoint = self.checkpoint(&mut stats).await;
        stats.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(err) = failure {
            if let Err(e) = final_checkpoint {
                warn!(error = %e, "Final checkpoint failed");
            }
            error!(error = %err, "Sync aborted");
            return Err(err);
        }
        final_checkpoint?;

        info!(
            records = stats.records_emitted,
            skipped = stats.records_skipped,
            pages = stats.pages_fetched,
            duration_ms = stats.duration_ms,
            "Sync completed"
        );
        Ok(stats)
    }

    fn scope(&self) -> Result<RunScope> {
        let selected: BTreeSet<String> = if self.config.streams.is_empty() {
            self.catalog.names().into_iter().map(String::from).collect()
        } else {
            self.config
                .streams
                .iter()
                .map(|name| self.catalog.get(name).map(|s| s.name.to_string()))
                .collect::<Result<_>>()?
        };

        let mut needed = selected.clone();
        for name in &selected {
            needed.extend(self.graph.ancestors(name).into_iter().map(String::from));
        }

        Ok(RunScope {
            selected,
            needed,
            now: Utc::now(),
            start: self.config.start_datetime()?.map(|d| d.timestamp_millis()),
            end: self.config.end_datetime()?.map(|d| d.timestamp_millis()),
            abort: self.cancel.child_token(),
        })
    }

    /// Send a stream's SCHEMA message
    async fn announce(&self, def: &StreamDefinition) -> Result<()> {
        let schema = self.schema_for(def).await?;
        let json = match self.config.flattening_depth() {
            Some(depth) => flatten_schema(&schema, depth).to_json_schema(),
            None => schema.to_json_schema(),
        };
        self.sink
            .write_schema(def.name, json, def.primary_key, def.replication_key)
            .await
    }

    /// Sync a root stream and everything below it
    async fn sync_tree(&self, root: &str, run: &RunScope) -> (SyncStats, Result<()>) {
        let mut stats = SyncStats::new();
        let tree: Vec<String> = self
            .graph
            .subtree(root)
            .into_iter()
            .filter(|s| run.needed.contains(*s))
            .map(String::from)
            .collect();

        self.set_status(&tree, StreamStatus::Running).await;
        info!(stream = root, "Syncing stream");

        let mut result = self.sync_root(root, run, &mut stats).await;
        if result.is_ok() {
            result = self.checkpoint(&mut stats).await;
        }

        match &result {
            Ok(()) => {
                self.set_status(&tree, StreamStatus::Completed).await;
                stats.streams_completed += tree.iter().filter(|s| run.selected.contains(*s)).count();
                info!(stream = root, records = stats.records_emitted, "Stream completed");
            }
            Err(e) => {
                self.set_status(&tree, StreamStatus::Failed).await;
                warn!(stream = root, error = %e, "Stream failed");
            }
        }
        (stats, result)
    }

    async fn sync_root(&self, root: &str, run: &RunScope, stats: &mut SyncStats) -> Result<()> {
        let def = self.catalog.get(root)?;
        let contexts = match &def.partitions {
            Some(router) => router.partitions()?,
            None => vec![Context::new()],
        };

        for context in contexts {
            self.sync_context(def, context, run, stats).await?;
        }
        Ok(())
    }

    /// Sync one stream context, recursing into children per record
    fn sync_context<'a>(
        &'a self,
        def: &'a StreamDefinition,
        context: Context,
        run: &'a RunScope,
        stats: &'a mut SyncStats,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let emit = run.selected.contains(def.name);
            let key = def.replication_key.filter(|_| def.is_incremental());
            let schema = self.schema_for(def).await?;
            let start = match key {
                Some(_) => self.effective_start(def, &context, run).await,
                None => None,
            };
            let plans = self.request_plans(def, &context, start, run).await?;
            debug!(stream = def.name, context = %context.key(), ?start, plans = plans.len(), "Syncing context");

            let mut progress: Option<Value> = None;
            let mut since_checkpoint = 0usize;

            'plans: for plan in plans {
                let live_bookmark = emit && key.is_some() && plan.order == SortOrder::Ascending;
                let mut past_end = false;
                let mut pages = PageIterator::new(
                    &self.client,
                    plan.request,
                    plan.paginator.as_ref(),
                    plan.selector,
                );

                loop {
                    let page = tokio::select! {
                        biased;
                        () = run.abort.cancelled() => return Err(Error::Cancelled),
                        page = pages.next_page() => page?,
                    };
                    let Some(page) = page else { break };
                    stats.pages_fetched += 1;

                    for raw in page.records {
                        let record = match self.transform(def, &schema, raw, &context) {
                            Ok(record) => record,
                            Err(e) if !e.is_fatal() => {
                                warn!(stream = def.name, error = %e, "Skipping malformed record");
                                stats.records_skipped += 1;
                                continue;
                            }
                            Err(e) => return Err(e),
                        };

                        let mut replication_value = None;
                        if let Some(key) = key {
                            let value = record.get(key).cloned().unwrap_or(Value::Null);
                            let Some(millis) =
                                ReplicationValue::from_json(&value).and_then(|v| v.to_millis())
                            else {
                                warn!(stream = def.name, key, "Skipping record without a replication value");
                                stats.records_skipped += 1;
                                continue;
                            };

                            if start.is_some_and(|s| millis <= s) {
                                if plan.order == SortOrder::Descending {
                                    pages.stop();
                                    break;
                                }
                                continue;
                            }
                            if run.end.is_some_and(|e| millis > e) {
                                if plan.order == SortOrder::Ascending {
                                    pages.stop();
                                    past_end = true;
                                    break;
                                }
                                continue;
                            }
                            replication_value = Some(value);
                        }

                        if emit {
                            self.emit(def, &record, stats).await?;
                        }

                        // A parent's bookmark only covers it once its children are done
                        self.sync_children(def, &record, run, stats).await?;

                        if let (Some(key), Some(value)) = (key, replication_value) {
                            if live_bookmark {
                                self.state
                                    .advance_bookmark(def.name, Some(&context), key, &value)
                                    .await;
                                since_checkpoint += 1;
                            } else if emit && progress.as_ref().map_or(true, |p| is_newer(&value, p)) {
                                progress = Some(value);
                            }
                        }

                        let interval = self.config.checkpoint_interval;
                        if live_bookmark && interval > 0 && since_checkpoint >= interval {
                            self.checkpoint(stats).await?;
                            since_checkpoint = 0;
                        }
                    }
                }

                if past_end {
                    break 'plans;
                }
            }

            if let (Some(key), Some(value)) = (key, progress) {
                self.state
                    .advance_bookmark(def.name, Some(&context), key, &value)
                    .await;
            }
            stats.contexts_completed += 1;

            if key.is_some() && emit {
                self.checkpoint(stats).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn sync_children(
        &self,
        def: &StreamDefinition,
        record: &JsonObject,
        run: &RunScope,
        stats: &mut SyncStats,
    ) -> Result<()> {
        for name in self.graph.children(def.name) {
            if !run.needed.contains(name) {
                continue;
            }
            let child = self.catalog.get(name)?;
            let Some(link) = child.parent else { continue };

            for context in (link.contexts)(record, run.now) {
                self.sync_context(child, context, run, stats).await?;
            }
        }
        Ok(())
    }

    /// Later of the stored bookmark and the configured start date
    async fn effective_start(
        &self,
        def: &StreamDefinition,
        context: &Context,
        run: &RunScope,
    ) -> Option<i64> {
        let bookmark = self
            .state
            .bookmark(def.name, Some(context))
            .await
            .and_then(|v| ReplicationValue::from_json(&v))
            .and_then(|v| v.to_millis());

        match (bookmark, run.start) {
            (Some(b), Some(s)) => Some(b.max(s)),
            (b, s) => b.or(s),
        }
    }

    async fn request_plans(
        &self,
        def: &StreamDefinition,
        context: &Context,
        start: Option<i64>,
        run: &RunScope,
    ) -> Result<Vec<RequestPlan>> {
        let properties = self.requested_properties(def).await?;

        if let (Some(path), Some(key), Some(since)) = (def.search_path, def.replication_key, start) {
            let search = |since: i64, end: Option<i64>| {
                let mut paginator =
                    SearchPaginator::new(key, since).with_properties(properties.clone());
                if let Some(end) = end {
                    paginator = paginator.with_window_end(end);
                }
                RequestPlan {
                    request: PageRequest::post(path, Value::Null),
                    paginator: Box::new(paginator),
                    selector: RecordSelector::Field("results"),
                    order: SortOrder::Ascending,
                }
            };

            let windows = match (self.config.search_window_days, Utc.timestamp_millis_opt(since).single()) {
                (Some(days), Some(from)) if days > 0 => {
                    // end_date is inclusive, windows are half-open
                    let until = run
                        .end
                        .and_then(|e| Utc.timestamp_millis_opt(e.saturating_add(1)).single())
                        .unwrap_or(run.now);
                    date_windows(from, until, Duration::days(i64::from(days)))
                }
                _ => Vec::new(),
            };

            if windows.is_empty() {
                return Ok(vec![search(since, None)]);
            }
            return Ok(windows
                .iter()
                .map(|w| search(w.start_millis(), Some(w.end_millis())))
                .collect());
        }

        let page_size = def.page_size.unwrap_or(self.config.page_size);
        let mut request = PageRequest::get(template::render(def.path, context)?)
            .with_params(template::render_params(def.params, context)?);
        if !properties.is_empty() {
            request = request.with_query("properties", properties.join(","));
        }

        Ok(vec![RequestPlan {
            request,
            paginator: def.pagination.paginator(page_size),
            selector: def.selector.clone(),
            order: def.sort_order,
        }])
    }

    async fn requested_properties(&self, def: &StreamDefinition) -> Result<Vec<String>> {
        match def.properties {
            PropertySource::None => Ok(Vec::new()),
            PropertySource::Fixed(names) => Ok(names.iter().map(ToString::to_string).collect()),
            PropertySource::Dynamic(object) => Ok(self.discover_properties(object).await?.to_vec()),
        }
    }

    /// Property names of a CRM object, fetched once per run
    async fn discover_properties(&self, object: &str) -> Result<Arc<Vec<String>>> {
        let mut cache = self.properties.lock().await;
        if let Some(names) = cache.get(object) {
            return Ok(Arc::clone(names));
        }

        let body = self
            .client
            .get_json(&format!("/crm/v3/properties/{object}"), RequestConfig::new())
            .await?;
        let names: Vec<String> = RecordSelector::Field("results")
            .extract(&body)?
            .iter()
            .filter_map(|p| p.get("name").and_then(Value::as_str).map(String::from))
            .collect();
        debug!(object, count = names.len(), "Discovered properties");

        let names = Arc::new(names);
        cache.insert(object.to_string(), Arc::clone(&names));
        Ok(names)
    }

    /// Stream schema, with discovered properties typed as strings
    async fn schema_for(&self, def: &StreamDefinition) -> Result<Arc<ObjectSchema>> {
        if let Some(schema) = self.schemas.lock().await.get(def.name) {
            return Ok(Arc::clone(schema));
        }

        let mut schema = def.schema.clone();
        if let PropertySource::Dynamic(object) = def.properties {
            let names = self.discover_properties(object).await?;
            let properties =
                ObjectSchema::new(names.iter().map(|n| (n.as_str(), FieldType::String)))
                    .allow_additional();
            schema.insert("properties", FieldType::Object(properties));
        }

        let schema = Arc::new(schema);
        self.schemas
            .lock()
            .await
            .insert(def.name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Inject context, lift the replication key, conform
    fn transform(
        &self,
        def: &StreamDefinition,
        schema: &ObjectSchema,
        raw: Value,
        context: &Context,
    ) -> Result<JsonObject> {
        let raw = match raw {
            Value::Object(mut record) => {
                for (key, value) in context.iter() {
                    record.insert(key.clone(), value.clone());
                }
                if def.promote_replication_key {
                    if let Some(key) = def.replication_key {
                        let value = record
                            .get("properties")
                            .and_then(|p| p.get(key))
                            .cloned()
                            .unwrap_or(Value::Null);
                        record.insert(key.to_string(), value);
                    }
                }
                Value::Object(record)
            }
            other => other,
        };

        conform_record(def.name, raw, schema, def.primary_key)
    }

    async fn emit(&self, def: &StreamDefinition, record: &JsonObject, stats: &mut SyncStats) -> Result<()> {
        let record = match self.config.flattening_depth() {
            Some(depth) => flatten_record(record.clone(), depth),
            None => record.clone(),
        };
        self.sink.write_record(def.name, record).await?;
        stats.records_emitted += 1;
        Ok(())
    }

    /// Persist state and emit it
    async fn checkpoint(&self, stats: &mut SyncStats) -> Result<()> {
        let _guard = self.checkpoint_lock.lock().await;
        let snapshot = self.state.checkpoint().await?;
        self.sink.write_state(&snapshot).await?;
        stats.checkpoints += 1;
        Ok(())
    }

    async fn set_status(&self, streams: &[String], status: StreamStatus) {
        let mut statuses = self.statuses.lock().await;
        for stream in streams {
            statuses.insert(stream.clone(), status);
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("streams", &self.catalog.len())
            .field("state", &self.state)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
