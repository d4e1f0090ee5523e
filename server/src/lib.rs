use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use ranksearch_core::persist::{load_index, load_link_graph, load_pagerank, IndexPaths};
use ranksearch_core::{
    Convergence, CrossReference, InvertedIndex, KGramIndex, LinkGraph, PageRankTable, PostingsStore, QueryType,
    RankingConfig, RankingType, Searcher, SpellChecker,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Where the server finds its inputs. Only the index is required.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub index_dir: PathBuf,
    pub links: Option<PathBuf>,
    pub titles: Option<PathBuf>,
    pub pagerank: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Frozen index structures shared by all requests.
pub struct Engine {
    pub index: InvertedIndex,
    pub kgrams: KGramIndex,
    pub graph: Option<(LinkGraph, CrossReference)>,
    pub pagerank: Option<PageRankTable>,
    pub config: RankingConfig,
    pub spell: SpellChecker,
}

impl Engine {
    pub fn load(options: &EngineOptions) -> Result<Self> {
        let config = RankingConfig::load_or_default(options.config.as_ref())?;
        let index = load_index(&IndexPaths::new(&options.index_dir))?;
        let kgrams = KGramIndex::from_terms(2, index.terms());

        let graph = match (&options.links, &options.titles) {
            (Some(links), Some(titles)) => {
                let (graph, report) = load_link_graph(links, titles, config.max_nodes)?;
                let xref = CrossReference::build(&index, &graph);
                tracing::info!(matched_docs = xref.len(), malformed = report.malformed, "cross-referenced documents");
                Some((graph, xref))
            }
            (None, None) => None,
            _ => anyhow::bail!("--links and --titles must be given together"),
        };

        let pagerank = match &options.pagerank {
            Some(path) => {
                let (table, report) = load_pagerank(path, config.max_nodes)?;
                tracing::info!(entries = table.len(), malformed = report.malformed, "loaded PageRank scores");
                Some(table)
            }
            None => None,
        };

        Ok(Self { index, kgrams, graph, pagerank, config, spell: SpellChecker::default() })
    }

    pub fn searcher(&self) -> Searcher<'_> {
        let mut s = Searcher::new(&self.index, &self.config).with_wildcards(&self.kgrams);
        if let Some(table) = &self.pagerank {
            s = s.with_pagerank(table);
        }
        if let Some((graph, xref)) = &self.graph {
            s = s.with_link_graph(graph, xref);
        }
        s
    }

    pub fn search(&self, params: &SearchParams) -> ranksearch_core::Result<SearchResponse> {
        let start = std::time::Instant::now();
        let query_type: QueryType = params.query_type.parse()?;
        let ranking: RankingType = params.ranking.parse()?;
        let query = ranksearch_core::Query::parse(&params.q, self.index.options());
        let results = self.searcher().search(&query, query_type, ranking)?;

        let total_hits = results.len();
        let k = params.k.clamp(1, 100);
        let hits = results
            .hits
            .iter()
            .take(k)
            .map(|h| SearchHit {
                doc_id: h.doc_id,
                score: h.score,
                name: self.index.document_name(h.doc_id).unwrap_or_default().to_string(),
            })
            .collect();
        Ok(SearchResponse {
            query: params.q.clone(),
            took_s: start.elapsed().as_secs_f64(),
            total_hits,
            results: hits,
            hits_convergence: results.hits_convergence,
        })
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_type", rename = "type")]
    pub query_type: String,
    #[serde(default = "default_ranking")]
    pub ranking: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_type() -> String { "ranked".into() }
fn default_ranking() -> String { "tf_idf".into() }
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_convergence: Option<Convergence>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub score: f64,
    pub name: String,
}

#[derive(Deserialize)]
pub struct SpellParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { 5 }

pub type AppState = Arc<Engine>;

pub fn build_app(options: EngineOptions) -> Result<Router> {
    let engine = Engine::load(&options)?;
    Ok(router(Arc::new(engine)))
}

pub fn router(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/spell", get(spell_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.to_string() })))
}

/// A blocking task that panicked or was cancelled.
fn join_failed(e: tokio::task::JoinError) -> ApiError {
    tracing::error!(error = %e, "blocking task failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    // HITS and large unions are CPU bound
    let outcome = tokio::task::spawn_blocking(move || state.search(&params))
        .await
        .map_err(join_failed)?;
    match outcome {
        Ok(resp) => Ok(Json(resp)),
        Err(e) => {
            tracing::warn!(error = %e, "search rejected");
            Err(api_error(StatusCode::BAD_REQUEST, e))
        }
    }
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<u32>) -> Result<Json<serde_json::Value>, ApiError> {
    let meta = state.index.doc_meta(doc_id).ok_or_else(|| api_error(StatusCode::NOT_FOUND, "not found"))?;
    let pagerank = state.pagerank.as_ref().and_then(|t| t.get(ranksearch_core::search::file_name(&meta.name)));
    Ok(Json(serde_json::json!({
        "doc_id": doc_id,
        "name": meta.name,
        "length": meta.length,
        "pagerank": pagerank,
    })))
}

pub async fn spell_handler(
    State(state): State<AppState>,
    Query(params): Query<SpellParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let suggestions = tokio::task::spawn_blocking(move || {
        let query = ranksearch_core::Query::parse(&params.q, state.index.options());
        state.spell.check(&state.searcher(), &state.kgrams, &query, params.limit.clamp(1, 20))
    })
    .await
    .map_err(join_failed)?;
    Ok(Json(serde_json::json!({ "suggestions": suggestions })))
}
