use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, warn};

use crate::cache::FreshnessCache;
use crate::live_scores::aggregate::suggestions;
use crate::live_scores::{ProviderRegistry, SportProvider};
use crate::models::{CanonicalMatch, ProviderResult, Sport};

pub struct AppState {
    pub providers: ProviderRegistry,
    pub cache: FreshnessCache<Sport, Arc<ProviderResult>>,
}

/// Failures surfaced to API clients, each with its own status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("No game found for \"{query}\"")]
    NoMatch {
        query: String,
        suggestions: Vec<String>,
        warning: Option<String>,
    },

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response(),
            ApiError::NoMatch {
                suggestions, warning, ..
            } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": message, "suggestions": suggestions, "warning": warning })),
            )
                .into_response(),
            ApiError::Internal(_) => {
                warn!("Request failed: {}", message);
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))).into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GamesParams {
    sport: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackParams {
    sport: Option<String>,
    query: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrackResponse {
    #[serde(rename = "match")]
    game: CanonicalMatch,
    warning: Option<String>,
}

/// Build the Axum router for the tracker API and client.
///
/// With `static_dir` set, everything outside the API is served from that
/// directory instead of the embedded page.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/games", get(games_handler))
        .route("/api/track", get(track_handler))
        .route("/healthz", get(|| async { "ok" }));

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api.route("/", get(index_handler)),
    };

    app.layer(CorsLayer::permissive()).with_state(Arc::new(state))
}

/// Missing or empty `sport` means NBA.
fn resolve_sport(raw: Option<&str>) -> Result<Sport, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(key) => key
            .parse::<Sport>()
            .map_err(|e| ApiError::InvalidRequest(e.to_string())),
        None => Ok(Sport::Nba),
    }
}

/// Current data for `sport` through the freshness cache.
async fn load(
    state: &AppState,
    sport: Sport,
) -> Result<(Arc<dyn SportProvider>, Arc<ProviderResult>), ApiError> {
    let provider = state
        .providers
        .get(sport)
        .ok_or_else(|| ApiError::InvalidRequest(format!("Unsupported sport \"{}\"", sport.key())))?;

    let loader = Arc::clone(&provider);
    let data = state
        .cache
        .get(sport, move || async move { loader.get_data().await.map(Arc::new) })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((provider, data))
}

async fn index_handler() -> impl IntoResponse {
    Html(TRACKER_HTML)
}

/// GET /api/games?sport=nba
async fn games_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GamesParams>,
) -> Result<Json<ProviderResult>, ApiError> {
    let sport = resolve_sport(params.sport.as_deref())?;
    let (_, data) = load(&state, sport).await?;
    Ok(Json(ProviderResult::clone(&data)))
}

/// GET /api/track?sport=nba&query=lakers
async fn track_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrackParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sport = resolve_sport(params.sport.as_deref())?;
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("Missing query".to_string()))?;

    let (provider, data) = load(&state, sport).await?;
    match provider.pick(&data, query) {
        Some(game) => Ok(Json(TrackResponse {
            game,
            warning: data.warning.clone(),
        })),
        None => {
            debug!("No {} match for {:?}", sport, query);
            Err(ApiError::NoMatch {
                query: query.to_string(),
                suggestions: suggestions(&data.games),
                warning: data.warning.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Embedded tracker client
// ---------------------------------------------------------------------------

const TRACKER_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Realtime Scores</title>
<style>
  :root {
    --bg: #0b0f17; --card: #141a26; --border: #232c3d;
    --text: #e6e9ef; --muted: #8a93a6; --accent: #4f8cff;
    --live: #ff4d4f; --warn: #f5a623;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: system-ui, sans-serif; font-size: 15px; }
  header { padding: 16px 24px; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.2rem; }
  main { max-width: 640px; margin: 24px auto; padding: 0 16px; }
  form { display: flex; gap: 8px; margin-bottom: 16px; }
  select, input, button {
    background: var(--card); color: var(--text); border: 1px solid var(--border);
    border-radius: 6px; padding: 8px 10px; font-size: 0.95rem;
  }
  input { flex: 1; }
  button { background: var(--accent); border-color: var(--accent); cursor: pointer; }
  .card { background: var(--card); border: 1px solid var(--border); border-radius: 10px; padding: 20px; }
  .teams { display: flex; justify-content: space-between; align-items: center; gap: 12px; }
  .team { flex: 1; text-align: center; }
  .team .code { font-size: 1.6rem; font-weight: 700; }
  .team .name { color: var(--muted); font-size: 0.85rem; }
  .score { font-size: 2rem; font-weight: 700; white-space: nowrap; }
  .label { font-size: 1.3rem; font-weight: 600; text-align: center; }
  .meta { margin-top: 12px; text-align: center; color: var(--muted); }
  .meta .live { color: var(--live); font-weight: 700; }
  .stream { display: inline-block; margin-top: 12px; color: var(--accent); }
  .warning { margin-top: 12px; color: var(--warn); font-size: 0.85rem; }
  .error { color: var(--live); }
  .suggestions { margin-top: 8px; color: var(--muted); font-size: 0.85rem; }
  .suggestions a { color: var(--accent); cursor: pointer; margin-right: 8px; }
  .updated { margin-top: 12px; color: var(--muted); font-size: 0.75rem; text-align: right; }
</style>
</head>
<body>
<header><h1>Realtime Scores</h1></header>
<main>
  <form id="search">
    <select id="sport">
      <option value="nba">NBA</option>
      <option value="lol">LoL</option>
      <option value="csgo">CS2</option>
      <option value="valorant">VALORANT</option>
    </select>
    <input id="query" placeholder="Team, matchup or match id" autocomplete="off">
    <button type="submit">Track</button>
  </form>
  <div id="result" class="card">Pick a sport and enter a team to start tracking.</div>
</main>
<script>
const POLL_MS = 1000;
const REQUEST_TIMEOUT_MS = 8000;
let timer = null;

function esc(s) {
  return String(s ?? '').replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

function startTime(iso) {
  if (!iso) return '';
  return new Date(iso).toLocaleString('en-US', {
    timeZone: 'America/Los_Angeles', month: 'short', day: 'numeric', hour: 'numeric', minute: '2-digit'
  }) + ' PT';
}

function teamBlock(t) {
  if (!t) return '';
  return `<div class="team"><div class="code">${esc(t.code)}</div><div class="name">${esc([t.city, t.name].filter(Boolean).join(' '))}</div></div>`;
}

function renderMatch(m, warning) {
  const status = m.status === 'live'
    ? `<span class="live">LIVE</span>${m.clock ? ' · ' + esc(m.clock) : ''}`
    : esc(m.statusText || m.status);
  const header = m.away && m.home
    ? `<div class="teams">${teamBlock(m.away)}<div class="score">${esc(m.score || 'vs')}</div>${teamBlock(m.home)}</div>`
    : `<div class="label">${esc(m.label)}</div>${m.score ? `<div class="label score">${esc(m.score)}</div>` : ''}`;
  const when = m.status === 'scheduled' && m.startTime ? `<div>${esc(startTime(m.startTime))}</div>` : '';
  const stream = m.streamUrl ? `<a class="stream" href="${esc(m.streamUrl)}" target="_blank" rel="noopener">Watch stream</a>` : '';
  return `${header}
    <div class="meta"><div>${esc(m.league)} · ${status}</div>${when}${stream}</div>
    ${warning ? `<div class="warning">Fallback: ${esc(warning)}</div>` : ''}
    <div class="updated">Updated ${new Date().toLocaleTimeString()}</div>`;
}

function renderMiss(body) {
  const list = (body.suggestions || [])
    .map(s => `<a data-q="${esc(s)}">${esc(s)}</a>`).join('');
  return `<div class="error">${esc(body.error)}</div>
    ${list ? `<div class="suggestions">Try: ${list}</div>` : ''}
    ${body.warning ? `<div class="warning">Fallback: ${esc(body.warning)}</div>` : ''}`;
}

async function poll(sport, query) {
  const result = document.getElementById('result');
  const controller = new AbortController();
  const abort = setTimeout(() => controller.abort(), REQUEST_TIMEOUT_MS);
  try {
    const params = new URLSearchParams({ sport, query });
    const res = await fetch(`/api/track?${params}`, { cache: 'no-store', signal: controller.signal });
    const body = await res.json();
    if (res.ok) {
      result.innerHTML = renderMatch(body.match, body.warning);
    } else if (res.status === 404) {
      result.innerHTML = renderMiss(body);
    } else {
      result.innerHTML = `<div class="error">${esc(body.error || res.statusText)}</div>`;
    }
  } catch (e) {
    result.innerHTML = `<div class="error">Request failed: ${esc(e.message)}</div>`;
  } finally {
    clearTimeout(abort);
  }
}

function track() {
  const sport = document.getElementById('sport').value;
  const query = document.getElementById('query').value.trim();
  if (timer) clearInterval(timer);
  if (!query) return;
  poll(sport, query);
  timer = setInterval(() => poll(sport, query), POLL_MS);
}

document.getElementById('search').addEventListener('submit', e => { e.preventDefault(); track(); });
document.getElementById('result').addEventListener('click', e => {
  const q = e.target.dataset && e.target.dataset.q;
  if (q) { document.getElementById('query').value = q; track(); }
});
</script>
</body>
</html>
"#;
