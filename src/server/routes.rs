//! Request handlers.
//!
//! - `GET /?url=<target>[&index=<n>]` - classify the target and redirect
//! - `GET /slideshow?url=<u1>&url=<u2>...[&duration=5][&loop=1]` - slideshow stream
//! - `GET /health` - liveness
//! - `GET /api/streams` - cache status

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use stillcast_common::{Error, JobDescriptor, SlideshowSpec};

use super::error::AppError;
use super::AppContext;
use crate::sources::{classify, rewrite, Target};
use crate::streaming::CacheStatus;

#[derive(Debug, Deserialize)]
pub struct RootQuery {
    pub url: String,
    pub index: Option<usize>,
}

pub async fn root(
    State(ctx): State<AppContext>,
    Query(query): Query<RootQuery>,
) -> Result<Response, AppError> {
    if query.url.trim().is_empty() {
        return Err(Error::validation("url must not be empty").into());
    }

    let target = classify(&query.url, ctx.config.sources.allow_local_paths);
    tracing::debug!(?target, "Classified request");

    match target {
        Target::Random => {
            let url = ctx.random.pick().await?;
            tracing::info!(url = %url, "Random pick");
            video_redirect(&url)
        }
        Target::VideoUrl(url) => video_redirect(&url),
        Target::ImageUrl(url) => stream(&ctx, JobDescriptor::url(url)).await,
        Target::ImagePath(path) => stream(&ctx, JobDescriptor::path(path)).await,
        Target::Keyword(keyword) => match query.index {
            Some(index) => {
                let result = ctx.search.result(&keyword, index).await?;
                tracing::info!(keyword = %keyword, index, url = %result.url, "Search pick");
                video_redirect(&result.url)
            }
            None => {
                let grid = ctx.search.grid(&keyword).await?;
                stream(&ctx, JobDescriptor::path(grid.to_string_lossy())).await
            }
        },
    }
}

fn default_duration() -> u32 {
    5
}
fn default_loop() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SlideshowQuery {
    #[serde(default)]
    pub url: Vec<String>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_loop", rename = "loop")]
    pub loop_count: u32,
}

pub async fn slideshow(
    State(ctx): State<AppContext>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<SlideshowQuery>,
) -> Result<Response, AppError> {
    let spec = SlideshowSpec::new(query.url, query.duration, query.loop_count);
    stream(&ctx, JobDescriptor::Slideshow(spec)).await
}

pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn streams_status(State(ctx): State<AppContext>) -> Result<Json<CacheStatus>, AppError> {
    Ok(Json(ctx.streams.status()?))
}

/// Get (or start) the stream and send the client to its playlist.
async fn stream(ctx: &AppContext, descriptor: JobDescriptor) -> Result<Response, AppError> {
    let location = ctx.streams.get(descriptor).await?;
    let target = format!(
        "{}/{}",
        ctx.config.server.stream_prefix.trim_end_matches('/'),
        location.relative
    );
    redirect(StatusCode::FOUND, &target)
}

/// Videos are not cached here; send the client to the (rewritten) source.
fn video_redirect(url: &str) -> Result<Response, AppError> {
    redirect(StatusCode::TEMPORARY_REDIRECT, &rewrite(url))
}

fn redirect(status: StatusCode, location: &str) -> Result<Response, AppError> {
    let value = HeaderValue::try_from(location)
        .map_err(|_| Error::validation(format!("cannot redirect to {location:?}")))?;
    Ok((status, [(header::LOCATION, value)]).into_response())
}
