//! Route handler trait system (compile-time-enforced request/response/test shape).
//!
//! Every route MUST: have metadata (path, method, tags, description), validate
//! its request before handling, use the shared [`ApiError`] for failures, and
//! provide at least one [`TestCase`].

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use async_trait::async_trait;
use axum::http::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone)]
pub struct RouteMetadata {
    pub path: &'static str,
    pub method: Method,
    pub tags: &'static [&'static str],
    pub description: &'static str,
    pub openai_compatible: bool,
}

#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    type Request: DeserializeOwned + Debug + Send + Sync;
    type Response: Serialize + Debug + Send + Sync;

    fn metadata() -> RouteMetadata;

    async fn validate_request(req: &Self::Request) -> ApiResult<()>;

    async fn handle(req: Self::Request, state: &AppState) -> ApiResult<Self::Response>;

    fn test_cases() -> Vec<TestCase<Self::Request, Self::Response>> {
        Vec::new()
    }
}

/// Routes implementing [`RouteHandler`] get Axum registration for free.
pub trait RegisterableRoute: RouteHandler {
    fn register(router: axum::Router<AppState>) -> axum::Router<AppState> {
        let metadata = Self::metadata();

        let handler = |axum::extract::State(state): axum::extract::State<AppState>,
                        axum::Json(req): axum::Json<Self::Request>| async move {
            Self::validate_request(&req).await?;
            let response = Self::handle(req, &state).await?;
            Ok::<_, ApiError>(axum::Json(response))
        };

        match metadata.method {
            Method::GET => router.route(metadata.path, axum::routing::get(handler)),
            Method::POST => router.route(metadata.path, axum::routing::post(handler)),
            Method::PUT => router.route(metadata.path, axum::routing::put(handler)),
            Method::DELETE => router.route(metadata.path, axum::routing::delete(handler)),
            other => panic!("unsupported HTTP method: {other}"),
        }
    }
}

impl<T: RouteHandler> RegisterableRoute for T {}

/// Reusable validation rules (§7 user-visible validation).
pub trait ValidationRule: Send + Sync {
    type Target;
    fn validate(&self, target: &Self::Target) -> ApiResult<()>;
}

pub mod validators {
    use super::*;

    pub struct NotEmpty;

    impl ValidationRule for NotEmpty {
        type Target = String;
        fn validate(&self, target: &Self::Target) -> ApiResult<()> {
            if target.is_empty() {
                Err(ApiError::BadRequest("cannot be empty".into()))
            } else {
                Ok(())
            }
        }
    }

    pub struct InRange<T> {
        pub min: T,
        pub max: T,
    }

    impl ValidationRule for InRange<f32> {
        type Target = f32;
        fn validate(&self, target: &Self::Target) -> ApiResult<()> {
            if *target < self.min || *target > self.max {
                Err(ApiError::BadRequest(format!(
                    "must be between {} and {}, got {}",
                    self.min, self.max, target
                )))
            } else {
                Ok(())
            }
        }
    }
}

/// A real, executable test case for a route (no fake tests).
pub struct TestCase<Req, Resp> {
    pub name: &'static str,
    pub request: Req,
    pub expected_error: Option<&'static str>,
    _marker: std::marker::PhantomData<Resp>,
}

impl<Req, Resp> TestCase<Req, Resp> {
    pub fn error(name: &'static str, request: Req, expected_error: &'static str) -> Self {
        Self {
            name,
            request,
            expected_error: Some(expected_error),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn success(name: &'static str, request: Req) -> Self {
        Self {
            name,
            request,
            expected_error: None,
            _marker: std::marker::PhantomData,
        }
    }
}
