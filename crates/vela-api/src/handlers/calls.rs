//! Call record and analytics handlers
//!
//! The write path (`POST /calls`) is what softphone clients persist through;
//! the read paths serve the call history screen and the dashboard summary.

use crate::dto::{AnalyticsParams, ApiResponse, CallListParams, CreateCallRequest};
use crate::identity::Identity;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};
use validator::Validate;
use vela_core::models::CallRecord;
use vela_core::traits::CallRecordStore;
use vela_core::AppError;
use vela_services::CallAnalyticsService;

/// List the owner's call records, newest first
///
/// GET /api/v1/calls
#[instrument(skip(store))]
pub async fn list_calls(
    store: web::Data<Arc<dyn CallRecordStore>>,
    identity: Identity,
    params: web::Query<CallListParams>,
) -> Result<HttpResponse, AppError> {
    params.validate()?;
    debug!("Listing calls for {}", identity.0);

    let records = match params.since {
        Some(since) => store.list_since(&identity.0, since).await?,
        None => {
            store
                .list_recent(&identity.0, params.limit, params.offset)
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(records)))
}

/// Append one call record to the ledger
///
/// POST /api/v1/calls
#[instrument(skip(store, body))]
pub async fn create_call(
    store: web::Data<Arc<dyn CallRecordStore>>,
    identity: Identity,
    body: web::Json<CreateCallRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let now = Utc::now();
    let record = body.into_inner().into_record(identity.0, now)?;
    let id = store.persist(&record).await?;
    debug!("Stored call record {}", id);

    let stored = CallRecord {
        id,
        phone_number: record.phone_number,
        direction: record.direction,
        outcome: record.outcome,
        duration_seconds: record.duration_seconds,
        started_at: record.started_at,
        provider_call_id: record.provider_call_id,
        owner_identity: record.owner_identity,
        created_at: now,
    };

    Ok(HttpResponse::Created().json(ApiResponse::success(stored)))
}

/// Summarize the owner's calls over a window
///
/// GET /api/v1/calls/analytics?period={today|week|month}
#[instrument(skip(analytics))]
pub async fn call_analytics(
    analytics: web::Data<CallAnalyticsService>,
    identity: Identity,
    params: web::Query<AnalyticsParams>,
) -> Result<HttpResponse, AppError> {
    let summary = analytics.summarize(&identity.0, params.period).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

/// Configure call routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/calls")
            .route("", web::get().to(list_calls))
            .route("", web::post().to(create_call))
            .route("/analytics", web::get().to(call_analytics)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::json;
    use vela_core::traits::SystemClock;
    use vela_db::InMemoryCallRecordStore;

    fn test_app(
        store: Arc<InMemoryCallRecordStore>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let store: Arc<dyn CallRecordStore> = store;
        let analytics = CallAnalyticsService::new(store.clone(), Arc::new(SystemClock));

        App::new()
            .app_data(web::Data::new(store))
            .app_data(web::Data::new(analytics))
            .service(web::scope("/api/v1").configure(configure))
    }

    #[actix_web::test]
    async fn test_create_then_list_round_trip() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store)).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/calls")
            .insert_header(("X-Identity", "agent-1"))
            .set_json(json!({
                "phone_number": "+15551234567",
                "direction": "outgoing",
                "outcome": "completed",
                "duration_seconds": 30,
                "provider_call_id": "CA-1"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        let req = test::TestRequest::get()
            .uri("/api/v1/calls")
            .insert_header(("X-Identity", "agent-1"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["outcome"], "completed");
        assert_eq!(body["data"][0]["duration_seconds"], 30);

        // Another identity sees nothing
        let req = test::TestRequest::get()
            .uri("/api/v1/calls")
            .insert_header(("X-Identity", "agent-2"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn test_missing_identity_is_unauthorized() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store)).await;

        let req = test::TestRequest::get().uri("/api/v1/calls").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_create_rejects_bad_outcome() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store.clone())).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/calls")
            .insert_header(("X-Identity", "agent-1"))
            .set_json(json!({
                "phone_number": "+15551234567",
                "direction": "outgoing",
                "outcome": "vanished"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        assert!(store.is_empty());
    }

    #[actix_web::test]
    async fn test_create_rejects_negative_duration() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store.clone())).await;

        let req = test::TestRequest::post()
            .uri("/api/v1/calls")
            .insert_header(("X-Identity", "agent-1"))
            .set_json(json!({
                "phone_number": "+15551234567",
                "direction": "outgoing",
                "outcome": "completed",
                "duration_seconds": -5
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        assert!(store.is_empty());
    }

    #[actix_web::test]
    async fn test_list_rejects_oversized_limit() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/calls?limit=5000")
            .insert_header(("X-Identity", "agent-1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_analytics_empty_window() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/calls/analytics?period=week")
            .insert_header(("X-Identity", "agent-1"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total_calls"], 0);
        assert_eq!(body["data"]["answer_rate"], 0);
        assert_eq!(body["data"]["avg_duration"], "0:00");
        assert_eq!(body["data"]["period"], "week");
    }

    #[actix_web::test]
    async fn test_analytics_counts() {
        let store = Arc::new(InMemoryCallRecordStore::new());
        let app = test::init_service(test_app(store)).await;

        for (outcome, duration) in [("completed", 60), ("completed", 120), ("no-answer", 0)] {
            let req = test::TestRequest::post()
                .uri("/api/v1/calls")
                .insert_header(("X-Identity", "agent-1"))
                .set_json(json!({
                    "phone_number": "+15551234567",
                    "direction": "outgoing",
                    "outcome": outcome,
                    "duration_seconds": duration
                }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 201);
        }

        let req = test::TestRequest::get()
            .uri("/api/v1/calls/analytics?period=today")
            .insert_header(("X-Identity", "agent-1"))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["total_calls"], 3);
        assert_eq!(body["data"]["answered_calls"], 2);
        assert_eq!(body["data"]["missed_calls"], 1);
        assert_eq!(body["data"]["answer_rate"], 67);
        assert_eq!(body["data"]["avg_duration_seconds"], 90);
        assert_eq!(body["data"]["avg_duration"], "1:30");
    }
}
