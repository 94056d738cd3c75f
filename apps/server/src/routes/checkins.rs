use actix_web::{HttpRequest, HttpResponse, delete, get, post, web};
use vigil_service::Core;
use vigil_service::database::models::NewCheckin;

use super::HistoryQuery;
use crate::error::ApiResult;
use crate::response::ActionResponse;

macros_utils::routes! {
    route list_checkins,
    route create_checkin,
    route get_checkin,
    route hit_checkin,
    route delete_checkin,
    route checkin_hits,
    route checkin_failures,
}

#[get("/checkins")]
pub async fn list_checkins(core: web::Data<Core>) -> HttpResponse {
    HttpResponse::Ok().json(core.checkins())
}

#[post("/checkins")]
pub async fn create_checkin(core: web::Data<Core>, body: web::Json<NewCheckin>) -> ApiResult<HttpResponse> {
    let checkin = core.create_checkin(body.into_inner()).await?;
    Ok(ActionResponse::new("checkin", "create", Some(checkin.id), checkin).into_response())
}

#[get("/checkins/{api}")]
pub async fn get_checkin(core: web::Data<Core>, api: web::Path<String>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(core.checkin(&api)?))
}

/// Heartbeat endpoint for external agents
#[post("/checkins/{api}")]
pub async fn hit_checkin(
    core: web::Data<Core>,
    api: web::Path<String>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let source = req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_default();
    let hit = core.record_hit(&api, source, core.now()).await?;
    Ok(ActionResponse::new("checkin_hit", "update", Some(hit.id), hit.id).into_response())
}

#[delete("/checkins/{api}")]
pub async fn delete_checkin(core: web::Data<Core>, api: web::Path<String>) -> ApiResult<HttpResponse> {
    let checkin = core.delete_checkin(&api).await?;
    Ok(ActionResponse::new("checkin", "delete", Some(checkin.id), checkin).into_response())
}

#[get("/checkins/{api}/hits")]
pub async fn checkin_hits(
    core: web::Data<Core>,
    api: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(core.checkin_hits(&api, query.limit()).await?))
}

#[get("/checkins/{api}/failures")]
pub async fn checkin_failures(
    core: web::Data<Core>,
    api: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(core.checkin_failures(&api, query.limit()).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use vigil_service::database::models::NewService;
    use vigil_service::monitoring::CheckType;

    use crate::routes::test_support;

    #[actix_web::test]
    async fn test_checkin_lifecycle() {
        let core = test_support::core();
        let service = core
            .create_service(NewService::new("api", CheckType::Http, "https://example.com"))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(core.clone()).configure(crate::routes::configure)).await;

        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/checkins")
                .set_json(json!({ "name": "backup", "service_id": service.service.id, "interval": 300 }))
                .to_request(),
        )
        .await;
        assert_eq!(created["status"], "success");
        assert_eq!(created["method"], "create");
        let api = created["output"]["api_key"].as_str().unwrap().to_string();
        assert_eq!(api.len(), 32);

        let hit: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/checkins/{api}"))
                .peer_addr("10.1.2.3:5000".parse().unwrap())
                .to_request(),
        )
        .await;
        assert_eq!(hit["type"], "checkin_hit");
        assert!(hit["id"].as_i64().is_some());

        let hits: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri(&format!("/checkins/{api}/hits")).to_request(),
        )
        .await;
        assert_eq!(hits[0]["from"], "10.1.2.3");

        let listed: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/checkins").to_request()).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let deleted = test::call_service(
            &app,
            test::TestRequest::delete().uri(&format!("/checkins/{api}")).to_request(),
        )
        .await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let missing = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/checkins/{api}")).to_request(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        core.shutdown().await;
    }

    #[actix_web::test]
    async fn test_create_checkin_errors() {
        let core = test_support::core();
        let app = test::init_service(App::new().app_data(core.clone()).configure(crate::routes::configure)).await;

        let unknown_service = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/checkins")
                .set_json(json!({ "name": "backup", "service_id": 42, "interval": 300 }))
                .to_request(),
        )
        .await;
        assert_eq!(unknown_service.status(), StatusCode::NOT_FOUND);

        let invalid = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/checkins")
                .set_json(json!({ "name": "", "service_id": 42, "interval": 300 }))
                .to_request(),
        )
        .await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(invalid).await;
        assert_eq!(body["status"], "error");

        let unknown_hit = test::call_service(
            &app,
            test::TestRequest::post().uri("/checkins/unknown").to_request(),
        )
        .await;
        assert_eq!(unknown_hit.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_malformed_body_gets_error_envelope() {
        let core = test_support::core();
        let app = test::init_service(App::new().app_data(core.clone()).configure(crate::routes::configure)).await;

        for payload in ["{not json", r#"{"name": "backup"}"#] {
            let response = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/checkins")
                    .insert_header(("content-type", "application/json"))
                    .set_payload(payload)
                    .to_request(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(response).await;
            assert_eq!(body["status"], "error");
            assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        }
    }
}
