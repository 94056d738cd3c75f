use actix_web::{HttpResponse, delete, get, post, web};
use vigil_service::Core;
use vigil_service::database::models::{NewService, ServiceUpdate};

use super::HistoryQuery;
use crate::error::ApiResult;
use crate::response::ActionResponse;

macros_utils::routes! {
    route list_services,
    route create_service,
    route get_service,
    route update_service,
    route delete_service,
    route service_failures,
}

/// Services in display order, with their live health
#[get("/services")]
pub async fn list_services(core: web::Data<Core>) -> HttpResponse {
    HttpResponse::Ok().json(core.services())
}

#[post("/services")]
pub async fn create_service(core: web::Data<Core>, body: web::Json<NewService>) -> ApiResult<HttpResponse> {
    let service = core.create_service(body.into_inner()).await?;
    Ok(ActionResponse::new("service", "create", Some(service.service.id), service).into_response())
}

#[get("/services/{id}")]
pub async fn get_service(core: web::Data<Core>, id: web::Path<i64>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(core.service(*id)?))
}

#[post("/services/{id}")]
pub async fn update_service(
    core: web::Data<Core>,
    id: web::Path<i64>,
    body: web::Json<ServiceUpdate>,
) -> ApiResult<HttpResponse> {
    let service = core.update_service(*id, body.into_inner()).await?;
    Ok(ActionResponse::new("service", "update", Some(service.service.id), service).into_response())
}

#[delete("/services/{id}")]
pub async fn delete_service(core: web::Data<Core>, id: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    core.delete_service(id).await?;
    Ok(ActionResponse::new("service", "delete", Some(id), id).into_response())
}

#[get("/services/{id}/failures")]
pub async fn service_failures(
    core: web::Data<Core>,
    id: web::Path<i64>,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(core.service_failures(*id, query.limit()).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};

    use crate::routes::test_support;

    #[actix_web::test]
    async fn test_service_crud() {
        let core = test_support::core();
        let app = test::init_service(App::new().app_data(core.clone()).configure(crate::routes::configure)).await;

        let created: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/services")
                .set_json(json!({ "name": "db", "check_type": "tcp", "target": "localhost:5432" }))
                .to_request(),
        )
        .await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(created["output"]["interval_seconds"], 60);
        assert_eq!(created["output"]["online"], true);

        let updated: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/services/{id}"))
                .set_json(json!({ "name": "primary db", "order": 3 }))
                .to_request(),
        )
        .await;
        assert_eq!(updated["output"]["name"], "primary db");

        let listed: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/services").to_request()).await;
        assert_eq!(listed[0]["order"], 3);

        let failures = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/services/{id}/failures?limit=5")).to_request(),
        )
        .await;
        assert_eq!(failures.status(), StatusCode::OK);

        let deleted = test::call_service(
            &app,
            test::TestRequest::delete().uri(&format!("/services/{id}")).to_request(),
        )
        .await;
        assert_eq!(deleted.status(), StatusCode::OK);

        let missing = test::call_service(
            &app,
            test::TestRequest::get().uri(&format!("/services/{id}")).to_request(),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_invalid_service_is_rejected() {
        let core = test_support::core();
        let app = test::init_service(App::new().app_data(core.clone()).configure(crate::routes::configure)).await;

        let response = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/services")
                .set_json(json!({ "name": "web", "target": "example.com" }))
                .to_request(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_undecodable_path_and_query_get_error_envelope() {
        let core = test_support::core();
        let app = test::init_service(App::new().app_data(core.clone()).configure(crate::routes::configure)).await;

        for uri in ["/services/abc", "/services/1/failures?limit=many"] {
            let response = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(response).await;
            assert_eq!(body["status"], "error");
        }
    }
}
