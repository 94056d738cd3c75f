use actix_web::{HttpResponse, Responder, get, web};
use serde::Serialize;
use vigil_service::Core;

macros_utils::routes! {
    route health_route,
    route status_route,
}

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

#[derive(Serialize)]
struct Status<'a> {
    name: &'a str,
    version: &'a str,
    started: String,
    current_time: String,
    use_cdn: bool,
}

#[get("/status")]
pub async fn status_route(core: web::Data<Core>) -> impl Responder {
    HttpResponse::Ok().json(Status {
        name: core.name(),
        version: core.version(),
        started: core.started().to_rfc3339(),
        current_time: core.current_time(),
        use_cdn: core.use_cdn(),
    })
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use crate::routes::test_support;

    #[actix_web::test]
    async fn test_health_and_status() {
        let app = test::init_service(App::new().app_data(test_support::core()).configure(super::routes)).await;

        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(response.status().is_success());

        let status: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/status").to_request()).await;
        assert_eq!(status["name"], "Vigil");
        assert_eq!(status["use_cdn"], false);
    }
}
