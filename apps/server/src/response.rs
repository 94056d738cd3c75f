use actix_web::HttpResponse;
use serde::Serialize;

/// Envelope returned by every mutating endpoint
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub method: &'static str,
    pub id: Option<i64>,
    pub output: T,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn new(kind: &'static str, method: &'static str, id: Option<i64>, output: T) -> Self {
        Self { status: "success", kind, method, id, output }
    }

    pub fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().json(self)
    }
}
