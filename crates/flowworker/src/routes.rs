use crate::WorkerState;
use actix_web::{get, post, web, HttpResponse, Responder};
use flowcore::ExecuteRequest;
use futures::stream;

/// Health check endpoint
#[get("/health")]
async fn health_check(state: web::Data<WorkerState>) -> impl Responder {
    HttpResponse::Ok().json(state.health())
}

/// Execute the flow once, as a single JSON result or an NDJSON stream
#[post("/execute")]
async fn execute(
    state: web::Data<WorkerState>,
    request: web::Json<ExecuteRequest>,
) -> actix_web::Result<HttpResponse> {
    let request = request.into_inner();
    let streaming = request.wants_stream();
    let trace = state.execute(request);

    if !streaming {
        return Ok(HttpResponse::Ok().json(trace.response));
    }

    let mut lines = Vec::new();
    for chunk in trace.into_chunks() {
        let mut line = serde_json::to_vec(&chunk)?;
        line.push(b'\n');
        lines.push(Ok::<_, actix_web::Error>(web::Bytes::from(line)));
    }

    Ok(HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .streaming(stream::iter(lines)))
}

/// Register the worker's routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check).service(execute);
}
