//! HTTP facade exposing the job lifecycle, preview/download artifacts,
//! approval, master-data, and model-history endpoints over the shared
//! pipeline crate. Request handling is parallel; the job store and event bus
//! serialize their own mutations.

use std::sync::Arc;

use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use cne_core::config::Settings;
use cne_core::error::AppError;
use cne_core::metrics::Metrics;
use cne_core::models::{ApprovalRequest, ApprovalResponse, JobSummary, MasterRecord};
use cne_core::AppContext;
use futures_util::StreamExt as _;
use serde::Serialize;
use tracing::{error, info};

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_response(err: AppError) -> HttpResponse {
    let detail = err.to_string();
    match err {
        AppError::NotFound(_) => HttpResponse::NotFound().json(ErrorBody { detail }),
        AppError::Validation(_) => HttpResponse::BadRequest().json(ErrorBody { detail }),
        AppError::Parse(_) | AppError::Io(_) => HttpResponse::InternalServerError().json(ErrorBody { detail }),
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn list_jobs(context: web::Data<AppContext>) -> impl Responder {
    let jobs: Vec<JobSummary> = context.job_store.list();
    HttpResponse::Ok().json(serde_json::json!({ "jobs": jobs }))
}

async fn get_job(context: web::Data<AppContext>, path: web::Path<String>) -> impl Responder {
    match context.job_store.get(&path) {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(err) => error_response(err),
    }
}

/// Accepts a multipart upload (`file`, optional `uploader`), stores it under
/// `incoming/<job_id>/<filename>`, creates the job record, and enqueues it.
async fn create_job(context: web::Data<AppContext>, mut payload: Multipart) -> actix_web::Result<HttpResponse> {
    let mut filename = String::new();
    let mut uploader: Option<String> = None;
    let mut bytes: Vec<u8> = Vec::new();

    while let Some(field) = payload.next().await {
        let mut field = field?;
        let name = field.name().to_string();
        if name == "uploader" {
            let mut text = Vec::new();
            while let Some(chunk) = field.next().await {
                text.extend_from_slice(&chunk?);
            }
            uploader = Some(String::from_utf8_lossy(&text).to_string());
            continue;
        }
        if name == "file" {
            filename = field
                .content_disposition()
                .get_filename()
                .map(str::to_string)
                .unwrap_or_else(|| "upload.bin".to_string());
            while let Some(chunk) = field.next().await {
                bytes.extend_from_slice(&chunk?);
            }
        }
    }

    if filename.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorBody { detail: "missing file field".to_string() }));
    }

    let job = context
        .job_store
        .create(&filename, uploader.as_deref())
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let incoming_dir = context.paths.incoming_job_dir(&job.job_id);
    std::fs::create_dir_all(&incoming_dir).map_err(actix_web::error::ErrorInternalServerError)?;
    std::fs::write(incoming_dir.join(&filename), &bytes).map_err(actix_web::error::ErrorInternalServerError)?;

    let job = context.job_store.enqueue(&job).map_err(actix_web::error::ErrorInternalServerError)?;
    info!(job_id = %job.job_id, filename, "job received and enqueued");

    Ok(HttpResponse::Ok().json(job))
}

async fn preview(context: web::Data<AppContext>, path: web::Path<String>) -> impl Responder {
    let job_id = path.into_inner();
    match context.job_store.get(&job_id) {
        Ok(job) if !job.preview_ready => HttpResponse::NotFound().json(ErrorBody { detail: "preview not ready".to_string() }),
        Ok(_) => {
            let file = context.paths.processed_job_dir(&job_id).join("preview.json");
            match std::fs::read_to_string(&file) {
                Ok(body) => HttpResponse::Ok().content_type("application/json").body(body),
                Err(_) => HttpResponse::NotFound().json(ErrorBody { detail: "preview not ready".to_string() }),
            }
        }
        Err(err) => error_response(err),
    }
}

async fn download(context: web::Data<AppContext>, path: web::Path<String>) -> impl Responder {
    let job_id = path.into_inner();
    match context.job_store.get(&job_id) {
        Ok(job) if !job.csv_ready => HttpResponse::NotFound().json(ErrorBody { detail: "csv not ready".to_string() }),
        Ok(_) => {
            let file = context.paths.processed_job_dir(&job_id).join("output.csv");
            match std::fs::read(&file) {
                Ok(bytes) => HttpResponse::Ok().content_type("text/csv").body(bytes),
                Err(_) => HttpResponse::NotFound().json(ErrorBody { detail: "csv not ready".to_string() }),
            }
        }
        Err(err) => error_response(err),
    }
}

async fn approve(
    context: web::Data<AppContext>,
    path: web::Path<String>,
    body: web::Json<ApprovalRequest>,
) -> impl Responder {
    let job_id = path.into_inner();
    match context.approve_job(&job_id, &body.approver, body.notes.as_deref()) {
        Ok(job) => HttpResponse::Ok().json(ApprovalResponse {
            job_id: job.job_id,
            approved: true,
            approved_at: job.approved_at.unwrap_or_else(chrono::Utc::now),
            notes: body.notes.clone(),
        }),
        Err(err) => {
            error!(job_id, error = %err, "approval failed");
            error_response(err)
        }
    }
}

async fn list_master_data(context: web::Data<AppContext>) -> impl Responder {
    match cne_core::master_registry::list(&context.paths.master_dir()) {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => error_response(err),
    }
}

async fn upsert_master_data(context: web::Data<AppContext>, body: web::Json<MasterRecord>) -> impl Responder {
    match cne_core::master_registry::upsert(&context.paths.master_dir(), &body) {
        Ok(()) => HttpResponse::Ok().json(body.into_inner()),
        Err(err) => error_response(err),
    }
}

async fn models_history(context: web::Data<AppContext>) -> impl Responder {
    match cne_core::model_registry::history(&context.paths.model_registry_file()) {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => error_response(err),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().json().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let settings = Settings::new().unwrap_or_default();
    let bind_addr = settings.bind_addr.clone();
    let context = Arc::new(AppContext::build(settings).expect("failed to build application context"));
    Metrics::global().set_gauge("api.startup", 1.0);
    info!(%bind_addr, "starting cne-api");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::Data::from(context.clone()))
            .route("/health", web::get().to(health))
            .route("/jobs/", web::get().to(list_jobs))
            .route("/jobs/", web::post().to(create_job))
            .route("/jobs/{id}", web::get().to(get_job))
            .route("/preview/{id}", web::get().to(preview))
            .route("/download/{id}", web::get().to(download))
            .route("/approval/{id}", web::post().to(approve))
            .route("/master-data/", web::get().to(list_master_data))
            .route("/master-data/", web::post().to(upsert_master_data))
            .route("/models/history", web::get().to(models_history))
    })
    .bind(bind_addr)?
    .run()
    .await
}
