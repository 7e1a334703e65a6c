use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info, warn};
use sanitize_filename::sanitize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;

use super::models::{ContractForm, ContractResponse, ContractUploadRequest};
use super::multipart_parser::MultipartParser;
use super::pages::{form_page, thank_you_page};
use super::template::preview_html;
use super::ContractError;
use crate::state::AppState;
use crate::ErrorResponse;

const INVALID_SIGNATURE_MESSAGE: &str = "La imagen de la firma es inválida.";
const DOWNLOAD_NOT_FOUND_MESSAGE: &str = "Error: No se encontró el contrato para descargar.";

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub timestamp: String,
}

fn text_response(mut builder: actix_web::HttpResponseBuilder, body: String) -> HttpResponse {
    builder.content_type("text/plain; charset=utf-8").body(body)
}

/// Plain-text errors for the HTML form.
fn form_error(err: ContractError) -> HttpResponse {
    match err {
        ContractError::Validation(errors) => {
            info!("Form rejected: {}", errors.to_form_message());
            text_response(HttpResponse::BadRequest(), errors.to_form_message())
        }
        ContractError::InvalidSignature(reason) => {
            warn!("Invalid signature image: {}", reason);
            text_response(HttpResponse::BadRequest(), INVALID_SIGNATURE_MESSAGE.to_string())
        }
        other => {
            error!("Contract generation failed: {}", other);
            text_response(HttpResponse::InternalServerError(), other.to_string())
        }
    }
}

/// JSON errors for the API.
fn api_error(err: ContractError) -> HttpResponse {
    match err {
        ContractError::Validation(errors) => HttpResponse::BadRequest()
            .json(ErrorResponse::bad_request(&errors.to_detailed_message())),
        ContractError::InvalidSignature(reason) => {
            warn!("Invalid signature image: {}", reason);
            HttpResponse::BadRequest().json(ErrorResponse::bad_request(INVALID_SIGNATURE_MESSAGE))
        }
        other => {
            error!("Contract generation failed: {}", other);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&other.to_string()))
        }
    }
}

fn is_contract_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

/// Serve `filename` from the output directory as an attachment.
///
/// Names that change under sanitization (path separators, `..`) are refused.
/// Only generated contracts are downloadable: a `.pdf` or `.docx` directly in
/// the output directory, never the company signature.
async fn serve_output(
    req: &HttpRequest,
    data: &AppState,
    filename: &str,
) -> Option<HttpResponse> {
    let safe = sanitize(filename);
    if safe.is_empty() || safe != filename || !is_contract_file(&safe) {
        warn!("Refusing download of '{}'", filename);
        return None;
    }

    let path = data.pipeline.output_dir().join(&safe);
    if path == data.pipeline.company().signature_path {
        warn!("Refusing download of the company signature");
        return None;
    }

    let file = match NamedFile::open_async(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Download of '{}' failed: {}", safe, e);
            return None;
        }
    };

    Some(
        file.set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(safe)],
        })
        .into_response(req),
    )
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Contract Form",
    responses(
        (status = 200, description = "Signing form with the contract preview", content_type = "text/html")
    )
)]
pub async fn index(data: web::Data<AppState>) -> impl Responder {
    let preview = preview_html(data.pipeline.template_path()).await;
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(form_page(&preview))
}

#[utoipa::path(
    post,
    path = "/generar",
    tag = "Contract Form",
    request_body(content = inline(ContractUploadRequest), content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Thank-you page; sets the download cookie", content_type = "text/html"),
        (status = 400, description = "Missing fields or invalid signature", content_type = "text/plain"),
        (status = 500, description = "Template or output failure", content_type = "text/plain")
    )
)]
pub async fn generate(
    data: web::Data<AppState>,
    fields: web::Form<HashMap<String, String>>,
) -> impl Responder {
    let form = ContractForm::from_fields(&fields);
    let contract = match data.pipeline.run(&form).await {
        Ok(contract) => contract,
        Err(e) => return form_error(e),
    };

    let filename = contract.filename();
    info!("Contract {} ready for download", filename);

    let mut response = HttpResponse::Ok();
    response.content_type("text/html; charset=utf-8");
    match data.session.cookie(&filename) {
        Ok(cookie) => {
            response.cookie(cookie);
        }
        Err(e) => error!("Could not issue download session: {}", e),
    }
    response.body(thank_you_page(&data.config.company.phone))
}

#[utoipa::path(
    get,
    path = "/descargar",
    tag = "Contract Form",
    responses(
        (status = 200, description = "The contract generated in this session"),
        (status = 404, description = "No contract in session", content_type = "text/plain")
    )
)]
pub async fn download(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let served = match data.session.filename_from_request(&req) {
        Some(filename) => serve_output(&req, &data, &filename).await,
        None => None,
    };
    served.unwrap_or_else(|| {
        text_response(HttpResponse::NotFound(), DOWNLOAD_NOT_FOUND_MESSAGE.to_string())
    })
}

#[utoipa::path(
    post,
    path = "/contracts",
    context_path = "/api",
    tag = "Contract API",
    request_body(content = inline(ContractUploadRequest), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Contract generated", body = ContractResponse),
        (status = 400, description = "Invalid submission", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn api_generate(data: web::Data<AppState>, payload: Multipart) -> impl Responder {
    let form = match MultipartParser::parse_contract_multipart(payload).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Multipart parse failed: {}", e);
            return HttpResponse::from(e);
        }
    };

    match data.pipeline.run(&form).await {
        Ok(contract) => {
            let response = ContractResponse::new(
                contract.filename(),
                contract.format,
                contract.remote_file_id,
                contract.emails_sent,
            );
            HttpResponse::Created().json(response)
        }
        Err(e) => api_error(e),
    }
}

#[utoipa::path(
    get,
    path = "/contracts/{filename}",
    context_path = "/api",
    tag = "Contract API",
    params(("filename" = String, Path, description = "Name returned by POST /api/contracts")),
    responses(
        (status = 200, description = "Contract file"),
        (status = 404, description = "Unknown contract", body = ErrorResponse)
    )
)]
pub async fn api_download(
    req: HttpRequest,
    data: web::Data<AppState>,
    filename: web::Path<String>,
) -> impl Responder {
    let filename = filename.into_inner();
    match serve_output(&req, &data, &filename).await {
        Some(response) => response,
        None => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "Contract '{}' not found",
            filename
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Routes of the contract service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/generar", web::post().to(generate))
        .route("/descargar", web::get().to(download))
        .route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                .route("/contracts", web::post().to(api_generate))
                .route("/contracts/{filename}", web::get().to(api_download)),
        );
}
