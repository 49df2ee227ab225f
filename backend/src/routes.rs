use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::header::ACCEPT_LANGUAGE;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, info, warn};
use serde_json::json;
use shared::{ErrorResponse, Language, LanguageInfo};
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::DetectionSettings;
use crate::diagnosis::random::RngSource;
use crate::diagnosis::resolver::LabelResolver;
use crate::upload::{resolve_language, validate_images, DetectForm, UploadError};

const ANALYSIS_FAILED: &str = "Failed to analyze images. Please try again.";

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<PathBuf>) {
    cfg.service(web::resource("/api/detect").route(web::post().to(handle_detect)))
        .service(web::resource("/api/languages").route(web::get().to(list_languages)))
        .service(web::resource("/api/health").route(web::get().to(health)));

    if let Some(dir) = static_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

fn bad_request(request_id: Uuid, err: UploadError) -> HttpResponse {
    match &err {
        UploadError::InvalidType { file_name } | UploadError::TooLarge { file_name, .. } => {
            warn!("[{}] Rejected {}: {}", request_id, file_name, err)
        }
        _ => warn!("[{}] Rejected request: {}", request_id, err),
    }
    HttpResponse::BadRequest().json(ErrorResponse {
        error: err.to_string(),
    })
}

async fn handle_detect(
    req: HttpRequest,
    payload: Multipart,
    resolver: web::Data<LabelResolver>,
    settings: web::Data<DetectionSettings>,
) -> HttpResponse {
    let request_id = Uuid::new_v4();

    let form = match DetectForm::read(payload).await {
        Ok(form) => form,
        Err(e) => return bad_request(request_id, e),
    };

    let accept_language = req
        .headers()
        .get(ACCEPT_LANGUAGE)
        .and_then(|value| value.to_str().ok());
    let language_field = form.language().map(str::to_string);

    let images = form.into_images();
    if let Err(e) = validate_images(&images, settings.max_image_mb) {
        return bad_request(request_id, e);
    }
    let language = match resolve_language(language_field.as_deref(), accept_language) {
        Ok(language) => language,
        Err(e) => return bad_request(request_id, e),
    };

    info!(
        "[{}] Diagnosing {} image(s) in {}",
        request_id,
        images.len(),
        language
    );

    if !settings.delay.is_zero() {
        tokio::time::sleep(settings.delay).await;
    }

    let file_names: Vec<&str> = images.iter().map(|i| i.file_name.as_str()).collect();
    let result = match settings.seed {
        Some(seed) => resolver.resolve(&file_names, language, &mut RngSource::seeded(seed)),
        None => resolver.resolve(&file_names, language, &mut RngSource::thread()),
    };

    match result {
        Ok(records) => {
            for record in &records {
                debug!(
                    "[{}] {} -> {} ({}%)",
                    request_id,
                    record.image_id,
                    record.disease_id.as_deref().unwrap_or("healthy"),
                    record.confidence
                );
            }
            HttpResponse::Ok().json(records)
        }
        Err(e) => {
            error!("[{}] Detection error: {}", request_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: ANALYSIS_FAILED.into(),
            })
        }
    }
}

async fn list_languages() -> HttpResponse {
    let languages: Vec<LanguageInfo> = Language::all().into_iter().map(LanguageInfo::from).collect();
    HttpResponse::Ok().json(languages)
}

async fn health(resolver: web::Data<LabelResolver>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "diseases": resolver.catalog().len(),
    }))
}
