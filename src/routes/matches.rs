use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::models::{
    ErrorResponse, FindMatchesRequest, FindMatchesResponse, HealthResponse, ProfileCourse, ProfileResponse,
    UserId,
};
use crate::services::{CourseCatalog, ProfileStore};
use crate::core::Matcher;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub catalog: Arc<dyn CourseCatalog>,
    pub matcher: Matcher,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/find", web::post().to(find_matches))
        .route("/users/{user_id}/profile", web::get().to(get_user_profile));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.profiles.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Find study matches endpoint
///
/// POST /api/v1/matches/find
///
/// Request body:
/// ```json
/// {
///   "userId": 42
/// }
/// ```
///
/// An unknown user gets an empty match list, not an error.
async fn find_matches(
    state: web::Data<AppState>,
    req: web::Json<FindMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for find_matches request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let user_id = UserId(req.user_id);
    tracing::info!("Finding study matches for user: {}", user_id);

    let matches = state.matcher.rank_matches(user_id).await;

    let response = FindMatchesResponse {
        total_results: matches.len(),
        matches,
    };

    tracing::info!("Returning {} matches for user {}", response.total_results, user_id);

    HttpResponse::Ok().json(response)
}

/// Get a user's profile with resolved course names
///
/// GET /api/v1/users/{user_id}/profile
async fn get_user_profile(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let user_id = UserId(path.into_inner());

    let profile = match state.profiles.get_profile(user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse {
                error: "User not found".to_string(),
                message: format!("No profile for user {}", user_id),
                status_code: 404,
            });
        }
        Err(e) => {
            tracing::error!("Failed to fetch profile for {}: {}", user_id, e);
            return HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch user profile".to_string(),
                message: e.to_string(),
                status_code: 500,
            });
        }
    };

    let course_ids: Vec<_> = profile.courses.iter().copied().collect();
    let names = match state.catalog.get_course_display_names(&course_ids).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!("Failed to resolve course names for {}, returning ids only: {}", user_id, e);
            Default::default()
        }
    };

    let courses = course_ids
        .iter()
        .filter_map(|id| {
            names.get(id).map(|name| ProfileCourse {
                course_id: id.0,
                course_name: name.clone(),
            })
        })
        .collect();

    HttpResponse::Ok().json(ProfileResponse { profile, courses })
}
