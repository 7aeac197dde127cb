use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use campus_match::config::{LogFormat, LoggingSettings, Settings, StoreBackend};
use campus_match::core::Matcher;
use campus_match::routes::{self, matches::AppState};
use campus_match::services::purdue::{fallback_courses, load_course_file, with_fallback_courses};
use campus_match::services::{
    seed_demo_data, CacheManager, CachedCatalog, CourseCatalog, InMemoryStore, PgStore, ProfileStore,
    PurdueCatalogClient, SeedStore,
};
use campus_match::models::NewCourse;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracing::{info, warn, error};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path parameter errors (e.g. a non-numeric user id)
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path parameter: {}", err),
        status_code: 400,
    }
    .into()
}

/// Course list used for seeding: saved feed, then remote feed, then built-ins
async fn load_seed_courses(settings: &Settings) -> Vec<NewCourse> {
    let catalog = &settings.catalog;

    let imported = if let Some(path) = &catalog.course_file {
        match load_course_file(path, catalog.import_limit) {
            Ok(courses) => courses,
            Err(e) => {
                warn!("Failed to load course file {}: {}", path, e);
                Vec::new()
            }
        }
    } else if catalog.fetch_remote {
        let fetched = match PurdueCatalogClient::new(catalog.base_url.clone(), catalog.timeout_secs) {
            Ok(client) => client.fetch_courses(catalog.import_limit, catalog.subject.as_deref()).await,
            Err(e) => Err(e),
        };
        fetched.unwrap_or_else(|e| {
            warn!("Course catalog import failed, using built-in courses: {}", e);
            Vec::new()
        })
    } else {
        fallback_courses()
    };

    with_fallback_courses(imported)
}

/// Seed (when enabled) and assemble the shared state around one store
async fn build_state<S>(store: Arc<S>, settings: &Settings) -> std::io::Result<AppState>
where
    S: ProfileStore + CourseCatalog + SeedStore + 'static,
{
    if settings.seed.enabled {
        let courses = load_seed_courses(settings).await;
        let mut rng = match settings.seed.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let report = seed_demo_data(store.as_ref(), &courses, &settings.seed.plan(), &mut rng)
            .await
            .map_err(|e| {
                error!("Failed to seed demo data: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;

        if !report.skipped {
            info!("Seeded {} courses and {} demo users", report.courses, report.users_created.len());
        }
    }

    // Cache is optional: without Redis the L1 tier still serves course names
    let cache_ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_cache_size = settings.cache.l1_cache_size.unwrap_or(1000);

    let cache = match &settings.cache.redis_url {
        Some(url) => match CacheManager::new(url, l1_cache_size, cache_ttl).await {
            Ok(c) => {
                info!("Cache manager initialized (L1: {} entries, TTL: {}s, Redis L2)", l1_cache_size, cache_ttl);
                c
            }
            Err(e) => {
                warn!("Failed to connect to Redis ({}), running with in-process cache only", e);
                CacheManager::in_memory(l1_cache_size, cache_ttl)
            }
        },
        None => CacheManager::in_memory(l1_cache_size, cache_ttl),
    };

    let profiles: Arc<dyn ProfileStore> = store.clone();
    let catalog: Arc<dyn CourseCatalog> = Arc::new(CachedCatalog::new(store, Arc::new(cache)));

    let policy = settings.matching.policy();
    info!("Matcher initialized with policy: {:?}", policy);

    let matcher = Matcher::new(profiles.clone(), catalog.clone(), policy)
        .with_random_seed(settings.matching.random_seed);

    Ok(AppState {
        profiles,
        catalog,
        matcher,
    })
}

/// Install the tracing subscriber
///
/// `LOG_LEVEL` and `LOG_FORMAT` override the `[logging]` settings. `RUST_LOG`,
/// when set, takes precedence over both levels.
fn init_logging(logging: &LoggingSettings) {
    let (log_level, log_format) = logging.resolve(
        std::env::var("LOG_LEVEL").ok(),
        std::env::var("LOG_FORMAT").ok(),
    );

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .with_target(false)
        .with_level(true);

    match log_format {
        LogFormat::Pretty => subscriber.pretty().init(),
        LogFormat::Compact => subscriber.compact().init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Load configuration; logging falls back to defaults if it fails
    let settings = Settings::load();
    let logging = settings
        .as_ref()
        .map(|s| s.logging.clone())
        .unwrap_or_default();
    init_logging(&logging);

    info!("Starting Campus Match service...");

    let settings = settings.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    let app_state = match settings.database.backend {
        StoreBackend::Postgres => {
            let db_max_conn = settings.database.max_connections.unwrap_or(10);
            let store = PgStore::from_settings(
                &settings.database.url,
                Some(db_max_conn),
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .unwrap_or_else(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                panic!("PostgreSQL connection error: {}", e);
            });

            info!("PostgreSQL store initialized (max: {} connections)", db_max_conn);
            build_state(Arc::new(store), &settings).await?
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            build_state(Arc::new(InMemoryStore::new()), &settings).await?
        }
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
