use std::{
    fs,
    io::{Error, ErrorKind},
    path::Path,
    sync::Arc,
};

use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::{
    get, http::{self, header::{ContentDisposition, ContentType, DispositionParam, DispositionType}},
    middleware, web, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use serde::Deserialize;

mod pages;

mod server_args;
use server_args::parse_args;

mod web_error;
use web_error::AppError;

use pdbcharges_web::{
    access_log::AccessLog,
    bundle::bundle_results,
    charges::ChargeRecord,
    code::StructureCode,
    config::ServerConfig,
    fetcher::{KeyedLocks, ResultCache},
    result_files::ResultFile,
    warnings::{self, ResidueWarning},
};

/// Per-worker state. The HTTP client inside the cache is not `Send`, so every
/// worker builds its own, while the fetch locks are shared.
struct AppState {
    config: Arc<ServerConfig>,
    cache: ResultCache,
    access_log: AccessLog,
}

impl AppState {
    fn new(config: Arc<ServerConfig>, locks: Arc<KeyedLocks>) -> Self {
        Self {
            cache: ResultCache::new(&config.cache_dir, config.remote_source(), locks),
            access_log: AccessLog::new(config.access_log_path()),
            config,
        }
    }
}

#[derive(Deserialize)]
struct CodeQuery {
    code: String,
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type(ContentType::html()).body(body)
}

fn client_addr(request: &HttpRequest) -> String {
    request
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "-".into())
}

async fn index() -> impl Responder {
    html(pages::index(None))
}

async fn submit(
    request: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<CodeQuery>,
) -> Result<HttpResponse, AppError> {
    let code = match StructureCode::parse(&form.code) {
        Ok(code) => code,
        Err(e) => {
            log::debug!("Rejected code {:?}: {e}", form.code);
            return Err(e.into());
        }
    };
    if let Err(e) = state.cache.ensure_local(&code).await {
        // Unsuccessful lookups are logged here, successful ones on the results page
        state.access_log.record(&client_addr(&request), &code);
        return Err(e.into());
    }
    Ok(HttpResponse::SeeOther()
        .insert_header((http::header::LOCATION, format!("/results?code={code}")))
        .finish())
}

/// Residual warnings as produced by the calculation. A structure without a
/// readable warnings file simply shows none.
fn read_warnings(dir: &Path, code: &StructureCode) -> Vec<ResidueWarning> {
    let path = ResultFile::Warnings.path(dir, code);
    if !path.is_file() {
        return Vec::new();
    }
    warnings::load_warnings(&path).unwrap_or_else(|e| {
        log::warn!("Ignoring unreadable {}: {e}", path.display());
        Vec::new()
    })
}

#[get("/results")]
async fn results(
    request: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<CodeQuery>,
) -> Result<HttpResponse, AppError> {
    let code = StructureCode::parse(&query.code)?;
    state.access_log.record(&client_addr(&request), &code);

    let cif_path = state.cache.ensure_local(&code).await?;
    let record = web::block(move || ChargeRecord::from_path(cif_path)).await??;
    let summary = record.summary(state.config.charge_rounding);

    let dir = state.cache.code_dir(&code);
    let warnings = read_warnings(&dir, &code);
    let remapped = fs::read_to_string(ResultFile::RemappedWarnings.path(&dir, &code))
        .unwrap_or_else(|_| "[]".into());
    log::debug!("Results for {code}: {summary:?}");
    Ok(html(pages::results(&code, &summary, &warnings, &remapped)))
}

/// Bundle already cached results for download. Never fetches.
#[get("/download_files")]
async fn download_files(
    state: web::Data<AppState>,
    query: web::Query<CodeQuery>,
) -> Result<NamedFile, AppError> {
    let code = StructureCode::parse(&query.code)?;
    let dir = state.cache.code_dir(&code);
    let name = ResultFile::Archive.file_name(&code);
    let archive = web::block(move || bundle_results(&dir, &code)).await??;
    let file = NamedFile::open_async(&archive).await
        .map_err(|e| AppError::Internal(format!("opening {}: {e}", archive.display())))?;
    Ok(file.set_content_disposition(ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(name)],
    }))
}

/// Raw structure file for external viewers. Never fetches.
#[get("/structure/{code}")]
async fn get_structure(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<NamedFile, AppError> {
    let code = StructureCode::parse(&path)?;
    let file = ResultFile::Structure.path(state.cache.code_dir(&code), &code);
    match NamedFile::open_async(&file).await {
        Ok(file) => Ok(file
            .set_content_type(ContentType::plaintext().0)
            .disable_content_disposition()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(code)),
        Err(e) => Err(AppError::Internal(format!("opening {}: {e}", file.display()))),
    }
}

async fn not_found() -> impl Responder {
    HttpResponse::NotFound()
        .content_type(ContentType::html())
        .body(pages::not_found())
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/")
            .route(web::get().to(index))
            .route(web::post().to(submit)))
        .service(results)
        .service(download_files)
        .service(get_structure);
}

fn static_files(cfg: &mut web::ServiceConfig, dir: Option<&Path>) {
    match dir {
        Some(dir) if dir.is_dir() => {
            cfg.service(Files::new("/static", dir));
        }
        Some(dir) => log::warn!("Static directory {} not found, not serving /static", dir.display()),
        None => {}
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let Some(config) = (match parse_args() {
        Ok(config) => config,
        Err(e) => {
            return Err(Error::new(ErrorKind::InvalidInput,
                format!("Error parsing command line arguments: {e}")));
        }
    }) else { return Ok(()) };

    fs::create_dir_all(&config.cache_dir)?;
    log::info!("Caching results in {} (remote: {})", config.cache_dir.display(), config.remote_url);

    let config = Arc::new(config);
    let locks = Arc::new(KeyedLocks::new());
    let bind = (config.address.clone(), config.port);
    let workers = config.workers;

    let mut server = HttpServer::new(move || {
        // Results are public, external structure viewers may fetch them directly
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET"])
            .allowed_headers(vec![http::header::ACCEPT])
            .max_age(3600);
        let static_dir = config.static_dir.clone();
        App::new()
            .app_data(web::Data::new(AppState::new(config.clone(), locks.clone())))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .configure(routes)
            .configure(move |cfg| static_files(cfg, static_dir.as_deref()))
            .default_service(web::route().to(not_found))
    });
    if let Some(workers) = workers {
        server = server.workers(workers);
    }
    server.bind(bind)?
        .run()
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use actix_web::{http::{header, StatusCode}, test};

    const CIF: &str = concat!(
        "data_1tst\n",
        "loop_\n",
        "_atom_site.group_PDB\n",
        "_atom_site.id\n",
        "_atom_site.type_symbol\n",
        "_atom_site.label_atom_id\n",
        "_atom_site.label_comp_id\n",
        "_atom_site.label_asym_id\n",
        "_atom_site.label_seq_id\n",
        "_atom_site.Cartn_x\n",
        "_atom_site.Cartn_y\n",
        "_atom_site.Cartn_z\n",
        "_atom_site.auth_seq_id\n",
        "_atom_site.auth_asym_id\n",
        "ATOM 1 N N GLY A 1 1.0 2.0 3.0 10 A\n",
        "ATOM 2 C CA GLY A 1 1.5 2.5 3.5 10 A\n",
        "#\n",
        "loop_\n",
        "_sb_ncbr_partial_atomic_charges.type_id\n",
        "_sb_ncbr_partial_atomic_charges.atom_id\n",
        "_sb_ncbr_partial_atomic_charges.charge\n",
        "1 1 -0.25\n",
        "1 2 ?\n",
    );

    const WARNINGS: &str = r#"[{"chain_id": "A", "residue_id": "10", "residue_name": "GLY", "warning": "Check me"}]"#;

    /// Server state backed by a local mirror holding results for `1tst`.
    fn state(root: &Path) -> web::Data<AppState> {
        let remote = root.join("remote").join("1tst");
        fs::create_dir_all(&remote).unwrap();
        fs::write(remote.join("1tst.cif"), CIF).unwrap();
        fs::write(remote.join("residual_warnings.json"), WARNINGS).unwrap();
        let config = ServerConfig {
            cache_dir: root.join("cache"),
            remote_url: format!("file://{}", root.join("remote").display()),
            static_dir: None,
            ..Default::default()
        };
        web::Data::new(AppState::new(Arc::new(config), Arc::new(KeyedLocks::new())))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new()
                .app_data($state.clone())
                .configure(routes)
                .default_service(web::route().to(not_found))
            ).await
        };
    }

    #[actix_web::test]
    async fn test_index() {
        let root = tempfile::tempdir().unwrap();
        let app = app!(state(root.path()));
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("<form method=\"post\""));
    }

    #[actix_web::test]
    async fn test_submit() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        let app = app!(state);

        let req = test::TestRequest::post().uri("/").set_form([("code", "../etc")]).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/").set_form([("code", " 1TST ")]).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/results?code=1tst");
        assert!(root.path().join("cache/1tst/modified_residual_warnings.json").is_file());

        let req = test::TestRequest::post()
            .uri("/")
            .peer_addr("10.1.2.3:5000".parse().unwrap())
            .set_form([("code", "9zzz")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("<strong>9zzz</strong>"));

        let log = fs::read_to_string(state.config.access_log_path()).unwrap();
        assert!(log.starts_with("10.1.2.3 9zzz "));
        assert_eq!(log.lines().count(), 1);
    }

    #[actix_web::test]
    async fn test_results() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        let app = app!(state);

        let req = test::TestRequest::get().uri("/results?code=1tst").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let page = std::str::from_utf8(&body).unwrap();
        assert!(page.contains("<tr><th>Atoms</th><td>2</td></tr>"));
        assert!(page.contains("<tr><th>Atoms without charge</th><td>1</td></tr>"));
        assert!(page.contains("<tr><th>Total charge</th><td>0</td></tr>"));
        assert!(page.contains("Check me"));
        assert!(page.contains("\"label_seq_id\": \"1\""));

        let req = test::TestRequest::get().uri("/results?code=9zzz").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        assert_eq!(fs::read_to_string(state.config.access_log_path()).unwrap().lines().count(), 2);
    }

    #[actix_web::test]
    async fn test_results_unparsable() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        fs::write(root.path().join("remote/1tst/1tst.cif"), "data_1tst\n").unwrap();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/results?code=1tst").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_download_requires_cached_results() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        let app = app!(state);

        let req = test::TestRequest::get().uri("/download_files?code=1tst").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.cache.remote_requests(), 0);

        state.cache.ensure_local(&StructureCode::parse("1tst").unwrap()).await.unwrap();
        let req = test::TestRequest::get().uri("/download_files?code=1tst").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers().get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap();
        assert!(disposition.starts_with("attachment"));
        assert!(disposition.contains("1tst_charges.zip"));
    }

    #[actix_web::test]
    async fn test_structure() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        let app = app!(state);

        let req = test::TestRequest::get().uri("/structure/1tst").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        state.cache.ensure_local(&StructureCode::parse("1tst").unwrap()).await.unwrap();
        let req = test::TestRequest::get().uri("/structure/1TST").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(test::read_body(resp).await, CIF.as_bytes());
    }

    #[actix_web::test]
    async fn test_unknown_route() {
        let root = tempfile::tempdir().unwrap();
        let app = app!(state(root.path()));
        let req = test::TestRequest::get().uri("/nothing/here").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
