//! The route table and request handlers.
//!
//! | Method | Path                                 | Handler             |
//! |--------|--------------------------------------|---------------------|
//! | GET    | `/example`                           | list messages       |
//! | GET    | `/example/login`                     | login               |
//! | GET    | `/example/frontend-insecure`         | demo page           |
//! | GET    | `/example/frontend-evil`             | demo page           |
//! | GET    | `/example/frontend-secure`           | demo page           |
//! | POST   | `/example/secure/{message}?token=..` | protected write     |
//! | GET    | `/example/{message}`                 | unprotected write   |
//! | POST   | `/example/{message}`                 | unprotected write   |
//!
//! Resources are matched in the order above, so for GET the fixed paths win
//! over `{message}`. The fixed paths only answer GET, so any other method
//! falls through: `POST /example/login` stores the message "login".

use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};

use crate::extractor::GateRequest;
use crate::gate::{Gate, GateError, Login};

const INSECURE_PAGE: &str = include_str!("pages/insecure.html");
const EVIL_PAGE: &str = include_str!("pages/evil.html");
const SECURE_PAGE: &str = include_str!("pages/secure.html");

/// Registers `gate` and every route under `/example`.
///
/// ```no_run
/// # async fn run(gate: csrf_demo::Gate) -> std::io::Result<()> {
/// use actix_web::{App, HttpServer};
///
/// HttpServer::new(move || App::new().configure(csrf_demo::routes::configure(gate.clone())))
///     .bind(("127.0.0.1", 8080))?
///     .run()
///     .await
/// # }
/// ```
pub fn configure(gate: Gate) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(gate.config().clone())
            .app_data(web::Data::new(gate))
            .service(
                web::scope("/example")
                    .route("", web::get().to(list_messages))
                    .route("/login", web::get().to(login))
                    .route("/frontend-insecure", web::get().to(frontend_insecure))
                    .route("/frontend-evil", web::get().to(frontend_evil))
                    .route("/frontend-secure", web::get().to(frontend_secure))
                    .route("/secure/{message}", web::post().to(write_protected))
                    .service(
                        web::resource("/{message}")
                            .route(web::get().to(write_unprotected))
                            .route(web::post().to(write_unprotected)),
                    ),
            );
    }
}

async fn list_messages(
    gate: web::Data<Gate>,
    req: GateRequest,
) -> Result<HttpResponse, GateError> {
    let messages = gate.read(&req).await?;
    Ok(HttpResponse::Ok().json(messages))
}

async fn login(gate: web::Data<Gate>) -> HttpResponse {
    let Login { token, cookie } = gate.login();
    HttpResponse::Ok()
        .cookie(cookie)
        .content_type(ContentType::plaintext())
        .body(token)
}

// Reachable through GET as well, so even a plain link or image tag can write.
async fn write_unprotected(
    gate: web::Data<Gate>,
    req: GateRequest,
) -> Result<HttpResponse, GateError> {
    gate.write_unprotected(&req).await?;
    Ok(HttpResponse::Ok().finish())
}

async fn write_protected(
    gate: web::Data<Gate>,
    req: GateRequest,
) -> Result<HttpResponse, GateError> {
    gate.write_protected(&req).await?;
    Ok(HttpResponse::Ok().finish())
}

async fn frontend_insecure() -> HttpResponse {
    html(INSECURE_PAGE)
}

async fn frontend_evil() -> HttpResponse {
    html(EVIL_PAGE)
}

async fn frontend_secure() -> HttpResponse {
    html(SECURE_PAGE)
}

fn html(page: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(page)
}
