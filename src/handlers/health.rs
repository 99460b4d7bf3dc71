//! Liveness probe. Deliberately does not touch the database, Redis, or any
//! downstream collaborator - a dependency outage should not take the
//! process out of a load balancer's rotation.

use actix_web::HttpResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
