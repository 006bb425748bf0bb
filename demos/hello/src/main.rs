//! Hello World demo for nanoPortal
//!
//! Run from demos/hello: cargo run
//!
//! Then visit:
//! - http://127.0.0.1:8080/            (home/index, JSON)
//! - http://127.0.0.1:8080/users/show/42  (template)
//! - http://127.0.0.1:8080/u/42        (mapped to users/show/42)
//! - http://127.0.0.1:8080/users/show/42.json

use nanoportal::prelude::*;

#[derive(Serialize)]
struct HelloResponse {
    message: String,
}

fn home() -> Controller {
    Controller::new("home").action("index", |scope, _| {
        scope.response().set_cache_duration(60);
        Outcome::data(&HelloResponse {
            message: "Hello, World!".to_string(),
        })
    })
}

fn users() -> Controller {
    Controller::new("users").action("show", |scope, params| {
        let id = match params.first() {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| PortalError::bad_request("user id must be a number"))?,
            None => return Err(PortalError::bad_request("missing user id")),
        };
        scope.response().set_etag(format!("\"user-{}\"", id));
        scope.set("id", id);
        scope.set("name", format!("User {}", id));
        Ok(Outcome::None)
    })
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut portal = Portal::from_env()?.controller(home()).controller(users());
    match Templates::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html")) {
        Ok(templates) => portal = portal.renderer(templates),
        Err(err) => warn!("Templates unavailable, serving JSON only: {}", err),
    }

    portal.map("u/*", "/users/show/*").run("127.0.0.1:8080").await
}
