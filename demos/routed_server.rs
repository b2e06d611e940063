//! An HTTP server example demonstrating the microroute-rs routing and
//! dispatch API: template routes, typed parameters, and a body-consuming
//! handler.

use std::collections::HashMap;

use microroute_rs::{
    BodyHandler, BodyParams, BodylessHandler, BodylessParams, Coordinator, HandlerError, Headers,
    HttpRequest, HttpResponse, HttpServer, Json, Method, RequestContext, ResponseBody,
    ResponseWriter, Router, ServerConfig, StatusCode,
};

// GET /greet/{name} - path placeholder plus an optional query parameter

struct GreetParams {
    name: String,
    greeting: String,
}

impl BodylessParams for GreetParams {
    fn from_parts(
        path_params: &HashMap<String, String>,
        query_params: &[(String, String)],
        _headers: &Headers,
    ) -> Option<Self> {
        let name = path_params.get("name")?.clone();
        let greeting = query_params
            .iter()
            .find(|(k, _)| k == "greeting")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| "Hello".to_string());
        Some(Self { name, greeting })
    }
}

struct Greet;

impl BodylessHandler for Greet {
    type Params = GreetParams;

    fn serve(
        &self,
        _request: &HttpRequest,
        _context: &RequestContext<'_>,
        params: GreetParams,
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        response.send(
            HttpResponse::new(StatusCode::Ok)
                .with_content_type("text/plain")
                .with_body_string(format!("{}, {}!", params.greeting, params.name)),
        );
        Ok(())
    }
}

// POST /notes - consumes the request body and answers with JSON

struct NoteParams {
    text: String,
}

impl BodyParams for NoteParams {
    fn from_parts(
        _path_params: &HashMap<String, String>,
        _query_params: &[(String, String)],
        _headers: &Headers,
        body: &[u8],
    ) -> Option<Self> {
        let text = String::from_utf8(body.to_vec()).ok()?;
        if text.is_empty() {
            return None;
        }
        Some(Self { text })
    }
}

#[derive(serde::Serialize)]
struct NoteCreated {
    stored: String,
    length: usize,
}

struct CreateNote;

impl BodyHandler for CreateNote {
    type Params = NoteParams;

    fn serve(
        &self,
        _request: &HttpRequest,
        _context: &RequestContext<'_>,
        params: NoteParams,
    ) -> Result<(HttpResponse, Box<dyn ResponseBody>), HandlerError> {
        let length = params.text.len();
        Ok((
            HttpResponse::new(StatusCode::Created).with_content_type("application/json"),
            Box::new(Json(NoteCreated {
                stored: params.text,
                length,
            })),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Register all routes up front; the registry is read-only once the
    // server starts.
    let mut router = Router::new();
    router.add_bodyless(Method::GET, "/greet/{name}", Greet)?;
    router.add_with_body(Method::POST, "/notes", CreateNote)?;

    let config = ServerConfig {
        addr: "127.0.0.1:8080".parse()?,
        ..ServerConfig::default()
    };

    // Try:
    //   curl 'http://127.0.0.1:8080/greet/world?greeting=Hi'
    //   curl -d 'remember this' http://127.0.0.1:8080/notes
    let server = HttpServer::new(config, Coordinator::new(router));
    server.start().await?;

    Ok(())
}
