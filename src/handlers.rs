//! Request boundary
//!
//! Converts JSON request bodies into model manager calls and every outcome,
//! failures included, into a `{statusCode, body}` response. Nothing in here
//! returns an error to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use common::error::Error;
use common::models::DeleteOutcome;
use model_manager::{CreateModelRequest, ModelManager};

/// Lifecycle action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Make a model servable
    Create,
    /// Report whether a model is up
    Status,
    /// Tear a model down
    Delete,
    /// Send a prompt to a model
    Query,
}

/// One request: an action and its JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Requested action
    pub action: Action,
    /// Action-specific body
    #[serde(default)]
    pub body: Value,
}

/// Response sent back for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP-style status code
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Message or payload
    pub body: Value,
}

impl Response {
    fn ok(body: impl Into<Value>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    fn bad_request(body: impl Into<Value>) -> Self {
        Self {
            status_code: 400,
            body: body.into(),
        }
    }

    fn from_error(e: &Error) -> Self {
        let status_code = e.status_code();
        if status_code >= 500 {
            error!("Request failed: {}", e);
        } else {
            warn!("Request rejected: {}", e);
        }

        Self {
            status_code,
            body: Value::String(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NameBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    name: String,
    query: String,
    #[serde(default)]
    parameters: Option<Map<String, Value>>,
}

fn parse<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, Response> {
    serde_json::from_value(body).map_err(|e| Response::bad_request(format!("Invalid request body: {}", e)))
}

/// Handles a create request
pub async fn create(manager: &ModelManager, body: Value) -> Response {
    let request: CreateModelRequest = match parse(body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match manager.create(&request).await {
        Ok(()) => Response::ok("Model Created!"),
        Err(e) => Response::from_error(&e),
    }
}

/// Handles a status request
pub async fn status(manager: &ModelManager, body: Value) -> Response {
    let NameBody { name } = match parse::<NameBody>(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match manager.status(&name).await {
        Ok(report) => Response::ok(json!({ "is_up": report.is_up })),
        Err(e) => Response::from_error(&e),
    }
}

/// Handles a delete request
pub async fn delete(manager: &ModelManager, body: Value) -> Response {
    let NameBody { name } = match parse::<NameBody>(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match manager.delete(&name).await {
        Ok(DeleteOutcome::Deleted) => Response::ok("Model Deleted!"),
        Ok(DeleteOutcome::NothingToDelete) => Response::ok("Model Does Not Exist!"),
        Err(e) if e.is_still_creating() => {
            Response::bad_request("Please wait for model to create fully before deleting")
        }
        Err(e) => Response::from_error(&e),
    }
}

/// Handles a query request
pub async fn query(manager: &ModelManager, body: Value) -> Response {
    let QueryBody { name, query, parameters } = match parse::<QueryBody>(body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match manager.query(&name, &query, parameters).await {
        Ok(text) => Response::ok(text),
        Err(e) if e.is_not_in_service() => Response::bad_request("LLM not in service"),
        Err(e) => Response::from_error(&e),
    }
}

/// Routes a request to its handler
pub async fn dispatch(manager: &ModelManager, request: Request) -> Response {
    match request.action {
        Action::Create => create(manager, request.body).await,
        Action::Status => status(manager, request.body).await,
        Action::Delete => delete(manager, request.body).await,
        Action::Query => query(manager, request.body).await,
    }
}

/// Parses one request line and dispatches it
pub async fn handle_line(manager: &ModelManager, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(manager, request).await,
        Err(e) => Response::bad_request(format!("Invalid request: {}", e)),
    }
}
