//! Transport-neutral request handling for the HTTP surface.
//!
//! A server (or the CLI's `api` command) authenticates the caller, builds an
//! [`ApiRequest`] and gets back a status code plus a JSON or file body.

use concord_db::UserUpdate;
use concord_ids::UserId;
use concord_lifecycle::LockAction;
use concord_protocol::defaults::DEFAULT_USER_LIST_LIMIT;
use concord_protocol::routes::query_params;
use concord_protocol::{
    ContractResponse, ContractVersionResponse, CountResponse, ErrorResponse, LockRequest,
    MessageResponse, Method, NotificationResponse, Route, RouteError, UserResponse,
    UserUpdateRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, error};

use crate::credentials::hash_password;
use crate::engine::{ContractEngine, Revision, Submission};
use crate::views::{notification_response, user_response};
use crate::error::EngineError;

/// An uploaded multipart file part.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path plus optional query string.
    pub target: String,
    pub json: Option<serde_json::Value>,
    /// Multipart text fields.
    pub form: BTreeMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl ApiRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            json: None,
            form: BTreeMap::new(),
            file: None,
        }
    }

    pub fn with_json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.file = Some(UploadedFile {
            file_name: file_name.into(),
            bytes,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(serde_json::Value),
    File { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, EngineError> {
        Ok(Self {
            status,
            body: ApiBody::Json(serde_json::to_value(value)?),
        })
    }

    fn error(status: u16, error: ErrorResponse) -> Self {
        // ErrorResponse holds only strings and JSON values
        let body = serde_json::to_value(&error).unwrap_or(serde_json::Value::Null);
        Self {
            status,
            body: ApiBody::Json(body),
        }
    }

    /// JSON body, if this is not a file download.
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        match &self.body {
            ApiBody::Json(value) => Some(value),
            ApiBody::File { .. } => None,
        }
    }
}

impl From<RouteError> for ApiResponse {
    fn from(err: RouteError) -> Self {
        ApiResponse::error(err.status_code(), ErrorResponse::new(err.to_string(), err.code()))
    }
}

impl From<EngineError> for ApiResponse {
    fn from(err: EngineError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            error!(error = %err, "Request failed");
            return ApiResponse::error(
                status,
                ErrorResponse::new("Internal server error", err.code()),
            );
        }
        ApiResponse::error(status, ErrorResponse::new(err.to_string(), err.code()))
    }
}

fn parse_body<T: DeserializeOwned>(json: Option<serde_json::Value>) -> Result<T, EngineError> {
    let json = json.ok_or_else(|| EngineError::invalid_input("Request body is required"))?;
    serde_json::from_value(json)
        .map_err(|e| EngineError::invalid_input(format!("Invalid request body: {}", e)))
}

fn parse_query<T: FromStr>(
    params: &BTreeMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, EngineError> {
    match params.get(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| EngineError::invalid_input(format!("Invalid '{}': {}", name, raw))),
        None => Ok(default),
    }
}

fn require_file(file: Option<UploadedFile>) -> Result<UploadedFile, EngineError> {
    file.ok_or_else(|| EngineError::invalid_input("A file is required"))
}

fn to_json<T, R>(items: &[T]) -> Vec<R>
where
    for<'a> R: From<&'a T>,
{
    items.iter().map(R::from).collect()
}

impl ContractEngine {
    /// Handle one authenticated request.
    pub async fn handle(&self, actor: UserId, request: ApiRequest) -> ApiResponse {
        let route = match Route::parse(request.method, &request.target) {
            Ok(route) => route,
            Err(err) => return err.into(),
        };
        debug!(actor = %actor, route = %route, "Handling request");

        match self.dispatch(actor, route, request).await {
            Ok(response) => response,
            Err(err) => err.into(),
        }
    }

    async fn dispatch(
        &self,
        actor: UserId,
        route: Route,
        request: ApiRequest,
    ) -> Result<ApiResponse, EngineError> {
        let ok = route.success_status();
        if route.is_multipart() && request.json.is_some() {
            return Err(EngineError::invalid_input(
                "Expected multipart form data, not a JSON body",
            ));
        }
        let params = query_params(&request.target);
        let mut form = request.form;

        match route {
            Route::UploadContract => {
                let file = require_file(request.file)?;
                let submission = Submission {
                    title: form.remove("title").unwrap_or_default(),
                    file_name: file.file_name,
                    bytes: file.bytes,
                    recipient_username: form.remove("recipient_username"),
                    recipient_email: form.remove("recipient_email"),
                    notes: form.remove("notes"),
                };
                let details = self.submit(actor, submission).await?;
                ApiResponse::json(ok, &ContractResponse::from(&details))
            }
            Route::ListContracts => {
                let contracts: Vec<ContractResponse> = to_json(&self.list_mine(actor).await?);
                ApiResponse::json(ok, &contracts)
            }
            Route::GetContract(id) => {
                let details = self.get(actor, id).await?;
                ApiResponse::json(ok, &ContractResponse::from(&details))
            }
            Route::DeleteContract(id) => {
                self.delete_contract(actor, id).await?;
                ApiResponse::json(ok, &MessageResponse::deleted())
            }
            Route::DownloadContract(id) => {
                let download = self.download(actor, id).await?;
                Ok(ApiResponse {
                    status: ok,
                    body: ApiBody::File {
                        file_name: download.file_name,
                        bytes: download.bytes,
                    },
                })
            }
            Route::ListVersions(id) => {
                let versions: Vec<ContractVersionResponse> =
                    to_json(&self.list_versions(actor, id).await?);
                ApiResponse::json(ok, &versions)
            }
            Route::DownloadVersion(id, version_id) => {
                let download = self.download_version(actor, id, version_id).await?;
                Ok(ApiResponse {
                    status: ok,
                    body: ApiBody::File {
                        file_name: download.file_name,
                        bytes: download.bytes,
                    },
                })
            }
            Route::LockContract(id) => {
                let body: LockRequest = parse_body(request.json)?;
                let action = LockAction::from_str(&body.action)
                    .map_err(|e| EngineError::invalid_input(e.to_string()))?;
                self.set_lock(actor, id, action).await?;
                ApiResponse::json(ok, &MessageResponse::lock(action))
            }
            Route::EditContract(id) => {
                let file = require_file(request.file)?;
                let revision = Revision {
                    file_name: file.file_name,
                    bytes: file.bytes,
                    change_notes: form.remove("change_notes"),
                };
                let details = self.edit(actor, id, revision).await?;
                ApiResponse::json(ok, &ContractResponse::from(&details))
            }
            Route::ApproveContract(id) => {
                self.approve(actor, id).await?;
                ApiResponse::json(ok, &MessageResponse::approved())
            }
            Route::DenyContract(id) => {
                self.deny(actor, id).await?;
                ApiResponse::json(ok, &MessageResponse::denied())
            }
            Route::SignContract(id) => {
                self.sign(actor, id).await?;
                ApiResponse::json(ok, &MessageResponse::signed())
            }
            Route::ListNotifications => {
                let limit = parse_query(&params, "limit", self.config().notification_limit)?;
                let notifications: Vec<NotificationResponse> = self
                    .notifications(actor, Some(limit))
                    .await?
                    .iter()
                    .map(notification_response)
                    .collect();
                ApiResponse::json(ok, &notifications)
            }
            Route::NotificationCount => {
                let count = self.unread_count(actor).await?;
                ApiResponse::json(ok, &CountResponse { count })
            }
            Route::ReadNotification(id) => {
                self.mark_read(actor, id).await?;
                ApiResponse::json(ok, &MessageResponse::notification_read())
            }
            Route::ReadAllNotifications => {
                self.mark_all_read(actor).await?;
                ApiResponse::json(ok, &MessageResponse::all_notifications_read())
            }
            Route::ListUsers => {
                let skip = parse_query(&params, "skip", 0)?;
                let limit = parse_query(&params, "limit", DEFAULT_USER_LIST_LIMIT)?;
                let users: Vec<UserResponse> =
                    self.list_users(skip, limit).await?.iter().map(user_response).collect();
                ApiResponse::json(ok, &users)
            }
            Route::SearchUsers => {
                let query = params
                    .get("q")
                    .ok_or_else(|| EngineError::invalid_input("Query parameter 'q' is required"))?;
                let users: Vec<UserResponse> =
                    self.search_users(query).await?.iter().map(user_response).collect();
                ApiResponse::json(ok, &users)
            }
            Route::GetProfile => {
                let user = self.user(actor).await?;
                ApiResponse::json(ok, &user_response(&user))
            }
            Route::UpdateProfile => {
                let body: UserUpdateRequest = parse_body(request.json)?;
                let user = self
                    .update_profile(
                        actor,
                        UserUpdate {
                            full_name: body.full_name,
                            email: body.email,
                            credential: body
                                .password
                                .as_deref()
                                .filter(|p| !p.is_empty())
                                .map(hash_password),
                        },
                    )
                    .await?;
                ApiResponse::json(ok, &user_response(&user))
            }
        }
    }
}
