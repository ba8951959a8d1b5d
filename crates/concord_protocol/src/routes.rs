//! Route table for the contract service.
//!
//! Maps an HTTP method and request target onto the operation it invokes.
//! The transport itself lives outside this crate.

use concord_ids::{ContractId, NotificationId, VersionId};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Method {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(RouteError::UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Unknown HTTP method '{0}'")]
    UnknownMethod(String),
    #[error("Not Found")]
    NotFound(String),
    #[error("Method Not Allowed")]
    MethodNotAllowed { method: Method, path: String },
    #[error("Invalid path parameter: {0}")]
    InvalidParameter(String),
}

impl RouteError {
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::UnknownMethod(_) | RouteError::MethodNotAllowed { .. } => 405,
            RouteError::NotFound(_) => 404,
            RouteError::InvalidParameter(_) => 422,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RouteError::UnknownMethod(_) | RouteError::MethodNotAllowed { .. } => {
                "METHOD_NOT_ALLOWED"
            }
            RouteError::NotFound(_) => "NOT_FOUND",
            RouteError::InvalidParameter(_) => "INVALID_PARAMETER",
        }
    }
}

/// Every endpoint of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    // Contracts
    UploadContract,
    ListContracts,
    GetContract(ContractId),
    DeleteContract(ContractId),
    DownloadContract(ContractId),
    ListVersions(ContractId),
    DownloadVersion(ContractId, VersionId),
    LockContract(ContractId),
    EditContract(ContractId),
    ApproveContract(ContractId),
    DenyContract(ContractId),
    SignContract(ContractId),
    // Notifications
    ListNotifications,
    NotificationCount,
    ReadNotification(NotificationId),
    ReadAllNotifications,
    // Users
    ListUsers,
    SearchUsers,
    GetProfile,
    UpdateProfile,
}

impl Route {
    /// Resolve a request. `target` may carry a query string, which is ignored
    /// here (see [`query_params`]).
    pub fn parse(method: Method, target: &str) -> Result<Route, RouteError> {
        let path = target.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let check = |expected: Method, route: Route| (method == expected).then_some(route);

        let found = match segments.as_slice() {
            ["contracts"] => check(Method::Get, Route::ListContracts),
            ["contracts", "upload"] => check(Method::Post, Route::UploadContract),
            ["contracts", id] => {
                let id = parse_contract_id(id)?;
                match method {
                    Method::Get => Some(Route::GetContract(id)),
                    Method::Delete => Some(Route::DeleteContract(id)),
                    _ => check(Method::Get, Route::GetContract(id)),
                }
            }
            ["contracts", id, action] => {
                let id = parse_contract_id(id)?;
                match *action {
                    "download" => check(Method::Get, Route::DownloadContract(id)),
                    "versions" => check(Method::Get, Route::ListVersions(id)),
                    "lock" => check(Method::Post, Route::LockContract(id)),
                    "edit" => check(Method::Post, Route::EditContract(id)),
                    "approve" => check(Method::Post, Route::ApproveContract(id)),
                    "deny" => check(Method::Post, Route::DenyContract(id)),
                    "sign" => check(Method::Post, Route::SignContract(id)),
                    _ => return Err(RouteError::NotFound(path.to_string())),
                }
            }
            ["contracts", id, "versions", vid, "download"] => {
                let id = parse_contract_id(id)?;
                let vid = VersionId::parse(vid)
                    .map_err(|e| RouteError::InvalidParameter(e.to_string()))?;
                check(Method::Get, Route::DownloadVersion(id, vid))
            }
            ["notifications"] => check(Method::Get, Route::ListNotifications),
            ["notifications", "count"] => check(Method::Get, Route::NotificationCount),
            ["notifications", "read-all"] => check(Method::Post, Route::ReadAllNotifications),
            ["notifications", id, "read"] => {
                let id = NotificationId::parse(id)
                    .map_err(|e| RouteError::InvalidParameter(e.to_string()))?;
                check(Method::Post, Route::ReadNotification(id))
            }
            ["users"] => check(Method::Get, Route::ListUsers),
            ["users", "search"] => check(Method::Get, Route::SearchUsers),
            ["users", "profile"] => match method {
                Method::Get => Some(Route::GetProfile),
                _ => check(Method::Put, Route::UpdateProfile),
            },
            _ => return Err(RouteError::NotFound(path.to_string())),
        };

        found.ok_or_else(|| RouteError::MethodNotAllowed {
            method,
            path: path.to_string(),
        })
    }

    pub fn method(&self) -> Method {
        match self {
            Route::ListContracts
            | Route::GetContract(_)
            | Route::DownloadContract(_)
            | Route::ListVersions(_)
            | Route::DownloadVersion(_, _)
            | Route::ListNotifications
            | Route::NotificationCount
            | Route::ListUsers
            | Route::SearchUsers
            | Route::GetProfile => Method::Get,
            Route::UpdateProfile => Method::Put,
            Route::DeleteContract(_) => Method::Delete,
            _ => Method::Post,
        }
    }

    /// Canonical request path.
    pub fn path(&self) -> String {
        match self {
            Route::UploadContract => "/contracts/upload".to_string(),
            Route::ListContracts => "/contracts/".to_string(),
            Route::GetContract(id) | Route::DeleteContract(id) => format!("/contracts/{}", id),
            Route::DownloadContract(id) => format!("/contracts/{}/download", id),
            Route::ListVersions(id) => format!("/contracts/{}/versions", id),
            Route::DownloadVersion(id, vid) => {
                format!("/contracts/{}/versions/{}/download", id, vid)
            }
            Route::LockContract(id) => format!("/contracts/{}/lock", id),
            Route::EditContract(id) => format!("/contracts/{}/edit", id),
            Route::ApproveContract(id) => format!("/contracts/{}/approve", id),
            Route::DenyContract(id) => format!("/contracts/{}/deny", id),
            Route::SignContract(id) => format!("/contracts/{}/sign", id),
            Route::ListNotifications => "/notifications/".to_string(),
            Route::NotificationCount => "/notifications/count".to_string(),
            Route::ReadNotification(id) => format!("/notifications/{}/read", id),
            Route::ReadAllNotifications => "/notifications/read-all".to_string(),
            Route::ListUsers => "/users/".to_string(),
            Route::SearchUsers => "/users/search".to_string(),
            Route::GetProfile | Route::UpdateProfile => "/users/profile".to_string(),
        }
    }

    /// Status returned on success.
    pub fn success_status(&self) -> u16 {
        match self {
            Route::UploadContract => 201,
            _ => 200,
        }
    }

    /// Routes whose request body is multipart form data.
    pub fn is_multipart(&self) -> bool {
        matches!(self, Route::UploadContract | Route::EditContract(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

fn parse_contract_id(raw: &str) -> Result<ContractId, RouteError> {
    ContractId::parse(raw).map_err(|e| RouteError::InvalidParameter(e.to_string()))
}

/// Decode the `application/x-www-form-urlencoded` query string of a
/// request target. Later duplicates win.
pub fn query_params(target: &str) -> BTreeMap<String, String> {
    let Some((_, query)) = target.split_once('?') else {
        return BTreeMap::new();
    };
    form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}
