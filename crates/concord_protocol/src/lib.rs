//! Wire-level surface of Concord.
//!
//! JSON request/response bodies for the HTTP API, the route table that maps
//! `(method, path)` onto lifecycle operations, and the defaults and
//! filesystem locations shared by the engine and the CLI.

pub mod defaults;
pub mod http_types;
pub mod paths;
pub mod routes;

pub use http_types::{
    ContractResponse, ContractVersionResponse, CountResponse, ErrorResponse, LockRequest,
    MessageResponse, NotificationResponse, UserResponse, UserUpdateRequest,
};
pub use routes::{Method, Route, RouteError};
