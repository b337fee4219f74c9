//! strait-http — the HTTP/2.5-labeled request/response layer that rides on
//! the strait transport. Text grammar, a regex router, and the server and
//! client that speak it over associations.

pub mod client;
pub mod parse;
pub mod router;
pub mod server;
pub mod types;

pub use client::{Client, ClientError, RetryPolicy};
pub use parse::{
    parse_request, parse_response, serialize_request, serialize_response, ParseError,
};
pub use router::{RouteError, RouteParams, Router};
pub use server::Server;
pub use types::{Request, Response, StatusCode, HTTP_VERSION};
