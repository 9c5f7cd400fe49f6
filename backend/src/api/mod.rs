//! # REST API Module
//!
//! This module defines all HTTP endpoints of the lottery API.
//!
//! ## Endpoint Overview
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/` | API information |
//! | GET | `/health` | Health check |
//! | POST | `/pools/sync` | Fetch and store new pools |
//! | POST | `/pool/filter` | Search pools |
//! | POST | `/lottery` | Create a lottery |
//! | GET | `/lottery/{id}` | Get a lottery |
//! | GET | `/lotteries` | Recent lotteries |
//! | GET | `/delegator/{address}` | Delegator snapshot |
//!
//! ## Request/Response Format
//!
//! All requests and responses use JSON with camelCase fields:
//!
//! ```json
//! // Success response
//! {
//!     "success": true,
//!     "data": { ... }
//! }
//!
//! // Error response
//! {
//!     "success": false,
//!     "error": {
//!         "code": "ERROR_CODE",
//!         "message": "Human readable message"
//!     }
//! }
//! ```

pub mod handlers;
pub mod routes;

pub use routes::configure_routes;
