//! Client-server communication protocol.
//!
//! This module speaks the FileMaker Server XML gateway protocol: requests
//! are plain-text query strings POSTed over HTTP, responses come back as
//! XML in the `fmresultset` grammar. It provides the types and logic
//! required to render, send and interpret both sides of that exchange.
//!
//! # Overview
//!
//! The protocol layer is responsible for turning a structured [`Query`]
//! description into the exact character sequence the gateway parses, and
//! for walking the response document back into typed records.
//!
//! Every character of the request matters: the gateway reads directives
//! positionally and by key name (`-db=...&-lay=...&-findall`), so the
//! encoder is deterministic and byte-exact. The decoder joins the
//! response's record data against the layout metadata shipped in the same
//! document, typing each field before it reaches the caller.
//!
//! # Key Components
//!
//! - [`encode`]: Renders a [`Query`] into the query-string grammar.
//! - [`decode`]: Walks a parsed response document into a [`ResultSet`].
//! - [`HttpTransport`]: Abstraction over whatever issues the HTTP POST.
//! - [`Server`]: A connection to one FileMaker Server host, composing the
//!   encoder, a transport and the decoder into the supported operations.
//!
//! [`Query`]: crate::query::Query

mod client;
mod request;
mod response;
mod transport;

pub use client::{ClientError, Server};
pub use request::encode;
pub use response::{DatabaseInfo, DecodeError, Record, RecordItem, ResultSet, decode};
pub use transport::{HttpResponse, HttpTransport, TcpTransport, TransportError};

/// XML namespace of the `fmresultset` response grammar.
pub const FMRS_NAMESPACE: &str = "http://www.filemaker.com/xml/fmresultset";

pub(crate) const RELATEDSET_DEFINITION: &str = "relatedset-definition";
