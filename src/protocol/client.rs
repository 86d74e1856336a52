use log::debug;
use thiserror::Error;

use super::request;
use super::response::{self, DecodeError, RecordItem, ResultSet};
use super::transport::{HttpTransport, TcpTransport, TransportError};
use crate::layout::LayoutInfo;
use crate::query::Query;
use crate::xml::{Document, XmlError};

/// The grammar segment of the gateway endpoint path.
const GRAMMAR: &str = "fmresultset";

/// Well-known field names carrying the server's own listings.
const DATABASE_NAME: &str = "DATABASE_NAME";
const LAYOUT_NAME: &str = "LAYOUT_NAME";

/// Everything a protocol operation can fail with. Callers branch on this;
/// nothing else crosses the client boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
}

impl From<XmlError> for ClientError {
    fn from(err: XmlError) -> Self {
        ClientError::MalformedResponse(err.to_string())
    }
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Server(code) => ClientError::Server {
                code,
                message: "error from FileMaker server".to_string(),
            },
            DecodeError::MissingNode(_) => ClientError::MalformedResponse(err.to_string()),
        }
    }
}

/// A connection to one FileMaker Server host.
///
/// Each operation encodes a query string, sends it through the transport,
/// and decodes the XML that comes back. Operations are independent
/// request/response pairs; the value holds no session state.
pub struct Server<T> {
    transport: T,
    url: String,
}

impl Server<TcpTransport> {
    /// A server reachable over plain TCP. Empty credentials mean guest
    /// access.
    pub fn connect(host: &str, port: u16, username: &str, password: &str) -> Self {
        let url = format!("http://{host}:{port}/fmi/xml/{GRAMMAR}.xml");
        Server {
            transport: TcpTransport::new(host, port, username, password),
            url,
        }
    }
}

impl<T: HttpTransport> Server<T> {
    /// A server behind a caller-supplied transport.
    pub fn with_transport(transport: T, url: impl Into<String>) -> Self {
        Server {
            transport,
            url: url.into(),
        }
    }

    /// The list of databases hosted by the server.
    pub fn database_names(&self) -> Result<Vec<String>, ClientError> {
        self.perform("-dbnames").map(|set| names(&set, DATABASE_NAME))
    }

    /// The list of layouts in a database.
    pub fn layout_names(&self, database: &str) -> Result<Vec<String>, ClientError> {
        let body = format!("-db={}&-layoutnames", request::url_encode(database));
        self.perform(&body).map(|set| names(&set, LAYOUT_NAME))
    }

    /// A layout's metadata: every field and related-set it exposes.
    pub fn layout_info(&self, database: &str, layout: &str) -> Result<LayoutInfo, ClientError> {
        let body = format!(
            "-db={}&-lay={}&-view",
            request::url_encode(database),
            request::url_encode(layout),
        );
        self.perform(&body).map(|set| set.layout_info)
    }

    /// Performs a query and returns the resulting data.
    pub fn query(&self, query: &Query) -> Result<ResultSet, ClientError> {
        self.perform(&request::encode(query))
    }

    fn perform(&self, body: &str) -> Result<ResultSet, ClientError> {
        debug!("sending query: {body}");
        let response = self.transport.send(&self.url, body)?;
        if !(200..300).contains(&response.status) {
            return Err(TransportError::Status(response.status).into());
        }
        let text = String::from_utf8_lossy(&response.body);
        let doc = Document::parse(&text)?;
        let set = response::decode(&doc)?;
        debug!("decoded {} of {} found records", set.records.len(), set.found_count);
        Ok(set)
    }
}

/// Pulls the named field out of every record, skipping records that do not
/// carry it.
fn names(set: &ResultSet, key: &str) -> Vec<String> {
    set.records
        .iter()
        .filter_map(|record| match record.elements.get(key) {
            Some(RecordItem::Field(_, value)) => Some(value.to_string()),
            _ => None,
        })
        .collect()
}
