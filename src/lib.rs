pub mod layout;
pub mod protocol;
pub mod query;
pub mod value;
pub mod xml;

pub use layout::{FieldDefinition, LayoutInfo, LayoutItem};
pub use protocol::{
    ClientError, DatabaseInfo, DecodeError, HttpResponse, HttpTransport, Record, RecordItem,
    ResultSet, Server, TcpTransport, TransportError,
};
pub use query::{
    ALL_RECORDS, Action, FieldGroup, FieldOp, LogicalOp, NO_RECORD_ID, Query, QueryField,
    SortField, SortOrder,
};
pub use value::{FieldType, FieldValue};
