//! The immutable query description.
//!
//! A [`Query`] names a database, a layout and an action, plus whatever
//! field conditions, sorting, scripts and paging the action needs. It is
//! never mutated after construction: every setter returns a new value with
//! one field replaced, so a base query can be kept and refined freely.
//! Rendering into the server's query-string grammar lives in
//! [`protocol::encode`](crate::protocol::encode).

use std::fmt;

/// Record id value meaning "no record id set".
pub const NO_RECORD_ID: i64 = -1;
/// Max-records value meaning "return the whole found set".
pub const ALL_RECORDS: i64 = -1;

/// A database action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Search with the query's field conditions.
    Find,
    /// Find every record in the layout.
    FindAll,
    /// Find one random record.
    FindAny,
    /// Create a new record from the query's field values.
    New,
    /// Update the record named by the record id with the field values.
    Edit,
    /// Delete the record named by the record id.
    Delete,
    /// Duplicate the record named by the record id.
    Duplicate,
}

impl fmt::Display for Action {
    /// The action token that terminates the query string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Action::Find => "-findquery",
            Action::FindAll => "-findall",
            Action::FindAny => "-findany",
            Action::New => "-new",
            Action::Edit => "-edit",
            Action::Delete => "-delete",
            Action::Duplicate => "-dup",
        };
        write!(f, "{token}")
    }
}

/// A record sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
    Custom,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            SortOrder::Ascending => "ascend",
            SortOrder::Descending => "descend",
            SortOrder::Custom => "custom",
        };
        write!(f, "{token}")
    }
}

/// A sort field indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn new(name: impl Into<String>, order: SortOrder) -> Self {
        SortField {
            name: name.into(),
            order,
        }
    }

    /// A sort field with the default ascending order.
    pub fn ascending(name: impl Into<String>) -> Self {
        SortField::new(name, SortOrder::Ascending)
    }
}

/// An individual field search operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Equal,
    Contains,
    BeginsWith,
    EndsWith,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

/// One field condition within a find request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryField {
    pub name: String,
    pub value: String,
    pub op: FieldOp,
}

impl QueryField {
    pub fn new(name: impl Into<String>, value: impl ToString, op: FieldOp) -> Self {
        QueryField {
            name: name.into(),
            value: value.to_string(),
            op,
        }
    }

    /// The value with its operator prefix/suffix applied, as the server
    /// expects it in a `-qN.value` directive.
    pub(crate) fn op_value(&self) -> String {
        match self.op {
            FieldOp::Equal => format!("=={}", self.value),
            FieldOp::Contains => format!("==*{}*", self.value),
            FieldOp::BeginsWith => format!("=={}*", self.value),
            FieldOp::EndsWith => format!("==*{}", self.value),
            FieldOp::GreaterThan => format!(">{}", self.value),
            FieldOp::GreaterThanEqual => format!(">={}", self.value),
            FieldOp::LessThan => format!("<{}", self.value),
            FieldOp::LessThanEqual => format!("<={}", self.value),
        }
    }
}

/// A logical operator combining the fields of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// A group of field conditions under one logical operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    pub op: LogicalOp,
    pub fields: Vec<QueryField>,
}

impl FieldGroup {
    pub fn new(op: LogicalOp, fields: Vec<QueryField>) -> Self {
        FieldGroup { op, fields }
    }
}

/// An individual query and database action.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub(crate) database: String,
    pub(crate) layout: String,
    pub(crate) action: Action,
    pub(crate) field_groups: Vec<FieldGroup>,
    pub(crate) sort_fields: Vec<SortField>,
    pub(crate) record_id: i64,
    pub(crate) pre_sort_scripts: Vec<String>,
    pub(crate) pre_find_scripts: Vec<String>,
    pub(crate) post_find_scripts: Vec<String>,
    pub(crate) response_layout: String,
    pub(crate) response_fields: Vec<String>,
    pub(crate) max_records: i64,
    pub(crate) skip_records: u64,
}

impl Query {
    /// A query against a database and layout, with no conditions, no
    /// sorting, no scripts, and the whole found set requested.
    pub fn new(database: impl Into<String>, layout: impl Into<String>, action: Action) -> Self {
        Query {
            database: database.into(),
            layout: layout.into(),
            action,
            field_groups: Vec::new(),
            sort_fields: Vec::new(),
            record_id: NO_RECORD_ID,
            pre_sort_scripts: Vec::new(),
            pre_find_scripts: Vec::new(),
            post_find_scripts: Vec::new(),
            response_layout: String::new(),
            response_fields: Vec::new(),
            max_records: ALL_RECORDS,
            skip_records: 0,
        }
    }

    /// Sets the record id and returns the adjusted query.
    pub fn record_id(&self, record_id: i64) -> Query {
        Query {
            record_id,
            ..self.clone()
        }
    }

    /// Appends the field groups and returns the adjusted query.
    pub fn field_groups(&self, groups: Vec<FieldGroup>) -> Query {
        let mut query = self.clone();
        query.field_groups.extend(groups);
        query
    }

    /// Appends the fields as a single AND group and returns the adjusted
    /// query.
    pub fn fields(&self, fields: Vec<QueryField>) -> Query {
        let mut query = self.clone();
        query.field_groups.push(FieldGroup::new(LogicalOp::And, fields));
        query
    }

    /// Appends the sort fields and returns the adjusted query.
    pub fn sort_fields(&self, sort_fields: Vec<SortField>) -> Query {
        let mut query = self.clone();
        query.sort_fields.extend(sort_fields);
        query
    }

    /// Appends the pre-sort scripts and returns the adjusted query.
    pub fn pre_sort_scripts(&self, scripts: Vec<String>) -> Query {
        let mut query = self.clone();
        query.pre_sort_scripts.extend(scripts);
        query
    }

    /// Appends the pre-find scripts and returns the adjusted query.
    pub fn pre_find_scripts(&self, scripts: Vec<String>) -> Query {
        let mut query = self.clone();
        query.pre_find_scripts.extend(scripts);
        query
    }

    /// Appends the post-find scripts and returns the adjusted query.
    pub fn post_find_scripts(&self, scripts: Vec<String>) -> Query {
        let mut query = self.clone();
        query.post_find_scripts.extend(scripts);
        query
    }

    /// Sets the response layout and returns the adjusted query.
    pub fn response_layout(&self, layout: impl Into<String>) -> Query {
        Query {
            response_layout: layout.into(),
            ..self.clone()
        }
    }

    /// Appends response fields and returns the adjusted query.
    ///
    /// Carried for completeness; the current query-string grammar does not
    /// emit a directive for these.
    pub fn response_fields(&self, fields: Vec<String>) -> Query {
        let mut query = self.clone();
        query.response_fields.extend(fields);
        query
    }

    /// The response fields accumulated so far.
    pub fn response_field_names(&self) -> &[String] {
        &self.response_fields
    }

    /// Sets the maximum records to fetch and returns the adjusted query.
    /// Any negative value means [`ALL_RECORDS`].
    pub fn max_records(&self, max: i64) -> Query {
        Query {
            max_records: max,
            ..self.clone()
        }
    }

    /// Sets the number of records to skip in the found set and returns the
    /// adjusted query.
    pub fn skip_records(&self, skip: u64) -> Query {
        Query {
            skip_records: skip,
            ..self.clone()
        }
    }
}
