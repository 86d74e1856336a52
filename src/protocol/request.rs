use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::query::{Action, FieldGroup, LogicalOp, NO_RECORD_ID, Query};

/// Characters escaped in every encoded component of a query string.
///
/// `=`, `*` and the grouping characters (`(`, `)`, `!`, `,`, `;`) pass
/// through: the gateway reads them literally inside `-query` expressions
/// and operator-prefixed values. Non-ASCII bytes are always escaped.
const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

pub(crate) fn url_encode(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_SET).to_string()
}

/// Renders a [`Query`] into the gateway's query-string grammar.
///
/// Deterministic and total: malformed names and values are simply
/// percent-encoded as-is, and the same query always produces the same
/// bytes.
pub fn encode(query: &Query) -> String {
    let mut out = format!(
        "-db={}&-lay={}&",
        url_encode(&query.database),
        url_encode(&query.layout)
    );
    out.push_str(&maybe_amp(scripts(query)));
    out.push_str(&maybe_amp(response_layout(query)));

    match query.action {
        Action::Delete | Action::Duplicate => {
            out.push_str(&maybe_amp(recid(query)));
        }
        Action::Edit => {
            out.push_str(&maybe_amp(recid(query)));
            out.push_str(&maybe_amp(simple_fields(query)));
        }
        Action::New => {
            out.push_str(&maybe_amp(simple_fields(query)));
        }
        Action::FindAny => {}
        Action::FindAll => {
            out.push_str(&maybe_amp(sort_directives(query)));
            out.push_str(&maybe_amp(max_skip(query)));
        }
        // A record id lookup takes precedence over every field condition.
        Action::Find if query.record_id != NO_RECORD_ID => {
            out.push_str(&maybe_amp(recid(query)));
            out.push_str("-find");
            return out;
        }
        Action::Find => {
            out.push_str(&maybe_amp(sort_directives(query)));
            out.push_str(&maybe_amp(max_skip(query)));
            out.push_str(&maybe_amp(compound_query(query)));
            out.push_str(&maybe_amp(compound_fields(query)));
        }
    }

    out.push_str(&query.action.to_string());
    out
}

impl fmt::Display for Query {
    /// The formulated query string. Useful for debugging.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", encode(self))
    }
}

fn maybe_amp(segment: String) -> String {
    if segment.is_empty() {
        segment
    } else {
        segment + "&"
    }
}

fn recid(query: &Query) -> String {
    if query.record_id != NO_RECORD_ID && query.action != Action::FindAny {
        format!("-recid={}", query.record_id)
    } else {
        String::new()
    }
}

fn response_layout(query: &Query) -> String {
    if query.response_layout.is_empty() {
        String::new()
    } else {
        format!("-lay.response={}", url_encode(&query.response_layout))
    }
}

fn scripts(query: &Query) -> String {
    let blocks = [
        join_directive("-script.presort", &query.pre_sort_scripts),
        join_directive("-script.prefind", &query.pre_find_scripts),
        join_directive("-script", &query.post_find_scripts),
    ];
    blocks
        .into_iter()
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>()
        .join("&")
}

fn join_directive(key: &str, values: &[String]) -> String {
    values
        .iter()
        .map(|value| format!("{key}={}", url_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn sort_directives(query: &Query) -> String {
    query
        .sort_fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            format!(
                "-sortfield.{n}={name}&-sortorder.{n}={order}",
                n = i + 1,
                name = url_encode(&field.name),
                order = field.order,
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn max_skip(query: &Query) -> String {
    let max = if query.max_records < 0 {
        "all".to_string()
    } else {
        query.max_records.to_string()
    };
    format!("-skip={}&-max={max}", query.skip_records)
}

/// Field assignments for `-new` and `-edit`, flattened across all groups
/// with the group operators ignored.
fn simple_fields(query: &Query) -> String {
    query
        .field_groups
        .iter()
        .flat_map(|group| &group.fields)
        .map(|field| format!("{}={}", url_encode(&field.name), url_encode(&field.value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// The `-query` boolean expression. Fields are numbered `q1..` in traversal
/// order across all groups; the matching name/value pairs reuse the same
/// numbering in [`compound_fields`].
fn compound_query(query: &Query) -> String {
    let mut num = 0;
    let mut segments = Vec::with_capacity(query.field_groups.len());
    for group in &query.field_groups {
        segments.push(group_segment(group, &mut num));
    }
    format!("-query={}", url_encode(&segments.join(";")))
}

fn group_segment(group: &FieldGroup, num: &mut usize) -> String {
    let mut indices = Vec::with_capacity(group.fields.len());
    for _ in &group.fields {
        *num += 1;
        indices.push(*num);
    }
    match group.op {
        LogicalOp::And => format!(
            "({})",
            indices.iter().map(|i| format!("q{i}")).collect::<Vec<_>>().join(",")
        ),
        LogicalOp::Or => indices
            .iter()
            .map(|i| format!("(q{i})"))
            .collect::<Vec<_>>()
            .join(";"),
        LogicalOp::Not => format!(
            "!({})",
            indices.iter().map(|i| format!("q{i}")).collect::<Vec<_>>().join(",")
        ),
    }
}

fn compound_fields(query: &Query) -> String {
    let mut num = 0;
    let mut parts = Vec::new();
    for group in &query.field_groups {
        for field in &group.fields {
            num += 1;
            parts.push(format!(
                "-q{num}={}&-q{num}.value={}",
                url_encode(&field.name),
                url_encode(&field.op_value()),
            ));
        }
    }
    parts.join("&")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::query::{FieldOp, QueryField, SortField, SortOrder};

    fn sample(action: Action) -> Query {
        Query::new("FMServer_Sample", "Task Details", action)
    }

    #[test]
    fn find_all_matches_the_wire_grammar() {
        assert_eq!(
            encode(&sample(Action::FindAll)),
            "-db=FMServer_Sample&-lay=Task%20Details&-skip=0&-max=all&-findall"
        );
    }

    #[test]
    fn zero_max_is_not_the_all_sentinel() {
        assert_eq!(
            encode(&sample(Action::FindAll).skip_records(0).max_records(0)),
            "-db=FMServer_Sample&-lay=Task%20Details&-skip=0&-max=0&-findall"
        );
    }

    #[test]
    fn single_group_compound_find() {
        let query = sample(Action::Find).fields(vec![QueryField::new(
            "Status",
            "In Progress",
            FieldOp::BeginsWith,
        )]);
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details&-skip=0&-max=all\
             &-query=(q1)&-q1=Status&-q1.value===In%20Progress*&-findquery"
        );
    }

    #[test]
    fn group_numbering_runs_across_groups() {
        let query = sample(Action::Find).field_groups(vec![
            FieldGroup::new(
                LogicalOp::And,
                vec![
                    QueryField::new("A", 1, FieldOp::Equal),
                    QueryField::new("B", 2, FieldOp::Equal),
                ],
            ),
            FieldGroup::new(
                LogicalOp::Or,
                vec![
                    QueryField::new("C", 3, FieldOp::Equal),
                    QueryField::new("D", 4, FieldOp::Equal),
                ],
            ),
            FieldGroup::new(LogicalOp::Not, vec![QueryField::new("E", 5, FieldOp::Equal)]),
        ]);

        let encoded = encode(&query);
        assert!(encoded.contains("-query=(q1,q2);(q3);(q4);!(q5)&"));
        assert!(encoded.contains("-q3=C&-q3.value===3&"));
        assert!(encoded.ends_with("-q5=E&-q5.value===5&-findquery"));
    }

    #[test]
    fn record_id_lookup_ignores_field_conditions() {
        let query = sample(Action::Find)
            .record_id(42)
            .fields(vec![QueryField::new("Status", "Open", FieldOp::Equal)]);
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details&-recid=42&-find"
        );
    }

    #[test]
    fn find_any_never_emits_a_record_id() {
        assert_eq!(
            encode(&sample(Action::FindAny).record_id(42)),
            "-db=FMServer_Sample&-lay=Task%20Details&-findany"
        );
    }

    #[test]
    fn edit_emits_recid_then_flat_assignments() {
        let query = sample(Action::Edit)
            .record_id(5)
            .fields(vec![QueryField::new("Title", "Write docs", FieldOp::Equal)]);
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details&-recid=5&Title=Write%20docs&-edit"
        );
    }

    #[test]
    fn new_emits_flat_assignments() {
        let query = sample(Action::New).fields(vec![
            QueryField::new("Title", "Write docs", FieldOp::Equal),
            QueryField::new("Hours", 3, FieldOp::Equal),
        ]);
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details&Title=Write%20docs&Hours=3&-new"
        );
    }

    #[test]
    fn delete_without_record_id_has_no_recid_directive() {
        assert_eq!(
            encode(&sample(Action::Delete)),
            "-db=FMServer_Sample&-lay=Task%20Details&-delete"
        );
        assert_eq!(
            encode(&sample(Action::Duplicate).record_id(9)),
            "-db=FMServer_Sample&-lay=Task%20Details&-recid=9&-dup"
        );
    }

    #[test]
    fn script_blocks_keep_their_order_without_stray_ampersands() {
        let query = sample(Action::FindAll)
            .pre_sort_scripts(vec!["sortprep".to_string()])
            .pre_find_scripts(vec!["findprep".to_string()])
            .post_find_scripts(vec!["wrap up".to_string()]);
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details\
             &-script.presort=sortprep&-script.prefind=findprep&-script=wrap%20up\
             &-skip=0&-max=all&-findall"
        );
    }

    #[test]
    fn lone_presort_script_has_no_double_ampersand() {
        let query = sample(Action::FindAll).pre_sort_scripts(vec!["prep".to_string()]);
        let encoded = encode(&query);
        assert!(!encoded.contains("&&"));
        assert!(encoded.contains("&-script.presort=prep&-skip=0"));
    }

    #[test]
    fn sort_directives_are_numbered_from_one() {
        let query = sample(Action::FindAll).sort_fields(vec![
            SortField::ascending("Due Date"),
            SortField::new("Priority", SortOrder::Descending),
        ]);
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details\
             &-sortfield.1=Due%20Date&-sortorder.1=ascend\
             &-sortfield.2=Priority&-sortorder.2=descend\
             &-skip=0&-max=all&-findall"
        );
    }

    #[test]
    fn response_layout_is_emitted_when_set() {
        let query = sample(Action::FindAll).response_layout("Summary View");
        assert_eq!(
            encode(&query),
            "-db=FMServer_Sample&-lay=Task%20Details&-lay.response=Summary%20View\
             &-skip=0&-max=all&-findall"
        );
    }

    #[test]
    fn reserved_characters_in_values_are_escaped() {
        let query = Query::new("a&b", "c=d", Action::Find).fields(vec![QueryField::new(
            "Notes",
            "50% & rising",
            FieldOp::Contains,
        )]);
        let encoded = encode(&query);
        assert!(encoded.starts_with("-db=a%26b&-lay=c=d&"));
        assert!(encoded.contains("-q1.value===*50%25%20%26%20rising*&"));
    }

    #[test]
    fn encoding_is_deterministic() {
        let query = sample(Action::Find)
            .fields(vec![QueryField::new("Status", "Open", FieldOp::Equal)])
            .sort_fields(vec![SortField::ascending("Status")]);
        assert_eq!(encode(&query), encode(&query));
        assert_eq!(query.to_string(), encode(&query));
    }
}
