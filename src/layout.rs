//! Layout metadata: the fields and related sets a layout exposes, and the
//! flattened name-to-type lookup the decoder types record data with.

use std::collections::HashMap;

use crate::protocol::RELATEDSET_DEFINITION;
use crate::value::FieldType;
use crate::xml::Element;

/// A field definition: name plus declared result type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDefinition {
    fn from_node(node: &Element) -> Self {
        FieldDefinition {
            name: node.attribute("name").unwrap_or_default().to_string(),
            ty: FieldType::from(node.attribute("result").unwrap_or("text")),
        }
    }
}

/// Either an individual field or a related-set (portal) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutItem {
    Field(FieldDefinition),
    RelatedSet {
        table: String,
        fields: Vec<FieldDefinition>,
    },
}

/// Meta information about a layout: every exposed field or related set, in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutInfo {
    pub items: Vec<LayoutItem>,
}

impl LayoutInfo {
    /// Classifies each child of the metadata node: related-set definitions
    /// by tag name, anything else as a plain field definition.
    pub(crate) fn from_node(node: &Element) -> Self {
        let items = node
            .child_elements()
            .map(|child| {
                if child.name == RELATEDSET_DEFINITION {
                    LayoutItem::RelatedSet {
                        table: child.attribute("table").unwrap_or_default().to_string(),
                        fields: child.child_elements().map(FieldDefinition::from_node).collect(),
                    }
                } else {
                    LayoutItem::Field(FieldDefinition::from_node(child))
                }
            })
            .collect();
        LayoutInfo { items }
    }

    /// Flattened name-to-type map over every item.
    ///
    /// Related-set children keep their name exactly as declared; the server
    /// writes portal fields as `table::field`, which is the key the decoder
    /// uses when resolving a field inside a related record.
    pub fn field_types(&self) -> HashMap<String, FieldType> {
        let mut types = HashMap::new();
        for item in &self.items {
            match item {
                LayoutItem::Field(def) => {
                    types.insert(def.name.clone(), def.ty);
                }
                LayoutItem::RelatedSet { fields, .. } => {
                    for def in fields {
                        types.insert(def.name.clone(), def.ty);
                    }
                }
            }
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Document;

    fn metadata(source: &str) -> LayoutInfo {
        let doc = Document::parse(source).unwrap();
        LayoutInfo::from_node(doc.root())
    }

    #[test]
    fn classifies_fields_and_related_sets() {
        let info = metadata(
            r#"<metadata>
                <field-definition name="Title" result="text"/>
                <field-definition name="Hours" result="number"/>
                <relatedset-definition table="Assignees">
                    <field-definition name="Assignees::Name" result="text"/>
                </relatedset-definition>
            </metadata>"#,
        );

        assert_eq!(info.items.len(), 3);
        assert_eq!(
            info.items[1],
            LayoutItem::Field(FieldDefinition {
                name: "Hours".to_string(),
                ty: FieldType::Number,
            })
        );
        match &info.items[2] {
            LayoutItem::RelatedSet { table, fields } => {
                assert_eq!(table, "Assignees");
                assert_eq!(fields[0].name, "Assignees::Name");
            }
            other => panic!("expected related set, got {other:?}"),
        }
    }

    #[test]
    fn flattens_related_set_children_without_extra_prefix() {
        let info = metadata(
            r#"<metadata>
                <field-definition name="Title" result="text"/>
                <relatedset-definition table="Assignees">
                    <field-definition name="Assignees::Name" result="number"/>
                </relatedset-definition>
            </metadata>"#,
        );

        let types = info.field_types();
        assert_eq!(types.get("Title"), Some(&FieldType::Text));
        assert_eq!(types.get("Assignees::Name"), Some(&FieldType::Number));
        assert_eq!(types.get("Name"), None);
    }

    #[test]
    fn missing_result_attribute_defaults_to_text() {
        let info = metadata(r#"<metadata><field-definition name="Notes"/></metadata>"#);
        assert_eq!(info.field_types().get("Notes"), Some(&FieldType::Text));
    }

    #[test]
    fn unknown_result_type_falls_back_to_text() {
        let info = metadata(
            r#"<metadata><field-definition name="Blob" result="hologram"/></metadata>"#,
        );
        assert_eq!(info.field_types().get("Blob"), Some(&FieldType::Text));
    }
}
