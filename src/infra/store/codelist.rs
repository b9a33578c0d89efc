//! SDMX-style `datastructure.json` code lists.
//!
//! Only the parts used to enumerate reference entities are modelled:
//! ```json
//! {"Structure": {"CodeLists": {"CodeList": [
//!   {"@id": "CL_AREA_IFS", "Code": [{"@value": "FR", "Description": {"#text": "France"}}]}
//! ]}}}
//! ```
//! Single-element lists may appear as a bare object.

use serde::Deserialize;

use crate::coverage::types::Entity;

#[derive(Debug, Deserialize)]
pub(crate) struct DataStructure {
    #[serde(rename = "Structure")]
    structure: Structure,
}

#[derive(Debug, Deserialize)]
struct Structure {
    #[serde(rename = "CodeLists")]
    code_lists: CodeLists,
}

#[derive(Debug, Deserialize)]
struct CodeLists {
    #[serde(rename = "CodeList")]
    code_list: OneOrMany<CodeList>,
}

#[derive(Debug, Deserialize)]
struct CodeList {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "Code", default)]
    codes: Option<OneOrMany<Code>>,
}

#[derive(Debug, Deserialize)]
struct Code {
    #[serde(rename = "@value")]
    value: String,
    #[serde(rename = "Description", default)]
    description: Option<OneOrMany<TextNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => std::slice::from_ref(t),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextNode {
    Tagged {
        #[serde(rename = "#text")]
        text: String,
    },
    Plain(String),
}

impl TextNode {
    fn text(&self) -> &str {
        match self {
            TextNode::Tagged { text } => text,
            TextNode::Plain(text) => text,
        }
    }
}

impl DataStructure {
    /// Entities of the first code list accepted by `is_entity_list`, or `None`.
    pub(crate) fn entities(&self, is_entity_list: impl Fn(&str) -> bool) -> Option<(String, Vec<Entity>)> {
        let list = self
            .structure
            .code_lists
            .code_list
            .as_slice()
            .iter()
            .find(|l| is_entity_list(&l.id))?;

        let entities = list
            .codes
            .as_ref()
            .map(|codes| {
                codes
                    .as_slice()
                    .iter()
                    .map(|c| {
                        let description = c
                            .description
                            .as_ref()
                            .and_then(|d| d.as_slice().first())
                            .map(|d| d.text().trim().to_string())
                            .unwrap_or_default();
                        Entity::new(c.value.trim(), description)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some((list.id.clone(), entities))
    }
}
