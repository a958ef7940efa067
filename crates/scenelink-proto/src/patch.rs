// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Downlink event → [`TreePatch`] decoding.

use thiserror::Error;

use crate::value::map_get;
use crate::{etype, ChildAttr, DownlinkEvent, Node, TreePatch, Value};

/// A tree-edit event whose payload does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// Required field absent.
    #[error("{etype}: missing field `{field}`")]
    MissingField {
        /// Event type being decoded.
        etype: String,
        /// Field name.
        field: &'static str,
    },
    /// Field present but unusable.
    #[error("{etype}: malformed `{field}`: {reason}")]
    Malformed {
        /// Event type being decoded.
        etype: String,
        /// Field name.
        field: &'static str,
        /// What went wrong.
        reason: String,
    },
}

impl DownlinkEvent {
    /// Interpret a tree-edit event.
    ///
    /// Returns `Ok(None)` for etypes that are not tree edits.
    ///
    /// | etype | `data` |
    /// |---|---|
    /// | `SET` | root node |
    /// | `ADD` | `{ nodes: [..], to?: key }` |
    /// | `UPDATE` | `{ nodes: [..] }` |
    /// | `UPSERT` | `{ nodes: [..], to?: key, attr?: "children" \| "rawChildren" \| "htmlChildren" \| "bgChildren" }` |
    /// | `REMOVE` | `{ keys: [..] }` |
    pub fn tree_patch(&self) -> Result<Option<TreePatch>, PatchError> {
        let fields = Fields {
            etype: &self.etype,
            data: &self.data,
        };
        let patch = match self.etype.as_str() {
            etype::SET => TreePatch::Set(fields.node(&self.data, "data")?),
            etype::ADD => TreePatch::Add {
                nodes: fields.nodes()?,
                to: fields.opt_text("to")?,
            },
            etype::UPDATE => TreePatch::Update {
                nodes: fields.nodes()?,
            },
            etype::UPSERT => TreePatch::Upsert {
                nodes: fields.nodes()?,
                to: fields.opt_text("to")?,
                attr: fields.attr()?,
            },
            etype::REMOVE => TreePatch::Remove {
                keys: fields.keys()?,
            },
            _ => return Ok(None),
        };
        Ok(Some(patch))
    }
}

struct Fields<'a> {
    etype: &'a str,
    data: &'a Value,
}

impl Fields<'_> {
    fn missing(&self, field: &'static str) -> PatchError {
        PatchError::MissingField {
            etype: self.etype.to_owned(),
            field,
        }
    }

    fn malformed(&self, field: &'static str, reason: impl Into<String>) -> PatchError {
        PatchError::Malformed {
            etype: self.etype.to_owned(),
            field,
            reason: reason.into(),
        }
    }

    fn node(&self, value: &Value, field: &'static str) -> Result<Node, PatchError> {
        value
            .deserialized::<Node>()
            .map_err(|e| self.malformed(field, e.to_string()))
    }

    fn array(&self, field: &'static str) -> Result<&Vec<Value>, PatchError> {
        map_get(self.data, field)
            .ok_or_else(|| self.missing(field))?
            .as_array()
            .ok_or_else(|| self.malformed(field, "expected an array"))
    }

    fn nodes(&self) -> Result<Vec<Node>, PatchError> {
        self.array("nodes")?
            .iter()
            .map(|v| self.node(v, "nodes"))
            .collect()
    }

    fn keys(&self) -> Result<Vec<String>, PatchError> {
        self.array("keys")?
            .iter()
            .map(|v| {
                v.as_text()
                    .map(str::to_owned)
                    .ok_or_else(|| self.malformed("keys", "expected strings"))
            })
            .collect()
    }

    fn opt_text(&self, field: &'static str) -> Result<Option<String>, PatchError> {
        match map_get(self.data, field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.malformed(field, "expected a string")),
        }
    }

    fn attr(&self) -> Result<ChildAttr, PatchError> {
        match self.opt_text("attr")? {
            None => Ok(ChildAttr::Children),
            Some(name) => ChildAttr::from_wire(&name)
                .ok_or_else(|| self.malformed("attr", format!("unknown child array `{name}`"))),
        }
    }
}
