//! View descriptor generation
//!
//! Writes a `<title>.base` file next to the records: a filter selecting
//! the collection's records inside its folder, and one table view whose
//! column order follows the schema.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::writer::sanitize_file_name;
use crate::ids::CollectionId;
use crate::models::CollectionSchema;
use crate::store::keys;

/// File extension of view descriptors
pub const VIEW_EXTENSION: &str = "base";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub filters: Filters,
    pub views: Vec<TableView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub and: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableView {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub order: Vec<String>,
}

impl ViewDescriptor {
    /// Descriptor for a collection mirrored into `folder`
    pub fn for_collection(schema: &CollectionSchema, folder: &Path) -> Self {
        let folder = folder.to_string_lossy().replace('\\', "/");
        let order = schema
            .header_columns()
            .map(|column| column.name.clone())
            .filter(|name| !keys::RESERVED.contains(&name.as_str()))
            .collect();

        Self {
            filters: Filters {
                and: vec![
                    format!("file.inFolder(\"{}\")", folder),
                    collection_filter(&schema.id),
                ],
            },
            views: vec![TableView {
                kind: "table".to_string(),
                name: "Table".to_string(),
                order,
            }],
        }
    }

    /// Whether the filter selects records of collection `id`
    pub fn selects(&self, id: &CollectionId) -> bool {
        let wanted = collection_filter(id);
        self.filters.and.iter().any(|clause| *clause == wanted)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

fn collection_filter(id: &CollectionId) -> String {
    format!("{} == \"{}\"", keys::COLLECTION_ID, id)
}

/// Location of a collection's descriptor inside its folder
pub fn view_path(schema: &CollectionSchema, folder: &Path) -> PathBuf {
    folder.join(format!(
        "{}.{}",
        sanitize_file_name(&schema.title),
        VIEW_EXTENSION
    ))
}
