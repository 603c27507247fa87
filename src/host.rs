//! Host glue: where document bytes come from
//!
//! Documents are records of [`Entity::Document`] with a `name`, an optional
//! `scope_id`, a `mimetype` and the content base64-encoded in `datas`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};
use serde_json::Value;

use crate::data::{DataAccess, DataError, Entity, Filter, Order, Record, RecordId, field_str, record_id};

/// A document the viewer can open
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRef {
    pub attachment_id: RecordId,
    pub name: String,
}

impl DocumentRef {
    pub fn new(attachment_id: RecordId, name: impl Into<String>) -> Self {
        Self {
            attachment_id,
            name: name.into(),
        }
    }
}

/// Fetches stored document content
pub trait DocumentSource {
    fn fetch(&self, attachment_id: RecordId) -> Result<Vec<u8>, DataError>;
}

/// Document bytes held in memory
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    documents: HashMap<RecordId, Vec<u8>>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attachment_id: RecordId, bytes: Vec<u8>) {
        self.documents.insert(attachment_id, bytes);
    }

    #[must_use]
    pub fn with(mut self, attachment_id: RecordId, bytes: Vec<u8>) -> Self {
        self.insert(attachment_id, bytes);
        self
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, attachment_id: RecordId) -> Result<Vec<u8>, DataError> {
        self.documents
            .get(&attachment_id)
            .cloned()
            .ok_or(DataError::NotFound {
                entity: Entity::Document,
                id: attachment_id,
            })
    }
}

/// Document records in a [`DataAccess`] store, content decoded from `datas`
pub struct StoredDocuments<'a> {
    data: &'a dyn DataAccess,
}

impl<'a> StoredDocuments<'a> {
    pub fn new(data: &'a dyn DataAccess) -> Self {
        Self { data }
    }
}

impl DocumentSource for StoredDocuments<'_> {
    fn fetch(&self, attachment_id: RecordId) -> Result<Vec<u8>, DataError> {
        let records = self.data.get(Entity::Document, &[attachment_id], &["datas"])?;
        let encoded = records
            .first()
            .and_then(|r| field_str(r, "datas"))
            .ok_or_else(|| DataError::Rejected(format!("document #{attachment_id} has no content")))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| DataError::Rejected(format!("document #{attachment_id} content is not base64: {e}")))
    }
}

/// Documents of a scope ordered by name, optionally filtered by a
/// case-insensitive name fragment. Storage failures give an empty list.
#[must_use]
pub fn list_documents(data: &dyn DataAccess, scope_id: Option<RecordId>, name_filter: Option<&str>) -> Vec<DocumentRef> {
    let filter: Vec<Filter> = scope_id.map(|id| Filter::eq("scope_id", id)).into_iter().collect();
    let records = match data.list(Entity::Document, &filter, &["name"], Some(&Order::asc("name"))) {
        Ok(records) => records,
        Err(e) => {
            warn!("Could not list documents: {e}");
            return Vec::new();
        }
    };

    let needle = name_filter.map(|f| f.trim().to_lowercase()).filter(|f| !f.is_empty());
    records
        .iter()
        .filter_map(|r| Some(DocumentRef::new(record_id(r)?, field_str(r, "name").unwrap_or_default())))
        .filter(|doc| needle.as_ref().is_none_or(|n| doc.name.to_lowercase().contains(n)))
        .collect()
}

/// Store the file at `path` as a document record
pub fn import_document(data: &mut dyn DataAccess, path: &Path, scope_id: Option<RecordId>) -> anyhow::Result<RecordId> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("document path has no file name")?;
    let mimetype = if crate::render::is_pdf(&bytes) {
        "application/pdf".to_string()
    } else {
        image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .with_context(|| format!("{} is neither a PDF nor a supported image", path.display()))?
    };

    let mut record = Record::new();
    record.insert("name".into(), Value::from(name.clone()));
    record.insert("mimetype".into(), Value::from(mimetype));
    record.insert("datas".into(), Value::from(STANDARD.encode(&bytes)));
    if let Some(scope_id) = scope_id {
        record.insert("scope_id".into(), Value::from(scope_id));
    }
    let id = data.create(Entity::Document, record).context("storing document")?;
    info!("Imported '{name}' as document #{id} ({} bytes)", bytes.len());
    Ok(id)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::data::MemoryStore;

    fn store() -> MemoryStore {
        let mut data = MemoryStore::new();
        for (name, scope) in [("Floor 2.pdf", 1), ("floor 1.pdf", 1), ("Site.png", 1), ("Other.pdf", 2)] {
            data.create(
                Entity::Document,
                json!({"name": name, "scope_id": scope, "datas": STANDARD.encode(name)})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        }
        data
    }

    #[test]
    fn lists_scope_in_name_order() {
        let data = store();
        let names: Vec<_> = list_documents(&data, Some(1), None).into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["floor 1.pdf", "Floor 2.pdf", "Site.png"]);
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        let data = store();
        let docs = list_documents(&data, Some(1), Some("FLOOR"));
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn stored_documents_decode_base64() {
        let data = store();
        let first = list_documents(&data, Some(2), None).remove(0);
        let bytes = StoredDocuments::new(&data).fetch(first.attachment_id).unwrap();
        assert_eq!(bytes, b"Other.pdf");
    }

    #[test]
    fn missing_document_is_not_found() {
        let source = MemorySource::new().with(1, vec![1, 2, 3]);
        assert_eq!(source.fetch(1).unwrap(), vec![1, 2, 3]);
        assert!(matches!(source.fetch(2), Err(DataError::NotFound { id: 2, .. })));
    }

    #[test]
    fn import_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.png");
        let png = crate::test_utils::png_bytes(4, 4, image::Rgba([1, 2, 3, 255]));
        std::fs::write(&path, &png).unwrap();

        let mut data = MemoryStore::new();
        let id = import_document(&mut data, &path, Some(3)).unwrap();
        assert_eq!(StoredDocuments::new(&data).fetch(id).unwrap(), png);
        assert_eq!(list_documents(&data, Some(3), None)[0].name, "plan.png");
    }

    #[test]
    fn import_rejects_unknown_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(import_document(&mut MemoryStore::new(), &path, None).is_err());
    }
}
