// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open, inspect, merge, split, extract, and rotate existing PDF
// documents using the `lopdf` crate.

use std::collections::HashMap;

use filewerk_core::error::FilewerkError;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument, warn};

/// Attributes a page may inherit from its ancestors in the page tree
/// (ISO 32000-1 §7.7.3.4). They are copied onto the page when it is moved
/// into a new document, since its new parent will not carry them.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees.
const MAX_TREE_DEPTH: usize = 64;

/// Reads and manipulates an existing PDF file.
///
/// Wraps `lopdf::Document` and provides higher-level operations such as
/// extracting page subsets, splitting, and rotating pages.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source file name, for diagnostics.
    source_name: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, FilewerkError> {
        let document = Document::load_mem(data).map_err(|err| {
            FilewerkError::PdfError(format!("failed to load PDF: {}", err))
        })?;

        if document.is_encrypted() {
            return Err(FilewerkError::PdfError(
                "document is password-protected".to_string(),
            ));
        }

        let pages = document.get_pages().len();
        if pages == 0 {
            return Err(FilewerkError::PdfError("document has no pages".to_string()));
        }

        debug!(pages, "PDF loaded from bytes");

        Ok(Self {
            document,
            source_name: None,
        })
    }

    /// Attach a file name used in error messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// Page object ids in page order.
    fn page_ids(&self) -> Vec<ObjectId> {
        // get_pages() is keyed by 1-based page number in a BTreeMap, so the
        // values are already in document order.
        self.document.get_pages().into_values().collect()
    }

    // -- Extraction -----------------------------------------------------------

    /// Copy the given pages (0-based, in the given order) into a new PDF.
    #[instrument(skip(self, indices), fields(pages = indices.len()))]
    pub fn extract_pages(&self, indices: &[u32]) -> Result<Vec<u8>, FilewerkError> {
        if indices.is_empty() {
            return Err(FilewerkError::Validation("no pages selected".to_string()));
        }

        let page_ids = self.page_ids();
        let mut selected = Vec::with_capacity(indices.len());
        for &index in indices {
            let id = page_ids.get(index as usize).ok_or_else(|| {
                FilewerkError::Validation(format!(
                    "page {} out of range (document has {} pages)",
                    index + 1,
                    page_ids.len()
                ))
            })?;
            selected.push(*id);
        }

        let mut builder = PdfBuilder::new();
        builder.append_pages(&self.document, &selected)?;
        let output = builder.finish()?;

        debug!(output_bytes = output.len(), "Pages extracted");
        Ok(output)
    }

    /// One single-page PDF per page, in page order.
    #[instrument(skip(self))]
    pub fn split_every_page(&self) -> Result<Vec<Vec<u8>>, FilewerkError> {
        let total = self.page_count();
        info!(total, "Splitting PDF into single pages");
        (0..total).map(|index| self.extract_pages(&[index])).collect()
    }

    /// Rotate pages by `degrees` (a multiple of 90). `None` rotates every page.
    ///
    /// Returns the full document as bytes with the rotation applied.
    #[instrument(skip(self, indices), fields(degrees))]
    pub fn rotate_pages(
        &self,
        indices: Option<&[u32]>,
        degrees: i32,
    ) -> Result<Vec<u8>, FilewerkError> {
        if degrees % 90 != 0 {
            return Err(FilewerkError::Validation(format!(
                "rotation must be a multiple of 90, got {}",
                degrees
            )));
        }

        let mut doc = self.document.clone();
        let page_ids = self.page_ids();
        let targets: Vec<ObjectId> = match indices {
            None => page_ids.clone(),
            Some(indices) => indices
                .iter()
                .map(|&index| {
                    page_ids.get(index as usize).copied().ok_or_else(|| {
                        FilewerkError::Validation(format!(
                            "page {} out of range (document has {} pages)",
                            index + 1,
                            page_ids.len()
                        ))
                    })
                })
                .collect::<Result<_, _>>()?,
        };

        for page_id in targets {
            let existing_rotation = self
                .document
                .get_dictionary(page_id)
                .ok()
                .and_then(|dict| page_attribute(&self.document, dict, b"Rotate"))
                .and_then(|value| value.as_i64().ok())
                .unwrap_or(0);

            let new_rotation = (existing_rotation + degrees as i64).rem_euclid(360);

            let dict = doc.get_dictionary_mut(page_id).map_err(|err| {
                FilewerkError::PdfError(format!("cannot read page {:?}: {}", page_id, err))
            })?;
            dict.set("Rotate", Object::Integer(new_rotation));
        }

        info!(degrees, "Pages rotated");

        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(|err| {
            FilewerkError::PdfError(format!("failed to serialise rotated PDF: {}", err))
        })?;

        Ok(output)
    }
}

/// Concatenate the pages of several documents, in the order given.
#[instrument(skip_all, fields(documents = documents.len()))]
pub fn merge_documents(documents: &[PdfReader]) -> Result<Vec<u8>, FilewerkError> {
    if documents.is_empty() {
        return Err(FilewerkError::Validation("nothing to merge".to_string()));
    }

    let mut builder = PdfBuilder::new();
    for reader in documents {
        builder.append_pages(&reader.document, &reader.page_ids())?;
    }

    info!(pages = builder.kids.len(), "Merging PDFs");
    builder.finish()
}

// -- Page copying -------------------------------------------------------------

/// A fresh document with an empty page tree that pages are appended to.
struct PdfBuilder {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Self {
            document,
            pages_id,
            kids: Vec::new(),
        }
    }

    /// Deep-copy pages (and everything they reference) from `source`.
    ///
    /// Objects shared between the copied pages (fonts, images) are copied
    /// once per call.
    fn append_pages(
        &mut self,
        source: &Document,
        page_ids: &[ObjectId],
    ) -> Result<(), FilewerkError> {
        let mut copier = ObjectCopier {
            source,
            target: &mut self.document,
            copied: HashMap::new(),
        };

        for &page_id in page_ids {
            let page = source.get_dictionary(page_id).map_err(|err| {
                FilewerkError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
            })?;

            let mut flattened = page.clone();
            for key in INHERITABLE_KEYS {
                if !flattened.has(key)
                    && let Some(value) = page_attribute(source, page, key)
                {
                    flattened.set(key.to_vec(), value.clone());
                }
            }

            let mut cloned = copier.copy_dictionary(&flattened);
            cloned.set("Parent", Object::Reference(self.pages_id));
            let new_id = copier.target.add_object(Object::Dictionary(cloned));
            copier.copied.insert(page_id, new_id);
            self.kids.push(Object::Reference(new_id));
        }

        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, FilewerkError> {
        let count = self.kids.len() as i64;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );

        let mut output = Vec::new();
        self.document.save_to(&mut output).map_err(|err| {
            FilewerkError::PdfError(format!("failed to serialise PDF: {}", err))
        })?;
        Ok(output)
    }
}

/// Copies objects from one document into another, remapping references.
///
/// `/Parent` entries are dropped so that copying a page never drags the whole
/// source page tree along; the caller re-parents pages itself.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    /// Source id -> target id, so shared and cyclic references copy once.
    copied: HashMap<ObjectId, ObjectId>,
}

impl ObjectCopier<'_> {
    fn copy_object(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(*id)),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(dict)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.copy_object(item)).collect())
            }
            Object::Stream(stream) => {
                let mut cloned = stream.clone();
                cloned.dict = self.copy_dictionary(&stream.dict);
                Object::Stream(cloned)
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            let value = self.copy_object(value);
            cloned.set(key.clone(), value);
        }
        cloned
    }

    fn copy_reference(&mut self, id: ObjectId) -> ObjectId {
        if let Some(&mapped) = self.copied.get(&id) {
            return mapped;
        }

        // Reserve the target id before recursing so cycles terminate.
        let new_id = self.target.new_object_id();
        self.copied.insert(id, new_id);

        let cloned = match self.source.get_object(id) {
            Ok(object) => self.copy_object(object),
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        self.target.objects.insert(new_id, cloned);
        new_id
    }
}

/// Look up a page attribute, walking up the page tree for inherited values.
fn page_attribute<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    if let Ok(value) = page.get(key) {
        return Some(value);
    }

    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
    }
    None
}
