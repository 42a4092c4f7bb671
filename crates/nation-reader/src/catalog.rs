//! Product catalogue and EPC-to-product resolution.
//!
//! A catalogue holds categories, products, and links from tag EPCs to
//! products. It is read from YAML:
//!
//! ```yaml
//! categories:
//!   - id: C1
//!     name: Beverages
//! products:
//!   - id: P1
//!     name: Water 500ml
//!     unit: bottle
//!     category_id: C1
//! tags:
//!   - epc: E28011700000020A1B2C3D4E
//!     product_id: P1
//! ```

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ReaderError, ReaderResult};

/// Category name used when a product has no (known) category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Maximum number of entries kept in the auto-import log.
pub const AUTO_IMPORT_LOG_CAPACITY: usize = 50;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// A product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category_id: Option<String>,
}

/// A link from a tag EPC to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagLink {
    pub epc: String,
    pub product_id: String,
}

/// What an EPC resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    /// Linked product id.
    pub product_id: String,
    /// Product name, or the id when the product is not in the catalogue.
    pub name: String,
    /// Unit of measure.
    pub unit: String,
    /// Category name.
    pub category: String,
}

/// Resolves tag EPCs to products.
pub trait ProductLookup {
    /// Product linked to `epc`, if any. `epc` is hex; case does not matter.
    fn lookup(&self, epc: &str) -> Option<ProductInfo>;
}

/// A lookup that knows no products.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCatalog;

impl ProductLookup for NoCatalog {
    fn lookup(&self, _epc: &str) -> Option<ProductInfo> {
        None
    }
}

/// An in-memory product catalogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub tags: Vec<TagLink>,
}

impl Catalog {
    /// Load a catalogue from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ReaderResult<Self> {
        let path = path.as_ref();
        let catalog = Self::from_yaml(&std::fs::read_to_string(path)?)?;
        info!(
            "Loaded catalogue {}: {} categories, {} products, {} tags",
            path.display(),
            catalog.categories.len(),
            catalog.products.len(),
            catalog.tags.len()
        );
        Ok(catalog)
    }

    /// Parse a catalogue from YAML text.
    pub fn from_yaml(text: &str) -> ReaderResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Find a product by id.
    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    /// Link `epc` to `product_id`.
    ///
    /// Returns `false` if the EPC was already linked (to any product).
    pub fn link_tag(&mut self, epc: &str, product_id: &str) -> ReaderResult<bool> {
        if self.product(product_id).is_none() {
            return Err(ReaderError::UnknownProduct(product_id.to_string()));
        }
        if self.linked_product(epc).is_some() {
            return Ok(false);
        }
        debug!("Linking {} to {}", epc, product_id);
        self.tags.push(TagLink {
            epc: epc.to_ascii_uppercase(),
            product_id: product_id.to_string(),
        });
        Ok(true)
    }

    fn linked_product(&self, epc: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.epc.eq_ignore_ascii_case(epc))
            .map(|t| t.product_id.as_str())
    }

    fn category_name(&self, category_id: Option<&str>) -> String {
        category_id
            .and_then(|id| self.categories.iter().find(|c| c.id == id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}

impl ProductLookup for Catalog {
    fn lookup(&self, epc: &str) -> Option<ProductInfo> {
        let product_id = self.linked_product(epc)?;
        Some(match self.product(product_id) {
            Some(product) => ProductInfo {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit: product.unit.clone(),
                category: self.category_name(product.category_id.as_deref()),
            },
            None => ProductInfo {
                product_id: product_id.to_string(),
                name: product_id.to_string(),
                unit: String::new(),
                category: UNCATEGORIZED.to_string(),
            },
        })
    }
}

// ============================================================================
// Auto-import
// ============================================================================

/// Outcome of offering one EPC to [`AutoImport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    /// The EPC was linked to the selected product.
    Linked,
    /// The EPC already had a product.
    AlreadyLinked,
}

/// One line of the auto-import log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportLogEntry {
    pub epc: String,
    pub outcome: ImportOutcome,
    pub time: DateTime<Local>,
}

/// Links every newly seen EPC to one selected product.
///
/// Each EPC is handled once per session; the log keeps the most recent
/// entries first.
#[derive(Debug)]
pub struct AutoImport {
    product_id: String,
    processed: HashSet<String>,
    log: VecDeque<ImportLogEntry>,
    linked: usize,
}

impl AutoImport {
    /// Start importing into `product_id`, which must exist in `catalog`.
    pub fn new(catalog: &Catalog, product_id: &str) -> ReaderResult<Self> {
        if catalog.product(product_id).is_none() {
            return Err(ReaderError::UnknownProduct(product_id.to_string()));
        }
        Ok(AutoImport {
            product_id: product_id.to_string(),
            processed: HashSet::new(),
            log: VecDeque::with_capacity(AUTO_IMPORT_LOG_CAPACITY),
            linked: 0,
        })
    }

    /// Product new tags are linked to.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Offer a seen EPC. Returns `None` if this EPC was already handled.
    pub fn offer(&mut self, catalog: &mut Catalog, epc: &str) -> ReaderResult<Option<ImportOutcome>> {
        let key = epc.to_ascii_uppercase();
        if self.processed.contains(&key) {
            return Ok(None);
        }
        let outcome = if catalog.link_tag(&key, &self.product_id)? {
            info!("Auto-imported {} into {}", key, self.product_id);
            self.linked += 1;
            ImportOutcome::Linked
        } else {
            ImportOutcome::AlreadyLinked
        };
        self.processed.insert(key.clone());
        if self.log.len() == AUTO_IMPORT_LOG_CAPACITY {
            self.log.pop_back();
        }
        self.log.push_front(ImportLogEntry {
            epc: key,
            outcome,
            time: Local::now(),
        });
        Ok(Some(outcome))
    }

    /// Log entries, most recent first.
    pub fn log(&self) -> impl Iterator<Item = &ImportLogEntry> {
        self.log.iter()
    }

    /// Number of EPCs linked by this session.
    pub fn linked_count(&self) -> usize {
        self.linked
    }

    /// Forget which EPCs were handled and clear the log.
    pub fn reset(&mut self) {
        self.processed.clear();
        self.log.clear();
        self.linked = 0;
    }
}
