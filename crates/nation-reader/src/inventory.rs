//! Tags seen during inventory.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Local};
use nation_protocol::TagReport;
use serde::Serialize;

use crate::catalog::{ProductInfo, ProductLookup};

/// What is known about one EPC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedTag {
    /// EPC, upper-case hex.
    pub epc: String,
    /// Number of reports received.
    pub count: u64,
    /// Time of the first report.
    pub first_seen: DateTime<Local>,
    /// Time of the latest report.
    pub last_seen: DateTime<Local>,
    /// Antenna of the latest report.
    pub antenna: u8,
    /// Linked product, if any.
    pub product: Option<ProductInfo>,
    #[serde(skip)]
    order: u64,
}

impl ScannedTag {
    /// Id of the linked product.
    pub fn product_id(&self) -> Option<&str> {
        self.product.as_ref().map(|p| p.product_id.as_str())
    }
}

/// Tags of one product, or a single unregistered tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagGroup {
    /// Linked product; `None` for an unregistered tag.
    pub product: Option<ProductInfo>,
    /// EPCs in the group, in the order they were first seen.
    pub epcs: Vec<String>,
    /// Number of distinct EPCs.
    pub total_items: usize,
    /// Total reports across the group.
    pub reads: u64,
    /// Latest sighting of any member.
    pub last_seen: DateTime<Local>,
    /// Antenna of the most recently seen member.
    pub antenna: u8,
}

/// The table of tags seen in a session, keyed by EPC.
#[derive(Debug, Default)]
pub struct TagTable {
    tags: BTreeMap<String, ScannedTag>,
    next_order: u64,
}

impl TagTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a report now, resolving the product through `lookup`.
    pub fn record(&mut self, report: &TagReport, lookup: &dyn ProductLookup) -> &ScannedTag {
        self.record_at(report, lookup, Local::now())
    }

    /// Record a report seen at `now`.
    ///
    /// Antenna 0 (a report without an antenna byte) is recorded as antenna 1.
    pub fn record_at(
        &mut self,
        report: &TagReport,
        lookup: &dyn ProductLookup,
        now: DateTime<Local>,
    ) -> &ScannedTag {
        let epc = report.epc_hex();
        let antenna = if report.antenna_id == 0 { 1 } else { report.antenna_id };
        let product = lookup.lookup(&epc);

        let next_order = &mut self.next_order;
        let tag = self.tags.entry(epc.clone()).or_insert_with(|| {
            let order = *next_order;
            *next_order += 1;
            ScannedTag {
                epc,
                count: 0,
                first_seen: now,
                last_seen: now,
                antenna,
                product: None,
                order,
            }
        });
        tag.count += 1;
        tag.last_seen = now;
        tag.antenna = antenna;
        tag.product = product;
        tag
    }

    /// Look up a tag by EPC (any case).
    pub fn get(&self, epc: &str) -> Option<&ScannedTag> {
        self.tags.get(&epc.to_ascii_uppercase())
    }

    /// Remove a tag. Returns it if it was present.
    pub fn remove(&mut self, epc: &str) -> Option<ScannedTag> {
        self.tags.remove(&epc.to_ascii_uppercase())
    }

    /// Forget every tag.
    pub fn clear(&mut self) {
        self.tags.clear();
        self.next_order = 0;
    }

    /// Number of distinct EPCs.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether no tag has been recorded.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Tags sorted by EPC.
    pub fn iter(&self) -> impl Iterator<Item = &ScannedTag> {
        self.tags.values()
    }

    /// Re-resolve every tag's product, e.g. after the catalogue changed.
    pub fn refresh_products(&mut self, lookup: &dyn ProductLookup) {
        for tag in self.tags.values_mut() {
            tag.product = lookup.lookup(&tag.epc);
        }
    }

    /// Group tags by product.
    ///
    /// Tags linked to the same product share a group; each unregistered tag
    /// is its own group. Groups come out in the order their first member was
    /// seen.
    pub fn groups(&self) -> Vec<TagGroup> {
        let mut members: Vec<&ScannedTag> = self.tags.values().collect();
        members.sort_by_key(|t| t.order);

        let mut groups: Vec<TagGroup> = Vec::new();
        let mut by_product: HashMap<&str, usize> = HashMap::new();

        for tag in members {
            let existing = tag.product_id().and_then(|id| by_product.get(id).copied());
            match existing {
                Some(index) => {
                    let group = &mut groups[index];
                    group.epcs.push(tag.epc.clone());
                    group.total_items += 1;
                    group.reads += tag.count;
                    if tag.last_seen >= group.last_seen {
                        group.last_seen = tag.last_seen;
                        group.antenna = tag.antenna;
                    }
                }
                None => {
                    if let Some(id) = tag.product_id() {
                        by_product.insert(id, groups.len());
                    }
                    groups.push(TagGroup {
                        product: tag.product.clone(),
                        epcs: vec![tag.epc.clone()],
                        total_items: 1,
                        reads: tag.count,
                        last_seen: tag.last_seen,
                        antenna: tag.antenna,
                    });
                }
            }
        }
        groups
    }
}
