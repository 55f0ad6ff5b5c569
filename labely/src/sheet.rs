//! Turning a label request into a filled in sheet.
//!
//! This happens in two steps. First the requested ids are resolved and
//! expanded by quantity into the ordered list of labels to print. Then that
//! list is laid onto the fixed slots of a sheet, starting at the requested
//! position. Neither step fails: ids that do not resolve and labels that do
//! not fit are dropped and reported as outcomes.
use futures::future::join_all;
use label_api_types::{ItemType, LabelOutcome, LabelSheetResponse, LabelSlot, ResolvedItem, SHEET_SLOTS};
use log::{info, warn};

use crate::{
    request::{ItemSpec, LabelRequest, StartPosition},
    resolver::ItemResolver,
};

/// The ordered labels to print for a request, before they are placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// At most as many labels as fit on the sheet.
    pub labels: Vec<ResolvedItem>,
    /// Copies that did not fit, counted per requested entry in request order.
    pub overflowed: Vec<(String, u64)>,
    /// Requested ids that did not resolve, in request order.
    pub unresolved: Vec<String>,
}

impl Expansion {
    /// Append `copies` of an item, keeping at most `limit` labels and counting
    /// the rest as overflow.
    fn push_copies(&mut self, item: &ResolvedItem, copies: u64, limit: usize) {
        let room = limit.saturating_sub(self.labels.len());
        let fit = usize::try_from(copies).unwrap_or(usize::MAX).min(room);
        for _ in 0..fit {
            self.labels.push(item.clone());
        }

        let rest = copies - fit as u64;
        if rest > 0 {
            self.overflowed.push((item.id.to_string(), rest));
        }
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflowed.iter().map(|(_, count)| count).sum()
    }
}

/// Resolve every id at once, keeping the order of `ids`.
///
/// A lookup that errors counts as not found.
pub async fn resolve_all<R>(resolver: &R, item_type: ItemType, ids: &[&str]) -> Vec<Option<ResolvedItem>>
where
    R: ItemResolver + ?Sized,
{
    let lookups = ids.iter().map(|id| async move {
        match resolver.resolve(id, item_type).await {
            Ok(item) => item,
            Err(e) => {
                warn!("looking up {} `{}` failed, skipping it: {}", item_type, id, e);
                None
            }
        }
    });

    join_all(lookups).await
}

/// Resolve the items of a request and expand them by quantity.
///
/// No more than `limit` labels are kept. Copies past that are only counted.
pub async fn expand_labels<R>(resolver: &R, item_type: ItemType, spec: &ItemSpec, limit: usize) -> Expansion
where
    R: ItemResolver + ?Sized,
{
    let mut expansion = Expansion::default();

    match spec {
        ItemSpec::PerItem(items) => {
            let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
            let resolved = resolve_all(resolver, item_type, &ids).await;

            for (item, resolved) in items.iter().zip(resolved) {
                match resolved {
                    Some(resolved) => expansion.push_copies(&resolved, u64::from(item.quantity), limit),
                    None => expansion.unresolved.push(item.id.to_string()),
                }
            }
        }
        ItemSpec::Shared { ids, quantity } => {
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let resolved = resolve_all(resolver, item_type, &refs).await;

            // The shared quantity only counts when a single id was asked for.
            let copies = if ids.len() == 1 { *quantity } else { 1 };

            for (id, resolved) in ids.iter().zip(resolved) {
                match resolved {
                    Some(resolved) => expansion.push_copies(&resolved, u64::from(copies), limit),
                    None => expansion.unresolved.push(id.to_string()),
                }
            }
        }
    }

    expansion
}

/// Labels laid onto the slots of a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub slots: [LabelSlot; SHEET_SLOTS],
    /// One `Placed` entry per placed label, then one `DroppedOverflow` entry
    /// per run of the same id that did not fit, in label order.
    pub outcomes: Vec<LabelOutcome>,
}

impl Assignment {
    pub fn placed(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }
}

/// Place labels in order from `start` on. Labels past the last slot are dropped.
pub fn assign_slots(labels: Vec<ResolvedItem>, start: StartPosition) -> Assignment {
    let mut slots: [LabelSlot; SHEET_SLOTS] = Default::default();
    let mut outcomes = Vec::new();

    let mut cursor = start.cursor();
    for label in labels {
        if cursor < SHEET_SLOTS {
            outcomes.push(LabelOutcome::Placed {
                slot: cursor,
                id: label.id.to_string(),
            });
            slots[cursor] = LabelSlot::Filled(label);
            cursor += 1;
            continue;
        }

        if let Some(LabelOutcome::DroppedOverflow { id, count }) = outcomes.last_mut() {
            if *id == label.id {
                *count += 1;
                continue;
            }
        }
        outcomes.push(LabelOutcome::DroppedOverflow { id: label.id, count: 1 });
    }

    Assignment { slots, outcomes }
}

/// Build the sheet for a request.
pub async fn build_sheet<R>(resolver: &R, request: &LabelRequest) -> LabelSheetResponse
where
    R: ItemResolver + ?Sized,
{
    let expansion = expand_labels(resolver, request.item_type, &request.spec, request.start.capacity()).await;
    let dropped_overflow = expansion.overflow_count();
    let dropped_unresolved = expansion.unresolved.len();

    let assignment = assign_slots(expansion.labels, request.start);
    let placed = assignment.placed();

    let mut outcomes: Vec<LabelOutcome> = expansion
        .unresolved
        .into_iter()
        .map(|id| LabelOutcome::DroppedUnresolved { id })
        .collect();
    outcomes.extend(assignment.outcomes);
    outcomes.extend(
        expansion
            .overflowed
            .into_iter()
            .map(|(id, count)| LabelOutcome::DroppedOverflow { id, count }),
    );

    info!(
        "built {} label sheet from slot {}: {} placed, {} unresolved, {} overflowed",
        request.item_type,
        request.start.get(),
        placed,
        dropped_unresolved,
        dropped_overflow
    );

    LabelSheetResponse {
        item_type: request.item_type,
        start: request.start.get(),
        slots: assignment.slots,
        outcomes,
        placed,
        dropped_unresolved,
        dropped_overflow,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        request::{parse_items, LabelRequestItem},
        resolver::{CatalogResolver, ResolveError},
    };

    fn catalog() -> CatalogResolver {
        CatalogResolver::new()
            .with_item(ItemType::Product, "P001", "Red rose bouquet")
            .with_item(ItemType::Product, "P002", "Sunflower basket")
            .with_item(ItemType::Product, "P003", "Orchid pot")
            .with_item(ItemType::Material, "M001", "Kraft wrapping paper")
    }

    fn ids(labels: &[ResolvedItem]) -> Vec<&str> {
        labels.iter().map(|l| l.id.as_str()).collect()
    }

    fn label(id: &str) -> ResolvedItem {
        ResolvedItem {
            id: id.to_string(),
            name: format!("Item {}", id),
        }
    }

    fn shared(ids: &[&str], quantity: u32) -> ItemSpec {
        ItemSpec::Shared {
            ids: ids.iter().map(|id| id.to_string()).collect(),
            quantity,
        }
    }

    /// Answers slower for earlier ids, so lookups finish in reverse order.
    struct SlowFirst {
        catalog: CatalogResolver,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ItemResolver for SlowFirst {
        async fn resolve(&self, id: &str, item_type: ItemType) -> Result<Option<ResolvedItem>, ResolveError> {
            let delay = match id {
                "P001" => 30,
                "P002" => 15,
                _ => 0,
            };
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            self.catalog.resolve(id, item_type).await
        }
    }

    struct Failing;

    #[async_trait]
    impl ItemResolver for Failing {
        async fn resolve(&self, _id: &str, _item_type: ItemType) -> Result<Option<ResolvedItem>, ResolveError> {
            Err(ResolveError::Io(std::io::Error::new(std::io::ErrorKind::Other, "store down")))
        }
    }

    #[tokio::test]
    async fn test_per_item_expands_in_order() {
        let spec = ItemSpec::PerItem(parse_items("P001:3,P002:2"));
        let expansion = expand_labels(&catalog(), ItemType::Product, &spec, SHEET_SLOTS).await;

        assert_eq!(ids(&expansion.labels), vec!["P001", "P001", "P001", "P002", "P002"]);
        assert!(expansion.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_per_item_skips_unresolved() {
        let spec = ItemSpec::PerItem(parse_items("P001:2,BADID:1,P003:1"));
        let expansion = expand_labels(&catalog(), ItemType::Product, &spec, SHEET_SLOTS).await;

        assert_eq!(ids(&expansion.labels), vec!["P001", "P001", "P003"]);
        assert_eq!(expansion.unresolved, vec!["BADID".to_string()]);
    }

    #[tokio::test]
    async fn test_per_item_repeated_ids_are_separate_runs() {
        let spec = ItemSpec::PerItem(vec![
            LabelRequestItem {
                id: "P001".to_string(),
                quantity: 2,
            },
            LabelRequestItem {
                id: "P002".to_string(),
                quantity: 1,
            },
            LabelRequestItem {
                id: "P001".to_string(),
                quantity: 3,
            },
        ]);
        let expansion = expand_labels(&catalog(), ItemType::Product, &spec, SHEET_SLOTS).await;

        assert_eq!(ids(&expansion.labels), vec!["P001", "P001", "P002", "P001", "P001", "P001"]);
    }

    #[tokio::test]
    async fn test_shared_quantity_ignored_for_many_ids() {
        let expansion = expand_labels(&catalog(), ItemType::Product, &shared(&["P001", "P002"], 5), SHEET_SLOTS).await;
        assert_eq!(ids(&expansion.labels), vec!["P001", "P002"]);
    }

    #[tokio::test]
    async fn test_shared_quantity_for_single_id() {
        let expansion = expand_labels(&catalog(), ItemType::Product, &shared(&["P001"], 5), SHEET_SLOTS).await;

        assert_eq!(expansion.labels.len(), 5);
        assert!(expansion.labels.iter().all(|l| l.name == "Red rose bouquet"));
    }

    #[tokio::test]
    async fn test_shared_single_unresolved_id() {
        let expansion = expand_labels(&catalog(), ItemType::Product, &shared(&["NOPE"], 5), SHEET_SLOTS).await;

        assert!(expansion.labels.is_empty());
        assert_eq!(expansion.unresolved, vec!["NOPE".to_string()]);
    }

    #[tokio::test]
    async fn test_shared_counts_ids_before_resolving() {
        // Two ids were asked for, so the quantity does not apply even though
        // only one of them resolves.
        let expansion = expand_labels(&catalog(), ItemType::Product, &shared(&["P001", "NOPE"], 4), SHEET_SLOTS).await;
        assert_eq!(ids(&expansion.labels), vec!["P001"]);
    }

    #[tokio::test]
    async fn test_resolution_keeps_request_order() {
        let resolver = SlowFirst {
            catalog: catalog(),
            calls: AtomicUsize::new(0),
        };
        let spec = ItemSpec::PerItem(parse_items("P001:1,P002:1,P003:1"));
        let expansion = expand_labels(&resolver, ItemType::Product, &spec, SHEET_SLOTS).await;

        assert_eq!(ids(&expansion.labels), vec!["P001", "P002", "P003"]);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_same_id_resolves_the_same() {
        let resolved = resolve_all(&catalog(), ItemType::Product, &["P002", "P002"]).await;
        assert_eq!(resolved[0], resolved[1]);
        assert_eq!(resolved[0].as_ref().map(|r| r.name.as_str()), Some("Sunflower basket"));
    }

    #[tokio::test]
    async fn test_failed_lookups_are_dropped() {
        let spec = ItemSpec::PerItem(parse_items("P001:2"));
        let expansion = expand_labels(&Failing, ItemType::Product, &spec, SHEET_SLOTS).await;

        assert!(expansion.labels.is_empty());
        assert_eq!(expansion.unresolved, vec!["P001".to_string()]);
    }

    #[tokio::test]
    async fn test_expansion_stops_at_the_limit() {
        let spec = ItemSpec::PerItem(parse_items("P001:2,P002:3,P003:1"));
        let expansion = expand_labels(&catalog(), ItemType::Product, &spec, 3).await;

        assert_eq!(ids(&expansion.labels), vec!["P001", "P001", "P002"]);
        assert_eq!(expansion.overflowed, vec![("P002".to_string(), 2), ("P003".to_string(), 1)]);
        assert_eq!(expansion.overflow_count(), 3);
    }

    #[tokio::test]
    async fn test_huge_quantity_is_counted_not_copied() {
        let spec = ItemSpec::PerItem(parse_items(&format!("P001:{}", u32::MAX)));
        let expansion = expand_labels(&catalog(), ItemType::Product, &spec, SHEET_SLOTS).await;

        assert_eq!(expansion.labels.len(), SHEET_SLOTS);
        assert_eq!(
            expansion.overflowed,
            vec![("P001".to_string(), u64::from(u32::MAX) - SHEET_SLOTS as u64)]
        );
    }

    #[test]
    fn test_assign_from_the_first_slot() {
        let labels: Vec<ResolvedItem> = (0..SHEET_SLOTS).map(|i| label(&format!("P{}", i))).collect();
        let assignment = assign_slots(labels, StartPosition::new(Some(1)));

        assert_eq!(assignment.placed(), SHEET_SLOTS);
        assert!(assignment
            .outcomes
            .iter()
            .all(|o| matches!(o, LabelOutcome::Placed { .. })));
        assert_eq!(assignment.slots[23].item().map(|i| i.id.as_str()), Some("P23"));
    }

    #[test]
    fn test_assign_overflow_is_dropped() {
        let labels: Vec<ResolvedItem> = ["A", "B", "C", "D", "E"].iter().map(|id| label(id)).collect();
        let assignment = assign_slots(labels, StartPosition::new(Some(23)));

        assert_eq!(assignment.placed(), 2);
        assert!(assignment.slots[..22].iter().all(LabelSlot::is_empty));
        assert_eq!(assignment.slots[22].item().map(|i| i.id.as_str()), Some("A"));
        assert_eq!(assignment.slots[23].item().map(|i| i.id.as_str()), Some("B"));
        assert_eq!(
            assignment.outcomes,
            vec![
                LabelOutcome::Placed {
                    slot: 22,
                    id: "A".to_string()
                },
                LabelOutcome::Placed {
                    slot: 23,
                    id: "B".to_string()
                },
                LabelOutcome::DroppedOverflow {
                    id: "C".to_string(),
                    count: 1
                },
                LabelOutcome::DroppedOverflow {
                    id: "D".to_string(),
                    count: 1
                },
                LabelOutcome::DroppedOverflow {
                    id: "E".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_assign_past_the_last_slot() {
        let assignment = assign_slots(vec![label("A"), label("A")], StartPosition::new(Some(30)));

        assert_eq!(assignment.placed(), 0);
        assert_eq!(
            assignment.outcomes,
            vec![LabelOutcome::DroppedOverflow {
                id: "A".to_string(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_assign_nothing() {
        let assignment = assign_slots(vec![], StartPosition::default());

        assert_eq!(assignment.slots.len(), SHEET_SLOTS);
        assert!(assignment.slots.iter().all(LabelSlot::is_empty));
        assert!(assignment.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_build_sheet() {
        let request = LabelRequest {
            item_type: ItemType::Product,
            start: StartPosition::new(Some(22)),
            spec: ItemSpec::PerItem(parse_items("P001:2,BADID:1,P003:3")),
        };
        let sheet = build_sheet(&catalog(), &request).await;

        assert_eq!(sheet.start, 22);
        assert_eq!(sheet.placed, 3);
        assert_eq!(sheet.dropped_unresolved, 1);
        assert_eq!(sheet.dropped_overflow, 2);
        assert_eq!(sheet.outcomes[0], LabelOutcome::DroppedUnresolved { id: "BADID".to_string() });
        assert_eq!(sheet.outcomes.len(), 5);
        assert_eq!(
            sheet.outcomes[4],
            LabelOutcome::DroppedOverflow {
                id: "P003".to_string(),
                count: 2
            }
        );
        assert_eq!(sheet.slots[23].item().map(|i| i.id.as_str()), Some("P003"));
    }

    #[tokio::test]
    async fn test_build_sheet_with_a_huge_quantity() {
        let request = LabelRequest {
            item_type: ItemType::Product,
            start: StartPosition::new(Some(5)),
            spec: ItemSpec::PerItem(parse_items("P001:3000000,P002:2")),
        };
        let sheet = build_sheet(&catalog(), &request).await;

        assert_eq!(sheet.placed, 20);
        assert_eq!(sheet.dropped_overflow, 3_000_000 - 20 + 2);
        assert_eq!(
            &sheet.outcomes[20..],
            &[
                LabelOutcome::DroppedOverflow {
                    id: "P001".to_string(),
                    count: 3_000_000 - 20
                },
                LabelOutcome::DroppedOverflow {
                    id: "P002".to_string(),
                    count: 2
                },
            ]
        );
        assert_eq!(sheet.outcomes.len(), 22);
        assert!(serde_json::to_string(&sheet).unwrap().len() < 16 * 1024);
    }

    #[tokio::test]
    async fn test_build_empty_sheet() {
        let request = LabelRequest {
            item_type: ItemType::Material,
            start: StartPosition::default(),
            spec: shared(&[], 1),
        };
        let sheet = build_sheet(&catalog(), &request).await;

        assert!(sheet.slots.iter().all(LabelSlot::is_empty));
        assert_eq!(sheet.placed, 0);
        assert!(sheet.outcomes.is_empty());
    }
}
