//! Customer identity dedup
//!
//! Collapses duplicate customer records that entered through different
//! sources (POS sync vs direct web orders). Two records belong to the same
//! person when they share any identity key from [`shared::identity`]; keys
//! are transitive, so A~B and B~C puts all three in one group.
//!
//! The survivor of a group is the record first seen locally (earliest
//! `first_seen_at`, id as tie-break) so references held elsewhere keep
//! pointing at the oldest id.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use shared::identity::{IdentityKey, identity_keys};
use shared::models::Customer;

use crate::store::{DocumentStore, Query, WriteOp, org_collection};
use crate::utils::AppResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub groups_merged: usize,
    pub customers_removed: usize,
}

/// Merge every group of duplicate customers in one atomic batch.
///
/// Survivors absorb the counters of the records they replace; absorbed
/// records are deleted in the same commit, so no partially-merged state is
/// ever visible.
pub async fn merge_duplicate_customers(
    store: &Arc<dyn DocumentStore>,
    org_id: &str,
) -> AppResult<MergeSummary> {
    let collection = org_collection(org_id, "customers");
    let docs = store.query(Query::collection(collection.clone())).await?;

    let mut customers: Vec<Customer> = Vec::with_capacity(docs.len());
    for doc in docs {
        match serde_json::from_value::<Customer>(doc.data) {
            Ok(customer) => customers.push(customer),
            Err(e) => {
                warn!(customer = %doc.id, error = %e, "unparseable customer record, skipping dedup");
            }
        }
    }

    let groups = group_by_identity(&customers);

    let mut batch = Vec::new();
    let mut summary = MergeSummary::default();
    for group in groups {
        if group.len() < 2 {
            continue;
        }

        let mut members: Vec<&Customer> = group.iter().map(|&i| &customers[i]).collect();
        members.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut survivor = members[0].clone();
        for duplicate in &members[1..] {
            survivor.absorb(duplicate);
            batch.push(WriteOp::Delete {
                collection: collection.clone(),
                id: duplicate.id.clone(),
            });
            summary.customers_removed += 1;
        }
        batch.push(WriteOp::Set {
            collection: collection.clone(),
            id: survivor.id.clone(),
            data: serde_json::to_value(&survivor)?,
        });
        summary.groups_merged += 1;
    }

    if !batch.is_empty() {
        store.commit(batch).await?;
        info!(
            org = %org_id,
            groups = summary.groups_merged,
            removed = summary.customers_removed,
            "merged duplicate customers"
        );
    }
    Ok(summary)
}

/// Partition customer indices into identity groups via union-find
fn group_by_identity(customers: &[Customer]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..customers.len()).collect();

    fn find(parent: &mut Vec<usize>, i: usize) -> usize {
        if parent[i] != i {
            let root = find(parent, parent[i]);
            parent[i] = root;
        }
        parent[i]
    }

    let mut key_owner: HashMap<IdentityKey, usize> = HashMap::new();
    for (i, customer) in customers.iter().enumerate() {
        for key in identity_keys(customer) {
            match key_owner.get(&key) {
                Some(&j) => {
                    let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                    if a != b {
                        parent[a] = b;
                    }
                }
                None => {
                    key_owner.insert(key, i);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..customers.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}
