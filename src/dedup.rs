use crate::fingerprint::{fingerprint, legacy_fingerprint};
use crate::record::Record;
use crate::state::Ledger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Records absent from the ledger, in fetch order.
    pub new_records: Vec<Record>,
    /// The input ledger plus the fingerprints of `new_records` and of any
    /// record recognised through a legacy token.
    pub ledger: Ledger,
}

impl Reconciled {
    pub fn known_count(&self, fetched: usize) -> usize {
        fetched.saturating_sub(self.new_records.len())
    }
}

/// Splits `records` into already-known and new against `ledger`.
///
/// The input ledger is never modified. A record repeated within one fetch is
/// only reported once.
pub fn reconcile(ledger: &Ledger, records: Vec<Record>, identity_fields: &[&str]) -> Reconciled {
    reconcile_with_legacy(ledger, &Ledger::new(), records, identity_fields)
}

/// Like [`reconcile`], but a record whose legacy token is in `legacy` counts
/// as known. Its current fingerprint is then added to the returned ledger, so
/// later runs match it directly.
pub fn reconcile_with_legacy(
    ledger: &Ledger,
    legacy: &Ledger,
    records: Vec<Record>,
    identity_fields: &[&str],
) -> Reconciled {
    let mut updated = ledger.clone();
    let mut new_records = Vec::new();

    for record in records {
        let id = fingerprint(&record, identity_fields);
        if updated.contains(&id) {
            continue;
        }
        let seen_before_upgrade =
            !legacy.is_empty() && legacy.contains(&legacy_fingerprint(&record, identity_fields));
        updated.insert(id);
        if !seen_before_upgrade {
            new_records.push(record);
        }
    }

    Reconciled {
        new_records,
        ledger: updated,
    }
}
