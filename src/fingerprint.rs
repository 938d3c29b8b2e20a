use sha2::Digest as _;

use crate::record::Record;

/// Derives the identity token of `record` from `identity_fields`, in order.
///
/// Each value is length-prefixed before hashing so that no choice of field
/// contents can make two different field tuples collide on the separator.
pub fn fingerprint(record: &Record, identity_fields: &[&str]) -> String {
    let mut hasher = sha2::Sha256::new();
    for name in identity_fields {
        let value = record.get(name);
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Token format of the pre-versioned state file: MD5 of the fields joined
/// with `|`. Only used to recognise rows reported before the upgrade.
pub fn legacy_fingerprint(record: &Record, identity_fields: &[&str]) -> String {
    let key = identity_fields
        .iter()
        .map(|name| record.get(name))
        .collect::<Vec<_>>()
        .join("|");
    hex::encode(md5::Md5::digest(key.as_bytes()))
}
