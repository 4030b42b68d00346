//! Structural fingerprints for instantiation caching.
//!
//! A generic or array instantiation is cached under a blake3 hash of the
//! canonical names of its parts, so the same `(definition, arguments)` pair
//! always maps to the same table entry however it was requested.
//!
//! Each part is length-prefixed before hashing, so `("A", ["BC"])` and
//! `("AB", ["C"])` produce different fingerprints.

const GENERIC_TAG: u8 = 1;
const ARRAY_TAG: u8 = 2;

fn update_name(hasher: &mut blake3::Hasher, name: &str) {
    hasher.update(&(name.len() as u64).to_le_bytes());
    hasher.update(name.as_bytes());
}

/// Fingerprint of a generic definition closed over `arguments`.
pub fn instantiation(definition: &str, arguments: &[&str]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[GENERIC_TAG]);
    update_name(&mut hasher, definition);
    hasher.update(&(arguments.len() as u64).to_le_bytes());
    for argument in arguments {
        update_name(&mut hasher, argument);
    }
    hasher.finalize()
}

/// Fingerprint of a single-dimension array of `element`.
pub fn array(element: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[ARRAY_TAG]);
    update_name(&mut hasher, element);
    hasher.finalize()
}
