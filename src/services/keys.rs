//! Opaque identifier and API key generation.
//!
//! All identifiers are 32 random bytes, base64url encoded, behind a stable
//! prefix. Randomness (not a sequence) is what makes `postGroupId` values
//! unique forever, including across deletes.

use base64::Engine;
use rand::Rng;

fn random_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// New account API key: `sk_...`
pub fn generate_api_key() -> String {
    format!("sk_{}", random_token())
}

/// New post group identifier: `pg_...`
pub fn generate_post_group_id() -> String {
    format!("pg_{}", random_token())
}

/// New media asset identifier: `med_...`
pub fn generate_media_id() -> String {
    format!("med_{}", random_token())
}

/// New workspace user identifier: `usr_...`
pub fn generate_workspace_user_id() -> String {
    format!("usr_{}", random_token())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifiers_carry_their_prefix() {
        assert!(generate_api_key().starts_with("sk_"));
        assert!(generate_post_group_id().starts_with("pg_"));
        assert!(generate_media_id().starts_with("med_"));
        assert!(generate_workspace_user_id().starts_with("usr_"));
    }

    #[test]
    fn post_group_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_post_group_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
