/// Utility functions for timestamps and change-id hashing
/// Get the current Unix timestamp in seconds
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Generate a Blake3 hash ID for a change from its creation-time identity.
/// Two changes created for the same destination with the same subject at the
/// same instant by the same owner would collide, which is acceptable: change
/// creation is serialized through the changes provider.
pub fn generate_change_id(
    project: &str,
    branch: &str,
    subject: &str,
    owner: &str,
    timestamp: u64,
) -> String {
    let mut hasher = blake3::Hasher::new();

    hasher.update(project.as_bytes());
    hasher.update(b"\0");
    hasher.update(branch.as_bytes());
    hasher.update(b"\0");
    hasher.update(subject.as_bytes());
    hasher.update(b"\0");
    hasher.update(owner.as_bytes());
    hasher.update(b"\0");
    hasher.update(&timestamp.to_le_bytes());

    hasher.finalize().to_hex().to_string()
}

/// Get short form of a hash ID (first 12 characters)
pub fn short_hash(hash: &str) -> String {
    hash.chars().take(12).collect()
}
