//! Size/count bounds collaborator (§3, §6 "Limits source"). A plain value
//! type a caller can override; the core never reads configuration from disk
//! or the environment.

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_files_per_capsa: usize,
    pub max_total_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_file_size: 100 * 1024 * 1024,
            max_files_per_capsa: 100,
            max_total_size: 500 * 1024 * 1024,
        }
    }
}

pub const MAX_SUBJECT_CHARS: usize = 65_536;
pub const MAX_BODY_CHARS: usize = 1_048_576;
pub const MAX_STRUCTURED_CHARS: usize = 1_048_576;
pub const MAX_ENCRYPTED_FILENAME_CHARS: usize = 2_048;
pub const MAX_METADATA_LABEL_CHARS: usize = 512;
pub const MAX_METADATA_TAGS: usize = 100;
pub const MAX_METADATA_TAG_CHARS: usize = 100;
pub const MAX_METADATA_NOTES_CHARS: usize = 10_240;
pub const MAX_RELATED_PACKAGES: usize = 50;
pub const MAX_PARTY_ID_CHARS: usize = 100;
pub const MAX_ACTING_FOR: usize = 10;
pub const MAX_KEYCHAIN_ENTRIES: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec() {
        let limits = Limits::default();
        assert_eq!(limits.max_file_size, 100 * 1024 * 1024);
        assert_eq!(limits.max_files_per_capsa, 100);
        assert_eq!(limits.max_total_size, 500 * 1024 * 1024);
    }
}
