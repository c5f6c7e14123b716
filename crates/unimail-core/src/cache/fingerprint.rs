use std::fmt;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Cache namespace derived from a credential pair.
///
/// 64-bit FNV-1a of `key + secret`, as 16 hex digits. Only partitions the
/// local cache file; it is not a security boundary. The value must stay
/// stable across builds, so `DefaultHasher` is not an option.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    pub fn of(key: &str, secret: &str) -> Self {
        let hash = key
            .bytes()
            .chain(secret.bytes())
            .fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
            });
        Self(format!("{:016x}", hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
