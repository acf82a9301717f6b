//! Structure hash used to detect "nothing changed" between syncs.
//!
//! This is a 32-bit `h * 31 + c` rolling hash over UTF-16 code units, printed
//! in base 36. It is NOT collision resistant: two different trees can share a
//! hash, in which case a sync is skipped when it should not be. Hashes already
//! stored in the document were produced by this exact function, so changing it
//! makes every stored record look different.

use std::fmt;

use crate::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hashes the canonical JSON form of `tree`.
    pub fn of_tree(tree: &TreeNode) -> Self {
        // TreeNode's Serialize impl only emits strings and sequences.
        let json = serde_json::to_string(tree).unwrap_or_default();
        Self::of_text(&json)
    }

    pub fn of_text(text: &str) -> Self {
        ContentHash(to_base36(rolling_hash(text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContentHash {
    fn from(value: String) -> Self {
        ContentHash(value)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn rolling_hash(text: &str) -> i32 {
    text.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

pub fn to_base36(value: i32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut magnitude = i64::from(value).unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        digits.push(DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
