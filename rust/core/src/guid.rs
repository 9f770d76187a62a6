// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC GlobalId generation
//!
//! An IfcGloballyUniqueId is a 128-bit value written as 22 characters of a
//! base64 variant: the first character carries the 2 high bits, the other
//! 21 carry 6 bits each.

use uuid::Uuid;

const ALPHABET: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_$";

/// Namespace for name-based GlobalIds
const GEO2IFC_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_7e3a_52d4_4b0e_9a61_2f0c_8d3e_11a7);

/// Encode 16 bytes as a 22-character IFC GlobalId
pub fn compress(bytes: &[u8; 16]) -> String {
    let value = u128::from_be_bytes(*bytes);
    let mut out = String::with_capacity(22);
    out.push(ALPHABET[(value >> 126) as usize] as char);
    for i in (0..21).rev() {
        let index = ((value >> (i * 6)) & 0x3f) as usize;
        out.push(ALPHABET[index] as char);
    }
    out
}

/// Decode a 22-character IFC GlobalId back into its 16 bytes
pub fn expand(guid: &str) -> Option<[u8; 16]> {
    let chars = guid.as_bytes();
    if chars.len() != 22 {
        return None;
    }
    let mut value: u128 = 0;
    for (i, c) in chars.iter().enumerate() {
        let digit = ALPHABET.iter().position(|a| a == c)? as u128;
        if i == 0 && digit > 3 {
            return None;
        }
        value = (value << 6) | digit;
    }
    Some(value.to_be_bytes())
}

/// Deterministic GlobalId derived from a scope (e.g. the site name) and the
/// role of the entity inside that scope.
pub fn stable_guid(scope: &str, role: &str) -> String {
    let name = format!("{scope}/{role}");
    compress(Uuid::new_v5(&GEO2IFC_NAMESPACE, name.as_bytes()).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_guid_has_22_chars() {
        let guid = stable_guid("Site_A", "project");
        assert_eq!(guid.len(), 22);
        assert!(guid.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn zero_and_max_values() {
        assert_eq!(compress(&[0u8; 16]), "0000000000000000000000");
        assert_eq!(compress(&[0xffu8; 16]), "3$$$$$$$$$$$$$$$$$$$$$");
    }

    #[test]
    fn expand_inverts_compress() {
        let uuid = Uuid::new_v5(&GEO2IFC_NAMESPACE, b"round-trip");
        let guid = compress(uuid.as_bytes());
        assert_eq!(expand(&guid), Some(*uuid.as_bytes()));
    }

    #[test]
    fn expand_rejects_bad_input() {
        assert_eq!(expand("short"), None);
        assert_eq!(expand("4000000000000000000000"), None);
        assert_eq!(expand("000000000000000000000!"), None);
    }

    #[test]
    fn stable_guid_is_deterministic_and_scoped() {
        assert_eq!(stable_guid("Site_A", "segment/0"), stable_guid("Site_A", "segment/0"));
        assert_ne!(stable_guid("Site_A", "segment/0"), stable_guid("Site_B", "segment/0"));
        assert_ne!(stable_guid("Site_A", "segment/0"), stable_guid("Site_A", "segment/1"));
    }
}
