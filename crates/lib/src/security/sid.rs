//! Security identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::SecurityError;

const MAX_SUB_AUTHORITIES: usize = 15;

/// A security identifier (`S-1-5-21-...`).
///
/// Serializes as its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sid {
    revision: u8,
    authority: u64,
    sub_authorities: Vec<u32>,
}

impl Sid {
    /// Create a SID from its parts. The authority is a 48-bit value.
    pub fn new(authority: u64, sub_authorities: &[u32]) -> Result<Self, SecurityError> {
        if authority >= 1 << 48 {
            return Err(SecurityError::MalformedSid {
                reason: format!("identifier authority {authority} exceeds 48 bits"),
            });
        }
        if sub_authorities.len() > MAX_SUB_AUTHORITIES {
            return Err(SecurityError::MalformedSid {
                reason: format!("{} sub-authorities", sub_authorities.len()),
            });
        }
        Ok(Self {
            revision: 1,
            authority,
            sub_authorities: sub_authorities.to_vec(),
        })
    }

    /// Decode the binary wire form: revision, sub-authority count, a big-endian
    /// 48-bit authority, then little-endian 32-bit sub-authorities.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        if bytes.len() < 8 {
            return Err(SecurityError::MalformedSid {
                reason: format!("{} bytes is shorter than the fixed header", bytes.len()),
            });
        }
        let revision = bytes[0];
        let count = bytes[1] as usize;
        if revision != 1 || count > MAX_SUB_AUTHORITIES {
            return Err(SecurityError::MalformedSid {
                reason: format!("revision {revision} with {count} sub-authorities"),
            });
        }
        if bytes.len() != 8 + 4 * count {
            return Err(SecurityError::MalformedSid {
                reason: format!("{} bytes for {count} sub-authorities", bytes.len()),
            });
        }
        let authority = bytes[2..8]
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        let sub_authorities = bytes[8..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            revision,
            authority,
            sub_authorities,
        })
    }

    /// Encode to the binary wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 4 * self.sub_authorities.len());
        out.push(self.revision);
        out.push(self.sub_authorities.len() as u8);
        out.extend_from_slice(&self.authority.to_be_bytes()[2..]);
        for sub in &self.sub_authorities {
            out.extend_from_slice(&sub.to_le_bytes());
        }
        out
    }

    /// The 48-bit identifier authority.
    pub fn authority(&self) -> u64 {
        self.authority
    }

    /// The sub-authorities, domain part first.
    pub fn sub_authorities(&self) -> &[u32] {
        &self.sub_authorities
    }

    /// The relative identifier (last sub-authority).
    pub fn rid(&self) -> Option<u32> {
        self.sub_authorities.last().copied()
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-{}", self.revision, self.authority)?;
        for sub in &self.sub_authorities {
            write!(f, "-{sub}")?;
        }
        Ok(())
    }
}

impl FromStr for Sid {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SecurityError::MalformedSid {
            reason: format!("cannot parse {s:?}"),
        };
        let mut parts = s.split('-');
        if !parts.next().is_some_and(|p| p.eq_ignore_ascii_case("S")) {
            return Err(malformed());
        }
        let revision: u8 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        if revision != 1 {
            return Err(malformed());
        }
        let authority: u64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        let sub_authorities = parts
            .map(|p| p.parse::<u32>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;
        Sid::new(authority, &sub_authorities)
    }
}

impl TryFrom<String> for Sid {
    type Error = SecurityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Sid> for String {
    fn from(sid: Sid) -> Self {
        sid.to_string()
    }
}
